use app_policy_core::Protocol;
use std::net::{IpAddr, SocketAddr};

/// The attributes of an in-flight flow that rules can match on.
///
/// A bare connection only provides its addresses and protocol; richer
/// requests additionally expose HTTP attributes and peer identities.
pub trait Flow {
    fn source_ip(&self) -> IpAddr;
    fn destination_ip(&self) -> IpAddr;
    fn source_port(&self) -> u16;
    fn destination_port(&self) -> u16;
    fn protocol(&self) -> Protocol;

    fn http_method(&self) -> Option<&str> {
        None
    }

    /// The raw request path, including any query string.
    fn http_path(&self) -> Option<&str> {
        None
    }

    fn source_principal(&self) -> Option<&str> {
        None
    }

    fn destination_principal(&self) -> Option<&str> {
        None
    }
}

/// A connection described only by its addresses and protocol.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FlowTuple {
    pub source: SocketAddr,
    pub destination: SocketAddr,
    pub protocol: Protocol,
}

// === impl FlowTuple ===

impl FlowTuple {
    pub fn new(source: SocketAddr, destination: SocketAddr, protocol: Protocol) -> Self {
        Self {
            source,
            destination,
            protocol,
        }
    }
}

impl Flow for FlowTuple {
    fn source_ip(&self) -> IpAddr {
        self.source.ip()
    }

    fn destination_ip(&self) -> IpAddr {
        self.destination.ip()
    }

    fn source_port(&self) -> u16 {
        self.source.port()
    }

    fn destination_port(&self) -> u16 {
        self.destination.port()
    }

    fn protocol(&self) -> Protocol {
        self.protocol
    }
}
