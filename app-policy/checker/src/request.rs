use crate::{flow::FlowTuple, Flow};
use app_policy_core::Protocol;
use std::{
    collections::BTreeMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
};

/// A request to authorize a flow, as issued by the proxy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckRequest {
    pub source: Peer,
    pub destination: Peer,
    pub protocol: Protocol,
    pub http: Option<HttpRequest>,
}

/// One side of the flow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Peer {
    pub addr: SocketAddr,

    /// The peer's SPIFFE identity, if the proxy authenticated it.
    pub principal: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub scheme: String,
    pub host: String,
    pub headers: BTreeMap<String, String>,

    /// Only consumed by content inspection.
    pub body: Vec<u8>,
}

// === impl CheckRequest ===

impl CheckRequest {
    pub fn new(source: SocketAddr, destination: SocketAddr, protocol: Protocol) -> Self {
        Self {
            source: Peer::new(source),
            destination: Peer::new(destination),
            protocol,
            http: None,
        }
    }

    pub fn with_http(mut self, http: HttpRequest) -> Self {
        self.http = Some(http);
        self
    }

    pub fn tuple(&self) -> FlowTuple {
        FlowTuple::new(self.source.addr, self.destination.addr, self.protocol)
    }
}

impl Default for CheckRequest {
    fn default() -> Self {
        let unspecified = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0);
        Self::new(unspecified, unspecified, Protocol::TCP)
    }
}

impl Flow for CheckRequest {
    fn source_ip(&self) -> IpAddr {
        self.source.addr.ip()
    }

    fn destination_ip(&self) -> IpAddr {
        self.destination.addr.ip()
    }

    fn source_port(&self) -> u16 {
        self.source.addr.port()
    }

    fn destination_port(&self) -> u16 {
        self.destination.addr.port()
    }

    fn protocol(&self) -> Protocol {
        self.protocol
    }

    fn http_method(&self) -> Option<&str> {
        self.http.as_ref().map(|h| h.method.as_str())
    }

    fn http_path(&self) -> Option<&str> {
        self.http.as_ref().map(|h| h.path.as_str())
    }

    fn source_principal(&self) -> Option<&str> {
        self.source.principal.as_deref()
    }

    fn destination_principal(&self) -> Option<&str> {
        self.destination.principal.as_deref()
    }
}

// === impl Peer ===

impl Peer {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            principal: None,
        }
    }

    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }
}

// === impl HttpRequest ===

impl HttpRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }
}
