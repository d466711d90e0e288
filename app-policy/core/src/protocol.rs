use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// An IP protocol, identified by its IANA number.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "ProtocolSpec", into = "ProtocolSpec")]
pub struct Protocol(pub u8);

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid protocol: {0:?}")]
pub struct InvalidProtocol(pub String);

/// Protocols may be named or numbered on the wire.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ProtocolSpec {
    Number(u8),
    Name(String),
}

// === impl Protocol ===

impl Protocol {
    pub const ICMP: Self = Self(1);
    pub const TCP: Self = Self(6);
    pub const UDP: Self = Self(17);
    pub const ICMPV6: Self = Self(58);
    pub const SCTP: Self = Self(132);
    pub const UDPLITE: Self = Self(136);

    /// The lowercase name of well-known protocols.
    pub fn name(&self) -> Option<&'static str> {
        match *self {
            Self::ICMP => Some("icmp"),
            Self::TCP => Some("tcp"),
            Self::UDP => Some("udp"),
            Self::ICMPV6 => Some("icmpv6"),
            Self::SCTP => Some("sctp"),
            Self::UDPLITE => Some("udplite"),
            _ => None,
        }
    }
}

impl FromStr for Protocol {
    type Err = InvalidProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "icmp" => Ok(Self::ICMP),
            "tcp" => Ok(Self::TCP),
            "udp" => Ok(Self::UDP),
            "icmpv6" => Ok(Self::ICMPV6),
            "sctp" => Ok(Self::SCTP),
            "udplite" => Ok(Self::UDPLITE),
            other => other
                .parse::<u8>()
                .map(Self)
                .map_err(|_| InvalidProtocol(s.to_string())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => name.fmt(f),
            None => self.0.fmt(f),
        }
    }
}

impl TryFrom<ProtocolSpec> for Protocol {
    type Error = InvalidProtocol;

    fn try_from(spec: ProtocolSpec) -> Result<Self, Self::Error> {
        match spec {
            ProtocolSpec::Number(n) => Ok(Self(n)),
            ProtocolSpec::Name(name) => name.parse(),
        }
    }
}

impl From<Protocol> for ProtocolSpec {
    fn from(p: Protocol) -> Self {
        match p.name() {
            Some(name) => Self::Name(name.to_string()),
            None => Self::Number(p.0),
        }
    }
}
