use std::{fmt, str::FromStr};

const SPIFFE_SCHEME: &str = "spiffe://";

/// A workload identity of the form `spiffe://<trust-domain>/ns/<namespace>/sa/<name>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Principal {
    pub trust_domain: String,
    pub namespace: String,
    pub service_account: String,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid principal: {0:?}")]
pub struct InvalidPrincipal(pub String);

// === impl Principal ===

impl FromStr for Principal {
    type Err = InvalidPrincipal;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidPrincipal(s.to_string());
        let rest = s.strip_prefix(SPIFFE_SCHEME).ok_or_else(invalid)?;

        let mut parts = rest.split('/');
        match (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) {
            (Some(td), Some("ns"), Some(ns), Some("sa"), Some(sa), None)
                if !td.is_empty() && !ns.is_empty() && !sa.is_empty() =>
            {
                Ok(Self {
                    trust_domain: td.to_string(),
                    namespace: ns.to_string(),
                    service_account: sa.to_string(),
                })
            }
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}/ns/{}/sa/{}",
            SPIFFE_SCHEME, self.trust_domain, self.namespace, self.service_account
        )
    }
}
