//! Identifiers used by the control plane to key store entries.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct PolicyId {
    pub tier: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct ProfileId {
    pub name: String,
}

/// Identifies a workload endpoint by its orchestrator, workload and endpoint names.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct WorkloadEndpointId {
    pub orchestrator_id: String,
    pub workload_id: String,
    pub endpoint_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct ServiceAccountId {
    pub namespace: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct NamespaceId {
    pub name: String,
}

// === impl PolicyId ===

impl PolicyId {
    pub fn new(tier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tier: tier.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tier, self.name)
    }
}

// === impl ProfileId ===

impl ProfileId {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.name.fmt(f)
    }
}

// === impl WorkloadEndpointId ===

impl WorkloadEndpointId {
    pub fn new(
        orchestrator_id: impl Into<String>,
        workload_id: impl Into<String>,
        endpoint_id: impl Into<String>,
    ) -> Self {
        Self {
            orchestrator_id: orchestrator_id.into(),
            workload_id: workload_id.into(),
            endpoint_id: endpoint_id.into(),
        }
    }
}

impl fmt::Display for WorkloadEndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.orchestrator_id, self.workload_id, self.endpoint_id
        )
    }
}

// === impl ServiceAccountId ===

impl ServiceAccountId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ServiceAccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// === impl NamespaceId ===

impl NamespaceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.name.fmt(f)
    }
}
