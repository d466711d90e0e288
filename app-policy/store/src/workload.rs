use crate::ip_index::EndpointIndex;
use ahash::AHashMap as HashMap;
use app_policy_core::{
    update::{WorkloadEndpointRemove, WorkloadEndpointUpdate},
    IpNet, WorkloadEndpoint, WorkloadEndpointId,
};
use std::net::IpAddr;

/// Tracks workload endpoints and drives an [`EndpointIndex`] with the
/// difference between each endpoint's previous and current interfaces.
#[derive(Clone, Debug, Default)]
pub struct WorkloadUpdateHandler {
    workloads: HashMap<WorkloadEndpointId, Workload>,
}

#[derive(Clone, Debug)]
struct Workload {
    endpoint: WorkloadEndpoint,

    /// Interfaces last registered with the index, in the order they were
    /// announced. Only used to compute deltas.
    active: Vec<String>,
}

// === impl WorkloadUpdateHandler ===

impl WorkloadUpdateHandler {
    pub fn get(&self, id: &WorkloadEndpointId) -> Option<&WorkloadEndpoint> {
        self.workloads.get(id).map(|w| &w.endpoint)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&WorkloadEndpointId, &WorkloadEndpoint)> {
        self.workloads.iter().map(|(id, w)| (id, &w.endpoint))
    }

    pub fn len(&self) -> usize {
        self.workloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workloads.is_empty()
    }

    /// Applies an endpoint upsert.
    ///
    /// Interfaces that the endpoint no longer announces are deleted from the
    /// index; every interface it does announce is (re-)updated.
    pub fn on_update<I: EndpointIndex>(&mut self, index: &mut I, update: &WorkloadEndpointUpdate) {
        let (Some(id), Some(endpoint)) = (update.id.as_ref(), update.endpoint.as_ref()) else {
            tracing::warn!(id = ?update.id, "Ignoring workload endpoint update without id or endpoint");
            return;
        };

        let mut incoming = Vec::<String>::new();
        for net in endpoint.nets() {
            if !incoming.iter().any(|n| n == net) {
                incoming.push(net.to_string());
            }
        }

        if let Some(prior) = self.workloads.get(id) {
            let remove = WorkloadEndpointRemove {
                id: Some(id.clone()),
            };
            for iface in prior.active.iter().filter(|a| !incoming.contains(*a)) {
                if let Some(addr) = parse_interface(iface) {
                    index.delete(addr, &remove);
                }
            }
        }

        for iface in &incoming {
            if let Some(addr) = parse_interface(iface) {
                index.update(addr, update);
            }
        }

        tracing::debug!(%id, interfaces = incoming.len(), "Indexed workload endpoint");
        self.workloads.insert(
            id.clone(),
            Workload {
                endpoint: endpoint.clone(),
                active: incoming,
            },
        );
    }

    /// Applies an endpoint removal, deleting all of its interfaces from the index.
    pub fn on_remove<I: EndpointIndex>(&mut self, index: &mut I, remove: &WorkloadEndpointRemove) {
        let Some(id) = remove.id.as_ref() else {
            tracing::warn!("Ignoring workload endpoint remove without id");
            return;
        };
        let Some(workload) = self.workloads.remove(id) else {
            tracing::debug!(%id, "Workload endpoint not indexed");
            return;
        };
        for iface in &workload.active {
            if let Some(addr) = parse_interface(iface) {
                index.delete(addr, remove);
            }
        }
    }
}

/// Parses an interface as a network or a bare address.
fn parse_interface(iface: &str) -> Option<IpNet> {
    if let Ok(net) = iface.parse::<IpNet>() {
        return Some(net);
    }
    match iface.parse::<IpAddr>() {
        Ok(addr) => Some(IpNet::from(addr)),
        Err(error) => {
            tracing::warn!(%iface, %error, "Skipping unparsable interface address");
            None
        }
    }
}
