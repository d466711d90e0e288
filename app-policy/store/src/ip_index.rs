use ahash::AHashMap as HashMap;
use app_policy_core::{
    update::{WorkloadEndpointRemove, WorkloadEndpointUpdate},
    IpNet, WorkloadEndpoint, WorkloadEndpointId,
};
use std::{collections::hash_map::Entry, net::IpAddr};

/// Receives per-address events from the workload update handler.
pub trait EndpointIndex {
    /// Binds the updated endpoint to the address.
    fn update(&mut self, addr: IpNet, update: &WorkloadEndpointUpdate);

    /// Unbinds the removed endpoint from the address.
    fn delete(&mut self, addr: IpNet, remove: &WorkloadEndpointRemove);
}

/// Maps interface addresses to the workload endpoints bound to them.
///
/// Interfaces are indexed by their host address; the prefix length of an
/// interface network is not significant.
#[derive(Clone, Debug, Default)]
pub struct IpIndex {
    by_addr: HashMap<IpAddr, ByEndpoint>,
}

type ByEndpoint = HashMap<WorkloadEndpointId, WorkloadEndpoint>;

// === impl IpIndex ===

impl IpIndex {
    /// Returns the endpoints bound to an address along with their ids.
    pub fn lookup(&self, addr: IpAddr) -> Vec<(&WorkloadEndpointId, &WorkloadEndpoint)> {
        self.by_addr
            .get(&addr)
            .map(|eps| eps.iter().collect())
            .unwrap_or_default()
    }

    /// Returns the ids of the endpoints bound to an address.
    pub fn keys(&self, addr: IpAddr) -> Vec<&WorkloadEndpointId> {
        self.lookup(addr).into_iter().map(|(id, _)| id).collect()
    }

    pub fn contains(&self, addr: IpAddr) -> bool {
        self.by_addr.contains_key(&addr)
    }

    /// The number of indexed addresses.
    pub fn len(&self) -> usize {
        self.by_addr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_addr.is_empty()
    }
}

impl EndpointIndex for IpIndex {
    fn update(&mut self, addr: IpNet, update: &WorkloadEndpointUpdate) {
        let (Some(id), Some(endpoint)) = (update.id.as_ref(), update.endpoint.as_ref()) else {
            return;
        };
        tracing::trace!(%addr, %id, "Binding address");
        self.by_addr
            .entry(addr.addr())
            .or_default()
            .insert(id.clone(), endpoint.clone());
    }

    fn delete(&mut self, addr: IpNet, remove: &WorkloadEndpointRemove) {
        let Some(id) = remove.id.as_ref() else {
            return;
        };
        if let Entry::Occupied(mut entry) = self.by_addr.entry(addr.addr()) {
            tracing::trace!(%addr, %id, "Unbinding address");
            entry.get_mut().remove(id);
            if entry.get().is_empty() {
                entry.remove();
            }
        }
    }
}
