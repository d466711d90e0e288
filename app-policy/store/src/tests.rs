mod workloads;

use crate::{EndpointIndex, EndpointMode, PolicyStore};
use app_policy_core::{
    update::{WorkloadEndpointRemove, WorkloadEndpointUpdate},
    IpNet, Update, WorkloadEndpoint, WorkloadEndpointId,
};
use tracing_subscriber::util::SubscriberInitExt;

struct TestConfig {
    store: PolicyStore,
    _tracing: tracing::subscriber::DefaultGuard,
}

impl TestConfig {
    fn new(mode: EndpointMode) -> Self {
        let _tracing = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::TRACE)
            .set_default();
        Self {
            store: PolicyStore::new(mode),
            _tracing,
        }
    }

    fn apply(&mut self, update: Update) {
        self.store.apply_update(update, false);
    }
}

fn mk_endpoint_id(name: &str) -> WorkloadEndpointId {
    WorkloadEndpointId::new("k8s", format!("ns-0/{name}"), "eth0")
}

fn mk_endpoint(
    name: impl ToString,
    ipv4: impl IntoIterator<Item = &'static str>,
    ipv6: impl IntoIterator<Item = &'static str>,
) -> WorkloadEndpoint {
    WorkloadEndpoint {
        name: name.to_string(),
        ipv4_nets: ipv4.into_iter().map(Into::into).collect(),
        ipv6_nets: ipv6.into_iter().map(Into::into).collect(),
        ..Default::default()
    }
}

fn mk_endpoint_update(
    id: &WorkloadEndpointId,
    ipv4: impl IntoIterator<Item = &'static str>,
) -> WorkloadEndpointUpdate {
    WorkloadEndpointUpdate {
        id: Some(id.clone()),
        endpoint: Some(mk_endpoint(&id.workload_id, ipv4, None)),
    }
}

/// An index that records the calls it receives.
#[derive(Debug, Default)]
struct Recorder {
    calls: Vec<Call>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Call {
    Update(IpNet, WorkloadEndpointId),
    Delete(IpNet, WorkloadEndpointId),
}

impl EndpointIndex for Recorder {
    fn update(&mut self, addr: IpNet, update: &WorkloadEndpointUpdate) {
        let id = update.id.clone().expect("updates must carry an id");
        self.calls.push(Call::Update(addr, id));
    }

    fn delete(&mut self, addr: IpNet, remove: &WorkloadEndpointRemove) {
        let id = remove.id.clone().expect("removes must carry an id");
        self.calls.push(Call::Delete(addr, id));
    }
}
