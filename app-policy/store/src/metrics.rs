use crate::SharedManager;
use prometheus_client::{
    collector::Collector,
    encoding::{DescriptorEncoder, EncodeMetric},
    metrics::{gauge::ConstGauge, MetricType},
    registry::Registry,
};

#[derive(Debug)]
struct Instrumented(SharedManager);

pub fn register(reg: &mut Registry, manager: SharedManager) {
    reg.register_collector(Box::new(Instrumented(manager)));
}

impl Collector for Instrumented {
    fn encode(&self, mut encoder: DescriptorEncoder<'_>) -> Result<(), std::fmt::Error> {
        let sizes = self.0.do_with_read_lock(|store| {
            let endpoints = match store.mode() {
                crate::EndpointMode::Single => store.endpoint.iter().count(),
                crate::EndpointMode::Multi => store.endpoints.len(),
            };
            [
                ("ready", "Whether the store holds a complete snapshot", store.is_ready() as usize),
                ("policies", "The number of active policies", store.policy_by_id.len()),
                ("profiles", "The number of active profiles", store.profile_by_id.len()),
                ("ip_sets", "The number of IP sets", store.ip_set_by_id.len()),
                ("endpoints", "The number of tracked workload endpoints", endpoints),
                (
                    "indexed_addresses",
                    "The number of addresses in the endpoint index",
                    store.ip_to_endpoints.len(),
                ),
                (
                    "service_accounts",
                    "The number of known service accounts",
                    store.service_account_by_id.len(),
                ),
                ("namespaces", "The number of known namespaces", store.namespace_by_id.len()),
            ]
        });

        for (name, help, value) in sizes {
            let gauge_encoder = encoder.encode_descriptor(name, help, None, MetricType::Gauge)?;
            ConstGauge::new(value as u32).encode(gauge_encoder)?;
        }

        Ok(())
    }
}
