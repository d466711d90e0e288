use crate::Flow;
use app_policy_core::Protocol;
use std::net::IpAddr;
use tokio::sync::mpsc;

/// Identifies a flow for statistics reporting.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tuple {
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: Protocol,
}

/// A per-flow tally of allowed and denied requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataplaneStats {
    pub tuple: Tuple,
    pub allowed: u64,
    pub denied: u64,
}

/// Receives statistics samples from the decision path.
///
/// Implementations must not block.
pub trait StatsSink: Send + Sync {
    fn report(&self, stats: DataplaneStats);
}

// === impl Tuple ===

impl Tuple {
    pub fn of(flow: &dyn Flow) -> Self {
        Self {
            src_ip: flow.source_ip(),
            dst_ip: flow.destination_ip(),
            src_port: flow.source_port(),
            dst_port: flow.destination_port(),
            protocol: flow.protocol(),
        }
    }
}

// === impl DataplaneStats ===

impl DataplaneStats {
    pub fn allowed(tuple: Tuple) -> Self {
        Self {
            tuple,
            allowed: 1,
            denied: 0,
        }
    }

    pub fn denied(tuple: Tuple) -> Self {
        Self {
            tuple,
            allowed: 0,
            denied: 1,
        }
    }
}

// === impl StatsSink ===

/// Discards all samples.
impl StatsSink for () {
    fn report(&self, _: DataplaneStats) {}
}

impl StatsSink for mpsc::Sender<DataplaneStats> {
    fn report(&self, stats: DataplaneStats) {
        if let Err(error) = self.try_send(stats) {
            tracing::debug!(%error, "Dropping statistics sample");
        }
    }
}
