//! Wires the policy store, the checker and the control feed together.

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod args;
pub mod sync;

pub use self::{
    args::{Args, LogFormat},
    sync::SyncEvent,
};

use app_policy_checker::{CheckMetrics, Checker, DataplaneStats, PolicyProvider};
use app_policy_store::{self as store, EndpointMode, PolicyStoreManager, SharedManager};
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A running checker.
///
/// Dropping `events` stops the control feed task.
#[derive(Debug)]
pub struct Runtime {
    pub manager: SharedManager,
    pub checker: Arc<Checker>,

    /// Feeds the single writer of the store.
    pub events: mpsc::Sender<SyncEvent>,

    /// Samples reported by the policy provider.
    pub stats: mpsc::Receiver<DataplaneStats>,

    pub registry: Registry,
}

// === impl Runtime ===

impl Runtime {
    /// Spawns the control feed task on the current tokio runtime.
    pub fn spawn(
        mode: EndpointMode,
        store_staged: bool,
        update_capacity: usize,
        stats_capacity: usize,
    ) -> Self {
        let manager = PolicyStoreManager::shared(mode);

        let mut registry = <Registry>::default();
        store::metrics::register(registry.sub_registry_with_prefix("store"), manager.clone());
        let metrics = CheckMetrics::register(registry.sub_registry_with_prefix("check"));

        let (stats_tx, stats) = mpsc::channel(stats_capacity);
        let checker = Checker::new()
            .with_metrics(metrics)
            .with_provider(PolicyProvider::new(manager.clone()).with_stats(stats_tx));

        let (events, events_rx) = mpsc::channel(update_capacity);
        tokio::spawn(sync::process(manager.clone(), store_staged, events_rx));

        Self {
            manager,
            checker: Arc::new(checker),
            events,
            stats,
            registry,
        }
    }
}
