//! Policy store for the application-layer policy checker.
//!
//! The store holds everything the control plane has told us about: active
//! policies and profiles, IP sets, workload endpoints, service-account and
//! namespace labels and a handful of store-wide settings. It is fed by a
//! single sync task through [`PolicyStoreManager::apply_update`] and read
//! concurrently by checks.
//!
//! In multi-endpoint mode, endpoints are additionally indexed by interface
//! address:
//!
//! ```text
//! [ WorkloadEndpointUpdate ] -> [ WorkloadUpdateHandler ] -> [ IpIndex ]
//!                                  (interface deltas)        (addr -> endpoints)
//! ```
//!
//! The handler only ever tells the index about interfaces that changed, so an
//! endpoint that drops an address stops resolving from it immediately.

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod config;
mod ip_index;
mod ipset;
mod manager;
pub mod metrics;
mod store;
mod workload;

#[cfg(test)]
mod tests;

pub use self::{
    config::{
        DropActionOverride, InvalidDropActionOverride, DROP_ACTION_OVERRIDE,
        STATS_ENABLED_FOR_ALLOWED, STATS_ENABLED_FOR_DENIED,
    },
    ip_index::{EndpointIndex, IpIndex},
    ipset::IpSet,
    manager::{PolicyStoreManager, SharedManager},
    store::{EndpointMode, ParseModeError, PolicyStore},
    workload::WorkloadUpdateHandler,
};
