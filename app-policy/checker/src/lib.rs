//! Authorization decisions for application-layer policy.
//!
//! A [`Checker`] runs each [`CheckRequest`] through an ordered chain of
//! [`CheckProvider`]s. The [`PolicyProvider`] evaluates the request against
//! the tiered policy in the store:
//!
//! ```text
//! [ Tier 0 ] -> [ Tier 1 ] -> ... -> [ Profiles ]
//!  policies      policies             rules
//!   rules         rules
//! ```
//!
//! Each decision holds the store's read lock for its whole duration, so a
//! decision never observes a partially-applied update.

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod checker;
pub mod engine;
mod flow;
pub mod matcher;
mod metrics;
mod provider;
mod request;
pub mod stats;


pub use self::{
    checker::Checker,
    engine::{CheckError, Verdict},
    flow::{Flow, FlowTuple},
    metrics::CheckMetrics,
    provider::{
        CheckProvider, CheckResponse, ContentInspector, InspectionProvider, PolicyProvider,
        Violation,
    },
    request::{CheckRequest, HttpRequest, Peer},
    stats::{DataplaneStats, StatsSink},
};
