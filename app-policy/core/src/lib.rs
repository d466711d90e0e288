//! Data model shared by the application-layer policy store and checker.
//!
//! Everything in this crate mirrors what the control plane sends over its
//! sync feed: identifiers, tiers, policies, profiles, rules and workload
//! endpoints, plus the `Update` union that carries them. The types are plain
//! data; evaluation lives in `app-policy-checker` and storage in
//! `app-policy-store`.

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod action;
pub mod http_match;
pub mod ids;
pub mod labels;
pub mod policy;
mod principal;
mod protocol;
pub mod trace;
pub mod update;

pub use self::{
    action::{Action, InvalidAction, RuleDir},
    http_match::{HttpMatch, PathMatch},
    ids::{NamespaceId, PolicyId, ProfileId, ServiceAccountId, WorkloadEndpointId},
    labels::{Labels, Selector},
    policy::{
        ApplicationLayer, DefaultAction, Policy, PortRange, Profile, Rule, ServiceAccountMatch, TierInfo,
        WorkloadEndpoint,
    },
    principal::{InvalidPrincipal, Principal},
    protocol::{InvalidProtocol, Protocol},
    trace::{Ordinal, RuleId},
    update::{IpSetKind, Update},
};
pub use ipnet::{IpNet, Ipv4Net, Ipv6Net};

/// Prefix carried by the names of staged (not yet enforced) policies.
pub const STAGED_POLICY_PREFIX: &str = "staged:";

/// Returns true if the policy name refers to a staged policy.
///
/// Namespaced policy names take the form `<namespace>/<name>`; the staged
/// prefix applies to the part after the namespace.
pub fn is_staged_policy(name: &str) -> bool {
    let name = name.rsplit_once('/').map(|(_, n)| n).unwrap_or(name);
    name.starts_with(STAGED_POLICY_PREFIX)
}
