//! Policies, profiles and the workload endpoints that reference them.

use crate::{labels::Selector, Action, HttpMatch, InvalidAction, IpNet, Protocol, RuleDir};
use serde::{Deserialize, Serialize};

/// A single policy rule.
///
/// Every predicate is optional; an empty field does not constrain the match.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Rule {
    /// The unparsed action. It is only interpreted once the rule matches.
    pub action: String,

    pub protocol: Option<Protocol>,
    pub not_protocol: Option<Protocol>,

    pub src_net: Vec<IpNet>,
    pub not_src_net: Vec<IpNet>,
    pub src_ports: Vec<PortRange>,
    pub not_src_ports: Vec<PortRange>,
    pub src_ip_set_ids: Vec<String>,
    pub not_src_ip_set_ids: Vec<String>,
    pub src_service_account_match: Option<ServiceAccountMatch>,
    pub src_namespace_selector: Option<Selector>,

    pub dst_net: Vec<IpNet>,
    pub not_dst_net: Vec<IpNet>,
    pub dst_ports: Vec<PortRange>,
    pub not_dst_ports: Vec<PortRange>,
    pub dst_ip_set_ids: Vec<String>,
    pub not_dst_ip_set_ids: Vec<String>,
    pub dst_ip_port_set_ids: Vec<String>,
    pub dst_service_account_match: Option<ServiceAccountMatch>,
    pub dst_namespace_selector: Option<Selector>,

    pub http_match: Option<HttpMatch>,
}

/// An inclusive range of ports.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct PortRange {
    pub first: u16,
    pub last: u16,
}

/// Matches the service account of a peer by name and/or labels.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceAccountMatch {
    pub names: Vec<String>,
    pub selector: Option<Selector>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Policy {
    pub namespace: String,
    pub inbound_rules: Vec<Rule>,
    pub outbound_rules: Vec<Rule>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Profile {
    pub inbound_rules: Vec<Rule>,
    pub outbound_rules: Vec<Rule>,
}

/// The action taken when no policy in a tier matches.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum DefaultAction {
    #[default]
    Deny,
    Pass,
}

/// An ordered group of policies applied to an endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TierInfo {
    pub name: String,
    pub ingress_policies: Vec<String>,
    pub egress_policies: Vec<String>,
    pub default_action: DefaultAction,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ApplicationLayer {
    pub policy: String,
    pub logging: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkloadEndpoint {
    pub name: String,
    pub tiers: Vec<TierInfo>,
    pub profile_ids: Vec<String>,
    pub ipv4_nets: Vec<String>,
    pub ipv6_nets: Vec<String>,
    pub application_layer: Option<ApplicationLayer>,
}

// === impl Rule ===

impl Rule {
    pub fn parse_action(&self) -> Result<Action, InvalidAction> {
        self.action.parse()
    }
}

// === impl PortRange ===

impl PortRange {
    pub fn new(first: u16, last: u16) -> Self {
        Self { first, last }
    }

    pub fn single(port: u16) -> Self {
        Self::new(port, port)
    }

    pub fn contains(&self, port: u16) -> bool {
        self.first <= port && port <= self.last
    }
}

// === impl Policy ===

impl Policy {
    pub fn rules(&self, dir: RuleDir) -> &[Rule] {
        match dir {
            RuleDir::Ingress => &self.inbound_rules,
            RuleDir::Egress => &self.outbound_rules,
        }
    }
}

// === impl Profile ===

impl Profile {
    pub fn rules(&self, dir: RuleDir) -> &[Rule] {
        match dir {
            RuleDir::Ingress => &self.inbound_rules,
            RuleDir::Egress => &self.outbound_rules,
        }
    }
}

// === impl TierInfo ===

impl TierInfo {
    pub fn policies(&self, dir: RuleDir) -> &[String] {
        match dir {
            RuleDir::Ingress => &self.ingress_policies,
            RuleDir::Egress => &self.egress_policies,
        }
    }
}

// === impl WorkloadEndpoint ===

impl WorkloadEndpoint {
    /// Iterates over the endpoint's interface addresses, IPv4 first.
    pub fn nets(&self) -> impl Iterator<Item = &str> {
        self.ipv4_nets
            .iter()
            .chain(self.ipv6_nets.iter())
            .map(String::as_str)
    }
}
