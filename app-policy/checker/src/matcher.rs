//! Rule predicates.
//!
//! A rule is a conjunction of independent predicates, each of which only
//! looks at the parts of the flow it cares about. Predicates implement
//! [`Predicate`], so new kinds of match can be added without touching the
//! decision engine.

use crate::Flow;
use app_policy_core::{
    HttpMatch, InvalidPrincipal, IpNet, Labels, NamespaceId, PortRange, Principal, Rule,
    Selector, ServiceAccountId, ServiceAccountMatch,
};
use app_policy_store::PolicyStore;
use std::net::IpAddr;

/// Decides whether a flow satisfies some condition.
pub trait Predicate {
    fn matches(&self, cx: &MatchContext<'_>) -> Result<bool, MatchError>;
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("invalid HTTP path {0:?}")]
    InvalidPath(String),

    #[error("rule references unknown IP set {0:?}")]
    UnknownIpSet(String),
}

/// The per-decision view of a flow: the flow itself, the store it is
/// evaluated against and the resolved identities of both peers.
pub struct MatchContext<'a> {
    store: &'a PolicyStore,
    flow: &'a dyn Flow,
    source: Option<PeerIdentity>,
    destination: Option<PeerIdentity>,
}

/// A peer's identity and the labels the store holds for it.
#[derive(Clone, Debug)]
pub struct PeerIdentity {
    pub principal: Principal,
    pub labels: Labels,
    pub namespace_labels: Labels,
}

/// Matches a single rule in the context of the policy that holds it.
#[derive(Copy, Clone, Debug)]
pub struct RuleMatch<'r> {
    rule: &'r Rule,
    namespace: &'r str,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Side {
    Source,
    Destination,
}

#[derive(Copy, Clone, Debug)]
struct ProtocolMatch<'r>(&'r Rule);

#[derive(Copy, Clone, Debug)]
struct HttpPredicate<'r>(Option<&'r HttpMatch>);

/// The predicates a rule applies to one side of the flow.
#[derive(Copy, Clone, Debug)]
struct PeerMatch<'r> {
    side: Side,
    nets: &'r [IpNet],
    not_nets: &'r [IpNet],
    ports: &'r [PortRange],
    not_ports: &'r [PortRange],
    ip_set_ids: &'r [String],
    not_ip_set_ids: &'r [String],
    ip_port_set_ids: &'r [String],
    service_accounts: Option<&'r ServiceAccountMatch>,
    namespace_selector: Option<&'r Selector>,

    /// The namespace of the policy that holds the rule, empty for global
    /// policies and profiles.
    policy_namespace: &'r str,
}

// === impl MatchContext ===

impl<'a> MatchContext<'a> {
    /// Resolves both peers' principals against the store.
    ///
    /// Fails if either principal is present but malformed.
    pub fn new(store: &'a PolicyStore, flow: &'a dyn Flow) -> Result<Self, InvalidPrincipal> {
        let source = flow
            .source_principal()
            .map(|p| PeerIdentity::resolve(store, p))
            .transpose()?;
        let destination = flow
            .destination_principal()
            .map(|p| PeerIdentity::resolve(store, p))
            .transpose()?;
        Ok(Self {
            store,
            flow,
            source,
            destination,
        })
    }

    pub fn store(&self) -> &'a PolicyStore {
        self.store
    }

    pub fn flow(&self) -> &'a dyn Flow {
        self.flow
    }

    pub fn source(&self) -> Option<&PeerIdentity> {
        self.source.as_ref()
    }

    pub fn destination(&self) -> Option<&PeerIdentity> {
        self.destination.as_ref()
    }

    fn peer(&self, side: Side) -> Option<&PeerIdentity> {
        match side {
            Side::Source => self.source(),
            Side::Destination => self.destination(),
        }
    }

    fn addr(&self, side: Side) -> IpAddr {
        match side {
            Side::Source => self.flow.source_ip(),
            Side::Destination => self.flow.destination_ip(),
        }
    }

    fn port(&self, side: Side) -> u16 {
        match side {
            Side::Source => self.flow.source_port(),
            Side::Destination => self.flow.destination_port(),
        }
    }
}

// === impl PeerIdentity ===

impl PeerIdentity {
    fn resolve(store: &PolicyStore, principal: &str) -> Result<Self, InvalidPrincipal> {
        let principal = principal.parse::<Principal>()?;
        let labels = store
            .service_account_by_id
            .get(&ServiceAccountId::new(
                &principal.namespace,
                &principal.service_account,
            ))
            .cloned()
            .unwrap_or_default();
        let namespace_labels = store
            .namespace_by_id
            .get(&NamespaceId::new(&principal.namespace))
            .cloned()
            .unwrap_or_default();
        Ok(Self {
            principal,
            labels,
            namespace_labels,
        })
    }
}

// === impl RuleMatch ===

impl<'r> RuleMatch<'r> {
    pub fn new(rule: &'r Rule, namespace: &'r str) -> Self {
        Self { rule, namespace }
    }
}

impl Predicate for RuleMatch<'_> {
    fn matches(&self, cx: &MatchContext<'_>) -> Result<bool, MatchError> {
        let source = PeerMatch::source(self.rule, self.namespace);
        let destination = PeerMatch::destination(self.rule, self.namespace);
        let predicates: [&dyn Predicate; 4] = [
            &ProtocolMatch(self.rule),
            &source,
            &destination,
            &HttpPredicate(self.rule.http_match.as_ref()),
        ];
        for predicate in predicates {
            if !predicate.matches(cx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

// === impl ProtocolMatch ===

impl Predicate for ProtocolMatch<'_> {
    fn matches(&self, cx: &MatchContext<'_>) -> Result<bool, MatchError> {
        let proto = cx.flow.protocol();
        if self.0.protocol.is_some_and(|p| p != proto) {
            return Ok(false);
        }
        Ok(self.0.not_protocol != Some(proto))
    }
}

// === impl PeerMatch ===

impl<'r> PeerMatch<'r> {
    fn source(rule: &'r Rule, policy_namespace: &'r str) -> Self {
        Self {
            side: Side::Source,
            nets: &rule.src_net,
            not_nets: &rule.not_src_net,
            ports: &rule.src_ports,
            not_ports: &rule.not_src_ports,
            ip_set_ids: &rule.src_ip_set_ids,
            not_ip_set_ids: &rule.not_src_ip_set_ids,
            ip_port_set_ids: &[],
            service_accounts: rule.src_service_account_match.as_ref(),
            namespace_selector: rule.src_namespace_selector.as_ref(),
            policy_namespace,
        }
    }

    fn destination(rule: &'r Rule, policy_namespace: &'r str) -> Self {
        Self {
            side: Side::Destination,
            nets: &rule.dst_net,
            not_nets: &rule.not_dst_net,
            ports: &rule.dst_ports,
            not_ports: &rule.not_dst_ports,
            ip_set_ids: &rule.dst_ip_set_ids,
            not_ip_set_ids: &rule.not_dst_ip_set_ids,
            ip_port_set_ids: &rule.dst_ip_port_set_ids,
            service_accounts: rule.dst_service_account_match.as_ref(),
            namespace_selector: rule.dst_namespace_selector.as_ref(),
            policy_namespace,
        }
    }

    fn matches_nets(&self, addr: IpAddr) -> bool {
        (self.nets.is_empty() || self.nets.iter().any(|n| n.contains(&addr)))
            && !self.not_nets.iter().any(|n| n.contains(&addr))
    }

    fn matches_ports(&self, port: u16) -> bool {
        (self.ports.is_empty() || self.ports.iter().any(|r| r.contains(port)))
            && !self.not_ports.iter().any(|r| r.contains(port))
    }

    fn matches_ip_sets(&self, cx: &MatchContext<'_>, addr: IpAddr) -> Result<bool, MatchError> {
        let sets = &cx.store.ip_set_by_id;
        let lookup = |id: &String| {
            sets.get(id)
                .ok_or_else(|| MatchError::UnknownIpSet(id.clone()))
        };

        for id in self.ip_set_ids {
            if !lookup(id)?.contains_addr(addr) {
                return Ok(false);
            }
        }
        for id in self.not_ip_set_ids {
            if lookup(id)?.contains_addr(addr) {
                return Ok(false);
            }
        }
        let (proto, port) = (cx.flow.protocol(), cx.port(self.side));
        for id in self.ip_port_set_ids {
            if !lookup(id)?.contains_addr_port(addr, proto, port) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn matches_service_accounts(&self, peer: Option<&PeerIdentity>) -> bool {
        let Some(sa) = self.service_accounts else {
            return true;
        };
        let Some(peer) = peer else {
            return false;
        };
        if !sa.names.is_empty() && !sa.names.contains(&peer.principal.service_account) {
            return false;
        }
        sa.selector
            .as_ref()
            .map_or(true, |s| s.matches(&peer.labels))
    }

    /// An explicit namespace selector is matched against the peer's namespace
    /// labels. Otherwise, identity matches in namespaced policies are scoped to
    /// the policy's own namespace.
    fn matches_namespace(&self, peer: Option<&PeerIdentity>) -> bool {
        if let Some(selector) = self.namespace_selector {
            return peer.is_some_and(|p| selector.matches(&p.namespace_labels));
        }
        if self.service_accounts.is_some() && !self.policy_namespace.is_empty() {
            return peer.is_some_and(|p| p.principal.namespace == self.policy_namespace);
        }
        true
    }
}

impl Predicate for PeerMatch<'_> {
    fn matches(&self, cx: &MatchContext<'_>) -> Result<bool, MatchError> {
        let addr = cx.addr(self.side);
        let peer = cx.peer(self.side);
        if !self.matches_nets(addr)
            || !self.matches_ports(cx.port(self.side))
            || !self.matches_service_accounts(peer)
            || !self.matches_namespace(peer)
        {
            return Ok(false);
        }
        self.matches_ip_sets(cx, addr)
    }
}

// === impl HttpPredicate ===

impl Predicate for HttpPredicate<'_> {
    fn matches(&self, cx: &MatchContext<'_>) -> Result<bool, MatchError> {
        let Some(http) = self.0.filter(|m| !m.is_empty()) else {
            return Ok(true);
        };

        if !http.methods.is_empty() {
            match cx.flow.http_method() {
                Some(method) if http.matches_method(method) => {}
                _ => return Ok(false),
            }
        }

        if !http.paths.is_empty() {
            let Some(raw) = cx.flow.http_path() else {
                return Ok(false);
            };
            let path = request_path(raw)?;
            if !http.matches_path(path) {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

/// Validates a request path and strips its query.
fn request_path(raw: &str) -> Result<&str, MatchError> {
    if !raw.starts_with('/') {
        return Err(MatchError::InvalidPath(raw.to_string()));
    }
    raw.parse::<http::uri::PathAndQuery>()
        .map_err(|_| MatchError::InvalidPath(raw.to_string()))?;
    Ok(raw.split_once('?').map_or(raw, |(path, _)| path))
}
