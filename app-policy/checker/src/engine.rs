//! The tiered decision engine.
//!
//! An endpoint's tiers are evaluated in order. Within a tier, policies are
//! evaluated in order and the first rule whose predicates match (and whose
//! action is not `log`) decides the policy's verdict:
//!
//! - `allow` and `deny` end the decision;
//! - `pass` ends the tier and moves on to the next one;
//! - a tier in which no policy matched applies its default action.
//!
//! Profiles form a final, untiered stage in which only `allow` admits the
//! flow. If every stage is exhausted, the flow is denied.

use crate::{
    matcher::{MatchContext, MatchError, Predicate, RuleMatch},
    Flow,
};
use app_policy_core::{
    is_staged_policy, Action, DefaultAction, InvalidAction, InvalidPrincipal, PolicyId,
    ProfileId, Rule, RuleDir, RuleId, TierInfo, WorkloadEndpoint,
};
use app_policy_store::{EndpointMode, PolicyStore};
use tonic::Code;

/// The outcome of evaluating a flow, with the rules that decided it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verdict {
    pub code: Code,
    pub trace: Vec<RuleId>,
}

/// Errors that abort the evaluation of a single flow.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error(transparent)]
    Principal(#[from] InvalidPrincipal),

    #[error(transparent)]
    Action(#[from] InvalidAction),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error("policy {0} not found")]
    MissingPolicy(PolicyId),

    #[error("profile {0} not found")]
    MissingProfile(ProfileId),
}

// === impl Verdict ===

impl Verdict {
    pub fn new(code: Code, trace: Vec<RuleId>) -> Self {
        Self { code, trace }
    }

    pub fn is_ok(&self) -> bool {
        self.code == Code::Ok
    }
}

// === impl CheckError ===

impl CheckError {
    pub fn code(&self) -> Code {
        match self {
            // Unidentifiable peers fail closed.
            Self::Principal(_) => Code::PermissionDenied,
            Self::Action(_) | Self::Match(MatchError::InvalidPath(_)) => Code::InvalidArgument,
            Self::Match(MatchError::UnknownIpSet(_))
            | Self::MissingPolicy(_)
            | Self::MissingProfile(_) => Code::Internal,
        }
    }
}

/// Evaluates a flow against whichever endpoints the store says it concerns.
///
/// In single-endpoint mode the tracked endpoint is evaluated for ingress. In
/// multi-endpoint mode the endpoints owning the destination address are
/// evaluated for ingress and then those owning the source address for
/// egress; the first verdict that is not `Ok` wins. A flow that no endpoint
/// owns yields `Unknown`.
pub fn check_flow(store: &PolicyStore, flow: &dyn Flow) -> Verdict {
    match store.mode() {
        EndpointMode::Single => match store.endpoint.as_ref() {
            Some(endpoint) => check_store(store, endpoint, RuleDir::Ingress, flow),
            None => {
                tracing::debug!("No endpoint; denying");
                apply_override(store, Verdict::new(Code::PermissionDenied, Vec::new()))
            }
        },
        EndpointMode::Multi => check_owners(store, flow),
    }
}

fn check_owners(store: &PolicyStore, flow: &dyn Flow) -> Verdict {
    let mut destinations = store.ip_to_endpoints.lookup(flow.destination_ip());
    let mut sources = store.ip_to_endpoints.lookup(flow.source_ip());
    if destinations.is_empty() && sources.is_empty() {
        tracing::debug!(
            src = %flow.source_ip(),
            dst = %flow.destination_ip(),
            "No endpoint owns the flow"
        );
        return Verdict::new(Code::Unknown, Vec::new());
    }
    destinations.sort_by(|(a, _), (b, _)| a.cmp(b));
    sources.sort_by(|(a, _), (b, _)| a.cmp(b));

    let owners = destinations
        .into_iter()
        .map(|(id, ep)| (id, ep, RuleDir::Ingress))
        .chain(sources.into_iter().map(|(id, ep)| (id, ep, RuleDir::Egress)));

    let mut trace = Vec::new();
    for (id, endpoint, dir) in owners {
        let verdict = check_store(store, endpoint, dir, flow);
        tracing::trace!(%id, %dir, code = ?verdict.code, "Evaluated endpoint");
        let ok = verdict.is_ok();
        trace.extend(verdict.trace);
        if !ok {
            return Verdict::new(verdict.code, trace);
        }
    }
    Verdict::new(Code::Ok, trace)
}

/// Evaluates a flow against one endpoint's policy in one direction.
///
/// Errors are reported through the verdict's code. Denied and invalid
/// verdicts are subject to the store's drop-action override.
pub fn check_store(
    store: &PolicyStore,
    endpoint: &WorkloadEndpoint,
    dir: RuleDir,
    flow: &dyn Flow,
) -> Verdict {
    let mut trace = Vec::new();
    let result = MatchContext::new(store, flow)
        .map_err(CheckError::from)
        .and_then(|cx| check_endpoint(&cx, endpoint, dir, &mut trace));

    let code = match result {
        Ok(Action::Allow) => Code::Ok,
        Ok(_) => Code::PermissionDenied,
        Err(error) => {
            let code = error.code();
            if code == Code::Internal {
                tracing::error!(%error, endpoint = %endpoint.name, "Failed to evaluate policy");
            } else {
                tracing::debug!(%error, endpoint = %endpoint.name, "Rejecting request");
            }
            code
        }
    };

    apply_override(store, Verdict::new(code, trace))
}

/// Rewrites denied or invalid verdicts as allowed when the store asks to
/// accept dropped traffic. The trace is left untouched.
fn apply_override(store: &PolicyStore, mut verdict: Verdict) -> Verdict {
    let dao = store.drop_action_override;
    if matches!(verdict.code, Code::PermissionDenied | Code::InvalidArgument) && dao.accepts() {
        tracing::debug!(code = ?verdict.code, drop_action_override = %dao, "Accepting denied request");
        verdict.code = Code::Ok;
    }
    verdict
}

/// Returns the action that decided the flow: `Allow` or `Deny`.
fn check_endpoint(
    cx: &MatchContext<'_>,
    endpoint: &WorkloadEndpoint,
    dir: RuleDir,
    trace: &mut Vec<RuleId>,
) -> Result<Action, CheckError> {
    if let Some(action) = check_tiers(cx, &endpoint.tiers, dir, trace)? {
        return Ok(action);
    }
    check_profiles(cx, &endpoint.profile_ids, dir, trace)
}

/// Returns `None` if every tier passed the flow on to the profiles.
pub(crate) fn check_tiers(
    cx: &MatchContext<'_>,
    tiers: &[TierInfo],
    dir: RuleDir,
    trace: &mut Vec<RuleId>,
) -> Result<Option<Action>, CheckError> {
    'tiers: for tier in tiers {
        // Staged policies are never enforced.
        let mut policies = tier
            .policies(dir)
            .iter()
            .filter(|name| !is_staged_policy(name))
            .peekable();
        if policies.peek().is_none() {
            tracing::trace!(tier = %tier.name, %dir, "Skipping tier without policies");
            continue;
        }

        let mut last = None;
        for name in policies {
            let id = PolicyId::new(&tier.name, name);
            let Some(policy) = cx.store().policy_by_id.get(&id) else {
                return Err(CheckError::MissingPolicy(id));
            };
            let name = local_name(name, &policy.namespace);
            last = Some((name, policy.namespace.as_str()));

            let Some((index, action)) = check_rules(cx, policy.rules(dir), &policy.namespace)? else {
                continue;
            };
            trace.push(RuleId::policy_rule(
                &tier.name,
                name,
                &policy.namespace,
                index,
                dir,
                action,
            ));
            match action {
                Action::Pass => {
                    tracing::trace!(tier = %tier.name, policy = %name, "Passing to next tier");
                    continue 'tiers;
                }
                action => return Ok(Some(action)),
            }
        }

        match tier.default_action {
            DefaultAction::Pass => {
                tracing::trace!(tier = %tier.name, "No match; tier defaults to pass");
            }
            DefaultAction::Deny => {
                let (name, ns) = last.unwrap_or_default();
                trace.push(RuleId::end_of_tier(&tier.name, name, ns, dir));
                return Ok(Some(Action::Deny));
            }
        }
    }
    Ok(None)
}

fn check_profiles(
    cx: &MatchContext<'_>,
    profile_ids: &[String],
    dir: RuleDir,
    trace: &mut Vec<RuleId>,
) -> Result<Action, CheckError> {
    for name in profile_ids {
        let id = ProfileId::new(name);
        let Some(profile) = cx.store().profile_by_id.get(&id) else {
            return Err(CheckError::MissingProfile(id));
        };
        if let Some((index, action)) = check_rules(cx, profile.rules(dir), "")? {
            trace.push(RuleId::profile_rule(name, index, dir, action));
            return Ok(match action {
                Action::Allow => Action::Allow,
                _ => Action::Deny,
            });
        }
    }
    trace.push(RuleId::profile_no_match(dir));
    Ok(Action::Deny)
}

/// Returns the index and action of the first non-`log` rule that matches.
pub(crate) fn check_rules(
    cx: &MatchContext<'_>,
    rules: &[Rule],
    namespace: &str,
) -> Result<Option<(usize, Action)>, CheckError> {
    for (index, rule) in rules.iter().enumerate() {
        if !RuleMatch::new(rule, namespace).matches(cx)? {
            continue;
        }
        match rule.parse_action()? {
            Action::Log => {
                tracing::debug!(index, "Rule matched with log action");
            }
            action => return Ok(Some((index, action))),
        }
    }
    Ok(None)
}

/// Strips the namespace from a namespaced policy name.
fn local_name<'n>(name: &'n str, namespace: &str) -> &'n str {
    name.strip_prefix(namespace)
        .and_then(|n| n.strip_prefix('/'))
        .filter(|_| !namespace.is_empty())
        .unwrap_or(name)
}
