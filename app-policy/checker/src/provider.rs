use crate::{
    engine::{self, Verdict},
    stats::{DataplaneStats, StatsSink, Tuple},
    CheckRequest, Flow,
};
use app_policy_core::RuleId;
use app_policy_store::SharedManager;
use tonic::Code;

/// A source of decisions in the checker's chain.
pub trait CheckProvider: Send + Sync {
    /// Names the provider in logs and metrics.
    fn name(&self) -> &'static str;

    /// Returns false if the provider has nothing to say about the request.
    fn applies(&self, _req: &CheckRequest) -> bool {
        true
    }

    fn check(&self, req: &CheckRequest) -> CheckResponse;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckResponse {
    pub code: Code,
    pub message: String,
    pub trace: Vec<RuleId>,
}

/// Evaluates requests against the tiered policy held by the store.
#[derive(Debug)]
pub struct PolicyProvider<S = ()> {
    manager: SharedManager,
    stats: S,
}

/// The external content-checking engine.
pub trait ContentInspector: Send + Sync {
    fn inspect(&self, req: &CheckRequest) -> Result<(), Violation>;
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("request violates rule {rule_id}: {message}")]
pub struct Violation {
    pub rule_id: String,
    pub message: String,
}

/// Denies HTTP requests whose content the inspector rejects.
#[derive(Debug)]
pub struct InspectionProvider<I> {
    inspector: I,
}

// === impl CheckResponse ===

impl CheckResponse {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            trace: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(Code::Ok, "")
    }

    pub fn is_ok(&self) -> bool {
        self.code == Code::Ok
    }

    pub fn into_status(self) -> tonic::Status {
        tonic::Status::new(self.code, self.message)
    }
}

impl From<Verdict> for CheckResponse {
    fn from(Verdict { code, trace }: Verdict) -> Self {
        let message = match code {
            Code::Ok => "",
            Code::PermissionDenied => "denied by policy",
            Code::InvalidArgument => "invalid request",
            Code::Unknown => "no endpoint owns the flow",
            Code::Unavailable => "policy store is not in sync",
            _ => "failed to evaluate policy",
        };
        Self {
            code,
            message: message.to_string(),
            trace,
        }
    }
}

// === impl PolicyProvider ===

impl PolicyProvider {
    pub fn new(manager: SharedManager) -> Self {
        Self { manager, stats: () }
    }
}

impl<S: StatsSink> PolicyProvider<S> {
    /// Reports per-flow statistics to `stats` when the store enables them.
    pub fn with_stats<T: StatsSink>(self, stats: T) -> PolicyProvider<T> {
        PolicyProvider {
            manager: self.manager,
            stats,
        }
    }

    /// Evaluates a flow under a single read lock, so that the verdict
    /// reflects exactly one snapshot of the store.
    pub fn check_flow(&self, flow: &dyn Flow) -> Verdict {
        let (verdict, sample) = self.manager.do_with_read_lock(|store| {
            if !store.is_ready() {
                tracing::debug!("Policy store not ready");
                return (Verdict::new(Code::Unavailable, Vec::new()), None);
            }

            let verdict = engine::check_flow(store, flow);
            let sample = match verdict.code {
                Code::Ok if store.stats_enabled_for_allowed => {
                    Some(DataplaneStats::allowed(Tuple::of(flow)))
                }
                Code::PermissionDenied if store.stats_enabled_for_denied => {
                    Some(DataplaneStats::denied(Tuple::of(flow)))
                }
                _ => None,
            };
            (verdict, sample)
        });

        if let Some(sample) = sample {
            self.stats.report(sample);
        }
        verdict
    }
}

impl<S: StatsSink> CheckProvider for PolicyProvider<S> {
    fn name(&self) -> &'static str {
        "policy"
    }

    fn check(&self, req: &CheckRequest) -> CheckResponse {
        self.check_flow(req).into()
    }
}

// === impl InspectionProvider ===

impl<I: ContentInspector> InspectionProvider<I> {
    pub fn new(inspector: I) -> Self {
        Self { inspector }
    }
}

impl<I: ContentInspector> CheckProvider for InspectionProvider<I> {
    fn name(&self) -> &'static str {
        "content-inspection"
    }

    fn applies(&self, req: &CheckRequest) -> bool {
        req.http.is_some()
    }

    fn check(&self, req: &CheckRequest) -> CheckResponse {
        match self.inspector.inspect(req) {
            Ok(()) => CheckResponse::ok(),
            Err(violation) => {
                tracing::debug!(rule = %violation.rule_id, "Request rejected by content inspection");
                CheckResponse::new(Code::PermissionDenied, violation.to_string())
            }
        }
    }
}
