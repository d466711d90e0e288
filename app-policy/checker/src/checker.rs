use crate::{
    metrics::CheckMetrics,
    provider::{CheckProvider, CheckResponse},
    CheckRequest,
};
use tonic::Code;

/// Runs a request through an ordered chain of providers.
///
/// Providers that do not apply to a request are skipped. The first response
/// that is not `Ok` is final. A checker without providers answers `Unknown`.
#[derive(Default)]
pub struct Checker {
    providers: Vec<Box<dyn CheckProvider>>,
    metrics: Option<CheckMetrics>,
}

// === impl Checker ===

impl Checker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(mut self, metrics: CheckMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_provider(mut self, provider: impl CheckProvider + 'static) -> Self {
        self.register(provider);
        self
    }

    pub fn register(&mut self, provider: impl CheckProvider + 'static) {
        tracing::debug!(provider = provider.name(), "Registering check provider");
        self.providers.push(Box::new(provider));
    }

    pub fn providers(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.providers.iter().map(|p| p.name())
    }

    pub fn check(&self, req: &CheckRequest) -> CheckResponse {
        let observer = self.metrics.as_ref().map(CheckMetrics::start);
        let rsp = self.run(req);
        tracing::debug!(code = ?rsp.code, message = %rsp.message, "Checked request");
        if let Some(observer) = observer {
            observer.end(rsp.code);
        }
        rsp
    }

    fn run(&self, req: &CheckRequest) -> CheckResponse {
        if self.providers.is_empty() {
            return CheckResponse::new(Code::Unknown, "no check providers registered");
        }

        let mut trace = Vec::new();
        for provider in &self.providers {
            if !provider.applies(req) {
                tracing::trace!(provider = provider.name(), "Skipping provider");
                continue;
            }

            let mut rsp = provider.check(req);
            tracing::trace!(provider = provider.name(), code = ?rsp.code, "Provider checked request");
            if let Some(metrics) = self.metrics.as_ref() {
                metrics.provider_checked(provider.name(), rsp.code);
            }

            trace.append(&mut rsp.trace);
            if !rsp.is_ok() {
                rsp.trace = trace;
                return rsp;
            }
        }

        CheckResponse {
            trace,
            ..CheckResponse::ok()
        }
    }
}

impl std::fmt::Debug for Checker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checker")
            .field("providers", &self.providers().collect::<Vec<_>>())
            .finish()
    }
}
