use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, histogram::Histogram},
    registry::{Registry, Unit},
};
use tokio::time;

/// Counts decisions made by each provider and by the checker as a whole.
#[derive(Clone, Debug)]
pub struct CheckMetrics {
    provider_checks: Family<ProviderLabels, Counter>,
    results: Family<CodeLabels, Counter>,
    checking: Histogram,
}

/// Observes a single call to the checker.
pub(crate) struct CheckObserver {
    start: time::Instant,
    metrics: CheckMetrics,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct ProviderLabels {
    provider: &'static str,
    code: &'static str,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
struct CodeLabels {
    code: &'static str,
}

// === impl CheckMetrics ===

impl CheckMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let provider_checks = Family::<ProviderLabels, Counter>::default();
        reg.register(
            "provider_checks",
            "Total number of checks performed by each provider, by result",
            provider_checks.clone(),
        );

        let results = Family::<CodeLabels, Counter>::default();
        reg.register(
            "results",
            "Total number of checks completed, by final result",
            results.clone(),
        );

        // Decisions are in-memory and expected to complete in microseconds.
        let checking = Histogram::new([0.000_01, 0.000_1, 0.001, 0.01].into_iter());
        reg.register_with_unit(
            "checking",
            "Histogram of check latency (seconds)",
            Unit::Seconds,
            checking.clone(),
        );

        Self {
            provider_checks,
            results,
            checking,
        }
    }

    pub(crate) fn start(&self) -> CheckObserver {
        CheckObserver {
            start: time::Instant::now(),
            metrics: self.clone(),
        }
    }

    pub(crate) fn provider_checked(&self, provider: &'static str, code: tonic::Code) {
        self.provider_checks
            .get_or_create(&ProviderLabels {
                provider,
                code: code_str(code),
            })
            .inc();
    }
}

// === impl CheckObserver ===

impl CheckObserver {
    pub(crate) fn end(self, code: tonic::Code) {
        self.metrics
            .checking
            .observe(self.start.elapsed().as_secs_f64());
        self.metrics
            .results
            .get_or_create(&CodeLabels {
                code: code_str(code),
            })
            .inc();
    }
}

pub(crate) fn code_str(code: tonic::Code) -> &'static str {
    use tonic::Code::*;
    match code {
        Ok => "OK",
        Cancelled => "CANCELLED",
        Unknown => "UNKNOWN",
        InvalidArgument => "INVALID_ARGUMENT",
        DeadlineExceeded => "DEADLINE_EXCEEDED",
        NotFound => "NOT_FOUND",
        AlreadyExists => "ALREADY_EXISTS",
        PermissionDenied => "PERMISSION_DENIED",
        ResourceExhausted => "RESOURCE_EXHAUSTED",
        FailedPrecondition => "FAILED_PRECONDITION",
        Aborted => "ABORTED",
        OutOfRange => "OUT_OF_RANGE",
        Unimplemented => "UNIMPLEMENTED",
        Internal => "INTERNAL",
        Unavailable => "UNAVAILABLE",
        DataLoss => "DATA_LOSS",
        Unauthenticated => "UNAUTHENTICATED",
    }
}
