use super::*;
use crate::{
    CheckMetrics, CheckProvider, CheckResponse, Checker, ContentInspector, DataplaneStats,
    InspectionProvider, PolicyProvider, Violation,
};
use app_policy_core::update::{ActiveProfileUpdate, ConfigUpdate, WorkloadEndpointUpdate};
use app_policy_core::{Update, WorkloadEndpointId};
use app_policy_store::{
    PolicyStoreManager, SharedManager, STATS_ENABLED_FOR_ALLOWED, STATS_ENABLED_FOR_DENIED,
};
use maplit::btreemap;
use prometheus_client::{encoding::text::encode, registry::Registry};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::sync::mpsc;

/// Always answers with a fixed code and counts how often it was asked.
struct Fixed {
    name: &'static str,
    code: Code,
    calls: Arc<AtomicUsize>,
}

impl Fixed {
    fn new(name: &'static str, code: Code) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = Self {
            name,
            code,
            calls: calls.clone(),
        };
        (provider, calls)
    }
}

impl CheckProvider for Fixed {
    fn name(&self) -> &'static str {
        self.name
    }

    fn check(&self, _: &CheckRequest) -> CheckResponse {
        self.calls.fetch_add(1, Ordering::SeqCst);
        CheckResponse::new(self.code, self.name)
    }
}

/// Rejects requests whose body contains a marker.
struct BodyMarker(&'static [u8]);

impl ContentInspector for BodyMarker {
    fn inspect(&self, req: &CheckRequest) -> Result<(), Violation> {
        let body = req.http.as_ref().map(|h| h.body.as_slice()).unwrap_or_default();
        if body.windows(self.0.len()).any(|w| w == self.0) {
            return Err(Violation {
                rule_id: "942100".to_string(),
                message: "marker found in body".to_string(),
            });
        }
        Ok(())
    }
}

fn mk_manager(ready: bool) -> SharedManager {
    let manager = PolicyStoreManager::shared(EndpointMode::Single);
    manager.apply_update(
        Update::ActiveProfileUpdate(ActiveProfileUpdate {
            id: Some(ProfileId::new("profile1")),
            profile: Profile {
                inbound_rules: vec![mk_rule("allow", &["GET"], vec![])],
                ..Default::default()
            },
        }),
        false,
    );
    manager.apply_update(
        Update::WorkloadEndpointUpdate(WorkloadEndpointUpdate {
            id: Some(WorkloadEndpointId::new("k8s", "default/sue", "eth0")),
            endpoint: Some(mk_endpoint(vec![], &["profile1"])),
        }),
        false,
    );
    if ready {
        manager.apply_update(Update::InSync, false);
    }
    manager
}

#[test]
fn no_providers_is_unknown() {
    let checker = Checker::new();
    let rsp = checker.check(&mk_request("GET", "/"));
    assert_eq!(rsp.code, Code::Unknown);
    assert_ne!(rsp.code, Code::Ok);
    assert_ne!(rsp.code, Code::PermissionDenied);
}

#[test]
fn first_failure_short_circuits() {
    let (a, a_calls) = Fixed::new("a", Code::Ok);
    let (b, b_calls) = Fixed::new("b", Code::PermissionDenied);
    let (c, c_calls) = Fixed::new("c", Code::Ok);
    let checker = Checker::new().with_provider(a).with_provider(b).with_provider(c);

    let rsp = checker.check(&mk_request("GET", "/"));
    assert_eq!(rsp.code, Code::PermissionDenied);
    assert_eq!(rsp.message, "b");
    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    assert_eq!(c_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn all_ok_is_ok() {
    let (a, _) = Fixed::new("a", Code::Ok);
    let (b, _) = Fixed::new("b", Code::Ok);
    let checker = Checker::new().with_provider(a).with_provider(b);
    assert_eq!(checker.check(&mk_request("GET", "/")).code, Code::Ok);
    assert_eq!(checker.providers().collect::<Vec<_>>(), vec!["a", "b"]);
}

#[test]
fn inapplicable_providers_are_skipped() {
    let checker = Checker::new().with_provider(InspectionProvider::new(BodyMarker(b"DROP TABLE")));

    // Without HTTP attributes, the inspector is never consulted.
    let rsp = checker.check(&CheckRequest::default());
    assert_eq!(rsp.code, Code::Ok);

    let mut req = mk_request("POST", "/");
    assert_eq!(checker.check(&req).code, Code::Ok);

    if let Some(http) = req.http.as_mut() {
        http.body = b"name='; DROP TABLE users".to_vec();
    }
    let rsp = checker.check(&req);
    assert_eq!(rsp.code, Code::PermissionDenied);
    assert!(rsp.message.contains("942100"), "{}", rsp.message);
}

#[test]
fn policy_provider_requires_sync() {
    let provider = PolicyProvider::new(mk_manager(false));
    let rsp = provider.check(&mk_request("GET", "/"));
    assert_eq!(rsp.code, Code::Unavailable);
    assert_eq!(rsp.into_status().code(), Code::Unavailable);

    let manager = mk_manager(true);
    let provider = PolicyProvider::new(manager.clone());
    assert_eq!(provider.check(&mk_request("GET", "/")).code, Code::Ok);

    manager.on_reconnecting();
    assert_eq!(
        provider.check(&mk_request("GET", "/")).code,
        Code::Unavailable
    );
}

#[test]
fn policy_then_inspection() {
    let checker = Checker::new()
        .with_provider(PolicyProvider::new(mk_manager(true)))
        .with_provider(InspectionProvider::new(BodyMarker(b"<script>")));

    let rsp = checker.check(&mk_request("GET", "/"));
    assert_eq!(rsp.code, Code::Ok);
    assert_eq!(rsp.trace.len(), 1);

    let rsp = checker.check(&mk_request("POST", "/"));
    assert_eq!(rsp.code, Code::PermissionDenied);
    assert_eq!(rsp.trace, vec![app_policy_core::RuleId::profile_no_match(
        app_policy_core::RuleDir::Ingress
    )]);
}

#[test]
fn stats_follow_store_config() {
    let manager = mk_manager(true);
    let (tx, mut rx) = mpsc::channel(8);
    let provider = PolicyProvider::new(manager.clone()).with_stats(tx);

    // Disabled by default.
    provider.check(&mk_request("GET", "/"));
    assert!(rx.try_recv().is_err());

    manager.apply_update(
        Update::ConfigUpdate(ConfigUpdate {
            config: btreemap! {
                STATS_ENABLED_FOR_ALLOWED.to_string() => "true".to_string(),
                STATS_ENABLED_FOR_DENIED.to_string() => "true".to_string(),
            },
        }),
        false,
    );

    let req = mk_request("GET", "/");
    provider.check(&req);
    let stats = rx.try_recv().expect("allowed sample");
    assert_eq!(stats, DataplaneStats::allowed(crate::stats::Tuple::of(&req)));

    let req = mk_request("POST", "/");
    provider.check(&req);
    let stats = rx.try_recv().expect("denied sample");
    assert_eq!(stats.denied, 1);
    assert_eq!(stats.tuple.dst_port, 8080);
}

#[test]
fn metrics_count_decisions() {
    let mut registry = Registry::default();
    let metrics = CheckMetrics::register(registry.sub_registry_with_prefix("check"));
    let (a, _) = Fixed::new("a", Code::Ok);
    let (b, _) = Fixed::new("b", Code::PermissionDenied);
    let checker = Checker::new()
        .with_metrics(metrics)
        .with_provider(a)
        .with_provider(b);

    checker.check(&mk_request("GET", "/"));
    checker.check(&mk_request("GET", "/"));

    let mut out = String::new();
    encode(&mut out, &registry).unwrap();
    assert!(
        out.contains(r#"check_provider_checks_total{provider="b",code="PERMISSION_DENIED"} 2"#),
        "{out}"
    );
    assert!(
        out.contains(r#"check_results_total{code="PERMISSION_DENIED"} 2"#),
        "{out}"
    );
}
