use super::*;
use app_policy_core::{
    update::{WorkloadEndpointRemove, WorkloadEndpointUpdate},
    Action, RuleDir, RuleId, Update, WorkloadEndpointId,
};

fn mk_multi() -> TestConfig {
    TestConfig::new(EndpointMode::Multi)
}

fn add_endpoint(test: &mut TestConfig, name: &str, addr: &str, profile: &str) -> WorkloadEndpointId {
    let id = WorkloadEndpointId::new("k8s", format!("default/{name}"), "eth0");
    let mut endpoint = mk_endpoint(vec![], &[profile]);
    endpoint.name = name.to_string();
    endpoint.ipv4_nets = vec![format!("{addr}/32")];
    test.store.apply_update(
        Update::WorkloadEndpointUpdate(WorkloadEndpointUpdate {
            id: Some(id.clone()),
            endpoint: Some(endpoint),
        }),
        false,
    );
    id
}

fn egress_profile(action: &str) -> Profile {
    Profile {
        outbound_rules: vec![mk_rule(action, &[], vec![])],
        ..Default::default()
    }
}

#[test]
fn unowned_flow_is_unknown() {
    let mut test = mk_multi();
    add_endpoint(&mut test, "pod-9", "10.9.9.9", "profile1");

    let verdict = test.check(&mk_request("GET", "/"));
    assert_eq!(verdict.code, Code::Unknown);
    assert!(verdict.trace.is_empty());

    // Unknown is not a deny, so it is never overridden.
    test.store.drop_action_override = DropActionOverride::Accept;
    assert_eq!(test.check(&mk_request("GET", "/")).code, Code::Unknown);
}

#[test]
fn destination_owner_is_checked_for_ingress() {
    let mut test = mk_multi().with_profile("allow-get", vec![mk_rule("allow", &["GET"], vec![])]);
    add_endpoint(&mut test, "sue", "10.0.0.2", "allow-get");

    let verdict = test.check(&mk_request("GET", "/"));
    assert_eq!(verdict.code, Code::Ok);
    assert_eq!(
        verdict.trace,
        vec![RuleId::profile_rule("allow-get", 0, RuleDir::Ingress, Action::Allow)]
    );

    assert_eq!(
        test.check(&mk_request("POST", "/")).code,
        Code::PermissionDenied
    );
}

#[test]
fn source_owner_is_checked_for_egress() {
    let mut test = mk_multi();
    test.store
        .profile_by_id
        .insert(ProfileId::new("egress-deny"), egress_profile("deny"));
    add_endpoint(&mut test, "steve", "10.0.0.1", "egress-deny");

    let verdict = test.check(&mk_request("GET", "/"));
    assert_eq!(verdict.code, Code::PermissionDenied);
    assert_eq!(verdict.trace[0].direction, RuleDir::Egress);
}

#[test]
fn both_owners_must_allow() {
    let mut test = mk_multi().with_profile("allow-all", vec![mk_rule("allow", &[], vec![])]);
    test.store
        .profile_by_id
        .insert(ProfileId::new("egress-allow"), egress_profile("allow"));
    add_endpoint(&mut test, "sue", "10.0.0.2", "allow-all");
    add_endpoint(&mut test, "steve", "10.0.0.1", "egress-allow");

    let verdict = test.check(&mk_request("GET", "/"));
    assert_eq!(verdict.code, Code::Ok);
    assert_eq!(verdict.trace.len(), 2);
    assert_eq!(verdict.trace[0].direction, RuleDir::Ingress);
    assert_eq!(verdict.trace[1].direction, RuleDir::Egress);

    // The destination allows ingress, but the source's egress profile denies.
    test.store
        .profile_by_id
        .insert(ProfileId::new("egress-allow"), egress_profile("deny"));
    let verdict = test.check(&mk_request("GET", "/"));
    assert_eq!(verdict.code, Code::PermissionDenied);
    assert_eq!(verdict.trace.len(), 2);
}

#[test]
fn removed_endpoint_no_longer_owns_its_address() {
    let mut test = mk_multi().with_profile("allow-all", vec![mk_rule("allow", &[], vec![])]);
    let id = add_endpoint(&mut test, "sue", "10.0.0.2", "allow-all");
    assert_eq!(test.check(&mk_request("GET", "/")).code, Code::Ok);

    test.store.apply_update(
        Update::WorkloadEndpointRemove(WorkloadEndpointRemove { id: Some(id) }),
        false,
    );
    assert_eq!(test.check(&mk_request("GET", "/")).code, Code::Unknown);
}
