use super::*;
use crate::{IpIndex, WorkloadUpdateHandler};
use std::net::IpAddr;

fn addr(s: &str) -> IpAddr {
    s.parse().unwrap()
}

fn net(s: &str) -> IpNet {
    s.parse().unwrap()
}

#[test]
fn reannouncing_interfaces_does_not_delete() {
    let mut handler = WorkloadUpdateHandler::default();
    let mut index = Recorder::default();
    let id = mk_endpoint_id("pod-0");
    let update = mk_endpoint_update(&id, ["10.0.0.1/32", "10.0.0.2/32"]);

    handler.on_update(&mut index, &update);
    handler.on_update(&mut index, &update);

    let updates = index
        .calls
        .iter()
        .filter(|c| matches!(c, Call::Update(..)))
        .count();
    assert_eq!(updates, 4);
    assert!(!index.calls.iter().any(|c| matches!(c, Call::Delete(..))));
}

#[test]
fn dropped_interfaces_are_deleted_before_updates() {
    let mut handler = WorkloadUpdateHandler::default();
    let mut index = Recorder::default();
    let id = mk_endpoint_id("pod-0");

    handler.on_update(&mut index, &mk_endpoint_update(&id, ["10.0.0.1/32", "10.0.0.2/32"]));
    index.calls.clear();

    handler.on_update(&mut index, &mk_endpoint_update(&id, ["10.0.0.1/32", "10.0.0.3/32"]));
    assert_eq!(
        index.calls,
        vec![
            Call::Delete(net("10.0.0.2/32"), id.clone()),
            Call::Update(net("10.0.0.1/32"), id.clone()),
            Call::Update(net("10.0.0.3/32"), id.clone()),
        ]
    );
}

#[test]
fn duplicate_interfaces_are_announced_once() {
    let mut handler = WorkloadUpdateHandler::default();
    let mut index = Recorder::default();
    let id = mk_endpoint_id("pod-0");

    handler.on_update(&mut index, &mk_endpoint_update(&id, ["10.0.0.1/32", "10.0.0.1/32"]));
    assert_eq!(index.calls, vec![Call::Update(net("10.0.0.1/32"), id)]);
}

#[test]
fn update_without_endpoint_is_ignored() {
    let mut handler = WorkloadUpdateHandler::default();
    let mut index = Recorder::default();
    handler.on_update(
        &mut index,
        &WorkloadEndpointUpdate {
            id: Some(mk_endpoint_id("pod-0")),
            endpoint: None,
        },
    );
    assert!(index.calls.is_empty());
    assert!(handler.is_empty());
}

#[test]
fn remove_deletes_every_interface() {
    let mut handler = WorkloadUpdateHandler::default();
    let mut index = Recorder::default();
    let id = mk_endpoint_id("pod-0");
    handler.on_update(&mut index, &mk_endpoint_update(&id, ["10.0.0.1/32", "10.0.0.2"]));
    index.calls.clear();

    handler.on_remove(
        &mut index,
        &WorkloadEndpointRemove {
            id: Some(id.clone()),
        },
    );
    assert_eq!(
        index.calls,
        vec![
            Call::Delete(net("10.0.0.1/32"), id.clone()),
            Call::Delete(net("10.0.0.2/32"), id.clone()),
        ]
    );
    assert!(handler.get(&id).is_none());
}

#[test]
fn index_resolves_current_interfaces_only() {
    let mut handler = WorkloadUpdateHandler::default();
    let mut index = IpIndex::default();
    let id = mk_endpoint_id("pod-0");

    handler.on_update(&mut index, &mk_endpoint_update(&id, ["10.0.0.1/32", "10.0.0.2/32"]));
    assert_eq!(index.keys(addr("10.0.0.2")), vec![&id]);

    handler.on_update(&mut index, &mk_endpoint_update(&id, ["10.0.0.1/32", "10.0.0.3/32"]));
    assert!(index.lookup(addr("10.0.0.2")).is_empty());
    assert!(!index.contains(addr("10.0.0.2")));
    assert_eq!(index.keys(addr("10.0.0.1")), vec![&id]);
    assert_eq!(index.keys(addr("10.0.0.3")), vec![&id]);
    assert_eq!(index.len(), 2);
}

#[test]
fn unparsable_interfaces_are_skipped() {
    let mut handler = WorkloadUpdateHandler::default();
    let mut recorder = Recorder::default();
    let mut index = IpIndex::default();
    let id = mk_endpoint_id("pod-0");
    let update = mk_endpoint_update(&id, ["not-an-ip", "10.0.0.1/32"]);

    handler.on_update(&mut recorder, &update);
    assert_eq!(
        recorder.calls,
        vec![Call::Update(net("10.0.0.1/32"), id.clone())]
    );

    let mut handler = WorkloadUpdateHandler::default();
    handler.on_update(&mut index, &update);
    assert_eq!(index.keys(addr("10.0.0.1")), vec![&id]);
    assert_eq!(index.len(), 1);
    assert!(handler.get(&id).is_some());
}

#[test]
fn index_holds_every_endpoint_sharing_an_address() {
    let mut handler = WorkloadUpdateHandler::default();
    let mut index = IpIndex::default();
    let id0 = mk_endpoint_id("pod-0");
    let id1 = mk_endpoint_id("pod-1");

    handler.on_update(&mut index, &mk_endpoint_update(&id0, ["10.0.0.1/32"]));
    handler.on_update(&mut index, &mk_endpoint_update(&id1, ["10.0.0.1/32"]));
    let mut keys = index.keys(addr("10.0.0.1"));
    keys.sort();
    assert_eq!(keys, vec![&id0, &id1]);

    handler.on_remove(&mut index, &WorkloadEndpointRemove { id: Some(id0) });
    assert_eq!(index.keys(addr("10.0.0.1")), vec![&id1]);
}

#[test]
fn store_indexes_endpoints_in_multi_mode() {
    let mut test = TestConfig::new(EndpointMode::Multi);
    let id = mk_endpoint_id("pod-0");
    let mut update = mk_endpoint_update(&id, ["10.0.0.1/32"]);
    if let Some(ep) = update.endpoint.as_mut() {
        ep.ipv6_nets = vec!["fd00::1/128".to_string()];
    }
    test.apply(Update::WorkloadEndpointUpdate(update));

    assert!(test.store.endpoint.is_none());
    assert_eq!(test.store.endpoints.len(), 1);
    assert_eq!(test.store.ip_to_endpoints.keys(addr("10.0.0.1")), vec![&id]);
    assert_eq!(test.store.ip_to_endpoints.keys(addr("fd00::1")), vec![&id]);

    test.apply(Update::WorkloadEndpointRemove(WorkloadEndpointRemove {
        id: Some(id),
    }));
    assert!(test.store.endpoints.is_empty());
    assert!(test.store.ip_to_endpoints.is_empty());
}

#[test]
fn store_tracks_one_endpoint_in_single_mode() {
    let mut test = TestConfig::new(EndpointMode::Single);
    let id = mk_endpoint_id("pod-0");
    test.apply(Update::WorkloadEndpointUpdate(mk_endpoint_update(
        &id,
        ["10.0.0.1/32"],
    )));
    assert_eq!(
        test.store.endpoint.as_ref().map(|ep| ep.name.as_str()),
        Some("ns-0/pod-0")
    );
    assert!(test.store.ip_to_endpoints.is_empty());

    test.apply(Update::WorkloadEndpointRemove(WorkloadEndpointRemove {
        id: Some(id),
    }));
    assert!(test.store.endpoint.is_none());
}

#[test]
fn single_mode_ignores_endpoint_messages_without_an_id() {
    let mut test = TestConfig::new(EndpointMode::Single);
    let id = mk_endpoint_id("pod-0");
    test.apply(Update::WorkloadEndpointUpdate(mk_endpoint_update(
        &id,
        ["10.0.0.1/32"],
    )));

    test.apply(Update::WorkloadEndpointRemove(WorkloadEndpointRemove {
        id: None,
    }));
    assert_eq!(
        test.store.endpoint.as_ref().map(|ep| ep.name.as_str()),
        Some("ns-0/pod-0")
    );

    test.apply(Update::WorkloadEndpointUpdate(WorkloadEndpointUpdate {
        id: None,
        endpoint: Some(mk_endpoint("ns-0/other", ["10.0.0.9/32"], None)),
    }));
    assert_eq!(
        test.store.endpoint.as_ref().map(|ep| ep.name.as_str()),
        Some("ns-0/pod-0")
    );
}

#[test]
fn multi_mode_ignores_endpoint_messages_without_an_id() {
    let mut test = TestConfig::new(EndpointMode::Multi);
    let id = mk_endpoint_id("pod-0");
    test.apply(Update::WorkloadEndpointUpdate(mk_endpoint_update(
        &id,
        ["10.0.0.1/32"],
    )));

    test.apply(Update::WorkloadEndpointRemove(WorkloadEndpointRemove {
        id: None,
    }));
    test.apply(Update::WorkloadEndpointUpdate(WorkloadEndpointUpdate {
        id: None,
        endpoint: Some(mk_endpoint("ns-0/other", ["10.0.0.9/32"], None)),
    }));

    assert_eq!(test.store.endpoints.len(), 1);
    assert_eq!(test.store.ip_to_endpoints.keys(addr("10.0.0.1")), vec![&id]);
    assert!(!test.store.ip_to_endpoints.contains(addr("10.0.0.9")));
}
