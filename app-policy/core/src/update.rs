//! Messages delivered by the control-plane sync feed.
//!
//! Each variant of [`Update`] carries one kind of change. Identifiers are
//! optional because the feed may deliver malformed messages; consumers log and
//! skip updates whose identifier is missing.

use crate::{
    labels::Map, NamespaceId, Policy, PolicyId, Profile, ProfileId, ServiceAccountId,
    WorkloadEndpoint, WorkloadEndpointId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Update {
    /// The feed has delivered a complete snapshot.
    InSync,
    IpSetUpdate(IpSetUpdate),
    IpSetDeltaUpdate(IpSetDeltaUpdate),
    IpSetRemove(IpSetRemove),
    ActiveProfileUpdate(ActiveProfileUpdate),
    ActiveProfileRemove(ActiveProfileRemove),
    ActivePolicyUpdate(ActivePolicyUpdate),
    ActivePolicyRemove(ActivePolicyRemove),
    WorkloadEndpointUpdate(WorkloadEndpointUpdate),
    WorkloadEndpointRemove(WorkloadEndpointRemove),
    ServiceAccountUpdate(ServiceAccountUpdate),
    ServiceAccountRemove(ServiceAccountRemove),
    NamespaceUpdate(NamespaceUpdate),
    NamespaceRemove(NamespaceRemove),
    ConfigUpdate(ConfigUpdate),

    /// A kind this build does not know how to decode.
    #[serde(other)]
    Unrecognized,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IpSetKind {
    #[default]
    Ip,
    Net,
    IpAndPort,
    Domain,
}

/// Replaces the IP set's members.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct IpSetUpdate {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: IpSetKind,
    pub members: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct IpSetDeltaUpdate {
    pub id: String,
    pub added_members: Vec<String>,
    pub removed_members: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct IpSetRemove {
    pub id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ActiveProfileUpdate {
    pub id: Option<ProfileId>,
    pub profile: Profile,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ActiveProfileRemove {
    pub id: Option<ProfileId>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ActivePolicyUpdate {
    pub id: Option<PolicyId>,
    pub policy: Policy,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ActivePolicyRemove {
    pub id: Option<PolicyId>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkloadEndpointUpdate {
    pub id: Option<WorkloadEndpointId>,
    pub endpoint: Option<WorkloadEndpoint>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkloadEndpointRemove {
    pub id: Option<WorkloadEndpointId>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceAccountUpdate {
    pub id: Option<ServiceAccountId>,
    pub labels: Map,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceAccountRemove {
    pub id: Option<ServiceAccountId>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct NamespaceUpdate {
    pub id: Option<NamespaceId>,
    pub labels: Map,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct NamespaceRemove {
    pub id: Option<NamespaceId>,
}

/// Store-wide settings as key/value pairs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfigUpdate {
    pub config: BTreeMap<String, String>,
}

// === impl Update ===

impl Update {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InSync => "in_sync",
            Self::IpSetUpdate(_) => "ip_set_update",
            Self::IpSetDeltaUpdate(_) => "ip_set_delta_update",
            Self::IpSetRemove(_) => "ip_set_remove",
            Self::ActiveProfileUpdate(_) => "active_profile_update",
            Self::ActiveProfileRemove(_) => "active_profile_remove",
            Self::ActivePolicyUpdate(_) => "active_policy_update",
            Self::ActivePolicyRemove(_) => "active_policy_remove",
            Self::WorkloadEndpointUpdate(_) => "workload_endpoint_update",
            Self::WorkloadEndpointRemove(_) => "workload_endpoint_remove",
            Self::ServiceAccountUpdate(_) => "service_account_update",
            Self::ServiceAccountRemove(_) => "service_account_remove",
            Self::NamespaceUpdate(_) => "namespace_update",
            Self::NamespaceRemove(_) => "namespace_remove",
            Self::ConfigUpdate(_) => "config_update",
            Self::Unrecognized => "unrecognized",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Action, Rule};
    use maplit::btreemap;

    #[test]
    fn decodes_policy_update() {
        let update: Update = serde_json::from_str(
            r#"{
                "kind": "active_policy_update",
                "id": {"tier": "tier1", "name": "policy1"},
                "policy": {
                    "namespace": "ns-0",
                    "inbound_rules": [
                        {"action": "Allow", "protocol": "TCP", "dst_ports": [{"first": 80, "last": 80}],
                         "http_match": {"methods": ["GET"], "paths": [{"prefix": "/public"}]}}
                    ]
                }
            }"#,
        )
        .expect("update must decode");

        let Update::ActivePolicyUpdate(ActivePolicyUpdate { id, policy }) = update else {
            panic!("unexpected update kind");
        };
        assert_eq!(id, Some(PolicyId::new("tier1", "policy1")));
        assert_eq!(policy.namespace, "ns-0");
        let rule: &Rule = &policy.inbound_rules[0];
        assert_eq!(rule.parse_action(), Ok(Action::Allow));
        assert_eq!(rule.protocol, Some(crate::Protocol::TCP));
        assert!(rule.src_net.is_empty());
    }

    #[test]
    fn decodes_config_and_ip_sets() {
        let update: Update = serde_json::from_str(
            r#"{"kind": "config_update", "config": {"DropActionOverride": "LogAndAccept"}}"#,
        )
        .expect("update must decode");
        assert_eq!(
            update,
            Update::ConfigUpdate(ConfigUpdate {
                config: btreemap! {
                    "DropActionOverride".to_string() => "LogAndAccept".to_string(),
                },
            })
        );

        let update: Update = serde_json::from_str(
            r#"{"kind": "ip_set_update", "id": "s1", "type": "net", "members": ["10.0.0.0/8"]}"#,
        )
        .expect("update must decode");
        assert_eq!(
            update,
            Update::IpSetUpdate(IpSetUpdate {
                id: "s1".to_string(),
                kind: IpSetKind::Net,
                members: vec!["10.0.0.0/8".to_string()],
            })
        );
    }

    #[test]
    fn unknown_kinds_are_unrecognized() {
        let update: Update = serde_json::from_str(r#"{"kind": "host_endpoint_update", "id": "x"}"#)
            .expect("unknown kinds must still decode");
        assert_eq!(update, Update::Unrecognized);
        assert_eq!(update.kind(), "unrecognized");
    }

    #[test]
    fn missing_ids_decode_as_none() {
        let update: Update =
            serde_json::from_str(r#"{"kind": "active_profile_remove"}"#).expect("must decode");
        assert_eq!(
            update,
            Update::ActiveProfileRemove(ActiveProfileRemove { id: None })
        );
    }
}
