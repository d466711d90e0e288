use crate::{
    config::{DropActionOverride, StoreConfig},
    ip_index::IpIndex,
    ipset::IpSet,
    workload::WorkloadUpdateHandler,
};
use ahash::AHashMap as HashMap;
use app_policy_core::{
    is_staged_policy,
    update::{
        ActivePolicyRemove, ActivePolicyUpdate, ActiveProfileRemove, ActiveProfileUpdate,
        ConfigUpdate, IpSetDeltaUpdate, IpSetRemove, IpSetUpdate, NamespaceRemove,
        NamespaceUpdate, ServiceAccountRemove, ServiceAccountUpdate, WorkloadEndpointRemove,
        WorkloadEndpointUpdate,
    },
    Labels, NamespaceId, Policy, PolicyId, Profile, ProfileId, ServiceAccountId, Update,
    WorkloadEndpoint,
};
use std::{fmt, str::FromStr};

/// Selects whether the store tracks one endpoint or every endpoint on a node.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum EndpointMode {
    /// The store fronts a single workload (e.g. as a sidecar).
    #[default]
    Single,
    /// The store fronts every workload on a node and resolves flows to
    /// endpoints by address.
    Multi,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid endpoint mode {0:?}; expected 'single' or 'multi'")]
pub struct ParseModeError(String);

/// A snapshot of the policy configuration delivered by the control plane.
///
/// The store is only ever mutated through [`PolicyStore::apply_update`] by the
/// single owner of the exclusive lock. See [`crate::PolicyStoreManager`].
#[derive(Debug)]
pub struct PolicyStore {
    mode: EndpointMode,

    pub policy_by_id: HashMap<PolicyId, Policy>,
    pub profile_by_id: HashMap<ProfileId, Profile>,
    pub ip_set_by_id: HashMap<String, IpSet>,

    /// The tracked endpoint in single-endpoint mode.
    pub endpoint: Option<WorkloadEndpoint>,

    /// Endpoints keyed by id in multi-endpoint mode.
    pub endpoints: WorkloadUpdateHandler,

    /// Resolves addresses to endpoints in multi-endpoint mode.
    pub ip_to_endpoints: IpIndex,

    pub service_account_by_id: HashMap<ServiceAccountId, Labels>,
    pub namespace_by_id: HashMap<NamespaceId, Labels>,

    pub drop_action_override: DropActionOverride,
    pub stats_enabled_for_allowed: bool,
    pub stats_enabled_for_denied: bool,

    pub(crate) ready: bool,
}

// === impl EndpointMode ===

impl FromStr for EndpointMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "multi" => Ok(Self::Multi),
            _ => Err(ParseModeError(s.to_string())),
        }
    }
}

impl fmt::Display for EndpointMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => "single".fmt(f),
            Self::Multi => "multi".fmt(f),
        }
    }
}

// === impl PolicyStore ===

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new(EndpointMode::default())
    }
}

impl PolicyStore {
    pub fn new(mode: EndpointMode) -> Self {
        Self {
            mode,
            policy_by_id: HashMap::default(),
            profile_by_id: HashMap::default(),
            ip_set_by_id: HashMap::default(),
            endpoint: None,
            endpoints: WorkloadUpdateHandler::default(),
            ip_to_endpoints: IpIndex::default(),
            service_account_by_id: HashMap::default(),
            namespace_by_id: HashMap::default(),
            drop_action_override: DropActionOverride::default(),
            stats_enabled_for_allowed: false,
            stats_enabled_for_denied: false,
            ready: false,
        }
    }

    pub fn mode(&self) -> EndpointMode {
        self.mode
    }

    /// Returns true once the control plane has delivered a complete snapshot.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Applies a single control-plane update.
    ///
    /// Malformed updates are logged and ignored. Staged policies are dropped
    /// unless `store_staged` is set.
    pub fn apply_update(&mut self, update: Update, store_staged: bool) {
        tracing::trace!(kind = update.kind(), "Applying update");
        match update {
            Update::InSync => {
                tracing::debug!("Processing InSync");
                self.ready = true;
            }
            Update::IpSetUpdate(u) => self.apply_ip_set_update(u),
            Update::IpSetDeltaUpdate(u) => self.apply_ip_set_delta_update(u),
            Update::IpSetRemove(u) => self.apply_ip_set_remove(u),
            Update::ActiveProfileUpdate(u) => self.apply_profile_update(u),
            Update::ActiveProfileRemove(u) => self.apply_profile_remove(u),
            Update::ActivePolicyUpdate(u) => self.apply_policy_update(u, store_staged),
            Update::ActivePolicyRemove(u) => self.apply_policy_remove(u, store_staged),
            Update::WorkloadEndpointUpdate(u) => self.apply_endpoint_update(u),
            Update::WorkloadEndpointRemove(u) => self.apply_endpoint_remove(u),
            Update::ServiceAccountUpdate(u) => self.apply_service_account_update(u),
            Update::ServiceAccountRemove(u) => self.apply_service_account_remove(u),
            Update::NamespaceUpdate(u) => self.apply_namespace_update(u),
            Update::NamespaceRemove(u) => self.apply_namespace_remove(u),
            Update::ConfigUpdate(u) => self.apply_config_update(u),
            Update::Unrecognized => {
                tracing::warn!("Ignoring unrecognized update");
            }
        }
    }

    fn apply_config_update(&mut self, update: ConfigUpdate) {
        tracing::info!(config = ?update.config, "Processing ConfigUpdate");
        let config = StoreConfig::parse(&update);
        if let Some(dao) = config.drop_action_override {
            self.drop_action_override = dao;
        }
        self.stats_enabled_for_allowed = config.stats_enabled_for_allowed;
        self.stats_enabled_for_denied = config.stats_enabled_for_denied;
    }

    fn apply_ip_set_update(&mut self, update: IpSetUpdate) {
        if update.id.is_empty() {
            tracing::warn!("Ignoring IpSetUpdate without an IP set id");
            return;
        }
        tracing::debug!(id = %update.id, "Processing IpSetUpdate");
        let mut set = IpSet::new(update.kind);
        set.extend(update.members);
        self.ip_set_by_id.insert(update.id, set);
    }

    fn apply_ip_set_delta_update(&mut self, update: IpSetDeltaUpdate) {
        tracing::debug!(id = %update.id, "Processing IpSetDeltaUpdate");
        let Some(set) = self.ip_set_by_id.get_mut(&update.id) else {
            tracing::error!(id = %update.id, "Ignoring delta update for unknown IP set");
            return;
        };
        set.extend(update.added_members);
        for member in &update.removed_members {
            set.remove(member);
        }
    }

    fn apply_ip_set_remove(&mut self, update: IpSetRemove) {
        if update.id.is_empty() {
            tracing::warn!("Ignoring IpSetRemove without an IP set id");
            return;
        }
        tracing::debug!(id = %update.id, "Processing IpSetRemove");
        self.ip_set_by_id.remove(&update.id);
    }

    fn apply_profile_update(&mut self, update: ActiveProfileUpdate) {
        let Some(id) = update.id else {
            tracing::warn!("Ignoring ActiveProfileUpdate without a profile id");
            return;
        };
        tracing::debug!(%id, "Processing ActiveProfileUpdate");
        self.profile_by_id.insert(id, update.profile);
    }

    fn apply_profile_remove(&mut self, update: ActiveProfileRemove) {
        let Some(id) = update.id else {
            tracing::warn!("Ignoring ActiveProfileRemove without a profile id");
            return;
        };
        tracing::debug!(%id, "Processing ActiveProfileRemove");
        self.profile_by_id.remove(&id);
    }

    fn apply_policy_update(&mut self, update: ActivePolicyUpdate, store_staged: bool) {
        let Some(id) = update.id else {
            tracing::warn!("Ignoring ActivePolicyUpdate without a policy id");
            return;
        };
        if !store_staged && is_staged_policy(&id.name) {
            tracing::debug!(%id, "Skipping staged policy");
            return;
        }
        tracing::debug!(%id, "Processing ActivePolicyUpdate");
        self.policy_by_id.insert(id, update.policy);
    }

    fn apply_policy_remove(&mut self, update: ActivePolicyRemove, store_staged: bool) {
        let Some(id) = update.id else {
            tracing::warn!("Ignoring ActivePolicyRemove without a policy id");
            return;
        };
        if !store_staged && is_staged_policy(&id.name) {
            tracing::debug!(%id, "Skipping staged policy");
            return;
        }
        tracing::debug!(%id, "Processing ActivePolicyRemove");
        self.policy_by_id.remove(&id);
    }

    fn apply_endpoint_update(&mut self, update: WorkloadEndpointUpdate) {
        let Some(id) = update.id.as_ref() else {
            tracing::warn!("Ignoring WorkloadEndpointUpdate without an endpoint id");
            return;
        };
        tracing::info!(%id, "Processing WorkloadEndpointUpdate");
        match self.mode {
            EndpointMode::Single => match update.endpoint {
                Some(endpoint) => self.endpoint = Some(endpoint),
                None => tracing::warn!("Ignoring WorkloadEndpointUpdate without an endpoint"),
            },
            EndpointMode::Multi => self
                .endpoints
                .on_update(&mut self.ip_to_endpoints, &update),
        }
    }

    fn apply_endpoint_remove(&mut self, update: WorkloadEndpointRemove) {
        let Some(id) = update.id.as_ref() else {
            tracing::warn!("Ignoring WorkloadEndpointRemove without an endpoint id");
            return;
        };
        tracing::warn!(%id, "Processing WorkloadEndpointRemove");
        match self.mode {
            EndpointMode::Single => self.endpoint = None,
            EndpointMode::Multi => self
                .endpoints
                .on_remove(&mut self.ip_to_endpoints, &update),
        }
    }

    fn apply_service_account_update(&mut self, update: ServiceAccountUpdate) {
        let Some(id) = update.id else {
            tracing::warn!("Ignoring ServiceAccountUpdate without a service account id");
            return;
        };
        tracing::debug!(%id, "Processing ServiceAccountUpdate");
        self.service_account_by_id.insert(id, update.labels.into());
    }

    fn apply_service_account_remove(&mut self, update: ServiceAccountRemove) {
        let Some(id) = update.id else {
            tracing::warn!("Ignoring ServiceAccountRemove without a service account id");
            return;
        };
        tracing::debug!(%id, "Processing ServiceAccountRemove");
        self.service_account_by_id.remove(&id);
    }

    fn apply_namespace_update(&mut self, update: NamespaceUpdate) {
        let Some(id) = update.id else {
            tracing::warn!("Ignoring NamespaceUpdate without a namespace id");
            return;
        };
        tracing::debug!(%id, "Processing NamespaceUpdate");
        self.namespace_by_id.insert(id, update.labels.into());
    }

    fn apply_namespace_remove(&mut self, update: NamespaceRemove) {
        let Some(id) = update.id else {
            tracing::warn!("Ignoring NamespaceRemove without a namespace id");
            return;
        };
        tracing::debug!(%id, "Processing NamespaceRemove");
        self.namespace_by_id.remove(&id);
    }
}
