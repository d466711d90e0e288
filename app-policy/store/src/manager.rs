use crate::{EndpointMode, PolicyStore};
use app_policy_core::Update;
use parking_lot::RwLock;
use std::sync::Arc;

pub type SharedManager = Arc<PolicyStoreManager>;

/// Guards the current [`PolicyStore`].
///
/// The sync task is the only writer; checks take the shared lock. On
/// reconnection the store is swapped for an empty one so that stale state is
/// never evaluated while a fresh snapshot is streamed in.
#[derive(Debug)]
pub struct PolicyStoreManager {
    mode: EndpointMode,
    state: RwLock<PolicyStore>,
}

// === impl PolicyStoreManager ===

impl PolicyStoreManager {
    pub fn new(mode: EndpointMode) -> Self {
        Self {
            mode,
            state: RwLock::new(PolicyStore::new(mode)),
        }
    }

    pub fn shared(mode: EndpointMode) -> SharedManager {
        Arc::new(Self::new(mode))
    }

    pub fn mode(&self) -> EndpointMode {
        self.mode
    }

    /// Runs `f` with exclusive access to the store.
    pub fn do_with_lock<R>(&self, f: impl FnOnce(&mut PolicyStore) -> R) -> R {
        f(&mut self.state.write())
    }

    /// Runs `f` with shared access to the store.
    pub fn do_with_read_lock<R>(&self, f: impl FnOnce(&PolicyStore) -> R) -> R {
        f(&self.state.read())
    }

    pub fn apply_update(&self, update: Update, store_staged: bool) {
        if let Update::InSync = update {
            self.on_in_sync();
            return;
        }
        self.state.write().apply_update(update, store_staged);
    }

    /// Marks the current store as complete.
    pub fn on_in_sync(&self) {
        let mut store = self.state.write();
        if !store.ready {
            tracing::info!(mode = %self.mode, "Policy store in sync");
        }
        store.ready = true;
    }

    /// Discards all state. The manager is not ready until the next in-sync.
    pub fn on_reconnecting(&self) {
        tracing::info!(mode = %self.mode, "Resetting policy store for reconnection");
        *self.state.write() = PolicyStore::new(self.mode);
    }

    pub fn is_ready(&self) -> bool {
        self.state.read().ready
    }
}
