//! Key-value backed per-user presence tracking.
//!
//! Presence is per-**user**, not per-session. The gateway only calls
//! [`PresenceRegistry::mark_offline`] once the last session for a user has
//! disconnected, so a key existing means at least one live session.

use std::sync::Arc;

use thiserror::Error;

use crate::kv::{KeyValueStore, KvError};

/// Prefix for presence keys in the backing store.
pub const ONLINE_PREFIX: &str = "online:";

/// Error raised when the presence backend cannot be reached.
#[derive(Debug, Error)]
pub enum PresenceStoreError {
    #[error("presence store error: {0}")]
    Store(#[from] KvError),
}

/// Presence registry over a shared key-value store.
pub struct PresenceRegistry {
    kv: Arc<dyn KeyValueStore>,
}

impl PresenceRegistry {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Mark a user online. Idempotent: marking an already-online user
    /// rewrites the same key.
    pub async fn mark_online(&self, user_id: &str) -> Result<(), PresenceStoreError> {
        self.kv.set(&presence_key(user_id), "1").await?;
        Ok(())
    }

    /// Mark a user offline. Deleting an absent key is a no-op.
    pub async fn mark_offline(&self, user_id: &str) -> Result<(), PresenceStoreError> {
        self.kv.del(&presence_key(user_id)).await?;
        Ok(())
    }

    pub async fn is_online(&self, user_id: &str) -> Result<bool, PresenceStoreError> {
        Ok(self.kv.get(&presence_key(user_id)).await?.is_some())
    }

    /// Snapshot of every online user ID. No ordering guarantee.
    pub async fn list_online(&self) -> Result<Vec<String>, PresenceStoreError> {
        let keys = self.kv.keys(ONLINE_PREFIX).await?;
        Ok(keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(ONLINE_PREFIX).map(str::to_string))
            .collect())
    }
}

fn presence_key(user_id: &str) -> String {
    format!("{ONLINE_PREFIX}{user_id}")
}
