//! Session table for live gateway connections.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc;

/// Frames queued per session before sends start failing.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// One live gateway connection.
pub struct SessionEntry {
    pub connection_id: String,
    /// Bound at handshake; `None` for anonymous sessions.
    pub user_id: Option<String>,
    pub connected_at: DateTime<Utc>,
    /// Sending half of the session's outbound frame queue. Frames are
    /// pre-serialized so fanout shares one allocation across sessions.
    pub tx: mpsc::Sender<Arc<str>>,
}

/// Shared table of all live sessions, keyed by connection ID.
///
/// Uses `DashMap` for shard-level concurrency. Entries are inserted on
/// accept and removed when the socket task exits.
pub struct SessionRegistry {
    sessions: DashMap<String, SessionEntry>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Insert a session and hand back the receiving half of its outbound
    /// queue. The caller owns the receiver for the life of the socket.
    pub fn register(
        &self,
        connection_id: &str,
        user_id: Option<String>,
    ) -> mpsc::Receiver<Arc<str>> {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        self.sessions.insert(
            connection_id.to_string(),
            SessionEntry {
                connection_id: connection_id.to_string(),
                user_id,
                connected_at: Utc::now(),
                tx,
            },
        );
        rx
    }

    /// Remove a session, returning its entry if it was present.
    pub fn remove(&self, connection_id: &str) -> Option<SessionEntry> {
        self.sessions.remove(connection_id).map(|(_, entry)| entry)
    }

    /// Number of live sessions currently bound to `user_id`.
    pub fn sessions_for_user(&self, user_id: &str) -> usize {
        self.sessions
            .iter()
            .filter(|e| e.value().user_id.as_deref() == Some(user_id))
            .count()
    }

    /// Outbound sender for one session, if it is still connected.
    pub fn sender(&self, connection_id: &str) -> Option<mpsc::Sender<Arc<str>>> {
        self.sessions.get(connection_id).map(|e| e.tx.clone())
    }

    /// Snapshot of every session's outbound sender. Fanout iterates the
    /// snapshot so a slow session cannot hold a shard lock.
    pub fn snapshot(&self) -> Vec<(String, mpsc::Sender<Arc<str>>)> {
        self.sessions
            .iter()
            .map(|e| (e.key().clone(), e.value().tx.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
