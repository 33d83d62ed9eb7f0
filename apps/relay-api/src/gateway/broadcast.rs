//! Event fan-out to connected gateway sessions.

use std::sync::Arc;

use banter_common::Frame;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use super::registry::SessionRegistry;

/// Fans events out to live sessions.
///
/// Each frame is serialized once per broadcast and shared across receivers
/// as an `Arc<str>`. Cloneable — store in AppState.
#[derive(Clone)]
pub struct Broadcaster {
    sessions: Arc<SessionRegistry>,
}

impl Broadcaster {
    pub fn new(sessions: Arc<SessionRegistry>) -> Self {
        Self { sessions }
    }

    /// Send one event to every live session, the origin included.
    pub fn broadcast_all(&self, event: &str, data: Value) {
        let Some(payload) = encode(event, data) else {
            return;
        };
        let recipients = self.sessions.len();
        debug!(event, recipients, "broadcast event to all");
        for (connection_id, tx) in self.sessions.snapshot() {
            deliver(&connection_id, &tx, Arc::clone(&payload));
        }
    }

    /// Send one event to a single session. A missing session disconnected
    /// under us; nothing to do.
    pub fn send_to(&self, connection_id: &str, event: &str, data: Value) {
        let Some(tx) = self.sessions.sender(connection_id) else {
            return;
        };
        let Some(payload) = encode(event, data) else {
            return;
        };
        deliver(connection_id, &tx, payload);
    }
}

fn encode(event: &str, data: Value) -> Option<Arc<str>> {
    match serde_json::to_string(&Frame::new(event, data)) {
        Ok(json) => Some(Arc::from(json)),
        Err(e) => {
            warn!(event, error = %e, "failed to serialize frame");
            None
        }
    }
}

fn deliver(connection_id: &str, tx: &mpsc::Sender<Arc<str>>, payload: Arc<str>) {
    match tx.try_send(payload) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            warn!(connection_id, "outbound queue full; dropping frame");
        }
        // The session is tearing down; its registry entry goes next.
        Err(TrySendError::Closed(_)) => {}
    }
}
