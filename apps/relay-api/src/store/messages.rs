use std::sync::Mutex;

use async_trait::async_trait;
use banter_common::{DeliveryStatus, Message, SnowflakeGenerator};
use chrono::Utc;

use super::StoreError;

/// Abstraction over chat message persistence.
///
/// Backed by a document store in production and an in-memory vec in tests.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a new message with a freshly minted ID and `Sent` status.
    async fn save(
        &self,
        sender_id: &str,
        receiver_id: &str,
        text: &str,
    ) -> Result<Message, StoreError>;

    /// All messages exchanged between `a` and `b` in either direction,
    /// ordered by ID ascending (IDs are time-ordered).
    async fn find_between(&self, a: &str, b: &str) -> Result<Vec<Message>, StoreError>;

    /// Delete messages sent by `sender_id` to `receiver_id`. The reverse
    /// direction is untouched. Returns the number of rows removed.
    async fn delete_direction(
        &self,
        sender_id: &str,
        receiver_id: &str,
    ) -> Result<usize, StoreError>;

    /// Move a message's delivery status forward. Regressions are ignored and
    /// the stored row is returned unchanged. `None` when the ID is unknown.
    async fn update_status(
        &self,
        id: i64,
        status: DeliveryStatus,
    ) -> Result<Option<Message>, StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory implementation (for local runs / tests)
// ---------------------------------------------------------------------------

pub struct MemoryMessageStore {
    ids: SnowflakeGenerator,
    rows: Mutex<Vec<Message>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self {
            ids: SnowflakeGenerator::new(0),
            rows: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn save(
        &self,
        sender_id: &str,
        receiver_id: &str,
        text: &str,
    ) -> Result<Message, StoreError> {
        let message = Message {
            id: self.ids.generate(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
            status: DeliveryStatus::Sent,
        };
        self.rows.lock().unwrap().push(message.clone());
        Ok(message)
    }

    async fn find_between(&self, a: &str, b: &str) -> Result<Vec<Message>, StoreError> {
        let mut found: Vec<Message> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.is_between(a, b))
            .cloned()
            .collect();
        found.sort_by_key(|m| m.id);
        Ok(found)
    }

    async fn delete_direction(
        &self,
        sender_id: &str,
        receiver_id: &str,
    ) -> Result<usize, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|m| !(m.sender_id == sender_id && m.receiver_id == receiver_id));
        Ok(before - rows.len())
    }

    async fn update_status(
        &self,
        id: i64,
        status: DeliveryStatus,
    ) -> Result<Option<Message>, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.iter_mut().find(|m| m.id == id) else {
            return Ok(None);
        };
        if row.status.can_advance_to(status) {
            row.status = status;
        }
        Ok(Some(row.clone()))
    }
}
