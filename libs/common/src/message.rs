//! The chat message record shared between the relay and its clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery progress of a message. Transitions only move forward:
/// `sent → delivered → read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
}

impl DeliveryStatus {
    /// Whether a message at `self` may advance to `next`.
    pub fn can_advance_to(self, next: DeliveryStatus) -> bool {
        next > self
    }
}

/// A persisted one-to-one chat message.
///
/// The ID is a snowflake serialized as a JSON string so JavaScript clients
/// don't lose precision past 2^53.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(with = "id_string")]
    pub id: i64,
    pub sender_id: String,
    pub receiver_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub status: DeliveryStatus,
}

impl Message {
    /// Whether this message belongs to the conversation between `a` and `b`,
    /// in either direction.
    pub fn is_between(&self, a: &str, b: &str) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }
}

mod id_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(id: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(id)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
