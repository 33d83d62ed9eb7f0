//! Wire frames and event names for the gateway protocol.
//!
//! Every message on the socket, in both directions, is a single JSON object
//! `{ "event": <name>, "data": <payload> }`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event names carried in the `event` field.
pub mod event {
    // Client → server commands.
    pub const SEND_MESSAGE: &str = "sendMessage";
    pub const GET_MESSAGES: &str = "getMessages";
    pub const CLEAR_CHAT: &str = "clearChat";

    // Server → all sessions.
    pub const ONLINE_USERS: &str = "onlineUsers";
    pub const RECEIVE_MESSAGE: &str = "receiveMessage";

    // Server → the requesting session only.
    pub const MESSAGES: &str = "messages";
    pub const CHAT_CLEARED: &str = "chatCleared";
    pub const ERROR: &str = "error";
}

/// One message on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// `sendMessage` command payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub sender_id: String,
    pub receiver_id: String,
    pub text: String,
}

/// Conversation pair for `getMessages` and `clearChat`.
///
/// For `clearChat` the direction matters: only messages sent by `sender_id`
/// to `receiver_id` are removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPair {
    pub sender_id: String,
    pub receiver_id: String,
}

/// `error` frame payload: which command failed and why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub command: String,
    pub message: String,
}
