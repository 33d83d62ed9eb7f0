//! Local mirror of what the gateway has pushed to this client.

use banter_common::proto::event;
use banter_common::{Frame, Message};

/// Conversation state as last seen from the gateway.
///
/// The mirror is only ever mutated by inbound frames; it carries no
/// authority of its own. It survives a rebind untouched until the new
/// connection pushes fresh data.
#[derive(Debug, Default)]
pub struct ClientState {
    pub(crate) messages: Vec<Message>,
    pub(crate) online: Vec<String>,
}

impl ClientState {
    /// Fold one inbound frame into the mirror.
    pub(crate) fn apply(&mut self, frame: Frame) {
        let Frame { event, data } = frame;
        match event.as_str() {
            event::RECEIVE_MESSAGE => match serde_json::from_value::<Message>(data) {
                Ok(message) => self.messages.push(message),
                Err(err) => tracing::debug!(%err, "bad receiveMessage payload"),
            },
            event::ONLINE_USERS => match serde_json::from_value::<Vec<String>>(data) {
                Ok(users) => self.online = users,
                Err(err) => tracing::debug!(%err, "bad onlineUsers payload"),
            },
            event::MESSAGES => match serde_json::from_value::<Vec<Message>>(data) {
                Ok(history) => self.messages = history,
                Err(err) => tracing::debug!(%err, "bad messages payload"),
            },
            event::CHAT_CLEARED => self.messages.clear(),
            event::ERROR => tracing::warn!(%data, "gateway reported an error"),
            other => tracing::debug!(event = other, "ignoring unknown gateway event"),
        }
    }
}
