//! Inbound command dispatch: sendMessage, getMessages, clearChat.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use banter_common::proto::{event, ChatPair, SendMessagePayload};
use serde_json::Value;
use thiserror::Error;

use crate::outbox::MESSAGES_TOPIC;
use crate::store::StoreError;
use crate::AppState;

/// Error produced by a command handler. Converted into an `error` frame for
/// the invoking session; never fatal to the connection.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("invalid payload: {0}")]
    BadPayload(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CommandError {
    /// Client-facing description carried on the `error` frame. Details stay
    /// in the server log.
    pub fn public_message(&self) -> &'static str {
        match self {
            CommandError::BadPayload(_) => "Invalid command payload",
            CommandError::Store(_) => "Message store unavailable",
        }
    }
}

type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<(), CommandError>> + Send + 'a>>;

/// A command handler entry. Handlers borrow the state and connection ID for
/// the duration of one dispatch.
type HandlerFn = for<'a> fn(&'a AppState, &'a str, Value) -> HandlerFuture<'a>;

/// Routes inbound command frames to their handlers.
///
/// The table is built once at startup; lookups are plain string matches on
/// the frame's event name.
pub struct CommandRouter {
    table: HashMap<&'static str, HandlerFn>,
}

impl CommandRouter {
    pub fn new() -> Self {
        let mut table: HashMap<&'static str, HandlerFn> = HashMap::new();
        table.insert(event::SEND_MESSAGE, dispatch_send as HandlerFn);
        table.insert(event::GET_MESSAGES, dispatch_get as HandlerFn);
        table.insert(event::CLEAR_CHAT, dispatch_clear as HandlerFn);
        Self { table }
    }

    /// Dispatch one inbound frame. `Ok(false)` means the event name has no
    /// handler; the caller decides what to do with strangers.
    pub async fn dispatch(
        &self,
        state: &AppState,
        connection_id: &str,
        event_name: &str,
        data: Value,
    ) -> Result<bool, CommandError> {
        match self.table.get(event_name) {
            Some(handler) => {
                handler(state, connection_id, data).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

fn dispatch_send<'a>(state: &'a AppState, connection_id: &'a str, data: Value) -> HandlerFuture<'a> {
    Box::pin(handle_send_message(state, connection_id, data))
}

fn dispatch_get<'a>(state: &'a AppState, connection_id: &'a str, data: Value) -> HandlerFuture<'a> {
    Box::pin(handle_get_messages(state, connection_id, data))
}

fn dispatch_clear<'a>(
    state: &'a AppState,
    connection_id: &'a str,
    data: Value,
) -> HandlerFuture<'a> {
    Box::pin(handle_clear_chat(state, connection_id, data))
}

/// Persist, fan out to everyone, then hand the raw tuple to the outbox.
///
/// Ordering is deliberate: nothing is broadcast or emitted unless the save
/// succeeded, so every `receiveMessage` a client sees is durable.
async fn handle_send_message(
    state: &AppState,
    _connection_id: &str,
    data: Value,
) -> Result<(), CommandError> {
    let payload: SendMessagePayload = serde_json::from_value(data)?;

    let message = state
        .messages
        .save(&payload.sender_id, &payload.receiver_id, &payload.text)
        .await?;

    state.broadcast.broadcast_all(
        event::RECEIVE_MESSAGE,
        serde_json::to_value(&message).unwrap_or_default(),
    );

    // Fire-and-forget; the message is already durable.
    state.outbox.emit(
        MESSAGES_TOPIC,
        serde_json::to_value(&payload).unwrap_or_default(),
    );

    Ok(())
}

async fn handle_get_messages(
    state: &AppState,
    connection_id: &str,
    data: Value,
) -> Result<(), CommandError> {
    let payload: ChatPair = serde_json::from_value(data)?;

    let history = state
        .messages
        .find_between(&payload.sender_id, &payload.receiver_id)
        .await?;

    state.broadcast.send_to(
        connection_id,
        event::MESSAGES,
        serde_json::to_value(&history).unwrap_or_default(),
    );

    Ok(())
}

async fn handle_clear_chat(
    state: &AppState,
    connection_id: &str,
    data: Value,
) -> Result<(), CommandError> {
    let payload: ChatPair = serde_json::from_value(data)?;

    let removed = state
        .messages
        .delete_direction(&payload.sender_id, &payload.receiver_id)
        .await?;
    tracing::debug!(
        removed,
        sender_id = %payload.sender_id,
        "chat history cleared"
    );

    state
        .broadcast
        .send_to(connection_id, event::CHAT_CLEARED, Value::Null);

    Ok(())
}
