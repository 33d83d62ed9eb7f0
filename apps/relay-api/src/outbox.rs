//! Fire-and-forget delivery of chat events to an external consumer.
//!
//! The gateway hands events to [`Outbox::emit`], which queues them on an
//! unbounded channel. A detached worker drains the queue and pushes each
//! event through the configured [`EventSink`]. Delivery failures are logged
//! and dropped; they never affect the session that produced the event.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

/// Topic carried on persisted-message events.
pub const MESSAGES_TOPIC: &str = "messages";

/// Error raised when a sink cannot deliver an event.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("outbox request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("outbox endpoint returned status {0}")]
    Status(u16),
}

/// An event queued for delivery.
#[derive(Debug, Clone)]
pub struct OutboundEvent {
    pub topic: String,
    pub data: Value,
}

/// Destination for outbound events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, topic: &str, data: &Value) -> Result<(), EmitError>;
}

/// POSTs each event as `{"topic": ..., "data": ...}` to a webhook URL.
pub struct WebhookSink {
    http: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl EventSink for WebhookSink {
    async fn publish(&self, topic: &str, data: &Value) -> Result<(), EmitError> {
        let body = serde_json::json!({ "topic": topic, "data": data });
        let resp = self.http.post(&self.url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(EmitError::Status(resp.status().as_u16()));
        }
        Ok(())
    }
}

/// Discards every event. Used when no outbox URL is configured.
pub struct NoopSink;

#[async_trait]
impl EventSink for NoopSink {
    async fn publish(&self, _topic: &str, _data: &Value) -> Result<(), EmitError> {
        Ok(())
    }
}

/// Cloneable handle to the outbox worker.
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<OutboundEvent>,
}

impl Outbox {
    /// Spawn the delivery worker and return a handle for producers.
    pub fn spawn(sink: Arc<dyn EventSink>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<OutboundEvent>();

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = sink.publish(&event.topic, &event.data).await {
                    tracing::warn!(?e, topic = %event.topic, "outbox delivery failed");
                }
            }
        });

        Self { tx }
    }

    /// Queue an event for delivery. Never blocks and never fails the caller.
    pub fn emit(&self, topic: impl Into<String>, data: Value) {
        let event = OutboundEvent {
            topic: topic.into(),
            data,
        };
        if self.tx.send(event).is_err() {
            tracing::warn!("outbox worker is gone; dropping event");
        }
    }
}
