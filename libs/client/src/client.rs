//! The connection controller.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use banter_common::proto::{event, ChatPair, SendMessagePayload};
use banter_common::{Frame, Message};

use crate::error::ConnectError;
use crate::state::ClientState;

/// Where the controller's single connection currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// No identity bound, no connection wanted.
    Idle,
    Connecting,
    Connected,
    /// The last connection failed or ended. The controller does not retry.
    Disconnected,
}

/// The live connection: the identity it was bound with and the outbound
/// channel feeding its writer task.
struct Link {
    identity: String,
    tx: mpsc::UnboundedSender<WsMessage>,
}

/// Client-side gateway connection controller.
///
/// Owns at most one WebSocket at a time. [`bind`](ChatClient::bind) with a
/// new identity tears the old connection down (and awaits its tasks) before
/// opening the next one, so two connections never overlap.
pub struct ChatClient {
    url: String,
    state: Arc<Mutex<ClientState>>,
    link: Arc<Mutex<Option<Link>>>,
    status_tx: watch::Sender<LinkStatus>,
    tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl ChatClient {
    /// `url` is the gateway endpoint, e.g. `ws://127.0.0.1:3001/gateway`.
    pub fn new(url: impl Into<String>) -> Self {
        let (status_tx, _) = watch::channel(LinkStatus::Idle);
        Self {
            url: url.into(),
            state: Arc::new(Mutex::new(ClientState::default())),
            link: Arc::new(Mutex::new(None)),
            status_tx,
            tasks: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// Bind to `identity` and connect, or unbind with `None`.
    ///
    /// Any existing connection is torn down first, whatever the outcome.
    /// A handshake failure leaves the controller `Disconnected`; it will not
    /// retry on its own.
    pub async fn bind(&self, identity: Option<&str>) -> Result<(), ConnectError> {
        let mut tasks = self.tasks.lock().await;
        self.teardown(&mut tasks).await;

        let Some(identity) = identity else {
            self.status_tx.send_replace(LinkStatus::Idle);
            return Ok(());
        };

        self.status_tx.send_replace(LinkStatus::Connecting);

        let url = format!("{}?userId={}", self.url, identity);
        let (ws, _) = match connect_async(&url).await {
            Ok(pair) => pair,
            Err(err) => {
                tracing::warn!(%err, identity, "gateway handshake failed");
                self.status_tx.send_replace(LinkStatus::Disconnected);
                return Err(err.into());
            }
        };

        let (mut ws_tx, mut ws_rx) = ws.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();

        // Publish the link before spawning the reader: if the connection
        // dies instantly, the reader's cleanup must find this link in place.
        *self.link.lock() = Some(Link {
            identity: identity.to_string(),
            tx: tx.clone(),
        });
        self.status_tx.send_replace(LinkStatus::Connected);

        let writer = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if ws_tx.send(msg).await.is_err() {
                    break;
                }
            }
        });

        let reader = tokio::spawn({
            let state = Arc::clone(&self.state);
            let link = Arc::clone(&self.link);
            let status_tx = self.status_tx.clone();
            async move {
                while let Some(msg) = ws_rx.next().await {
                    let msg = match msg {
                        Ok(msg) => msg,
                        Err(err) => {
                            tracing::debug!(%err, "gateway read error");
                            break;
                        }
                    };
                    match msg {
                        WsMessage::Text(text) => match serde_json::from_str::<Frame>(&text) {
                            Ok(frame) => state.lock().apply(frame),
                            Err(err) => tracing::debug!(%err, "unparseable gateway frame"),
                        },
                        WsMessage::Close(_) => break,
                        // The transport answers pings on its own.
                        _ => {}
                    }
                }
                // Natural disconnect. A rebind may already own the slot;
                // only clear it if it still points at this connection.
                let mut slot = link.lock();
                if slot.as_ref().is_some_and(|l| l.tx.same_channel(&tx)) {
                    *slot = None;
                    status_tx.send_replace(LinkStatus::Disconnected);
                }
            }
        });

        tasks.push(writer);
        tasks.push(reader);

        tracing::info!(identity, url = %self.url, "gateway link established");
        Ok(())
    }

    /// Drop any live connection and return to `Idle`.
    pub async fn shutdown(&self) {
        let mut tasks = self.tasks.lock().await;
        self.teardown(&mut tasks).await;
        self.status_tx.send_replace(LinkStatus::Idle);
    }

    async fn teardown(&self, tasks: &mut Vec<JoinHandle<()>>) {
        self.link.lock().take();
        for task in tasks.drain(..) {
            task.abort();
            let _ = task.await;
        }
    }

    /// Send a chat message to `receiver_id`.
    ///
    /// The bound identity is the sender. Does nothing when unbound.
    pub fn send_message(&self, receiver_id: &str, text: &str) {
        let slot = self.link.lock();
        let Some(link) = slot.as_ref() else {
            tracing::debug!("send_message with no bound connection; dropped");
            return;
        };
        let payload = SendMessagePayload {
            sender_id: link.identity.clone(),
            receiver_id: receiver_id.to_string(),
            text: text.to_string(),
        };
        push(
            link,
            event::SEND_MESSAGE,
            serde_json::to_value(&payload).unwrap_or_default(),
        );
    }

    /// Ask for the full history with `receiver_id`. Does nothing when unbound.
    pub fn get_messages(&self, receiver_id: &str) {
        let slot = self.link.lock();
        let Some(link) = slot.as_ref() else {
            tracing::debug!("get_messages with no bound connection; dropped");
            return;
        };
        let pair = ChatPair {
            sender_id: link.identity.clone(),
            receiver_id: receiver_id.to_string(),
        };
        push(
            link,
            event::GET_MESSAGES,
            serde_json::to_value(&pair).unwrap_or_default(),
        );
    }

    /// Delete the messages this identity sent to `receiver_id`.
    /// Does nothing when unbound.
    pub fn clear_chat(&self, receiver_id: &str) {
        let slot = self.link.lock();
        let Some(link) = slot.as_ref() else {
            tracing::debug!("clear_chat with no bound connection; dropped");
            return;
        };
        let pair = ChatPair {
            sender_id: link.identity.clone(),
            receiver_id: receiver_id.to_string(),
        };
        push(
            link,
            event::CLEAR_CHAT,
            serde_json::to_value(&pair).unwrap_or_default(),
        );
    }

    pub fn status(&self) -> LinkStatus {
        *self.status_tx.borrow()
    }

    /// Subscribe to status transitions.
    pub fn watch_status(&self) -> watch::Receiver<LinkStatus> {
        self.status_tx.subscribe()
    }

    /// The message list as last pushed by the gateway.
    pub fn messages(&self) -> Vec<Message> {
        self.state.lock().messages.clone()
    }

    /// The online-user set as last pushed by the gateway.
    pub fn online_users(&self) -> Vec<String> {
        self.state.lock().online.clone()
    }

    /// The identity of the live connection, if any.
    pub fn identity(&self) -> Option<String> {
        self.link.lock().as_ref().map(|l| l.identity.clone())
    }
}

fn push(link: &Link, event: &str, data: serde_json::Value) {
    match serde_json::to_string(&Frame::new(event, data)) {
        Ok(text) => {
            if link.tx.send(WsMessage::Text(text.into())).is_err() {
                tracing::debug!(event, "writer is gone; dropping command");
            }
        }
        Err(err) => tracing::warn!(%err, event, "failed to encode command frame"),
    }
}
