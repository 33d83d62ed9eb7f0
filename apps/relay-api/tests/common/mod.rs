use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use banter_common::{DeliveryStatus, Message};
use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use relay_api::auth::{Claims, JwtAuthenticator};
use relay_api::config::Config;
use relay_api::gateway::broadcast::Broadcaster;
use relay_api::gateway::handler::CommandRouter;
use relay_api::gateway::registry::SessionRegistry;
use relay_api::kv::{KeyValueStore, KvError, MemoryStore};
use relay_api::outbox::{EmitError, EventSink, Outbox};
use relay_api::presence::PresenceRegistry;
use relay_api::store::messages::{MemoryMessageStore, MessageStore};
use relay_api::store::users::MemoryUserDirectory;
use relay_api::store::StoreError;
use relay_api::AppState;

pub const TEST_SECRET: &str = "relay-test-secret";

/// Records every event the outbox delivers.
#[derive(Default)]
pub struct CollectorSink {
    events: Mutex<Vec<(String, Value)>>,
}

impl CollectorSink {
    pub fn events(&self) -> Vec<(String, Value)> {
        self.events.lock().unwrap().clone()
    }

    /// Poll until at least `n` events have been delivered.
    pub async fn wait_for(&self, n: usize) -> Vec<(String, Value)> {
        for _ in 0..100 {
            let events = self.events();
            if events.len() >= n {
                return events;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        panic!("outbox sink never saw {n} events");
    }
}

#[async_trait]
impl EventSink for CollectorSink {
    async fn publish(&self, topic: &str, data: &Value) -> Result<(), EmitError> {
        self.events
            .lock()
            .unwrap()
            .push((topic.to_string(), data.clone()));
        Ok(())
    }
}

/// Key-value store whose every call fails, for presence outage tests.
pub struct FailingKv;

#[async_trait]
impl KeyValueStore for FailingKv {
    async fn set(&self, _key: &str, _value: &str) -> Result<(), KvError> {
        Err(KvError::Unavailable("connection refused".to_string()))
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, KvError> {
        Err(KvError::Unavailable("connection refused".to_string()))
    }

    async fn del(&self, _key: &str) -> Result<(), KvError> {
        Err(KvError::Unavailable("connection refused".to_string()))
    }

    async fn keys(&self, _prefix: &str) -> Result<Vec<String>, KvError> {
        Err(KvError::Unavailable("connection refused".to_string()))
    }
}

/// Message store whose every call fails, for persistence outage tests.
pub struct FailingMessageStore;

#[async_trait]
impl MessageStore for FailingMessageStore {
    async fn save(&self, _: &str, _: &str, _: &str) -> Result<Message, StoreError> {
        Err(StoreError::Unavailable("boom".to_string()))
    }

    async fn find_between(&self, _: &str, _: &str) -> Result<Vec<Message>, StoreError> {
        Err(StoreError::Unavailable("boom".to_string()))
    }

    async fn delete_direction(&self, _: &str, _: &str) -> Result<usize, StoreError> {
        Err(StoreError::Unavailable("boom".to_string()))
    }

    async fn update_status(
        &self,
        _: i64,
        _: DeliveryStatus,
    ) -> Result<Option<Message>, StoreError> {
        Err(StoreError::Unavailable("boom".to_string()))
    }
}

pub fn test_config() -> Config {
    Config {
        port: 0,
        auth_secret: TEST_SECRET.to_string(),
        outbox_url: None,
        ping_interval_secs: 30,
    }
}

/// Build a test AppState wired to in-memory backends and a collector outbox.
pub fn test_state() -> (AppState, Arc<CollectorSink>) {
    state_with(
        test_config(),
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryMessageStore::new()),
    )
}

/// Like [`test_state`], with specific config and backends swapped in.
pub fn state_with(
    config: Config,
    kv: Arc<dyn KeyValueStore>,
    messages: Arc<dyn MessageStore>,
) -> (AppState, Arc<CollectorSink>) {
    let sink = Arc::new(CollectorSink::default());
    let sessions = Arc::new(SessionRegistry::new());
    let state = AppState {
        config: Arc::new(config),
        auth: Arc::new(JwtAuthenticator::new(TEST_SECRET)),
        presence: Arc::new(PresenceRegistry::new(kv)),
        messages,
        users: Arc::new(MemoryUserDirectory::new()),
        sessions: Arc::clone(&sessions),
        broadcast: Broadcaster::new(sessions),
        outbox: Outbox::spawn(sink.clone()),
        commands: Arc::new(CommandRouter::new()),
    };
    (state, sink)
}

/// Build the full application router wired to a fresh test state.
pub fn test_app() -> (Router, AppState) {
    let (state, _sink) = test_state();
    let app = relay_api::routes::router().with_state(state.clone());
    (app, state)
}

/// Start the relay on an ephemeral port. The server runs in the background.
pub async fn start_server(state: AppState) -> SocketAddr {
    let app = relay_api::routes::router().with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

/// Mint a bearer token for `uid`, signed with the test secret.
pub fn mint_token(uid: &str) -> String {
    let claims = Claims {
        sub: uid.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::seconds(300)).timestamp(),
    };
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("mint test token")
}

/// The authenticator used by [`test_state`], for direct unit-style checks.
pub fn test_authenticator() -> JwtAuthenticator {
    JwtAuthenticator::new(TEST_SECRET)
}

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connect to the gateway, optionally with a bound user ID.
pub async fn connect(addr: SocketAddr, user_id: Option<&str>) -> WsClient {
    let url = match user_id {
        Some(uid) => format!("ws://{addr}/gateway?userId={uid}"),
        None => format!("ws://{addr}/gateway"),
    };
    let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");
    ws_stream
}

/// Send one `{event, data}` frame.
pub async fn send_frame(ws: &mut WsClient, event: &str, data: Value) {
    let frame = serde_json::json!({ "event": event, "data": data });
    ws.send(tungstenite::Message::Text(frame.to_string().into()))
        .await
        .expect("send frame");
}

/// Read the next text frame, failing the test after five seconds.
pub async fn next_frame(ws: &mut WsClient) -> Value {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for frame")
            .expect("stream ended")
            .expect("ws read error");

        match msg {
            tungstenite::Message::Text(text) => {
                return serde_json::from_str(&text).expect("parse frame");
            }
            // Keepalive traffic is not part of any assertion.
            tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_) => continue,
            other => panic!("expected text frame, got: {other:?}"),
        }
    }
}

/// Read frames until one with the given event name arrives; returns its data.
pub async fn next_event(ws: &mut WsClient, event: &str) -> Value {
    for _ in 0..10 {
        let frame = next_frame(ws).await;
        if frame["event"] == event {
            return frame["data"].clone();
        }
    }
    panic!("never saw event {event}");
}

/// Assert that no frame arrives within a short window.
pub async fn expect_silence(ws: &mut WsClient) {
    if let Ok(msg) = time::timeout(Duration::from_millis(300), ws.next()).await {
        panic!("expected silence, got: {msg:?}");
    }
}
