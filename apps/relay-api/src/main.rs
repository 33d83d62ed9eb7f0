use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relay_api::auth::JwtAuthenticator;
use relay_api::config::Config;
use relay_api::gateway::broadcast::Broadcaster;
use relay_api::gateway::handler::CommandRouter;
use relay_api::gateway::registry::SessionRegistry;
use relay_api::kv::{KeyValueStore, MemoryStore};
use relay_api::outbox::{EventSink, NoopSink, Outbox, WebhookSink};
use relay_api::presence::PresenceRegistry;
use relay_api::store::messages::MemoryMessageStore;
use relay_api::store::users::MemoryUserDirectory;
use relay_api::AppState;

#[tokio::main]
async fn main() {
    // Load .env if there is one; deployments set real env vars instead.
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    // In-memory KV store for presence. Replace with RedisStore when Redis is added.
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());

    let sink: Arc<dyn EventSink> = match &config.outbox_url {
        Some(url) => {
            tracing::info!(%url, "outbox delivery enabled");
            Arc::new(WebhookSink::new(url))
        }
        None => Arc::new(NoopSink),
    };

    let sessions = Arc::new(SessionRegistry::new());

    let state = AppState {
        auth: Arc::new(JwtAuthenticator::new(&config.auth_secret)),
        presence: Arc::new(PresenceRegistry::new(kv)),
        messages: Arc::new(MemoryMessageStore::new()),
        users: Arc::new(MemoryUserDirectory::new()),
        broadcast: Broadcaster::new(Arc::clone(&sessions)),
        sessions,
        outbox: Outbox::spawn(sink),
        commands: Arc::new(CommandRouter::new()),
        config: Arc::new(config),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(relay_api::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "relay-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}
