pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod kv;
pub mod outbox;
pub mod presence;
pub mod routes;
pub mod store;

use std::sync::Arc;

use auth::Authenticator;
use config::Config;
use gateway::broadcast::Broadcaster;
use gateway::handler::CommandRouter;
use gateway::registry::SessionRegistry;
use outbox::Outbox;
use presence::PresenceRegistry;
use store::messages::MessageStore;
use store::users::UserDirectory;

/// Everything the handlers share, injected through axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: Arc<dyn Authenticator>,
    pub presence: Arc<PresenceRegistry>,
    pub messages: Arc<dyn MessageStore>,
    pub users: Arc<dyn UserDirectory>,
    pub sessions: Arc<SessionRegistry>,
    pub broadcast: Broadcaster,
    pub outbox: Outbox,
    pub commands: Arc<CommandRouter>,
}
