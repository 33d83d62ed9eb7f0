/// Relay API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port the server listens on.
    pub port: u16,
    /// Shared secret used to verify bearer tokens on the REST surface.
    pub auth_secret: String,
    /// Optional webhook origin for outbound message events. When unset,
    /// events are dropped instead of delivered.
    pub outbox_url: Option<String>,
    /// Seconds between keepalive pings on gateway sessions.
    pub ping_interval_secs: u64,
}

impl Config {
    /// Read every setting from the environment.
    ///
    /// Panics when a required variable is absent, naming it.
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3001),
            auth_secret: required_var("AUTH_SECRET"),
            outbox_url: std::env::var("OUTBOX_URL").ok().filter(|s| !s.is_empty()),
            ping_interval_secs: std::env::var("PING_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        }
    }
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}
