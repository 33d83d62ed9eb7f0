use thiserror::Error;

/// Failure to establish a gateway connection.
///
/// The controller does not retry on its own; callers decide whether and when
/// to bind again.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("gateway handshake failed: {0}")]
    Handshake(#[from] tokio_tungstenite::tungstenite::Error),
}
