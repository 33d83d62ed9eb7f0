pub mod messages;
pub mod users;

use thiserror::Error;

/// Error raised by a persistence backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
