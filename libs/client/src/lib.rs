//! Client-side connection controller for the banter gateway.
//!
//! [`ChatClient`] owns at most one live WebSocket to the gateway and mirrors
//! the conversation state the server pushes at it: the message list and the
//! set of online users. Rebinding to a new identity tears the old connection
//! down before the new one is opened.

pub mod client;
pub mod error;
pub mod state;

pub use client::{ChatClient, LinkStatus};
pub use error::ConnectError;
