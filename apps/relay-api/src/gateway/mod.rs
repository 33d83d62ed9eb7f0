pub mod broadcast;
pub mod handler;
pub mod registry;
pub mod server;
