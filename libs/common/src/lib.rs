pub mod id;
pub mod message;
pub mod proto;
pub mod snowflake;

pub use message::{DeliveryStatus, Message};
pub use proto::Frame;
pub use snowflake::SnowflakeGenerator;
