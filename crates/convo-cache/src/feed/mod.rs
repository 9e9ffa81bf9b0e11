//! Change feed over Redis pub/sub
//!
//! Writers that live in Redis (the TTL typing store) announce their row
//! changes with a [`ChangePublisher`]; every process runs one
//! [`RedisChangeFeed`] listener that fans those events out locally.

mod publisher;
mod subscriber;

pub use publisher::ChangePublisher;
pub use subscriber::{RedisChangeFeed, RedisFeedConfig};

/// Pub/sub channel carrying change envelopes
pub const CHANGE_CHANNEL: &str = "convo:changes";
