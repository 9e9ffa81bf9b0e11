//! Typing indicators kept in Redis with a TTL

mod store;

pub use store::{RedisTypingStore, DEFAULT_TYPING_TTL_SECS};
