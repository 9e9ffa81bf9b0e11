//! # convo-cache
//!
//! Redis adapters for the conversation engine.
//!
//! ## Features
//!
//! - **Connection Pool**: Managed Redis connection pool with deadpool
//! - **Typing Store**: TTL-backed typing indicators implementing `TypingRepository`
//! - **Change Feed**: Row changes published on a pub/sub channel and fanned
//!   out to local subscribers
//!
//! ## Example
//!
//! ```ignore
//! use convo_cache::{ChangePublisher, RedisChangeFeed, RedisFeedConfig, RedisPool, RedisPoolConfig, RedisTypingStore};
//!
//! let config = RedisPoolConfig::from_env();
//! let pool = RedisPool::new(&config)?;
//! let typing = RedisTypingStore::new(pool.clone(), ChangePublisher::new(pool));
//! let feed = RedisChangeFeed::start(RedisFeedConfig { redis_url: config.url, ..Default::default() });
//! ```

pub mod feed;
pub mod pool;
pub mod typing;

pub use feed::{ChangePublisher, RedisChangeFeed, RedisFeedConfig, CHANGE_CHANNEL};
pub use pool::{
    RedisPool, RedisPoolConfig, RedisPoolError, RedisResult,
};
pub use typing::{RedisTypingStore, DEFAULT_TYPING_TTL_SECS};
