//! # convo-db
//!
//! Storage adapters for the conversation engine.
//!
//! ## Overview
//!
//! This crate provides implementations of the store ports defined in
//! `convo-core`:
//!
//! - Connection pool management and embedded migrations
//! - Database models with SQLx `FromRow` derives and entity mappers
//! - PostgreSQL repositories
//! - A change feed driven by `LISTEN/NOTIFY` triggers
//! - A filesystem blob store for attachments
//! - An in-memory store implementing every port, used by tests and demos
//!
//! ## Usage
//!
//! ```rust,ignore
//! use convo_db::pool::{create_pool, run_migrations, DatabaseConfig};
//! use convo_db::repositories::PgMessageRepository;
//! use convo_core::traits::MessageRepository;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = create_pool(&DatabaseConfig::from_env()).await?;
//!     run_migrations(&pool).await?;
//!     let messages = PgMessageRepository::new(pool);
//!
//!     // Use the repository...
//!     Ok(())
//! }
//! ```

pub mod feed;
pub mod mappers;
pub mod memory;
pub mod models;
pub mod pool;
pub mod repositories;
pub mod storage;

// Re-export commonly used types
pub use feed::{PgChangeFeed, PgFeedConfig};
pub use memory::{FailPoint, MemoryBlobStore, MemoryChangeFeed, MemoryStore};
pub use pool::{create_pool, create_pool_from_env, run_migrations, DatabaseConfig, PgPool};
pub use repositories::{
    map_db_error,
    PgAttachmentRepository, PgConversationRepository, PgMembershipRepository,
    PgMessageRepository, PgProfileRepository, PgReactionRepository, PgReadReceiptRepository,
    PgTypingRepository,
};
pub use storage::LocalBlobStore;
