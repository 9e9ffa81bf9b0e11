//! In-memory store
//!
//! A single-process implementation of every store port plus the change feed
//! and blob store. It mirrors the Postgres semantics (ordering, idempotent
//! upserts, soft deletes) and publishes a change event for every write, so
//! the engine can run end to end without a database. Failure points and
//! per-table counters let tests observe how the engine talks to its store.

mod blob;
mod feed;
mod store;

pub use blob::MemoryBlobStore;
pub use feed::MemoryChangeFeed;
pub use store::{FailPoint, MemoryStore};
