//! # convo-common
//!
//! Shared utilities: engine configuration loaded from the environment and
//! tracing setup.

pub mod config;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{
    ConfigError, EngineConfig, Environment, StorageConfig, SyncConfig, ThreadConfig,
    TypingBackend, TypingConfig,
};
pub use telemetry::{init_tracing, try_init_tracing, TracingConfig, TracingError};
