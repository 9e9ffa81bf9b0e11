//! Configuration structs

mod engine_config;

pub use engine_config::{
    ConfigError, EngineConfig, Environment, StorageConfig, SyncConfig, ThreadConfig,
    TypingBackend, TypingConfig,
};
