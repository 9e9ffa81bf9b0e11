//! Engine configuration
//!
//! Every knob has a default, so an empty environment yields a working
//! configuration. Values that fail to parse fall back to their defaults;
//! values that parse but make no sense are rejected by [`EngineConfig::validate`].

use std::env;
use std::time::Duration;

/// Main engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub env: Environment,
    pub sync: SyncConfig,
    pub typing: TypingConfig,
    pub thread: ThreadConfig,
    pub storage: StorageConfig,
    /// Worker bits of generated Snowflake IDs
    pub worker_id: u16,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Timing of read-marking and realtime reloads
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Coalescer window for mark-as-read
    pub read_debounce: Duration,
    /// Continuous visibility needed before a conversation counts as read
    pub visibility_dwell: Duration,
    /// Intersection ratio that arms the dwell timer
    pub visibility_threshold: f64,
    /// Window in which change-feed bursts collapse into one reload
    pub reload_coalesce: Duration,
    /// Debounce of conversation-list refreshes driven by incoming messages
    pub refresh_debounce: Duration,
}

/// Where typing indicators live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypingBackend {
    #[default]
    Postgres,
    Redis,
}

impl TypingBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "postgres" | "pg" => Some(Self::Postgres),
            "redis" => Some(Self::Redis),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypingConfig {
    /// Local timer after which a typing user is stopped automatically
    pub timeout: Duration,
    /// Rows older than this are swept on read; zero disables the sweep
    pub stale_after: Duration,
    pub backend: TypingBackend,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThreadConfig {
    /// Number of messages loaded per thread window
    pub page_size: u32,
    /// Maximum characters of message text
    pub max_content_chars: usize,
}

/// Attachment storage configuration
#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    pub bucket: String,
    pub max_upload_bytes: u64,
    /// Root directory of the filesystem blob store
    pub upload_dir: String,
    /// URL prefix under which uploaded files are served
    pub public_base_url: String,
}

// Default value functions
fn default_read_debounce_ms() -> u64 {
    300
}

fn default_visibility_dwell_ms() -> u64 {
    500
}

fn default_visibility_threshold() -> f64 {
    0.5
}

fn default_reload_coalesce_ms() -> u64 {
    50
}

fn default_refresh_debounce_ms() -> u64 {
    300
}

fn default_typing_timeout_ms() -> u64 {
    3000
}

fn default_typing_stale_secs() -> u64 {
    10
}

fn default_page_size() -> u32 {
    50
}

fn default_max_content_chars() -> usize {
    4000
}

fn default_bucket() -> String {
    "chat-attachments".to_string()
}

fn default_max_upload_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_upload_dir() -> String {
    "./uploads".to_string()
}

fn default_public_base_url() -> String {
    "http://localhost:8080/files".to_string()
}

const MAX_PAGE_SIZE: u32 = 200;

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_source(|_| None)
    }
}

impl EngineConfig {
    /// Load configuration from environment variables (and `.env` if present)
    ///
    /// # Errors
    /// Returns an error if a value parses but is out of range
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let config = Self::from_source(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Build from an arbitrary key lookup
    pub fn from_source<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());
        let millis = |key: &str, default: fn() -> u64| {
            Duration::from_millis(parsed(key).unwrap_or_else(default))
        };

        Self {
            env: lookup("APP_ENV")
                .and_then(|s| Environment::parse(&s))
                .unwrap_or_default(),
            sync: SyncConfig {
                read_debounce: millis("CONVO_READ_DEBOUNCE_MS", default_read_debounce_ms),
                visibility_dwell: millis("CONVO_VISIBILITY_DWELL_MS", default_visibility_dwell_ms),
                visibility_threshold: lookup("CONVO_VISIBILITY_THRESHOLD")
                    .and_then(|s| s.trim().parse().ok())
                    .unwrap_or_else(default_visibility_threshold),
                reload_coalesce: millis("CONVO_RELOAD_COALESCE_MS", default_reload_coalesce_ms),
                refresh_debounce: millis("CONVO_REFRESH_DEBOUNCE_MS", default_refresh_debounce_ms),
            },
            typing: TypingConfig {
                timeout: millis("CONVO_TYPING_TIMEOUT_MS", default_typing_timeout_ms),
                stale_after: Duration::from_secs(
                    parsed("CONVO_TYPING_STALE_SECS").unwrap_or_else(default_typing_stale_secs),
                ),
                backend: lookup("CONVO_TYPING_BACKEND")
                    .and_then(|s| TypingBackend::parse(&s))
                    .unwrap_or_default(),
            },
            thread: ThreadConfig {
                page_size: lookup("CONVO_THREAD_PAGE_SIZE")
                    .and_then(|s| s.trim().parse::<u32>().ok())
                    .unwrap_or_else(default_page_size)
                    .clamp(1, MAX_PAGE_SIZE),
                max_content_chars: lookup("CONVO_MAX_CONTENT_CHARS")
                    .and_then(|s| s.trim().parse().ok())
                    .unwrap_or_else(default_max_content_chars),
            },
            storage: StorageConfig {
                bucket: lookup("CONVO_ATTACHMENT_BUCKET").unwrap_or_else(default_bucket),
                max_upload_bytes: parsed("CONVO_MAX_UPLOAD_BYTES")
                    .unwrap_or_else(default_max_upload_bytes),
                upload_dir: lookup("CONVO_UPLOAD_DIR").unwrap_or_else(default_upload_dir),
                public_base_url: lookup("CONVO_PUBLIC_BASE_URL")
                    .unwrap_or_else(default_public_base_url),
            },
            worker_id: lookup("WORKER_ID")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(0),
        }
    }

    /// Reject values that parse but cannot work
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.sync.visibility_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigError::InvalidValue(
                "CONVO_VISIBILITY_THRESHOLD",
                format!("{threshold} is outside (0, 1]"),
            ));
        }
        if self.sync.read_debounce.is_zero() {
            return Err(ConfigError::InvalidValue(
                "CONVO_READ_DEBOUNCE_MS",
                "must be greater than zero".to_string(),
            ));
        }
        if self.sync.visibility_dwell.is_zero() {
            return Err(ConfigError::InvalidValue(
                "CONVO_VISIBILITY_DWELL_MS",
                "must be greater than zero".to_string(),
            ));
        }
        if self.typing.timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "CONVO_TYPING_TIMEOUT_MS",
                "must be greater than zero".to_string(),
            ));
        }
        if self.storage.bucket.trim().is_empty() {
            return Err(ConfigError::MissingVar("CONVO_ATTACHMENT_BUCKET"));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> EngineConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        EngineConfig::from_source(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.sync.read_debounce, Duration::from_millis(300));
        assert_eq!(config.sync.visibility_dwell, Duration::from_millis(500));
        assert!((config.sync.visibility_threshold - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.typing.timeout, Duration::from_secs(3));
        assert_eq!(config.typing.backend, TypingBackend::Postgres);
        assert_eq!(config.thread.page_size, 50);
        assert_eq!(config.storage.bucket, "chat-attachments");
        assert_eq!(config.storage.max_upload_bytes, 5 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_and_bad_numbers() {
        let config = from_pairs(&[
            ("CONVO_READ_DEBOUNCE_MS", "120"),
            ("CONVO_TYPING_BACKEND", "Redis"),
            ("CONVO_THREAD_PAGE_SIZE", "10000"),
            ("CONVO_VISIBILITY_DWELL_MS", "soon"),
            ("APP_ENV", "production"),
        ]);
        assert_eq!(config.sync.read_debounce, Duration::from_millis(120));
        assert_eq!(config.typing.backend, TypingBackend::Redis);
        assert_eq!(config.thread.page_size, MAX_PAGE_SIZE);
        assert_eq!(config.sync.visibility_dwell, Duration::from_millis(500));
        assert!(config.env.is_production());
    }

    #[test]
    fn test_validate_rejects_threshold() {
        let config = from_pairs(&[("CONVO_VISIBILITY_THRESHOLD", "1.5")]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue("CONVO_VISIBILITY_THRESHOLD", _))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_debounce() {
        let config = from_pairs(&[("CONVO_READ_DEBOUNCE_MS", "0")]);
        assert!(config.validate().is_err());
    }
}
