//! Test fixtures and data generators
//!
//! Provides reusable users and payloads for integration tests.

use std::sync::atomic::{AtomicU64, Ordering};

use convo_core::{Profile, Snowflake};

/// Counter for unique test data
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Get a unique suffix for test data
pub fn unique_suffix() -> u64 {
    COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// A signed-in user of the engine
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Snowflake,
    pub username: String,
    pub display_name: String,
}

impl TestUser {
    pub fn new(id: Snowflake, username: &str, display_name: &str) -> Self {
        Self {
            id,
            username: username.to_string(),
            display_name: display_name.to_string(),
        }
    }

    /// A user with a fresh ID and username, for shared databases
    pub fn unique(base: i64) -> Self {
        let suffix = unique_suffix();
        Self {
            id: Snowflake::new(base + suffix as i64),
            username: format!("testuser{suffix}"),
            display_name: format!("Test User {suffix}"),
        }
    }

    pub fn profile(&self) -> Profile {
        Profile::new(self.id, self.username.clone()).with_display_name(self.display_name.clone())
    }
}

pub fn alice() -> TestUser {
    TestUser::new(Snowflake::new(2001), "alice", "Alice")
}

pub fn bob() -> TestUser {
    TestUser::new(Snowflake::new(2002), "bob", "Bob")
}

pub fn carol() -> TestUser {
    TestUser::new(Snowflake::new(2003), "carol", "Carol")
}

/// Bytes with a PNG signature, padded to `len`
pub fn png_bytes(len: usize) -> Vec<u8> {
    const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    let mut bytes = vec![0u8; len.max(SIGNATURE.len())];
    bytes[..SIGNATURE.len()].copy_from_slice(&SIGNATURE);
    bytes
}

pub const TWO_MIB: usize = 2 * 1024 * 1024;
