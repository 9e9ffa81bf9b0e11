//! Integration test utilities for the conversation engine
//!
//! This crate provides an in-memory engine for end-to-end scenarios and
//! helpers for the optional tests against a live PostgreSQL instance.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
