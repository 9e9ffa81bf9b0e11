//! External collaborators: change feed and blob store

use async_trait::async_trait;

use crate::events::{ChangeCallback, Subscription, SubscriptionHandle};

use super::repositories::RepoResult;

/// Push feed of row-level changes
///
/// Callbacks run on the feed's delivery task and must not block; the engine
/// only uses them to schedule reloads.
pub trait ChangeFeed: Send + Sync {
    fn subscribe(
        &self,
        subscription: Subscription,
        callback: ChangeCallback,
    ) -> RepoResult<SubscriptionHandle>;

    /// Returns false if the handle was unknown or already released
    fn unsubscribe(&self, handle: SubscriptionHandle) -> bool;
}

/// Object storage for attachment payloads
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `bucket/path`, returning the stored path
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> RepoResult<String>;

    /// Public (or signed) URL of a stored object
    async fn public_url(&self, bucket: &str, path: &str) -> RepoResult<String>;

    async fn remove(&self, bucket: &str, paths: &[String]) -> RepoResult<()>;
}
