//! In-memory blob store

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use convo_core::error::DomainError;
use convo_core::traits::{BlobStore, RepoResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Blob store holding objects in a map keyed by `bucket/path`
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, StoredBlob>>,
    fail_uploads: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent uploads fail (or succeed again)
    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, bucket: &str, path: &str) -> Option<StoredBlob> {
        self.objects.lock().get(&key(bucket, path)).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }
}

fn key(bucket: &str, path: &str) -> String {
    format!("{bucket}/{path}")
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> RepoResult<String> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(DomainError::StorageError("upload rejected".to_string()));
        }
        self.objects.lock().insert(
            key(bucket, path),
            StoredBlob {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(path.to_string())
    }

    async fn public_url(&self, bucket: &str, path: &str) -> RepoResult<String> {
        Ok(format!("memory://{bucket}/{path}"))
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> RepoResult<()> {
        let mut objects = self.objects.lock();
        for path in paths {
            objects.remove(&key(bucket, path));
        }
        Ok(())
    }
}
