//! Filesystem blob store
//!
//! Objects live at `{root}/{bucket}/{path}` and are served from
//! `{public_base_url}/{bucket}/{path}` by whatever fronts the directory.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::instrument;

use convo_core::error::DomainError;
use convo_core::traits::{BlobStore, RepoResult};

#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Resolve `bucket/path` under the root, refusing anything that escapes it
    fn resolve(&self, bucket: &str, path: &str) -> RepoResult<PathBuf> {
        let relative = Path::new(bucket).join(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes || bucket.is_empty() || path.is_empty() {
            return Err(DomainError::ValidationError(format!(
                "invalid object path: {bucket}/{path}"
            )));
        }
        Ok(self.root.join(relative))
    }
}

fn storage_error(e: std::io::Error) -> DomainError {
    DomainError::StorageError(e.to_string())
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> RepoResult<String> {
        let target = self.resolve(bucket, path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(storage_error)?;
        }
        tokio::fs::write(&target, bytes).await.map_err(storage_error)?;

        tracing::debug!(bucket, path, content_type, "Stored blob");
        Ok(path.to_string())
    }

    async fn public_url(&self, bucket: &str, path: &str) -> RepoResult<String> {
        self.resolve(bucket, path)?;
        Ok(format!("{}/{bucket}/{path}", self.public_base_url))
    }

    #[instrument(skip(self, paths), fields(count = paths.len()))]
    async fn remove(&self, bucket: &str, paths: &[String]) -> RepoResult<()> {
        for path in paths {
            let target = self.resolve(bucket, path)?;
            match tokio::fs::remove_file(&target).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(storage_error(e)),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!(
            "convo-blob-{}-{}",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ))
    }

    #[tokio::test]
    async fn test_upload_then_url_then_remove() {
        let root = temp_root();
        let store = LocalBlobStore::new(&root, "http://cdn.test/files/");

        let stored = store
            .upload("chat-attachments", "1/2/3.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();
        assert_eq!(stored, "1/2/3.png");
        assert!(root.join("chat-attachments/1/2/3.png").exists());

        let url = store.public_url("chat-attachments", &stored).await.unwrap();
        assert_eq!(url, "http://cdn.test/files/chat-attachments/1/2/3.png");

        store
            .remove("chat-attachments", &[stored.clone(), "missing.bin".into()])
            .await
            .unwrap();
        assert!(!root.join("chat-attachments/1/2/3.png").exists());

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let store = LocalBlobStore::new(temp_root(), "http://cdn.test");
        let err = store
            .upload("chat-attachments", "../../etc/passwd", vec![], "text/plain")
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }
}
