// Blob storage for uploaded photos and avatars.
// Paths are always relative to the store root; the database only records those.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn save(&self, bytes: &[u8], path: &str) -> AppResult<()>;
    async fn remove(&self, path: &str) -> AppResult<()>;
    async fn exists(&self, path: &str) -> AppResult<bool>;
}

/// Best-effort removal. Failures are logged and swallowed: callers use this
/// after the owning metadata row is already gone.
pub async fn remove_quietly(store: &dyn BlobStore, path: &str) {
    if let Err(e) = store.remove(path).await {
        warn!(path = %path, error = %e, "Failed to remove blob");
    }
}

pub async fn remove_all_quietly(store: &dyn BlobStore, paths: &[String]) {
    for path in paths {
        remove_quietly(store, path).await;
    }
}

/// Files under a local directory.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a relative blob path into the root, refusing anything that could escape it.
    fn resolve(&self, path: &str) -> AppResult<PathBuf> {
        let relative = Path::new(path);
        let clean = !path.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !clean {
            return Err(AppError::validation("Invalid file path"));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn save(&self, bytes: &[u8], path: &str) -> AppResult<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        debug!(path = %path, size = bytes.len(), "Blob saved");
        Ok(())
    }

    async fn remove(&self, path: &str) -> AppResult<()> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &str) -> AppResult<bool> {
        let target = self.resolve(path)?;
        Ok(tokio::fs::try_exists(&target).await?)
    }
}
