//! Local filesystem model store

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::{artifact_key, validate_name, ModelStore};
use crate::error::{Result, ServingError};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Stores each artifact as `<root>/<name>.bin`
#[derive(Debug, Clone)]
pub struct LocalModelStore {
    root: PathBuf,
}

impl LocalModelStore {
    /// Create a store rooted at `root`, creating the directory if needed
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn artifact_path(&self, name: &str) -> PathBuf {
        self.root.join(artifact_key(name))
    }
}

#[async_trait]
impl ModelStore for LocalModelStore {
    async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<()> {
        validate_name(name)?;
        let path = self.artifact_path(name);

        // Write beside the target and rename so readers never see a partial file
        let tmp = self.root.join(format!(
            ".{}.{}-{}.tmp",
            artifact_key(name),
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        tokio::fs::write(&tmp, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!(path = %path.display(), bytes = bytes.len(), "Artifact written");
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>> {
        validate_name(name)?;
        match tokio::fs::read(self.artifact_path(name)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ServingError::ModelNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        match tokio::fs::remove_file(self.artifact_path(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ServingError::ModelNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn scope(&self) -> String {
        format!("dir:{}", self.root.display())
    }
}
