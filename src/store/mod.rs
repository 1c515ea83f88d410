//! Model artifact storage
//!
//! A [`ModelStore`] maps a model name to an artifact blob within one storage
//! scope (a local directory or a bucket). Writes overwrite; a concurrent
//! writer to the same name simply wins if it finishes last.

mod bucket;
mod local;

pub use bucket::BucketModelStore;
pub use local::LocalModelStore;

use async_trait::async_trait;

use crate::error::{Result, ServingError};

/// File extension / object suffix used for model artifacts
pub const ARTIFACT_EXTENSION: &str = "bin";

/// Byte-blob persistence keyed by model name
#[async_trait]
pub trait ModelStore: Send + Sync {
    /// Write `bytes` under `name`, replacing any previous artifact
    async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<()>;

    /// Read the artifact stored under `name`
    async fn get(&self, name: &str) -> Result<Vec<u8>>;

    /// Remove the artifact stored under `name`
    async fn delete(&self, name: &str) -> Result<()>;

    /// Human-readable description of the storage scope
    fn scope(&self) -> String;
}

/// Reject names that are empty or could escape the storage scope
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ServingError::InvalidInput("model name must not be empty".to_string()));
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") || name.contains('\0') {
        return Err(ServingError::InvalidInput(format!(
            "model name '{}' must not contain path separators or '..'",
            name
        )));
    }
    Ok(())
}

/// Storage key for a model name
pub fn artifact_key(name: &str) -> String {
    format!("{}.{}", name, ARTIFACT_EXTENSION)
}
