//! Bucket-backed model store

use async_trait::async_trait;

use super::{artifact_key, validate_name, ModelStore};
use crate::error::{Result, ServingError};
use crate::object_storage::ObjectStorage;

/// Stores each artifact as object `<name>.bin` in a fixed bucket
#[derive(Clone)]
pub struct BucketModelStore {
    storage: ObjectStorage,
    bucket: String,
}

impl BucketModelStore {
    pub fn new(storage: ObjectStorage, bucket: impl Into<String>) -> Self {
        Self {
            storage,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ModelStore for BucketModelStore {
    async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<()> {
        validate_name(name)?;
        self.storage
            .save_model(&self.bucket, &artifact_key(name), bytes)
            .await
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>> {
        validate_name(name)?;
        self.storage
            .load_model(&self.bucket, &artifact_key(name))
            .await
            .map_err(|e| rename_missing(e, name))
    }

    async fn delete(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        self.storage
            .delete_model(&self.bucket, &artifact_key(name))
            .await
            .map_err(|e| rename_missing(e, name))
    }

    fn scope(&self) -> String {
        format!("bucket:{}", self.bucket)
    }
}

/// Report missing artifacts by model name rather than object key
fn rename_missing(err: ServingError, name: &str) -> ServingError {
    match err {
        ServingError::ModelNotFound(_) => ServingError::ModelNotFound(name.to_string()),
        other => other,
    }
}
