//! Bucket backends: the raw client operations the adapter builds on

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

use crate::error::{Result, ServingError};

/// Minimal bucket/object client surface
///
/// Backends report missing objects as `DataNotFound(key)` and missing
/// buckets as `BucketNotFound`; the adapter maps those to domain errors.
#[async_trait]
pub trait BucketBackend: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    async fn create_bucket(&self, bucket: &str) -> Result<()>;

    async fn list_buckets(&self) -> Result<Vec<String>>;

    async fn list_objects(&self, bucket: &str) -> Result<Vec<String>>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<()>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;

    /// Backend name for logs
    fn describe(&self) -> String;
}

/// In-process backend, used for local development and tests
#[derive(Debug, Default)]
pub struct MemoryBackend {
    buckets: RwLock<HashMap<String, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BucketBackend for MemoryBackend {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        Ok(self.buckets.read().contains_key(bucket))
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let mut buckets = self.buckets.write();
        if buckets.contains_key(bucket) {
            return Err(ServingError::BucketAlreadyExists(bucket.to_string()));
        }
        buckets.insert(bucket.to_string(), BTreeMap::new());
        Ok(())
    }

    async fn list_buckets(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.buckets.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn list_objects(&self, bucket: &str) -> Result<Vec<String>> {
        self.buckets
            .read()
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .ok_or_else(|| ServingError::BucketNotFound(bucket.to_string()))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> Result<()> {
        self.buckets
            .write()
            .get_mut(bucket)
            .ok_or_else(|| ServingError::BucketNotFound(bucket.to_string()))?
            .insert(key.to_string(), data);
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.buckets
            .read()
            .get(bucket)
            .ok_or_else(|| ServingError::BucketNotFound(bucket.to_string()))?
            .get(key)
            .cloned()
            .ok_or_else(|| ServingError::DataNotFound(key.to_string()))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.buckets
            .write()
            .get_mut(bucket)
            .ok_or_else(|| ServingError::BucketNotFound(bucket.to_string()))?
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| ServingError::DataNotFound(key.to_string()))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_objects() {
        let backend = MemoryBackend::new();
        backend.create_bucket("models").await.unwrap();
        assert!(backend.bucket_exists("models").await.unwrap());
        assert!(!backend.bucket_exists("other").await.unwrap());

        backend.put_object("models", "b", vec![2], "application/octet-stream").await.unwrap();
        backend.put_object("models", "a", vec![1], "application/octet-stream").await.unwrap();
        assert_eq!(backend.list_objects("models").await.unwrap(), vec!["a", "b"]);
        assert_eq!(backend.get_object("models", "a").await.unwrap(), vec![1]);

        backend.delete_object("models", "a").await.unwrap();
        assert!(matches!(
            backend.get_object("models", "a").await,
            Err(ServingError::DataNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_backend_missing_bucket() {
        let backend = MemoryBackend::new();
        assert!(matches!(
            backend.put_object("nope", "k", vec![], "text/csv").await,
            Err(ServingError::BucketNotFound(_))
        ));
    }
}
