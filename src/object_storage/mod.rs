//! Object storage adapter
//!
//! Bucket-scoped persistence for model blobs and raw datasets on top of a
//! [`BucketBackend`]. Every bucket-scoped operation requires the bucket to
//! exist already; buckets are created explicitly and never implicitly.

mod backend;
mod dataset;
mod s3;

pub use backend::{BucketBackend, MemoryBackend};
pub use dataset::Dataset;
pub use s3::{S3Backend, S3Config};

use std::sync::Arc;
use tracing::info;

use crate::error::{Result, ServingError};

const MODEL_CONTENT_TYPE: &str = "application/octet-stream";
const DATASET_CONTENT_TYPE: &str = "text/csv";

/// Bucket-aware model and dataset storage
#[derive(Clone)]
pub struct ObjectStorage {
    backend: Arc<dyn BucketBackend>,
}

impl ObjectStorage {
    pub fn new(backend: Arc<dyn BucketBackend>) -> Self {
        Self { backend }
    }

    /// Adapter over a fresh in-process backend
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Adapter over an S3-compatible endpoint
    pub fn s3(config: &S3Config) -> Self {
        Self::new(Arc::new(S3Backend::new(config)))
    }

    pub fn describe(&self) -> String {
        self.backend.describe()
    }

    async fn ensure_bucket(&self, bucket: &str) -> Result<()> {
        if self.backend.bucket_exists(bucket).await? {
            Ok(())
        } else {
            Err(ServingError::BucketNotFound(bucket.to_string()))
        }
    }

    /// Create a bucket; an existing bucket is an error, not a no-op
    pub async fn create_bucket(&self, bucket: &str) -> Result<()> {
        validate_bucket_name(bucket)?;
        if self.backend.bucket_exists(bucket).await? {
            return Err(ServingError::BucketAlreadyExists(bucket.to_string()));
        }
        self.backend.create_bucket(bucket).await?;
        info!(bucket, backend = %self.describe(), "Bucket created");
        Ok(())
    }

    pub async fn list_buckets(&self) -> Result<Vec<String>> {
        self.backend.list_buckets().await
    }

    /// Names of every object in `bucket`
    pub async fn list_objects(&self, bucket: &str) -> Result<Vec<String>> {
        self.ensure_bucket(bucket).await?;
        self.backend.list_objects(bucket).await
    }

    pub async fn save_model(&self, bucket: &str, name: &str, bytes: Vec<u8>) -> Result<()> {
        self.ensure_bucket(bucket).await?;
        self.backend
            .put_object(bucket, name, bytes, MODEL_CONTENT_TYPE)
            .await?;
        info!(bucket, model = name, "Model saved to bucket");
        Ok(())
    }

    pub async fn load_model(&self, bucket: &str, name: &str) -> Result<Vec<u8>> {
        self.ensure_bucket(bucket).await?;
        self.backend
            .get_object(bucket, name)
            .await
            .map_err(|e| not_found_as(e, ServingError::ModelNotFound(name.to_string())))
    }

    pub async fn delete_model(&self, bucket: &str, name: &str) -> Result<()> {
        self.ensure_bucket(bucket).await?;
        self.backend
            .delete_object(bucket, name)
            .await
            .map_err(|e| not_found_as(e, ServingError::ModelNotFound(name.to_string())))?;
        info!(bucket, model = name, "Model deleted from bucket");
        Ok(())
    }

    /// Store a dataset as CSV under `name`
    pub async fn save_dataset(&self, bucket: &str, name: &str, dataset: &Dataset) -> Result<()> {
        self.ensure_bucket(bucket).await?;
        let csv = dataset.to_csv()?;
        self.backend
            .put_object(bucket, name, csv, DATASET_CONTENT_TYPE)
            .await?;
        info!(
            bucket,
            dataset = name,
            rows = dataset.n_rows(),
            columns = dataset.n_columns(),
            "Dataset saved to bucket"
        );
        Ok(())
    }

    pub async fn load_dataset(&self, bucket: &str, name: &str) -> Result<Dataset> {
        self.ensure_bucket(bucket).await?;
        let bytes = self.backend.get_object(bucket, name).await?;
        Dataset::from_csv(&bytes)
    }
}

/// Swap a backend's missing-object error for a more specific one
fn not_found_as(err: ServingError, replacement: ServingError) -> ServingError {
    match err {
        ServingError::DataNotFound(_) => replacement,
        other => other,
    }
}

/// S3 bucket naming rules: 3-63 chars of lowercase letters, digits, '.' and '-'
pub fn validate_bucket_name(bucket: &str) -> Result<()> {
    let valid_chars = bucket
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
    let valid_edges = bucket
        .chars()
        .next()
        .zip(bucket.chars().last())
        .map(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric())
        .unwrap_or(false);

    if (3..=63).contains(&bucket.len()) && valid_chars && valid_edges {
        Ok(())
    } else {
        Err(ServingError::InvalidInput(format!(
            "invalid bucket name '{}': use 3-63 lowercase letters, digits, '.' or '-'",
            bucket
        )))
    }
}
