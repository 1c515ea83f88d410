//! S3-compatible backend (AWS S3, MinIO) built on `aws-sdk-s3`

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Builder, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use tracing::debug;

use super::backend::BucketBackend;
use crate::error::{Result, ServingError};

/// Connection settings for an S3-compatible endpoint
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Endpoint URL, e.g. `http://127.0.0.1:9000` for a local MinIO
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    /// Path-style addressing, required by MinIO
    pub force_path_style: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9000".to_string(),
            region: "us-east-1".to_string(),
            access_key: String::new(),
            secret_key: String::new(),
            force_path_style: true,
        }
    }
}

fn backend_error<E: std::error::Error>(operation: &str, err: E) -> ServingError {
    ServingError::StorageError(format!("{} failed: {}", operation, DisplayErrorContext(err)))
}

/// Region that takes no location constraint on bucket creation
const DEFAULT_REGION: &str = "us-east-1";

pub struct S3Backend {
    client: Client,
    endpoint: String,
    region: String,
}

impl S3Backend {
    pub fn new(config: &S3Config) -> Self {
        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "model-serve",
        );
        let s3_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(config.endpoint.clone())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(config.force_path_style)
            .build();

        Self::with_client(Client::from_conf(s3_config), &config.endpoint, &config.region)
    }

    /// Wrap an already configured client
    pub fn with_client(client: Client, endpoint: &str, region: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            region: region.to_string(),
        }
    }

    fn bucket_configuration(&self) -> Option<CreateBucketConfiguration> {
        if self.region.is_empty() || self.region == DEFAULT_REGION {
            return None;
        }
        Some(
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                .build(),
        )
    }
}

#[async_trait]
impl BucketBackend for S3Backend {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(backend_error("HeadBucket", service_err))
                }
            }
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let request = self
            .client
            .create_bucket()
            .bucket(bucket)
            .set_create_bucket_configuration(self.bucket_configuration());
        match request.send().await {
            Ok(_) => Ok(()),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_bucket_already_owned_by_you()
                    || service_err.is_bucket_already_exists()
                {
                    Err(ServingError::BucketAlreadyExists(bucket.to_string()))
                } else {
                    Err(backend_error("CreateBucket", service_err))
                }
            }
        }
    }

    async fn list_buckets(&self) -> Result<Vec<String>> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| backend_error("ListBuckets", e))?;

        Ok(output
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(str::to_string))
            .collect())
    }

    async fn list_objects(&self, bucket: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| backend_error("ListObjectsV2", e))?;

            keys.extend(
                output
                    .contents()
                    .iter()
                    .filter_map(|o| o.key().map(str::to_string)),
            );

            match output.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        Ok(keys)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let len = data.len();
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| backend_error("PutObject", e))?;

        debug!(bucket, key, bytes = len, "Object uploaded");
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let output = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(output) => output,
            Err(err) => {
                let service_err = err.into_service_error();
                return if service_err.is_no_such_key() {
                    Err(ServingError::DataNotFound(key.to_string()))
                } else {
                    Err(backend_error("GetObject", service_err))
                };
            }
        };

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| ServingError::StorageError(format!("GetObject body read failed: {}", e)))?;
        Ok(data.into_bytes().to_vec())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        // S3 deletes are idempotent, so check existence to report missing keys
        if let Err(err) = self.client.head_object().bucket(bucket).key(key).send().await {
            let service_err = err.into_service_error();
            return if service_err.is_not_found() {
                Err(ServingError::DataNotFound(key.to_string()))
            } else {
                Err(backend_error("HeadObject", service_err))
            };
        }

        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| backend_error("DeleteObject", e))?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("s3:{}", self.endpoint)
    }
}
