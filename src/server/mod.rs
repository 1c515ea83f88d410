//! Model serving HTTP server
//!
//! Exposes training, prediction, listing and deletion of regression models,
//! plus bucket-scoped model and dataset storage when an object store is
//! configured.

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use state::AppState;

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::object_storage::{ObjectStorage, S3Config};
use crate::registry::ModelRegistry;
use crate::store::{BucketModelStore, LocalModelStore, ModelStore};

/// Where trained model artifacts are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelBackend {
    /// A directory on the local filesystem
    Local,
    /// A bucket in the configured object store
    Bucket,
}

impl FromStr for ModelBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "dir" | "fs" => Ok(ModelBackend::Local),
            "bucket" | "object" | "s3" => Ok(ModelBackend::Bucket),
            other => Err(format!("unknown model backend '{}': use local or bucket", other)),
        }
    }
}

/// Object store selection
#[derive(Debug, Clone)]
pub enum ObjectStoreConfig {
    None,
    /// In-process store, lost on restart
    Memory,
    S3(S3Config),
}

impl ObjectStoreConfig {
    fn from_env() -> Self {
        let kind = std::env::var("OBJECT_STORE").unwrap_or_else(|_| "none".to_string());
        match kind.trim().to_ascii_lowercase().as_str() {
            "memory" => ObjectStoreConfig::Memory,
            "s3" | "minio" => {
                let defaults = S3Config::default();
                ObjectStoreConfig::S3(S3Config {
                    endpoint: std::env::var("OBJECT_STORE_ENDPOINT").unwrap_or(defaults.endpoint),
                    region: std::env::var("OBJECT_STORE_REGION").unwrap_or(defaults.region),
                    access_key: std::env::var("OBJECT_STORE_ACCESS_KEY").unwrap_or_default(),
                    secret_key: std::env::var("OBJECT_STORE_SECRET_KEY").unwrap_or_default(),
                    force_path_style: defaults.force_path_style,
                })
            }
            "none" | "" => ObjectStoreConfig::None,
            other => {
                warn!(object_store = other, "Unknown OBJECT_STORE, object storage disabled");
                ObjectStoreConfig::None
            }
        }
    }

    /// Build the adapter, if any
    pub fn build(&self) -> Option<ObjectStorage> {
        match self {
            ObjectStoreConfig::None => None,
            ObjectStoreConfig::Memory => Some(ObjectStorage::in_memory()),
            ObjectStoreConfig::S3(s3) => Some(ObjectStorage::s3(s3)),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub models_dir: String,
    pub model_backend: ModelBackend,
    pub model_bucket: String,
    pub object_store: ObjectStoreConfig,
    pub cors_origin: Option<String>,
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            models_dir: std::env::var("MODELS_DIR").unwrap_or_else(|_| "./models".to_string()),
            model_backend: std::env::var("MODEL_BACKEND")
                .ok()
                .and_then(|b| b.parse().ok())
                .unwrap_or(ModelBackend::Local),
            model_bucket: std::env::var("MODEL_BUCKET").unwrap_or_else(|_| "models".to_string()),
            object_store: ObjectStoreConfig::from_env(),
            cors_origin: std::env::var("CORS_ORIGIN").ok(),
            max_upload_size: std::env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100 * 1024 * 1024), // 100MB
        }
    }
}

impl ServerConfig {
    /// Local-directory configuration with no object store, independent of env
    pub fn local(models_dir: impl Into<String>) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            models_dir: models_dir.into(),
            model_backend: ModelBackend::Local,
            model_bucket: "models".to_string(),
            object_store: ObjectStoreConfig::None,
            cors_origin: None,
            max_upload_size: 100 * 1024 * 1024,
        }
    }
}

/// Build the model store, registry and object storage for `config`
pub async fn build_state(config: ServerConfig) -> anyhow::Result<Arc<AppState>> {
    let object_storage = config.object_store.build();

    let store: Arc<dyn ModelStore> = match config.model_backend {
        ModelBackend::Local => Arc::new(LocalModelStore::new(&config.models_dir)?),
        ModelBackend::Bucket => {
            let storage = object_storage.clone().ok_or_else(|| {
                anyhow::anyhow!("MODEL_BACKEND=bucket requires OBJECT_STORE to be memory or s3")
            })?;
            if !storage.list_buckets().await?.contains(&config.model_bucket) {
                storage.create_bucket(&config.model_bucket).await?;
            }
            Arc::new(BucketModelStore::new(storage, config.model_bucket.clone()))
        }
    };

    info!(
        scope = %store.scope(),
        object_store = %object_storage.as_ref().map(|s| s.describe()).unwrap_or_else(|| "none".to_string()),
        "Storage initialized"
    );

    let registry = Arc::new(ModelRegistry::new(store));
    Ok(Arc::new(AppState::new(config, registry, object_storage)))
}

/// Start the server with the given configuration
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();

    let state = build_state(config.clone()).await?;
    let app = create_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(
        host = %config.host,
        port = config.port,
        address = %addr,
        backend = ?config.model_backend,
        max_upload_size_mb = config.max_upload_size / 1024 / 1024,
        started_at = %start_time.to_rfc3339(),
        "Model serving API starting"
    );
    info!(url = %format!("http://{}/health", addr), "Health endpoint available");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, pid = std::process::id(), "Server listening and ready to accept connections");

    // Graceful shutdown on ctrl+c
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
        let stop_time = chrono::Utc::now();
        let uptime = stop_time.signed_duration_since(start_time);
        info!(
            stopped_at = %stop_time.to_rfc3339(),
            uptime_secs = uptime.num_seconds(),
            "Shutdown signal received, stopping server gracefully"
        );
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}
