//! Model Serve - regression model serving over HTTP
//!
//! This crate trains, persists and serves regression models:
//! - [`training`] - Linear and boosted-tree regressors plus the artifact codec
//! - [`store`] - Model artifact persistence (local directory or bucket)
//! - [`registry`] - Kind dispatch, in-memory model cache, train/predict/delete
//! - [`object_storage`] - Bucket-scoped model and dataset storage (S3, MinIO)
//! - [`server`] - HTTP API
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Models
pub mod training;
pub mod registry;

// Persistence
pub mod store;
pub mod object_storage;

// Services
pub mod server;
pub mod cli;

pub use error::{Result, ServingError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{Result, ServingError};
    pub use crate::training::{
        ArtifactMetadata, CatBoostConfig, CatBoostRegressor, Hyperparameters, LinearRegression,
        ModelKind, ModelMetrics, TrainedModel,
    };
    pub use crate::registry::{ModelRegistry, TrainOutcome, TrainRequest};
    pub use crate::store::{BucketModelStore, LocalModelStore, ModelStore};
    pub use crate::object_storage::{BucketBackend, Dataset, MemoryBackend, ObjectStorage, S3Config};
    pub use crate::server::{create_router, run_server, AppState, ServerConfig};
}
