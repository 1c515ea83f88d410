//! Application state shared across handlers

use std::sync::Arc;

use crate::object_storage::ObjectStorage;
use crate::registry::ModelRegistry;

use super::ServerConfig;

pub struct AppState {
    pub config: ServerConfig,
    pub registry: Arc<ModelRegistry>,
    /// Present only when an object store is configured
    pub object_storage: Option<ObjectStorage>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        registry: Arc<ModelRegistry>,
        object_storage: Option<ObjectStorage>,
    ) -> Self {
        Self {
            config,
            registry,
            object_storage,
        }
    }
}
