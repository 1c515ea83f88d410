//! Error types for the server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::ServingError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Training error: {0}")]
    Training(String),
}

impl From<ServingError> for ServerError {
    fn from(err: ServingError) -> Self {
        match err {
            ServingError::UnsupportedModelKind { .. }
            | ServingError::InvalidInput(_)
            | ServingError::InvalidParameter { .. }
            | ServingError::ShapeError { .. }
            | ServingError::DataError(_) => ServerError::BadRequest(err.to_string()),

            ServingError::ModelNotFound(name) => {
                ServerError::NotFound(format!("Model '{}' not found", name))
            }
            ServingError::DataNotFound(_) | ServingError::BucketNotFound(_) => {
                ServerError::NotFound(err.to_string())
            }

            ServingError::BucketAlreadyExists(_) => ServerError::Conflict(err.to_string()),

            ServingError::TrainingError(_)
            | ServingError::ComputationError(_)
            | ServingError::ModelNotFitted => ServerError::Training(err.to_string()),

            ServingError::IoError(e) => ServerError::Io(e),

            ServingError::SerializationError(_) | ServingError::StorageError(_) => {
                ServerError::Internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ServerError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ServerError::Internal(msg) => {
                tracing::error!(detail = %msg, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "An internal error occurred".to_string())
            }
            ServerError::Io(e) => {
                tracing::error!(detail = %e, "IO error");
                (StatusCode::INTERNAL_SERVER_ERROR, "A file system error occurred".to_string())
            }
            ServerError::Training(msg) => {
                tracing::error!(detail = %msg, "Training error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Training failed. Check server logs for details.".to_string())
            }
        };

        let body = Json(json!({
            "error": true,
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
