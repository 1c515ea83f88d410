//! Error types for the model serving crate

use thiserror::Error;

/// Result type alias for model serving operations
pub type Result<T> = std::result::Result<T, ServingError>;

/// Main error type shared by the registry, stores and object storage
#[derive(Error, Debug)]
pub enum ServingError {
    #[error("{kind} is not implemented for training. Available models are: {available:?}")]
    UnsupportedModelKind {
        kind: String,
        available: Vec<&'static str>,
    },

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Data not found: {0}")]
    DataNotFound(String),

    #[error("Bucket {0} does not exist")]
    BucketNotFound(String),

    #[error("Bucket {0} already exists")]
    BucketAlreadyExists(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<polars::error::PolarsError> for ServingError {
    fn from(err: polars::error::PolarsError) -> Self {
        ServingError::DataError(err.to_string())
    }
}

impl From<bincode::Error> for ServingError {
    fn from(err: bincode::Error) -> Self {
        ServingError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ServingError {
    fn from(err: ndarray::ShapeError) -> Self {
        ServingError::ShapeError {
            expected: "rectangular feature matrix".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ServingError::ModelNotFound("LinReg".to_string());
        assert_eq!(err.to_string(), "Model not found: LinReg");
    }

    #[test]
    fn test_unsupported_kind_lists_available() {
        let err = ServingError::UnsupportedModelKind {
            kind: "svm".to_string(),
            available: vec!["LinReg", "Catboost"],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("svm is not implemented"));
        assert!(msg.contains("LinReg"));
        assert!(msg.contains("Catboost"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ServingError = io_err.into();
        assert!(matches!(err, ServingError::IoError(_)));
    }
}
