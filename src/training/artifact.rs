//! Model artifact encoding
//!
//! A stored artifact is a bincode-encoded envelope around the bincode bytes of
//! a [`TrainedModel`]. The envelope carries enough metadata to reject foreign
//! or corrupted blobs before the model itself is decoded.

use serde::{Deserialize, Serialize};

use super::models::{ModelKind, TrainedModel};
use crate::error::{Result, ServingError};

/// Descriptive metadata stored next to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Name the artifact was saved under
    pub name: String,
    pub kind: ModelKind,
    /// Feature count the model was trained on
    pub n_features: usize,
    pub n_samples: usize,
    /// Hyperparameters as supplied, JSON-encoded
    pub hyperparameters: String,
    /// Training timestamp (RFC 3339)
    pub trained_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    magic: [u8; 4],
    format_version: u32,
    metadata: ArtifactMetadata,
    model_data: Vec<u8>,
    checksum: u64,
}

const MAGIC: [u8; 4] = *b"MSRV";
const FORMAT_VERSION: u32 = 1;

/// FNV-1a over the model bytes
fn checksum(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 14695981039346656037;
    const FNV_PRIME: u64 = 1099511628211;

    data.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ *byte as u64).wrapping_mul(FNV_PRIME)
    })
}

/// Serialize a trained model and its metadata into artifact bytes
pub fn encode(model: &TrainedModel, metadata: ArtifactMetadata) -> Result<Vec<u8>> {
    let model_data = bincode::serialize(model)?;
    let envelope = Envelope {
        magic: MAGIC,
        format_version: FORMAT_VERSION,
        checksum: checksum(&model_data),
        metadata,
        model_data,
    };
    Ok(bincode::serialize(&envelope)?)
}

/// Decode artifact bytes, verifying magic, format version and checksum
pub fn decode(bytes: &[u8]) -> Result<(TrainedModel, ArtifactMetadata)> {
    let envelope: Envelope = bincode::deserialize(bytes)
        .map_err(|e| ServingError::SerializationError(format!("Not a model artifact: {}", e)))?;

    if envelope.magic != MAGIC {
        return Err(ServingError::SerializationError(
            "Not a model artifact: bad magic bytes".to_string(),
        ));
    }
    if envelope.format_version != FORMAT_VERSION {
        return Err(ServingError::SerializationError(format!(
            "Unsupported artifact format version {}",
            envelope.format_version
        )));
    }
    if checksum(&envelope.model_data) != envelope.checksum {
        return Err(ServingError::SerializationError(
            "Artifact checksum mismatch".to_string(),
        ));
    }

    let model: TrainedModel = bincode::deserialize(&envelope.model_data)?;
    if model.kind() != envelope.metadata.kind {
        return Err(ServingError::SerializationError(format!(
            "Artifact declares kind {} but holds {}",
            envelope.metadata.kind,
            model.kind()
        )));
    }

    Ok((model, envelope.metadata))
}
