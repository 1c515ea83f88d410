//! HTTP request handlers

use std::sync::Arc;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::object_storage::{Dataset, ObjectStorage};
use crate::registry::TrainRequest;
use crate::store::validate_name;
use crate::training::Hyperparameters;

use super::error::{Result, ServerError};
use super::state::AppState;

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TrainQuery {
    pub model_name: String,
    #[serde(default = "default_save", deserialize_with = "lenient_bool")]
    pub save: bool,
    pub save_as: Option<String>,
}

fn default_save() -> bool {
    true
}

/// Accepts the usual spellings of a query-string flag (`True`, `1`, `yes`, `off`)
fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" | "on" => Ok(true),
        "false" | "f" | "0" | "no" | "n" | "off" => Ok(false),
        _ => Err(serde::de::Error::custom(format!("invalid boolean '{}'", raw))),
    }
}

#[derive(Debug, Deserialize)]
pub struct ModelQuery {
    pub model_name: String,
}

#[derive(Debug, Deserialize)]
pub struct BucketQuery {
    pub bucket_name: String,
}

#[derive(Debug, Deserialize)]
pub struct TrainBody {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<f64>,
    #[serde(default, alias = "hyperparameters")]
    pub params: Option<Hyperparameters>,
}

#[derive(Debug, Deserialize)]
pub struct PredictBody {
    pub features: Vec<Vec<f64>>,
    /// Accepted and ignored
    #[serde(default)]
    pub labels: Option<Vec<f64>>,
}

// ============================================================================
// Service
// ============================================================================

pub async fn root() -> Json<&'static str> {
    Json("Model serving API")
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ============================================================================
// Model Handlers
// ============================================================================

/// Train a model of the requested kind
pub async fn train_model(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TrainQuery>,
    Json(body): Json<TrainBody>,
) -> Result<Json<serde_json::Value>> {
    let mut request = TrainRequest::new(query.model_name, body.features, body.labels)
        .with_persist(query.save);
    if let Some(params) = body.params {
        request = request.with_params(params);
    }
    if let Some(name) = query.save_as {
        request = request.with_name(name);
    }

    let outcome = state.registry.train(request).await?;

    Ok(Json(json!({
        "message": format!("{} trained", outcome.name),
        "model_name": outcome.name,
        "kind": outcome.kind,
        "n_samples": outcome.n_samples,
        "n_features": outcome.n_features,
        "saved": outcome.persisted,
        "metrics": outcome.metrics,
    })))
}

/// Predict with a trained model
pub async fn get_prediction(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ModelQuery>,
    Json(body): Json<PredictBody>,
) -> Result<Json<Vec<f64>>> {
    let predictions = state
        .registry
        .predict(&query.model_name, &body.features)
        .await?;
    Ok(Json(predictions))
}

pub async fn get_all_models(State(state): State<Arc<AppState>>) -> Json<Vec<&'static str>> {
    Json(state.registry.list())
}

pub async fn delete_model(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ModelQuery>,
) -> Result<StatusCode> {
    state.registry.delete(&query.model_name).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Object Storage Handlers
// ============================================================================

fn object_storage(state: &AppState) -> Result<&ObjectStorage> {
    state
        .object_storage
        .as_ref()
        .ok_or_else(|| ServerError::NotFound("Object storage is not configured".to_string()))
}

pub async fn create_bucket(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BucketQuery>,
) -> Result<impl IntoResponse> {
    object_storage(&state)?.create_bucket(&query.bucket_name).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": format!("Bucket {} created", query.bucket_name),
        })),
    ))
}

pub async fn list_buckets(State(state): State<Arc<AppState>>) -> Result<Json<Vec<String>>> {
    Ok(Json(object_storage(&state)?.list_buckets().await?))
}

pub async fn list_objects(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
) -> Result<Json<Vec<String>>> {
    Ok(Json(object_storage(&state)?.list_objects(&bucket).await?))
}

pub async fn upload_model(
    State(state): State<Arc<AppState>>,
    Path((bucket, name)): Path<(String, String)>,
    body: Bytes,
) -> Result<StatusCode> {
    validate_name(&name)?;
    if body.is_empty() {
        return Err(ServerError::BadRequest("Model body must not be empty".to_string()));
    }
    info!(bucket = %bucket, model = %name, bytes = body.len(), "Received model upload");
    object_storage(&state)?
        .save_model(&bucket, &name, body.to_vec())
        .await?;
    Ok(StatusCode::CREATED)
}

pub async fn download_model(
    State(state): State<Arc<AppState>>,
    Path((bucket, name)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    validate_name(&name)?;
    let bytes = object_storage(&state)?.load_model(&bucket, &name).await?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes))
}

pub async fn delete_bucket_model(
    State(state): State<Arc<AppState>>,
    Path((bucket, name)): Path<(String, String)>,
) -> Result<StatusCode> {
    validate_name(&name)?;
    object_storage(&state)?.delete_model(&bucket, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn upload_dataset(
    State(state): State<Arc<AppState>>,
    Path((bucket, name)): Path<(String, String)>,
    Json(dataset): Json<Dataset>,
) -> Result<impl IntoResponse> {
    validate_name(&name)?;
    object_storage(&state)?
        .save_dataset(&bucket, &name, &dataset)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "rows": dataset.n_rows(),
            "columns": dataset.n_columns(),
        })),
    ))
}

pub async fn download_dataset(
    State(state): State<Arc<AppState>>,
    Path((bucket, name)): Path<(String, String)>,
) -> Result<Json<Dataset>> {
    validate_name(&name)?;
    Ok(Json(object_storage(&state)?.load_dataset(&bucket, &name).await?))
}
