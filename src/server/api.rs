//! API route definitions

use std::sync::Arc;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use super::{handlers, state::AppState, ServerConfig};

async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": true,
            "message": "Not found. Visit /get_all_models for the supported models or /health to check API status.",
        })),
    )
}

async fn handle_405() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({
            "error": true,
            "message": "Method not allowed. Check the API documentation for supported methods.",
        })),
    )
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let allow_all = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    match origin {
        Some(origin) if !origin.is_empty() && origin != "*" => match origin.parse::<HeaderValue>() {
            Ok(value) => CorsLayer::new()
                .allow_origin(value)
                .allow_methods(Any)
                .allow_headers(Any),
            Err(_) => {
                warn!(origin, "Invalid CORS_ORIGIN, allowing all origins");
                allow_all
            }
        },
        _ => allow_all,
    }
}

/// Create the main application router
pub fn create_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let mut app = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        // Models
        .route("/train_models", post(handlers::train_model))
        .route("/get_prediction", post(handlers::get_prediction))
        .route("/get_all_models", get(handlers::get_all_models))
        .route(
            "/delete_model/",
            post(handlers::delete_model).delete(handlers::delete_model),
        )
        .route(
            "/delete_model",
            post(handlers::delete_model).delete(handlers::delete_model),
        );

    if state.object_storage.is_some() {
        app = app
            .route("/buckets", get(handlers::list_buckets).post(handlers::create_bucket))
            .route("/buckets/:bucket/objects", get(handlers::list_objects))
            .route(
                "/buckets/:bucket/models/:name",
                put(handlers::upload_model)
                    .get(handlers::download_model)
                    .delete(handlers::delete_bucket_model),
            )
            .route(
                "/buckets/:bucket/datasets/:name",
                put(handlers::upload_dataset).get(handlers::download_dataset),
            );
    }

    app.fallback(handle_404)
        .method_not_allowed_fallback(handle_405)
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_upload_size))
        .layer(cors_layer(config.cors_origin.as_deref()))
        .layer(TraceLayer::new_for_http())
}
