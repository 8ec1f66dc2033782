//! HTTP routes

pub mod health;
pub mod predict;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

/// Build the application router
pub fn router(state: SharedState) -> Router {
    let max_upload_bytes = state.config.max_upload_bytes;

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Classification
        .route("/predict/", post(predict::predict_image))
        .route("/predict", post(predict::predict_image))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        // Add state
        .with_state(state)
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
