//! Prediction endpoint

use std::sync::Arc;

use animal_classifier::{ClassifierError, Prediction};
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::state::SharedState;

/// Multipart field carrying the image
const FILE_FIELD: &str = "file";

/// Error body, `{"detail": "..."}`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// A failed request
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl From<ClassifierError> for ApiError {
    fn from(err: ClassifierError) -> Self {
        if err.is_client_error() {
            warn!("Rejected upload: {}", err);
            ApiError::new(StatusCode::BAD_REQUEST, err.to_string())
        } else {
            error!("Classification failed: {}", err);
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

/// POST /predict/ - Classify an uploaded image
pub async fn predict_image(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Prediction>, ApiError> {
    let mut multipart =
        multipart.map_err(|rejection| ApiError::new(rejection.status(), rejection.body_text()))?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), e.body_text()))?
    {
        if field.name() == Some(FILE_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
            upload = Some(bytes);
            break;
        }
    }

    let bytes = upload.ok_or_else(|| {
        ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("missing multipart field '{}'", FILE_FIELD),
        )
    })?;
    debug!("Received upload of {} bytes", bytes.len());

    // Decoding and the forward pass are CPU-bound
    let classifier = Arc::clone(&state.classifier);
    let prediction = tokio::task::spawn_blocking(move || classifier.classify_bytes(&bytes))
        .await
        .map_err(|e| {
            error!("Classification task failed: {}", e);
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "classification task failed")
        })??;

    Ok(Json(prediction))
}
