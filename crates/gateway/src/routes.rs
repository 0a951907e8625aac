use crate::error::ApiError;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Multipart, State};
use classifier::Prediction;
use serde::Serialize;

#[derive(Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    pub degraded: bool,
}

/// Liveness probe
pub async fn root() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "ok",
        message: "Insect classifier API is running",
    })
}

/// Health probe. `degraded` is true when the model runs on fallback
/// initialization instead of the trained parameters.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model_loaded: state.predictor.is_some(),
        degraded: state
            .predictor
            .as_ref()
            .is_some_and(|p| p.is_degraded()),
    })
}

/// Classify an uploaded image.
///
/// Expects a multipart field named `file` carrying the image bytes with an
/// image content type. The forward pass runs on a blocking worker under a
/// bounded timeout.
pub async fn predict(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Prediction>, ApiError> {
    let predictor = state.predictor.clone().ok_or(ApiError::ModelUnavailable)?;

    let mut payload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidInput(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        // Reject before reading the body; no inference is attempted for
        // non-image uploads.
        match field.content_type() {
            Some(content_type) if content_type.starts_with("image/") => {}
            _ => return Err(ApiError::InvalidInput("File must be an image".to_string())),
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::InvalidInput(format!("failed to read upload: {e}")))?;
        payload = Some(bytes);
        break;
    }
    let payload =
        payload.ok_or_else(|| ApiError::InvalidInput("missing `file` field".to_string()))?;

    let handle = tokio::task::spawn_blocking(move || predictor.predict(&payload));
    let result = tokio::time::timeout(state.predict_timeout, handle)
        .await
        .map_err(|_| {
            tracing::error!("Forward pass exceeded the configured timeout");
            ApiError::Internal("Prediction timed out".to_string())
        })?
        .map_err(|e| {
            tracing::error!(error = %e, "Inference task failed");
            ApiError::Internal("Prediction failed".to_string())
        })?;

    Ok(Json(result?))
}
