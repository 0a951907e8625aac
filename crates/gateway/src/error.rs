use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use classifier::ClassifierError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub detail: String,
}

/// Request-boundary error mapping. Internal failure detail stays in the
/// logs; the response body carries a human-readable summary only.
#[derive(Debug)]
pub enum ApiError {
    InvalidInput(String),
    ModelUnavailable,
    Internal(String),
}

impl From<ClassifierError> for ApiError {
    fn from(err: ClassifierError) -> Self {
        match err {
            ClassifierError::InvalidImage(reason) => {
                ApiError::InvalidInput(format!("File must be a decodable image: {reason}"))
            }
            other => {
                tracing::error!(error = %other, "Prediction failed");
                ApiError::Internal("Prediction failed".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::InvalidInput(detail) => (StatusCode::BAD_REQUEST, detail),
            ApiError::ModelUnavailable => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Model not loaded".to_string(),
            ),
            ApiError::Internal(detail) => (StatusCode::INTERNAL_SERVER_ERROR, detail),
        };
        (status, Json(ErrorDetail { detail })).into_response()
    }
}
