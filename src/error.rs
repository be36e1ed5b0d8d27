use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::catalog::CatalogError;
use crate::inference::InferenceError;
use crate::recommend::RecommendError;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Recommend(#[from] RecommendError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Every handler failure is reported to the client as a 400.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    /// Returns a machine-readable error code (used in logs only)
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Inference(_) => "INFERENCE_ERROR",
            Self::Catalog(_) => "CATALOG_ERROR",
            Self::Recommend(_) => "RECOMMEND_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Error response body structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        warn!(code = self.code(), error = %message, "Request failed");

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_error_is_bad_request() {
        let errors = [
            AppError::BadRequest("missing image".to_string()),
            AppError::Internal("join failed".to_string()),
            AppError::Recommend(RecommendError::LowConfidence),
            AppError::Inference(InferenceError::Onnx("session lost".to_string())),
            AppError::Catalog(CatalogError::Unauthorized("invalid_client".to_string())),
        ];

        for err in errors {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_low_confidence_message_is_verbatim() {
        let err = AppError::from(RecommendError::LowConfidence);
        assert_eq!(err.to_string(), "Emotion detection confidence too low.");
    }

    #[test]
    fn test_error_body_shape() {
        let body = ErrorResponse {
            error: "boom".to_string(),
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"error":"boom"}"#);
    }
}
