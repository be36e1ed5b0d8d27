//! Service-level route handlers.

use axum::{extract::State, Json};

use crate::types::{HealthResponse, HealthStatus};

use super::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Health check endpoint
///
/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: HealthStatus::Healthy,
        version: VERSION.to_string(),
        caption_model: state.captioner.model_id().to_string(),
        emotion_model: state.classifier.model_id().to_string(),
        uptime_s: state.uptime_seconds(),
    })
}
