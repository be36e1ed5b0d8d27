//! Emotion classification route handler.

use axum::{extract::State, Json};
use tracing::debug;

use crate::error::Result;
use crate::types::emotion::keep_top;
use crate::types::{CaptionRequest, EmotionScore};

use super::extractors::JsonBody;
use super::AppState;

/// POST /analyze-emotion
///
/// Classify the emotion of a caption. Returns the best `emotion.top_k`
/// labels with their scores, best first (only the top label by default).
pub async fn analyze_emotion(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CaptionRequest>,
) -> Result<Json<Vec<EmotionScore>>> {
    let scores = state.classify(req.caption).await?;

    if let Some(top) = scores.first() {
        debug!(emotion = %top.label, score = top.score, "Emotion classified");
    }

    Ok(Json(keep_top(scores, state.config.emotion.top_k)))
}
