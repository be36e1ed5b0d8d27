//! Song recommendation and catalog account handlers.

use axum::{extract::State, Json};
use tracing::info;

use crate::error::Result;
use crate::types::{AccountResponse, CaptionRequest, SongsResponse};

use super::extractors::JsonBody;
use super::AppState;

/// POST /recommend-songs
///
/// Classify the caption, map its dominant emotion to a genre and return a
/// small random sample of matching tracks.
pub async fn recommend_songs(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CaptionRequest>,
) -> Result<Json<SongsResponse>> {
    let scores = state.classify(req.caption).await?;
    let recommendation = state.recommender.recommend(&scores).await?;

    info!(
        emotion = %recommendation.emotion.label,
        genre = recommendation.genre,
        songs = recommendation.tracks.len(),
        "Songs recommended"
    );

    Ok(Json(SongsResponse {
        songs: recommendation.tracks,
    }))
}

/// GET /account
///
/// Profile of the account the catalog client is authenticated as.
pub async fn account(State(state): State<AppState>) -> Result<Json<AccountResponse>> {
    let account = state.catalog.current_account().await?;
    Ok(Json(account.into()))
}
