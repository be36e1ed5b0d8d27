//! HTTP server setup and routing.

mod caption;
mod emotion;
mod extractors;
mod routes;
mod songs;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

use crate::catalog::SongCatalog;
use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::inference::{CaptionService, EmotionClassifier};
use crate::recommend::Recommender;
use crate::types::EmotionScore;

/// Shared application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub captioner: Arc<dyn CaptionService>,
    pub classifier: Arc<dyn EmotionClassifier>,
    pub catalog: Arc<dyn SongCatalog>,
    pub recommender: Arc<Recommender>,
    /// Server start time for uptime calculation
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        captioner: Arc<dyn CaptionService>,
        classifier: Arc<dyn EmotionClassifier>,
        catalog: Arc<dyn SongCatalog>,
    ) -> Self {
        let recommender = Recommender::new(catalog.clone(), config.recommend.clone());
        Self {
            config: Arc::new(config),
            captioner,
            classifier,
            catalog,
            recommender: Arc::new(recommender),
            started_at: Instant::now(),
        }
    }

    /// Replace the recommender, e.g. with one driven by a seeded RNG
    pub fn with_recommender(mut self, recommender: Recommender) -> Self {
        self.recommender = Arc::new(recommender);
        self
    }

    /// Classify text on the blocking pool
    pub async fn classify(&self, text: String) -> Result<Vec<EmotionScore>> {
        let classifier = self.classifier.clone();
        let scores = tokio::task::spawn_blocking(move || classifier.classify(&text))
            .await
            .map_err(|e| AppError::Internal(format!("Join error: {e}")))??;
        Ok(scores)
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Creates the application router with all routes configured
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.server.max_upload_bytes;

    Router::new()
        .route("/health", get(routes::health))
        .route("/generate-caption", post(caption::generate_caption))
        .route("/analyze-emotion", post(emotion::analyze_emotion))
        .route("/recommend-songs", post(songs::recommend_songs))
        .route("/account", get(songs::account))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
