//! Song recommendation policy.
//!
//! Turns classifier output into a handful of catalog tracks:
//! 1. pick the dominant emotion (highest score, first on ties)
//! 2. reject it when its score is under the confidence threshold
//! 3. map it to a genre through [`GENRE_TABLE`]
//! 4. search the catalog, drop denylisted tracks, sample the rest

pub mod genres;

pub use genres::{genres_for, is_denied, primary_genre, GenreMapping, DENYLIST, GENRE_TABLE};

use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::catalog::{CatalogError, SongCatalog, Track};
use crate::config::RecommendConfig;
use crate::types::EmotionScore;

/// Minimum score the dominant emotion needs
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.2;

/// Number of tracks requested from the catalog per recommendation
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Upper bound on the number of tracks returned
pub const DEFAULT_SAMPLE_SIZE: usize = 5;

#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("No emotion scores to choose from.")]
    NoEmotions,

    #[error("Emotion detection confidence too low.")]
    LowConfidence,

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Outcome of a successful recommendation
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    /// Emotion the recommendation is based on
    pub emotion: EmotionScore,
    /// Genre that was searched
    pub genre: &'static str,
    /// Sampled tracks, in sampling order
    pub tracks: Vec<Track>,
}

/// Pick the highest-scoring emotion, keeping the first one on ties.
///
/// Fails with [`RecommendError::LowConfidence`] when the winner scores below
/// `min_confidence` (a NaN score never passes).
pub fn select_dominant(
    scores: &[EmotionScore],
    min_confidence: f32,
) -> Result<&EmotionScore, RecommendError> {
    let mut iter = scores.iter();
    let first = iter.next().ok_or(RecommendError::NoEmotions)?;
    let best = iter.fold(first, |best, s| if s.score > best.score { s } else { best });

    if best.score >= min_confidence {
        Ok(best)
    } else {
        Err(RecommendError::LowConfidence)
    }
}

/// Drop tracks whose name or artist contains a denylist entry
pub fn filter_denied(tracks: Vec<Track>) -> Vec<Track> {
    tracks
        .into_iter()
        .filter(|t| !is_denied(&t.name) && !is_denied(&t.artist))
        .collect()
}

/// Uniform sample of `min(amount, tracks.len())` tracks without replacement.
pub fn sample_tracks<R: Rng + ?Sized>(
    mut tracks: Vec<Track>,
    amount: usize,
    rng: &mut R,
) -> Vec<Track> {
    let amount = amount.min(tracks.len());
    let (picked, _) = tracks.partial_shuffle(rng, amount);
    picked.to_vec()
}

/// Recommendation policy bound to a catalog and a random source
pub struct Recommender {
    catalog: Arc<dyn SongCatalog>,
    settings: RecommendConfig,
    rng: Mutex<StdRng>,
}

impl std::fmt::Debug for Recommender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recommender")
            .field("settings", &self.settings)
            .finish()
    }
}

impl Recommender {
    /// Create a recommender; a configured seed makes sampling reproducible.
    pub fn new(catalog: Arc<dyn SongCatalog>, settings: RecommendConfig) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_rng(catalog, settings, rng)
    }

    /// Create a recommender with an explicit random source
    pub fn with_rng(catalog: Arc<dyn SongCatalog>, settings: RecommendConfig, rng: StdRng) -> Self {
        Self {
            catalog,
            settings,
            rng: Mutex::new(rng),
        }
    }

    /// Run the full policy against classifier output
    pub async fn recommend(
        &self,
        scores: &[EmotionScore],
    ) -> Result<Recommendation, RecommendError> {
        let dominant = select_dominant(scores, self.settings.min_confidence)?.clone();
        let genre = primary_genre(&dominant.label);

        info!(
            emotion = %dominant.label,
            score = dominant.score,
            genre,
            "Dominant emotion selected"
        );

        let found = self
            .catalog
            .search_tracks(genre, self.settings.search_limit)
            .await?;
        let found_count = found.len();
        let allowed = filter_denied(found);

        debug!(
            found = found_count,
            allowed = allowed.len(),
            "Filtered catalog results"
        );

        let tracks = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            sample_tracks(allowed, self.settings.sample_size, &mut *rng)
        };

        Ok(Recommendation {
            emotion: dominant,
            genre,
            tracks,
        })
    }
}
