//! Caption Tunes
//!
//! A small web backend that describes uploaded images, classifies the emotion
//! of a caption and recommends songs whose genre fits that emotion, using the
//! Spotify Web API as the song catalog.

pub mod catalog;
pub mod config;
pub mod error;
pub mod inference;
pub mod recommend;
pub mod server;
pub mod types;

pub use catalog::{SongCatalog, SpotifyClient, Track};
pub use config::AppConfig;
pub use error::{AppError, Result};
pub use inference::{CaptionService, EmotionClassifier};
pub use recommend::Recommender;
pub use types::EmotionScore;
