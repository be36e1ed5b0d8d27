//! Song catalog abstraction.
//!
//! The recommendation policy only needs two things from a streaming service:
//! a genre search and the connected account. [`SpotifyClient`] implements
//! both against the Spotify Web API.

mod spotify;

pub use spotify::SpotifyClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Error type for catalog operations
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Catalog authorization failed: {0}")]
    Unauthorized(String),

    #[error("Catalog API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected catalog response: {0}")]
    InvalidResponse(String),
}

/// A track returned by a catalog search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Track title
    pub name: String,
    /// First credited artist
    pub artist: String,
    /// Catalog URI (e.g. `spotify:track:...`)
    pub uri: String,
}

/// The account the catalog client is connected as
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Display name (may be absent)
    pub display_name: Option<String>,
    /// Account id
    pub id: String,
    /// Account URI
    pub uri: String,
}

/// Read-only access to a streaming catalog.
#[async_trait]
pub trait SongCatalog: Send + Sync {
    /// Search up to `limit` tracks tagged with `genre`
    async fn search_tracks(&self, genre: &str, limit: usize) -> Result<Vec<Track>, CatalogError>;

    /// Details of the connected account
    async fn current_account(&self) -> Result<Account, CatalogError>;
}
