//! Spotify Web API client using the client-credentials flow.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{Account, CatalogError, SongCatalog, Track};
use crate::config::{CatalogConfig, CatalogCredentials};

/// Spotify caps search pages at 50 items
const MAX_SEARCH_LIMIT: usize = 50;

/// Refresh the token this long before Spotify says it expires
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_EXPIRY_MARGIN < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    tracks: Option<TrackPage>,
}

#[derive(Debug, Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<Option<TrackItem>>,
}

#[derive(Debug, Deserialize)]
struct TrackItem {
    name: String,
    uri: String,
    #[serde(default)]
    artists: Vec<ArtistItem>,
}

#[derive(Debug, Deserialize)]
struct ArtistItem {
    name: String,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    #[serde(default)]
    display_name: Option<String>,
    id: String,
    uri: String,
}

impl SearchResponse {
    /// Flatten a search page into tracks; items without artists are skipped.
    fn into_tracks(self) -> Vec<Track> {
        self.tracks
            .map(|page| page.items)
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .filter_map(|item| {
                let artist = item.artists.into_iter().next()?.name;
                Some(Track {
                    name: item.name,
                    artist,
                    uri: item.uri,
                })
            })
            .collect()
    }
}

/// Spotify catalog client with a cached application token
pub struct SpotifyClient {
    client: Client,
    credentials: CatalogCredentials,
    auth_url: String,
    api_url: String,
    token: RwLock<Option<AccessToken>>,
}

impl std::fmt::Debug for SpotifyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifyClient")
            .field("auth_url", &self.auth_url)
            .field("api_url", &self.api_url)
            .field("client_id", &self.credentials.client_id)
            .finish()
    }
}

impl SpotifyClient {
    pub fn new(
        config: &CatalogConfig,
        credentials: CatalogCredentials,
    ) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .user_agent(concat!("caption-tunes/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_s))
            .build()?;

        Ok(Self {
            client,
            credentials,
            auth_url: config.auth_url.trim_end_matches('/').to_string(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        })
    }

    /// Return a valid bearer token, requesting a new one when needed
    async fn access_token(&self) -> Result<String, CatalogError> {
        {
            let token = self.token.read().await;
            if let Some(token) = token.as_ref().filter(|t| t.is_fresh()) {
                return Ok(token.value.clone());
            }
        }

        let mut guard = self.token.write().await;
        // Another request may have refreshed it while we waited
        if let Some(token) = guard.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        let token = self.request_token().await?;
        let value = token.value.clone();
        *guard = Some(token);
        Ok(value)
    }

    async fn request_token(&self) -> Result<AccessToken, CatalogError> {
        let url = format!("{}/api/token", self.auth_url);
        debug!(%url, "Requesting catalog access token");

        let response = self
            .client
            .post(&url)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = match response.json::<TokenErrorResponse>().await {
                Ok(body) => body.error_description.unwrap_or(body.error),
                Err(_) => format!("HTTP {status}"),
            };
            warn!(%status, %message, "Catalog token request rejected");
            return Err(CatalogError::Unauthorized(message));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::InvalidResponse(e.to_string()))?;

        info!(expires_in = body.expires_in, "Catalog access token acquired");

        Ok(AccessToken {
            value: body.access_token,
            expires_at: Instant::now() + Duration::from_secs(body.expires_in),
        })
    }

    /// Turn non-2xx API responses into errors
    async fn check(&self, response: Response) -> Result<Response, CatalogError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = match response.json::<ApiErrorResponse>().await {
            Ok(body) => body.error.message,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string(),
        };

        if status == StatusCode::UNAUTHORIZED {
            // Drop the cached token so the next request starts over
            *self.token.write().await = None;
        }

        Err(CatalogError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl SongCatalog for SpotifyClient {
    async fn search_tracks(&self, genre: &str, limit: usize) -> Result<Vec<Track>, CatalogError> {
        let token = self.access_token().await?;
        let limit = limit.clamp(1, MAX_SEARCH_LIMIT).to_string();
        let query = format!("genre:{genre}");

        let response = self
            .client
            .get(format!("{}/v1/search", self.api_url))
            .bearer_auth(token)
            .query(&[
                ("q", query.as_str()),
                ("type", "track"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;

        let body: SearchResponse = self
            .check(response)
            .await?
            .json()
            .await
            .map_err(|e| CatalogError::InvalidResponse(e.to_string()))?;

        let tracks = body.into_tracks();
        debug!(genre, count = tracks.len(), "Catalog search complete");
        Ok(tracks)
    }

    async fn current_account(&self) -> Result<Account, CatalogError> {
        let token = self.access_token().await?;

        let response = self
            .client
            .get(format!("{}/v1/me", self.api_url))
            .bearer_auth(token)
            .send()
            .await?;

        let user: UserResponse = self
            .check(response)
            .await?
            .json()
            .await
            .map_err(|e| CatalogError::InvalidResponse(e.to_string()))?;

        Ok(Account {
            display_name: user.display_name,
            id: user.id,
            uri: user.uri,
        })
    }
}
