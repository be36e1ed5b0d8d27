use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;

use crate::recommend::{DEFAULT_MIN_CONFIDENCE, DEFAULT_SAMPLE_SIZE, DEFAULT_SEARCH_LIMIT};

/// Application configuration loaded from environment variables.
///
/// All settings can be configured via environment variables with the `TUNES_` prefix.
/// For example: `TUNES_SERVER__PORT=8080`, `TUNES_RUNTIME__ENABLE_CUDA=true`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// ONNX runtime settings shared by both models
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Image captioning model
    #[serde(default)]
    pub caption: CaptionModelConfig,

    /// Emotion classification model
    #[serde(default)]
    pub emotion: EmotionModelConfig,

    /// Song catalog (Spotify Web API)
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Recommendation policy tunables
    #[serde(default)]
    pub recommend: RecommendConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted request body (image uploads)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024
}

impl ServerConfig {
    /// Returns the socket address for binding the server
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Enable CUDA acceleration
    #[serde(default)]
    pub enable_cuda: bool,

    /// Intra-op thread count for each ONNX session
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,

    /// Override for the model download cache
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            enable_cuda: false,
            intra_threads: default_intra_threads(),
            cache_dir: None,
        }
    }
}

fn default_intra_threads() -> usize {
    4
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptionModelConfig {
    /// Captioning model (Hugging Face model ID)
    #[serde(default = "default_caption_model")]
    pub name: String,

    /// Directory holding already exported model files; skips the download
    #[serde(default)]
    pub model_dir: Option<PathBuf>,

    /// Maximum caption length in tokens, counting the start token
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

impl Default for CaptionModelConfig {
    fn default() -> Self {
        Self {
            name: default_caption_model(),
            model_dir: None,
            max_length: default_max_length(),
        }
    }
}

fn default_caption_model() -> String {
    "Xenova/blip-image-captioning-base".to_string()
}

fn default_max_length() -> usize {
    20
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmotionModelConfig {
    /// Emotion classification model (Hugging Face model ID)
    #[serde(default = "default_emotion_model")]
    pub name: String,

    /// Directory holding already exported model files; skips the download
    #[serde(default)]
    pub model_dir: Option<PathBuf>,

    /// Labels returned by `/analyze-emotion`, best first (0 returns all labels)
    #[serde(default = "default_top_k")]
    pub top_k: Option<usize>,
}

impl Default for EmotionModelConfig {
    fn default() -> Self {
        Self {
            name: default_emotion_model(),
            model_dir: None,
            top_k: default_top_k(),
        }
    }
}

fn default_emotion_model() -> String {
    "bhadresh-savani/bert-base-uncased-emotion".to_string()
}

fn default_top_k() -> Option<usize> {
    Some(1)
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// OAuth client id (falls back to `API_KEY`)
    #[serde(default)]
    pub client_id: Option<String>,

    /// OAuth client secret (falls back to `API_SECRET`)
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Accounts service base URL (token endpoint)
    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    /// Web API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_s")]
    pub timeout_s: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            auth_url: default_auth_url(),
            api_url: default_api_url(),
            timeout_s: default_timeout_s(),
        }
    }
}

fn default_auth_url() -> String {
    "https://accounts.spotify.com".to_string()
}

fn default_api_url() -> String {
    "https://api.spotify.com".to_string()
}

fn default_timeout_s() -> u64 {
    30
}

/// Client credentials for the catalog service
#[derive(Clone)]
pub struct CatalogCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for CatalogCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

impl CatalogConfig {
    /// Resolve the client credentials, falling back to the legacy
    /// `API_KEY` / `API_SECRET` variables.
    pub fn credentials(&self) -> Result<CatalogCredentials, ConfigError> {
        self.credentials_with(|key| std::env::var(key).ok())
    }

    fn credentials_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<CatalogCredentials, ConfigError> {
        let client_id = self
            .client_id
            .clone()
            .or_else(|| lookup("API_KEY"))
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::NotFound("catalog.client_id".to_string()))?;

        let client_secret = self
            .client_secret
            .clone()
            .or_else(|| lookup("API_SECRET"))
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::NotFound("catalog.client_secret".to_string()))?;

        Ok(CatalogCredentials {
            client_id,
            client_secret,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecommendConfig {
    /// Dominant emotion must score at least this much
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,

    /// Number of tracks requested from the catalog
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Number of tracks returned to the client
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Fixed RNG seed for reproducible sampling
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            search_limit: default_search_limit(),
            sample_size: default_sample_size(),
            seed: None,
        }
    }
}

fn default_min_confidence() -> f32 {
    DEFAULT_MIN_CONFIDENCE
}

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

fn default_sample_size() -> usize {
    DEFAULT_SAMPLE_SIZE
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables should be prefixed with `TUNES_` and use
    /// double underscores for nested values:
    /// - `TUNES_CAPTION__NAME` -> caption.name
    /// - `TUNES_RUNTIME__ENABLE_CUDA` -> runtime.enable_cuda
    /// - `TUNES_CATALOG__CLIENT_ID` -> catalog.client_id
    /// - `TUNES_SERVER__PORT` -> server.port
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("TUNES")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.caption.name, "Xenova/blip-image-captioning-base");
        assert_eq!(config.caption.max_length, 20);
        assert_eq!(
            config.emotion.name,
            "bhadresh-savani/bert-base-uncased-emotion"
        );
        assert_eq!(config.emotion.top_k, Some(1));
        assert!(!config.runtime.enable_cuda);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(config.recommend.search_limit, 50);
        assert_eq!(config.recommend.sample_size, 5);
        assert!((config.recommend.min_confidence - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_top_k_override() {
        let config: AppConfig = Config::builder()
            .set_override("emotion.top_k", 3)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.emotion.top_k, Some(3));
        assert_eq!(config.caption.max_length, 20);
    }

    #[test]
    fn test_socket_addr() {
        let server = ServerConfig::default();
        let addr = server.socket_addr().unwrap();
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn test_invalid_socket_addr() {
        let server = ServerConfig {
            host: "not a host".to_string(),
            ..Default::default()
        };
        assert!(server.socket_addr().is_err());
    }

    #[test]
    fn test_credentials_from_config() {
        let catalog = CatalogConfig {
            client_id: Some("id".to_string()),
            client_secret: Some("secret".to_string()),
            ..Default::default()
        };

        let creds = catalog.credentials_with(|_| None).unwrap();
        assert_eq!(creds.client_id, "id");
        assert_eq!(creds.client_secret, "secret");
    }

    #[test]
    fn test_credentials_legacy_fallback() {
        let catalog = CatalogConfig::default();

        let creds = catalog
            .credentials_with(|key| match key {
                "API_KEY" => Some("legacy-id".to_string()),
                "API_SECRET" => Some("legacy-secret".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(creds.client_id, "legacy-id");
        assert_eq!(creds.client_secret, "legacy-secret");
    }

    #[test]
    fn test_missing_credentials() {
        let catalog = CatalogConfig {
            client_id: Some("id".to_string()),
            ..Default::default()
        };

        let err = catalog.credentials_with(|_| None).unwrap_err();
        assert!(err.to_string().contains("client_secret"));
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let creds = CatalogCredentials {
            client_id: "id".to_string(),
            client_secret: "hunter2".to_string(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
