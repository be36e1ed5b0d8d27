//! Caption Tunes - Entry Point

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use caption_tunes::{
    config::AppConfig,
    inference::{CaptionService, EmotionClassifier},
    server, SongCatalog, SpotifyClient,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine, the environment may already be set
    let dotenv = dotenvy::dotenv();

    init_logging();

    info!("Starting Caption Tunes");
    if let Err(e) = dotenv {
        if !e.not_found() {
            warn!("Failed to read .env file: {e}");
        }
    }

    let config = AppConfig::load().unwrap_or_else(|e| {
        warn!("Failed to load config from environment: {e}, using defaults");
        AppConfig::default()
    });

    info!(
        caption_model = %config.caption.name,
        emotion_model = %config.emotion.name,
        cuda = config.runtime.enable_cuda,
        "Configuration loaded"
    );

    let credentials = config
        .catalog
        .credentials()
        .context("Spotify client credentials are not configured")?;
    let catalog: Arc<dyn SongCatalog> = Arc::new(
        SpotifyClient::new(&config.catalog, credentials).context("Failed to build Spotify client")?,
    );

    let (captioner, classifier) = load_models(&config).await?;

    let state = server::AppState::new(config.clone(), captioner, classifier, catalog);
    let app = server::create_router(state);

    let addr = config
        .server
        .socket_addr()
        .context("Invalid server host/port")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Fetch (if needed) and load both models. Loading runs on the blocking pool.
#[cfg(feature = "inference")]
async fn load_models(
    config: &AppConfig,
) -> anyhow::Result<(Arc<dyn CaptionService>, Arc<dyn EmotionClassifier>)> {
    use caption_tunes::inference::{
        resolve_model_dir, BertEmotionClassifier, BlipCaptioner, ModelKind, SessionOptions,
    };

    let cache_dir = config.runtime.cache_dir.as_deref();
    let options = SessionOptions::from(&config.runtime);

    let caption_dir = resolve_model_dir(
        &config.caption.name,
        ModelKind::Caption,
        config.caption.model_dir.as_deref(),
        cache_dir,
    )
    .await
    .context("Failed to prepare caption model")?;

    let emotion_dir = resolve_model_dir(
        &config.emotion.name,
        ModelKind::Emotion,
        config.emotion.model_dir.as_deref(),
        cache_dir,
    )
    .await
    .context("Failed to prepare emotion model")?;

    let caption = config.caption.clone();
    let captioner = tokio::task::spawn_blocking(move || {
        BlipCaptioner::load(caption.name, &caption_dir, caption.max_length, &options)
    })
    .await
    .context("Caption model loader panicked")?
    .context("Failed to load caption model")?;

    let emotion = config.emotion.clone();
    let classifier = tokio::task::spawn_blocking(move || {
        BertEmotionClassifier::load(emotion.name, &emotion_dir, &options)
    })
    .await
    .context("Emotion model loader panicked")?
    .context("Failed to load emotion model")?;

    info!(
        caption_device = %captioner.device(),
        emotion_device = %options.device(),
        emotion_labels = ?classifier.labels(),
        "Models loaded"
    );

    let captioner: Arc<dyn CaptionService> = Arc::new(captioner);
    let classifier: Arc<dyn EmotionClassifier> = Arc::new(classifier);
    Ok((captioner, classifier))
}

#[cfg(not(feature = "inference"))]
async fn load_models(
    _config: &AppConfig,
) -> anyhow::Result<(Arc<dyn CaptionService>, Arc<dyn EmotionClassifier>)> {
    anyhow::bail!("Built without the `inference` feature; no models available")
}

/// Initialize the tracing subscriber for logging
fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "caption_tunes=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
