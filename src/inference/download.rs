//! Model downloading from Hugging Face Hub.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::registry::{KnownModel, ModelKind};
use super::InferenceError;

const HF_HUB_URL: &str = "https://huggingface.co";

/// Get the default cache directory for models
pub fn default_cache_dir() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("com", "caption-tunes", "caption-tunes") {
        proj_dirs.cache_dir().join("models")
    } else {
        PathBuf::from("./cache/models")
    }
}

/// Directory name used for a model inside the cache
pub fn model_dir_name(model_id: &str) -> String {
    model_id.replace('/', "__")
}

/// Files from `files` that are not present in `dir`
fn missing_files<'a>(dir: &Path, files: &[&'a str]) -> Vec<&'a str> {
    files
        .iter()
        .copied()
        .filter(|f| !dir.join(f).is_file())
        .collect()
}

/// Resolve the local directory holding a model's files.
///
/// An explicit `model_dir` is used as-is and must already contain every
/// required file; otherwise the model is fetched into the cache.
pub async fn resolve_model_dir(
    model_id: &str,
    kind: ModelKind,
    model_dir: Option<&Path>,
    cache_dir: Option<&Path>,
) -> Result<PathBuf, InferenceError> {
    let Some(dir) = model_dir else {
        return ensure_model(model_id, kind, cache_dir).await;
    };

    let missing = missing_files(dir, KnownModel::files_for(model_id, kind));
    if !missing.is_empty() {
        return Err(InferenceError::MissingFiles {
            dir: dir.display().to_string(),
            files: missing.join(", "),
        });
    }

    debug!(model_id, ?dir, "Using local model directory");
    Ok(dir.to_path_buf())
}

/// Download a model from Hugging Face Hub if not already cached
pub async fn ensure_model(
    model_id: &str,
    kind: ModelKind,
    cache_dir: Option<&Path>,
) -> Result<PathBuf, InferenceError> {
    let cache_dir = cache_dir
        .map(PathBuf::from)
        .unwrap_or_else(default_cache_dir);

    fetch_model(HF_HUB_URL, model_id, kind, &cache_dir).await
}

async fn fetch_model(
    hub_url: &str,
    model_id: &str,
    kind: ModelKind,
    cache_dir: &Path,
) -> Result<PathBuf, InferenceError> {
    // Create model-specific cache directory
    let model_cache = cache_dir.join(model_dir_name(model_id));
    fs::create_dir_all(&model_cache).await?;

    let missing = missing_files(&model_cache, KnownModel::files_for(model_id, kind));
    info!(model_id, %kind, ?model_cache, missing = missing.len(), "Checking model cache");

    if missing.is_empty() {
        return Ok(model_cache);
    }

    if let Some(known) = KnownModel::get(model_id) {
        info!(
            model = known.name,
            estimated_bytes = known.estimated_size_bytes(),
            "Downloading model files"
        );
    }

    let client = Client::builder()
        .user_agent(concat!("caption-tunes/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| InferenceError::DownloadFailed(e.to_string()))?;

    for filename in missing {
        let dest = model_cache.join(filename);
        download_file(&client, hub_url, model_id, kind, filename, &dest).await?;
    }

    Ok(model_cache)
}

/// Download a single file, looking under `onnx/` first and then at the repo root
async fn download_file(
    client: &Client,
    hub_url: &str,
    model_id: &str,
    kind: ModelKind,
    filename: &str,
    dest: &Path,
) -> Result<(), InferenceError> {
    let urls = [
        format!("{hub_url}/{model_id}/resolve/main/onnx/{filename}"),
        format!("{hub_url}/{model_id}/resolve/main/{filename}"),
    ];

    let mut last_status = StatusCode::NOT_FOUND;
    for url in &urls {
        info!(%url, ?dest, "Downloading model file");

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| InferenceError::DownloadFailed(format!("Request failed: {e}")))?;

        if response.status().is_success() {
            return download_response(response, dest).await;
        }

        last_status = response.status();
        debug!(%url, status = %last_status, "Model file not available here");
    }

    // The Hub answers 401 for repos it cannot find without a token
    if matches!(last_status, StatusCode::NOT_FOUND | StatusCode::UNAUTHORIZED) {
        return Err(InferenceError::NotPublished {
            model_id: model_id.to_string(),
            file: filename.to_string(),
            setting: kind.model_dir_setting(),
        });
    }

    Err(InferenceError::DownloadFailed(format!(
        "HTTP {last_status}: {}",
        urls[1]
    )))
}

/// Stream a response into `dest` through a temp file that never outlives a failure
async fn download_response(response: reqwest::Response, dest: &Path) -> Result<(), InferenceError> {
    let temp_path = dest.with_extension("tmp");

    let written = match write_body(response, &temp_path).await {
        Ok(written) => fs::rename(&temp_path, dest)
            .await
            .map(|()| written)
            .map_err(InferenceError::from),
        Err(e) => Err(e),
    };

    let (downloaded, hash) = match written {
        Ok(written) => written,
        Err(e) => {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }
    };

    info!(
        ?dest,
        bytes = downloaded,
        sha256 = %hash,
        "Download complete"
    );

    Ok(())
}

/// Write the body to `path`, returning its size and SHA-256
async fn write_body(
    response: reqwest::Response,
    path: &Path,
) -> Result<(u64, String), InferenceError> {
    let mut file = fs::File::create(path).await?;

    let mut hasher = Sha256::new();
    let mut downloaded: u64 = 0;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk =
            chunk.map_err(|e| InferenceError::DownloadFailed(format!("Download failed: {e}")))?;

        hasher.update(&chunk);
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
    }

    file.flush().await?;

    Ok((downloaded, hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_dir_name() {
        assert_eq!(
            model_dir_name("bhadresh-savani/bert-base-uncased-emotion"),
            "bhadresh-savani__bert-base-uncased-emotion"
        );
    }

    #[test]
    fn test_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tokenizer.json"), b"{}").unwrap();

        let missing = missing_files(dir.path(), &["model.onnx", "tokenizer.json"]);
        assert_eq!(missing, vec!["model.onnx"]);
    }

    #[tokio::test]
    async fn test_resolve_explicit_dir_with_all_files() {
        let dir = tempfile::tempdir().unwrap();
        for file in ModelKind::Emotion.default_files() {
            std::fs::write(dir.path().join(file), b"x").unwrap();
        }

        let resolved = resolve_model_dir("local/model", ModelKind::Emotion, Some(dir.path()), None)
            .await
            .unwrap();
        assert_eq!(resolved, dir.path());
    }

    #[tokio::test]
    async fn test_resolve_explicit_dir_missing_files() {
        let dir = tempfile::tempdir().unwrap();

        let err = resolve_model_dir("local/model", ModelKind::Caption, Some(dir.path()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::MissingFiles { .. }));
        assert!(err.to_string().contains("vision_model.onnx"));
    }

    #[tokio::test]
    async fn test_ensure_model_uses_complete_cache() {
        let cache = tempfile::tempdir().unwrap();
        let model_dir = cache.path().join(model_dir_name("local/model"));
        std::fs::create_dir_all(&model_dir).unwrap();
        for file in ModelKind::Emotion.default_files() {
            std::fs::write(model_dir.join(file), b"x").unwrap();
        }

        // Nothing is missing, so no network access happens
        let resolved = ensure_model("local/model", ModelKind::Emotion, Some(cache.path()))
            .await
            .unwrap();
        assert_eq!(resolved, model_dir);
    }

    /// Serve `router` on an ephemeral local port, returning its base URL
    async fn serve(router: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}")
    }

    fn leftover_temp_files(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "tmp"))
            .collect()
    }

    #[tokio::test]
    async fn test_fetch_model_falls_back_to_repo_root() {
        use axum::routing::get;

        let hub = serve(
            axum::Router::new()
                .route("/local/model/resolve/main/onnx/model.onnx", get(|| async { "onnx-bytes" }))
                .route("/local/model/resolve/main/tokenizer.json", get(|| async { "{}" }))
                .route("/local/model/resolve/main/config.json", get(|| async { "{\"id2label\": {}}" })),
        )
        .await;
        let cache = tempfile::tempdir().unwrap();

        let dir = fetch_model(&hub, "local/model", ModelKind::Emotion, cache.path())
            .await
            .unwrap();

        assert_eq!(std::fs::read(dir.join("model.onnx")).unwrap(), b"onnx-bytes");
        assert_eq!(std::fs::read(dir.join("tokenizer.json")).unwrap(), b"{}");
        assert!(dir.join("config.json").is_file());
        assert!(leftover_temp_files(&dir).is_empty());
    }

    #[tokio::test]
    async fn test_fetch_model_without_onnx_export_names_setting() {
        use axum::routing::get;

        // Tokenizer and config exist, the ONNX graph does not
        let hub = serve(
            axum::Router::new()
                .route("/local/model/resolve/main/tokenizer.json", get(|| async { "{}" }))
                .route("/local/model/resolve/main/config.json", get(|| async { "{}" })),
        )
        .await;
        let cache = tempfile::tempdir().unwrap();

        let err = fetch_model(&hub, "local/model", ModelKind::Emotion, cache.path())
            .await
            .unwrap_err();

        assert!(matches!(
            &err,
            InferenceError::NotPublished { file, .. } if file == "model.onnx"
        ));
        assert!(err.to_string().contains("emotion.model_dir"));
        assert!(err.to_string().contains("TUNES_EMOTION__MODEL_DIR"));
    }

    #[tokio::test]
    async fn test_truncated_download_removes_temp_file() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // Promises more bytes than it sends, then hangs up
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 1000\r\n\r\npartial")
                    .await;
                let _ = socket.shutdown().await;
            }
        });
        let cache = tempfile::tempdir().unwrap();

        let err = fetch_model(
            &format!("http://{addr}"),
            "local/model",
            ModelKind::Emotion,
            cache.path(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, InferenceError::DownloadFailed(_)));
        let model_dir = cache.path().join(model_dir_name("local/model"));
        assert!(leftover_temp_files(&model_dir).is_empty());
        assert!(!model_dir.join("model.onnx").exists());
    }
}
