//! ML inference for image captioning and emotion classification.
//!
//! The HTTP layer only sees the [`CaptionService`] and [`EmotionClassifier`]
//! traits. With the `inference` feature they are backed by ONNX Runtime:
//! [`BlipCaptioner`] (BLIP image captioning) and [`BertEmotionClassifier`]
//! (BERT fine-tuned on six emotions). Model files are fetched from the
//! Hugging Face Hub on first use.

mod download;
pub mod preprocess;
mod registry;

#[cfg(feature = "inference")]
mod bert;
#[cfg(feature = "inference")]
mod blip;
#[cfg(feature = "inference")]
mod session;

pub use download::{default_cache_dir, ensure_model, model_dir_name, resolve_model_dir};
pub use registry::{KnownModel, ModelKind, KNOWN_MODELS};

#[cfg(feature = "inference")]
pub use bert::BertEmotionClassifier;
#[cfg(feature = "inference")]
pub use blip::BlipCaptioner;
#[cfg(feature = "inference")]
pub use session::{Device, SessionOptions};

use image::RgbImage;

use crate::types::EmotionScore;

/// Turns an image into a natural-language description
pub trait CaptionService: Send + Sync {
    /// Model identifier, for logs and the health endpoint
    fn model_id(&self) -> &str;

    /// Describe the image in one sentence
    fn caption(&self, image: &RgbImage) -> Result<String, InferenceError>;
}

/// Scores a piece of text against a fixed set of emotion labels
pub trait EmotionClassifier: Send + Sync {
    /// Model identifier, for logs and the health endpoint
    fn model_id(&self) -> &str;

    /// Scores for every label, ranked by descending confidence
    fn classify(&self, text: &str) -> Result<Vec<EmotionScore>, InferenceError>;
}

/// Inference error types
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Model download failed: {0}")]
    DownloadFailed(String),

    #[error(
        "{model_id} does not publish {file}; export the model to ONNX and point `{setting}` at it"
    )]
    NotPublished {
        model_id: String,
        file: String,
        setting: &'static str,
    },

    #[error("Model files missing in {dir}: {files}")]
    MissingFiles { dir: String, files: String },

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("ONNX runtime error: {0}")]
    Onnx(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Numerically stable softmax
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    if logits.is_empty() {
        return Vec::new();
    }

    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp: Vec<f32> = logits.iter().map(|x| (x - max).exp()).collect();
    let sum: f32 = exp.iter().sum();

    exp.into_iter().map(|e| e / sum).collect()
}

/// Index of the largest value (first one on ties)
pub fn argmax(values: &[f32]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if v <= b => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}
