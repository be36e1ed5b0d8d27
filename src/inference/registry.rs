//! Known models registry.
//!
//! Lists the tested captioning and emotion models along with the files each
//! one needs locally. Unknown model ids fall back to the default file layout
//! for their kind.

use serde::Serialize;

/// BLIP vision encoder graph
pub const VISION_MODEL_FILE: &str = "vision_model.onnx";
/// BLIP text decoder graph
pub const TEXT_DECODER_FILE: &str = "text_decoder_model.onnx";
/// Sequence classification graph
pub const CLASSIFIER_MODEL_FILE: &str = "model.onnx";
/// Hugging Face tokenizer definition
pub const TOKENIZER_FILE: &str = "tokenizer.json";
/// Hugging Face model config (label names)
pub const CONFIG_FILE: &str = "config.json";

const CAPTION_FILES: &[&str] = &[VISION_MODEL_FILE, TEXT_DECODER_FILE, TOKENIZER_FILE];
const EMOTION_FILES: &[&str] = &[CLASSIFIER_MODEL_FILE, TOKENIZER_FILE, CONFIG_FILE];

/// What a model is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Caption,
    Emotion,
}

impl ModelKind {
    /// Files every model of this kind needs
    pub fn default_files(self) -> &'static [&'static str] {
        match self {
            Self::Caption => CAPTION_FILES,
            Self::Emotion => EMOTION_FILES,
        }
    }

    /// Setting that points this kind at a local model directory
    pub fn model_dir_setting(self) -> &'static str {
        match self {
            Self::Caption => "caption.model_dir (TUNES_CAPTION__MODEL_DIR)",
            Self::Emotion => "emotion.model_dir (TUNES_EMOTION__MODEL_DIR)",
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Caption => write!(f, "caption"),
            Self::Emotion => write!(f, "emotion"),
        }
    }
}

/// Information about a known/tested model
#[derive(Debug, Clone, Serialize)]
pub struct KnownModel {
    /// Model ID (HuggingFace format: owner/model-name)
    pub model_id: &'static str,
    /// Display name
    pub name: &'static str,
    pub kind: ModelKind,
    /// Estimated total download size in MB
    pub estimated_size_mb: u32,
    /// Required files
    pub files: &'static [&'static str],
}

pub const KNOWN_MODELS: &[KnownModel] = &[
    KnownModel {
        model_id: "Xenova/blip-image-captioning-base",
        name: "BLIP Image Captioning (Base)",
        kind: ModelKind::Caption,
        estimated_size_mb: 990,
        files: CAPTION_FILES,
    },
    KnownModel {
        model_id: "bhadresh-savani/bert-base-uncased-emotion",
        name: "BERT Base Uncased Emotion",
        kind: ModelKind::Emotion,
        estimated_size_mb: 440,
        files: EMOTION_FILES,
    },
];

impl KnownModel {
    /// Get a known model by ID
    pub fn get(model_id: &str) -> Option<&'static KnownModel> {
        KNOWN_MODELS.iter().find(|m| m.model_id == model_id)
    }

    /// Files needed for `model_id`, using the kind's defaults when unknown
    pub fn files_for(model_id: &str, kind: ModelKind) -> &'static [&'static str] {
        Self::get(model_id)
            .filter(|m| m.kind == kind)
            .map(|m| m.files)
            .unwrap_or_else(|| kind.default_files())
    }

    /// Get estimated size in bytes
    pub fn estimated_size_bytes(&self) -> u64 {
        (self.estimated_size_mb as u64) * 1024 * 1024
    }
}
