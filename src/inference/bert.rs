//! BERT sequence classifier for text emotion.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;
use serde::Deserialize;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info, warn};

use super::registry::{CLASSIFIER_MODEL_FILE, CONFIG_FILE, TOKENIZER_FILE};
use super::session::{create_session, has_input, output_name, Device, SessionOptions};
use super::{softmax, EmotionClassifier, InferenceError};
use crate::types::emotion::rank;
use crate::types::EmotionScore;

/// BERT's position embedding limit
const MAX_SEQUENCE_LENGTH: usize = 512;

/// Label order of `bert-base-uncased-emotion`, used when `config.json` has none
pub const DEFAULT_EMOTION_LABELS: &[&str] = &["sadness", "joy", "love", "anger", "fear", "surprise"];

#[derive(Debug, Deserialize)]
struct ClassifierConfig {
    #[serde(default)]
    id2label: HashMap<String, String>,
}

/// Label names ordered by class index, read from a Hugging Face `config.json`.
fn labels_from_config(json: &str) -> Result<Vec<String>, InferenceError> {
    let config: ClassifierConfig = serde_json::from_str(json)
        .map_err(|e| InferenceError::InvalidModel(format!("Bad {CONFIG_FILE}: {e}")))?;

    if config.id2label.is_empty() {
        return Ok(DEFAULT_EMOTION_LABELS.iter().map(|l| l.to_string()).collect());
    }

    let mut indexed = config
        .id2label
        .into_iter()
        .map(|(idx, label)| {
            idx.parse::<usize>()
                .map(|i| (i, label))
                .map_err(|_| InferenceError::InvalidModel(format!("Bad label index '{idx}'")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    indexed.sort_by_key(|(i, _)| *i);

    Ok(indexed.into_iter().map(|(_, label)| label).collect())
}

/// Pair probabilities with labels and rank them.
fn score_labels(labels: &[String], probs: &[f32]) -> Result<Vec<EmotionScore>, InferenceError> {
    if labels.len() != probs.len() {
        return Err(InferenceError::InvalidModel(format!(
            "Model produced {} scores for {} labels",
            probs.len(),
            labels.len()
        )));
    }

    Ok(rank(
        labels
            .iter()
            .zip(probs)
            .map(|(label, &p)| EmotionScore::new(label.clone(), p))
            .collect(),
    ))
}

/// Emotion classifier running a fine-tuned BERT through ONNX Runtime
pub struct BertEmotionClassifier {
    model_id: String,
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    labels: Vec<String>,
    logits_output: String,
    takes_token_type_ids: bool,
    device: Device,
}

impl std::fmt::Debug for BertEmotionClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BertEmotionClassifier")
            .field("model_id", &self.model_id)
            .field("labels", &self.labels)
            .field("device", &self.device)
            .finish()
    }
}

impl BertEmotionClassifier {
    /// Load the classifier from a directory holding the model files
    pub fn load(
        model_id: impl Into<String>,
        dir: &Path,
        options: &SessionOptions,
    ) -> Result<Self, InferenceError> {
        let model_id = model_id.into();
        info!(%model_id, device = %options.device(), "Loading emotion classifier");

        let session = create_session(&dir.join(CLASSIFIER_MODEL_FILE), options)?;
        let logits_output = output_name(&session, "logits")?;
        let takes_token_type_ids = has_input(&session, "token_type_ids");

        let mut tokenizer = Tokenizer::from_file(dir.join(TOKENIZER_FILE))
            .map_err(|e| InferenceError::Tokenizer(e.to_string()))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_LENGTH,
                ..Default::default()
            }))
            .map_err(|e| InferenceError::Tokenizer(e.to_string()))?;
        tokenizer.with_padding(None);

        let labels = match std::fs::read_to_string(dir.join(CONFIG_FILE)) {
            Ok(json) => labels_from_config(&json)?,
            Err(e) => {
                warn!("Failed to read {CONFIG_FILE} ({e}), using default emotion labels");
                DEFAULT_EMOTION_LABELS.iter().map(|l| l.to_string()).collect()
            }
        };

        debug!(?labels, takes_token_type_ids, "Emotion classifier loaded");

        Ok(Self {
            model_id,
            session: Mutex::new(session),
            tokenizer,
            labels,
            logits_output,
            takes_token_type_ids,
            device: options.device(),
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    fn run_logits(&self, text: &str) -> Result<Vec<f32>, InferenceError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| InferenceError::Tokenizer(e.to_string()))?;

        let to_i64 = |values: &[u32]| -> Box<[i64]> { values.iter().map(|&v| v as i64).collect() };
        let seq_len = encoding.get_ids().len();

        let input_ids = Tensor::from_array(([1usize, seq_len], to_i64(encoding.get_ids())))
            .map_err(|e| InferenceError::Onnx(e.to_string()))?;
        let attention_mask =
            Tensor::from_array(([1usize, seq_len], to_i64(encoding.get_attention_mask())))
                .map_err(|e| InferenceError::Onnx(e.to_string()))?;

        let mut inputs = ort::inputs![
            "input_ids" => input_ids,
            "attention_mask" => attention_mask
        ];
        if self.takes_token_type_ids {
            let token_type_ids =
                Tensor::from_array(([1usize, seq_len], to_i64(encoding.get_type_ids())))
                    .map_err(|e| InferenceError::Onnx(e.to_string()))?;
            inputs.push(("token_type_ids".into(), token_type_ids.into()));
        }

        // Lock session for inference
        let mut session = self
            .session
            .lock()
            .map_err(|e| InferenceError::Onnx(format!("Session lock error: {e}")))?;

        let outputs = session
            .run(inputs)
            .map_err(|e| InferenceError::Onnx(e.to_string()))?;

        let output = outputs.get(self.logits_output.as_str()).ok_or_else(|| {
            InferenceError::Onnx(format!("Output '{}' not found", self.logits_output))
        })?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Onnx(e.to_string()))?;

        debug!(?shape, seq_len, "Classifier output");

        Ok(data.to_vec())
    }
}

impl EmotionClassifier for BertEmotionClassifier {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn classify(&self, text: &str) -> Result<Vec<EmotionScore>, InferenceError> {
        let logits = self.run_logits(text)?;
        score_labels(&self.labels, &softmax(&logits))
    }
}
