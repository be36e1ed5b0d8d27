//! BLIP image captioning through ONNX Runtime.
//!
//! The model is split in two graphs: a ViT vision encoder producing image
//! embeddings, and a BERT-style text decoder cross-attending to them. Captions
//! are generated greedily one token at a time.

use std::path::Path;
use std::sync::Mutex;

use image::RgbImage;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use super::preprocess::{blip_pixel_values, BLIP_IMAGE_SIZE};
use super::registry::{TEXT_DECODER_FILE, TOKENIZER_FILE, VISION_MODEL_FILE};
use super::session::{create_session, has_input, output_name, Device, SessionOptions};
use super::{argmax, CaptionService, InferenceError};

/// `[DEC]` token BLIP starts every caption with
const BOS_TOKEN_ID: i64 = 30522;

/// `[SEP]` token that ends a caption
const SEP_TOKEN_ID: i64 = 102;

/// Greedy decoding loop. The sequence starts at `bos` and is capped at
/// `max_length` tokens including `bos`; `eos` is never part of the output.
fn greedy_decode<F>(
    bos: i64,
    eos: i64,
    max_length: usize,
    mut next: F,
) -> Result<Vec<i64>, InferenceError>
where
    F: FnMut(&[i64]) -> Result<i64, InferenceError>,
{
    let mut tokens = vec![bos];
    while tokens.len() < max_length {
        let token = next(&tokens)?;
        if token == eos {
            break;
        }
        tokens.push(token);
    }

    tokens.remove(0);
    Ok(tokens)
}

/// Image embeddings produced by the vision encoder
struct ImageEmbeddings {
    dims: [usize; 3],
    data: Vec<f32>,
}

/// Image captioner running BLIP through ONNX Runtime
pub struct BlipCaptioner {
    model_id: String,
    vision: Mutex<Session>,
    decoder: Mutex<Session>,
    tokenizer: Tokenizer,
    vision_output: String,
    logits_output: String,
    decoder_takes_encoder_mask: bool,
    max_length: usize,
    device: Device,
}

impl std::fmt::Debug for BlipCaptioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlipCaptioner")
            .field("model_id", &self.model_id)
            .field("max_length", &self.max_length)
            .field("device", &self.device)
            .finish()
    }
}

impl BlipCaptioner {
    /// Load the captioner from a directory holding the model files
    pub fn load(
        model_id: impl Into<String>,
        dir: &Path,
        max_length: usize,
        options: &SessionOptions,
    ) -> Result<Self, InferenceError> {
        let model_id = model_id.into();
        info!(%model_id, device = %options.device(), "Loading caption model");

        let vision = create_session(&dir.join(VISION_MODEL_FILE), options)?;
        let decoder = create_session(&dir.join(TEXT_DECODER_FILE), options)?;

        let vision_output = output_name(&vision, "last_hidden_state")?;
        let logits_output = output_name(&decoder, "logits")?;
        let decoder_takes_encoder_mask = has_input(&decoder, "encoder_attention_mask");

        let tokenizer = Tokenizer::from_file(dir.join(TOKENIZER_FILE))
            .map_err(|e| InferenceError::Tokenizer(e.to_string()))?;

        Ok(Self {
            model_id,
            vision: Mutex::new(vision),
            decoder: Mutex::new(decoder),
            tokenizer,
            vision_output,
            logits_output,
            decoder_takes_encoder_mask,
            max_length: max_length.max(2),
            device: options.device(),
        })
    }

    pub fn device(&self) -> Device {
        self.device
    }

    fn encode_image(&self, image: &RgbImage) -> Result<ImageEmbeddings, InferenceError> {
        let size = BLIP_IMAGE_SIZE as usize;
        let pixels = blip_pixel_values(image);

        let pixel_values = Tensor::from_array(([1usize, 3, size, size], pixels.into_boxed_slice()))
            .map_err(|e| InferenceError::Onnx(e.to_string()))?;

        let mut session = self
            .vision
            .lock()
            .map_err(|e| InferenceError::Onnx(format!("Session lock error: {e}")))?;

        let outputs = session
            .run(ort::inputs!["pixel_values" => pixel_values])
            .map_err(|e| InferenceError::Onnx(e.to_string()))?;

        let output = outputs.get(self.vision_output.as_str()).ok_or_else(|| {
            InferenceError::Onnx(format!("Output '{}' not found", self.vision_output))
        })?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Onnx(e.to_string()))?;

        debug!(?shape, "Vision model output");

        let dims = match shape.iter().map(|&d| d as usize).collect::<Vec<_>>()[..] {
            [batch, tokens, hidden] => [batch, tokens, hidden],
            _ => {
                return Err(InferenceError::InvalidModel(format!(
                    "Expected 3-D image embeddings, got shape {shape:?}"
                )))
            }
        };

        Ok(ImageEmbeddings {
            dims,
            data: data.to_vec(),
        })
    }

    /// Run the decoder on the tokens so far and pick the next one
    fn next_token(
        &self,
        session: &mut Session,
        tokens: &[i64],
        embeddings: &ImageEmbeddings,
    ) -> Result<i64, InferenceError> {
        let seq_len = tokens.len();

        let input_ids = Tensor::from_array(([1usize, seq_len], tokens.to_vec().into_boxed_slice()))
            .map_err(|e| InferenceError::Onnx(e.to_string()))?;
        let attention_mask =
            Tensor::from_array(([1usize, seq_len], vec![1i64; seq_len].into_boxed_slice()))
                .map_err(|e| InferenceError::Onnx(e.to_string()))?;
        let encoder_hidden_states =
            Tensor::from_array((embeddings.dims, embeddings.data.clone().into_boxed_slice()))
                .map_err(|e| InferenceError::Onnx(e.to_string()))?;

        let mut inputs = ort::inputs![
            "input_ids" => input_ids,
            "attention_mask" => attention_mask,
            "encoder_hidden_states" => encoder_hidden_states
        ];
        if self.decoder_takes_encoder_mask {
            let [batch, image_tokens, _] = embeddings.dims;
            let encoder_attention_mask = Tensor::from_array((
                [batch, image_tokens],
                vec![1i64; batch * image_tokens].into_boxed_slice(),
            ))
            .map_err(|e| InferenceError::Onnx(e.to_string()))?;
            inputs.push(("encoder_attention_mask".into(), encoder_attention_mask.into()));
        }

        let outputs = session
            .run(inputs)
            .map_err(|e| InferenceError::Onnx(e.to_string()))?;

        let output = outputs.get(self.logits_output.as_str()).ok_or_else(|| {
            InferenceError::Onnx(format!("Output '{}' not found", self.logits_output))
        })?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Onnx(e.to_string()))?;

        // logits: [1, seq_len, vocab]
        let vocab = shape
            .last()
            .map(|&v| v as usize)
            .filter(|&v| v > 0 && data.len() >= v)
            .ok_or_else(|| {
                InferenceError::InvalidModel(format!("Unexpected logits shape {shape:?}"))
            })?;
        let last = &data[data.len() - vocab..];

        argmax(last)
            .map(|i| i as i64)
            .ok_or_else(|| InferenceError::InvalidModel("Empty logits".to_string()))
    }

    fn generate(&self, embeddings: &ImageEmbeddings) -> Result<Vec<u32>, InferenceError> {
        let mut session = self
            .decoder
            .lock()
            .map_err(|e| InferenceError::Onnx(format!("Session lock error: {e}")))?;

        let tokens = greedy_decode(BOS_TOKEN_ID, SEP_TOKEN_ID, self.max_length, |tokens| {
            self.next_token(&mut session, tokens, embeddings)
        })?;

        Ok(tokens.into_iter().map(|t| t as u32).collect())
    }
}

impl CaptionService for BlipCaptioner {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn caption(&self, image: &RgbImage) -> Result<String, InferenceError> {
        let embeddings = self.encode_image(image)?;
        let ids = self.generate(&embeddings)?;

        let caption = self
            .tokenizer
            .decode(&ids, true)
            .map_err(|e| InferenceError::Tokenizer(e.to_string()))?;

        debug!(tokens = ids.len(), "Caption generated");
        Ok(caption.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greedy_decode_counts_start_token() {
        let mut steps = 0;
        let tokens = greedy_decode(BOS_TOKEN_ID, SEP_TOKEN_ID, 20, |seq| {
            steps += 1;
            Ok(1000 + seq.len() as i64)
        })
        .unwrap();

        assert_eq!(tokens.len(), 19);
        assert_eq!(steps, 19);
        assert_eq!(tokens[0], 1001);
        assert!(!tokens.contains(&BOS_TOKEN_ID));
    }

    #[test]
    fn test_greedy_decode_stops_at_sep() {
        let script = [2023, 2003, SEP_TOKEN_ID, 9999];
        let tokens = greedy_decode(BOS_TOKEN_ID, SEP_TOKEN_ID, 20, |seq| {
            assert_eq!(seq[0], BOS_TOKEN_ID);
            Ok(script[seq.len() - 1])
        })
        .unwrap();

        assert_eq!(tokens, vec![2023, 2003]);
    }

    #[test]
    fn test_greedy_decode_propagates_errors() {
        let err = greedy_decode(BOS_TOKEN_ID, SEP_TOKEN_ID, 20, |_| {
            Err(InferenceError::Onnx("boom".to_string()))
        })
        .unwrap_err();

        assert!(matches!(err, InferenceError::Onnx(_)));
    }
}
