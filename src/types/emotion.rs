use serde::{Deserialize, Serialize};

/// One label of the emotion classifier output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionScore {
    /// Emotion label (e.g. "joy", "sadness")
    pub label: String,
    /// Confidence in [0, 1]
    pub score: f32,
}

impl EmotionScore {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Sort scores by descending confidence; equal scores keep their order.
pub fn rank(mut scores: Vec<EmotionScore>) -> Vec<EmotionScore> {
    scores.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scores
}

/// Keep the `top_k` best entries of an already ranked list; `None` or 0 keeps all.
pub fn keep_top(mut ranked: Vec<EmotionScore>, top_k: Option<usize>) -> Vec<EmotionScore> {
    if let Some(k) = top_k.filter(|&k| k > 0) {
        ranked.truncate(k);
    }
    ranked
}
