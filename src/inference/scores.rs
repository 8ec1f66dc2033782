//! Score vectors and predictions

use serde::Serialize;

use crate::utils::error::{ClassifierError, Result};

/// Slack allowed for floating point error around [0, 1]
const PROBABILITY_TOLERANCE: f32 = 1e-5;

/// Numerically stable softmax over a logit vector
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Validated per-class probabilities returned by an engine
#[derive(Debug, Clone, PartialEq)]
pub struct Scores(Vec<f32>);

impl Scores {
    /// Validate raw engine output
    ///
    /// Rejects empty vectors, NaN/infinite values and anything outside [0, 1]; values within
    /// rounding distance of the bounds are clamped.
    pub fn new(values: Vec<f32>) -> Result<Self> {
        if values.is_empty() {
            return Err(ClassifierError::Inference(
                "engine returned an empty score vector".to_string(),
            ));
        }

        let mut values = values;
        for (idx, value) in values.iter_mut().enumerate() {
            if !value.is_finite() {
                return Err(ClassifierError::Inference(format!(
                    "score {} is not finite ({})",
                    idx, value
                )));
            }
            if *value < -PROBABILITY_TOLERANCE || *value > 1.0 + PROBABILITY_TOLERANCE {
                return Err(ClassifierError::Inference(format!(
                    "score {} is not a probability ({})",
                    idx, value
                )));
            }
            *value = value.clamp(0.0, 1.0);
        }

        Ok(Self(values))
    }

    /// Index and value of the highest score; the first index wins ties
    pub fn argmax(&self) -> (usize, f32) {
        let mut best = (0, self.0[0]);
        for (idx, &value) in self.0.iter().enumerate().skip(1) {
            if value > best.1 {
                best = (idx, value);
            }
        }
        best
    }

    /// The `k` highest scores, best first
    pub fn top_k(&self, k: usize) -> Vec<(usize, f32)> {
        let mut indexed: Vec<(usize, f32)> = self.0.iter().copied().enumerate().collect();
        indexed.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        indexed.truncate(k);
        indexed
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

/// Result of classifying one image
///
/// Serializes to the HTTP response body `{"prediction": ..., "confidence": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Index of the predicted class in the registry
    #[serde(skip)]
    pub class_index: usize,

    /// Predicted class label
    pub prediction: String,

    /// Highest score of the model output, in [0, 1]
    pub confidence: f32,
}
