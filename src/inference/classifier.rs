//! Classifier context
//!
//! Process-wide, immutable pairing of the class registry and a loaded engine. Built once
//! before serving, then shared by reference with every request.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info};

use crate::inference::burn_engine::BurnEngine;
use crate::inference::engine::InferenceEngine;
use crate::inference::scores::{Prediction, Scores};
use crate::labels::{ClassRegistry, LabelSource};
use crate::preprocess::{preprocess_bytes, ImageTensor};
use crate::utils::error::{ClassifierError, Result};

/// Where to find the model and its labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierSettings {
    /// Model artifact: a Burn record (`.mpk`) or an ONNX export (`.onnx`)
    pub model_path: PathBuf,
    /// Ordered class names
    pub labels: LabelSource,
    /// Apply softmax to ONNX outputs that are logits
    pub onnx_logits: bool,
}

impl ClassifierSettings {
    pub fn new<P: Into<PathBuf>>(model_path: P, labels: LabelSource) -> Self {
        Self {
            model_path: model_path.into(),
            labels,
            onnx_logits: false,
        }
    }

    pub fn with_onnx_logits(mut self, onnx_logits: bool) -> Self {
        self.onnx_logits = onnx_logits;
        self
    }
}

/// Pick an engine from the model file extension
pub fn load_engine(
    path: &Path,
    num_classes: usize,
    onnx_logits: bool,
) -> Result<Box<dyn InferenceEngine>> {
    let is_onnx = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("onnx"))
        .unwrap_or(false);

    if is_onnx {
        load_onnx(path, onnx_logits)
    } else {
        Ok(Box::new(BurnEngine::load_default(path, num_classes)?))
    }
}

#[cfg(feature = "onnx")]
fn load_onnx(path: &Path, onnx_logits: bool) -> Result<Box<dyn InferenceEngine>> {
    Ok(Box::new(crate::inference::onnx_engine::OnnxEngine::load(
        path,
        onnx_logits,
    )?))
}

#[cfg(not(feature = "onnx"))]
fn load_onnx(path: &Path, _onnx_logits: bool) -> Result<Box<dyn InferenceEngine>> {
    Err(ClassifierError::Config(format!(
        "{:?} is an ONNX model but this build lacks the `onnx` feature",
        path
    )))
}

/// Immutable classification context
pub struct Classifier {
    registry: ClassRegistry,
    engine: Box<dyn InferenceEngine>,
}

impl Classifier {
    /// Pair a registry with an engine, checking that their sizes agree
    pub fn new(registry: ClassRegistry, engine: Box<dyn InferenceEngine>) -> Result<Self> {
        let output = engine.predict(&ImageTensor::zeros())?;
        registry.ensure_output_len(output.len())?;

        Ok(Self { registry, engine })
    }

    /// Load labels and model from disk
    ///
    /// Every error returned here satisfies [`ClassifierError::is_startup_failure`].
    pub fn load(settings: &ClassifierSettings) -> Result<Self> {
        let labels_path = settings.labels.path();
        let registry = ClassRegistry::load(&settings.labels).map_err(|e| {
            as_startup_failure(e, |reason| {
                ClassifierError::Labels(format!("{:?}: {}", labels_path, reason))
            })
        })?;
        let engine = load_engine(&settings.model_path, registry.len(), settings.onnx_logits)
            .and_then(|engine| Self::new(registry, engine));
        let classifier = engine.map_err(|e| model_load_failure(e, &settings.model_path))?;

        info!(
            "Classifier ready: {} classes, engine {}",
            classifier.registry.len(),
            classifier.engine.name()
        );
        Ok(classifier)
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Run the engine and validate its output
    pub fn scores(&self, input: &ImageTensor) -> Result<Scores> {
        let raw = self.engine.predict(input)?;
        if raw.len() != self.registry.len() {
            return Err(ClassifierError::Inference(format!(
                "engine returned {} scores for {} classes",
                raw.len(),
                self.registry.len()
            )));
        }
        Scores::new(raw)
    }

    /// Classify a preprocessed tensor
    pub fn classify_tensor(&self, input: &ImageTensor) -> Result<Prediction> {
        let scores = self.scores(input)?;
        self.prediction_for(&scores)
    }

    /// Decode, preprocess and classify raw upload bytes
    pub fn classify_bytes(&self, bytes: &[u8]) -> Result<Prediction> {
        let start = Instant::now();
        let tensor = preprocess_bytes(bytes)?;
        let prediction = self.classify_tensor(&tensor)?;

        debug!(
            "Classified {} bytes as '{}' ({:.3}) in {:.2} ms",
            bytes.len(),
            prediction.prediction,
            prediction.confidence,
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(prediction)
    }

    /// Label the argmax of a score vector
    pub fn prediction_for(&self, scores: &Scores) -> Result<Prediction> {
        let (class_index, confidence) = scores.argmax();
        let label = self.registry.get(class_index).ok_or_else(|| {
            ClassifierError::Inference(format!("no label for class index {}", class_index))
        })?;

        Ok(Prediction {
            class_index,
            prediction: label.to_string(),
            confidence,
        })
    }
}

/// Keep startup variants as they are, wrap anything else with `wrap`
fn as_startup_failure<F>(err: ClassifierError, wrap: F) -> ClassifierError
where
    F: FnOnce(String) -> ClassifierError,
{
    if err.is_startup_failure() {
        err
    } else {
        wrap(err.to_string())
    }
}

fn model_load_failure(err: ClassifierError, path: &Path) -> ClassifierError {
    as_startup_failure(err, |reason| ClassifierError::ModelLoad {
        path: path.to_path_buf(),
        reason,
    })
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("classes", &self.registry.len())
            .field("engine", &self.engine.name())
            .finish()
    }
}
