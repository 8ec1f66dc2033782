//! Inference module
//!
//! This module provides:
//! - The `InferenceEngine` contract: one preprocessed image in, one score per class out
//! - A Burn engine for the bundled CNN and an ONNX engine (feature `onnx`)
//! - Score validation, argmax and top-k selection
//! - The `Classifier` context tying the class registry to a loaded engine

pub mod burn_engine;
pub mod classifier;
pub mod engine;
#[cfg(feature = "onnx")]
pub mod onnx_engine;
pub mod scores;

// Re-export main types for convenience
pub use burn_engine::{save_model, BurnEngine};
pub use classifier::{load_engine, Classifier, ClassifierSettings};
pub use engine::InferenceEngine;
#[cfg(feature = "onnx")]
pub use onnx_engine::OnnxEngine;
pub use scores::{softmax, Prediction, Scores};

/// Number of alternatives shown by the CLI
pub const DEFAULT_TOP_K: usize = 5;
