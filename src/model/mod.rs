//! Model module for the CNN architecture used by the default inference engine
//!
//! The trained weights are an opaque artifact: a Burn record produced by training
//! elsewhere, plus the JSON form of `AnimalClassifierConfig` describing its shape.

pub mod cnn;

// Re-export main types for convenience
pub use cnn::{AnimalClassifier, AnimalClassifierConfig};
