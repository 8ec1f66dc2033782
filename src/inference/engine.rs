//! Inference engine contract

use crate::preprocess::ImageTensor;
use crate::utils::error::Result;

/// A loaded, immutable classifier network
///
/// `predict` takes a `[1, 128, 128, 3]` tensor and returns one probability per class,
/// in the order the network was trained with. Implementations must be callable from
/// several request threads at once.
pub trait InferenceEngine: Send + Sync {
    /// Short human-readable description (runtime and backend)
    fn name(&self) -> &str;

    /// Run one forward pass
    fn predict(&self, input: &ImageTensor) -> Result<Vec<f32>>;
}
