//! # Animal Classifier
//!
//! Single-image classification with a pre-trained convolutional network.
//! The crate turns raw upload bytes into a class label and a confidence score:
//! decode → resize/normalize → one forward pass → argmax.
//!
//! ## Modules
//!
//! - `labels`: ordered class-name registry shipped alongside the model
//! - `preprocess`: image decoding and the fixed 128×128 MobileNetV2-style input scaling
//! - `model`: CNN architecture built with Burn
//! - `inference`: engine contract, Burn/ONNX engines and the `Classifier` context
//! - `utils`: error types and logging setup
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use animal_classifier::{Classifier, ClassifierSettings, LabelSource};
//!
//! let settings = ClassifierSettings::new("model/tl_model.mpk", LabelSource::File("model/labels.txt".into()));
//! let classifier = Classifier::load(&settings)?;
//! let prediction = classifier.classify_bytes(&std::fs::read("cat.jpg")?)?;
//! println!("{} ({:.2})", prediction.prediction, prediction.confidence);
//! ```

pub mod backend;
pub mod inference;
pub mod labels;
pub mod model;
pub mod preprocess;
pub mod utils;

pub use inference::{Classifier, ClassifierSettings, InferenceEngine, Prediction, Scores};
pub use labels::{ClassRegistry, LabelSource};
pub use model::cnn::{AnimalClassifier, AnimalClassifierConfig};
pub use preprocess::ImageTensor;
pub use utils::error::{ClassifierError, Result};

/// Spatial input size of the network (square images)
pub const IMAGE_SIZE: usize = 128;

/// Number of color channels fed to the network
pub const NUM_CHANNELS: usize = 3;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
