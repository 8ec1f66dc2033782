//! Application state for the classifier server
//!
//! Everything here is built before the listener starts and never mutated afterwards.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use animal_classifier::{Classifier, ClassifierSettings, LabelSource};

/// Default cap on request bodies (16 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to listen on
    pub addr: SocketAddr,
    /// Model artifact (.mpk Burn record or .onnx export)
    pub model_path: PathBuf,
    /// Labels file, one class per line in model output order
    pub labels_path: PathBuf,
    /// Legacy label source: sorted sub-directories of a dataset
    pub dataset_dir: Option<PathBuf>,
    /// Apply softmax to ONNX outputs
    pub onnx_logits: bool,
    /// Maximum accepted request body size
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            model_path: PathBuf::from("model/tl_model.mpk"),
            labels_path: PathBuf::from("model/labels.txt"),
            dataset_dir: None,
            onnx_logits: false,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ServerConfig {
    /// Classifier settings derived from this configuration
    pub fn classifier_settings(&self) -> ClassifierSettings {
        let labels = match &self.dataset_dir {
            Some(dir) => LabelSource::DatasetDir(dir.clone()),
            None => LabelSource::File(self.labels_path.clone()),
        };
        ClassifierSettings::new(self.model_path.clone(), labels).with_onnx_logits(self.onnx_logits)
    }
}

/// Shared application state
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// Loaded labels and model
    pub classifier: Arc<Classifier>,
    /// Server start time
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: ServerConfig, classifier: Classifier) -> Self {
        Self {
            config,
            classifier: Arc::new(classifier),
            started_at: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

pub type SharedState = Arc<AppState>;
