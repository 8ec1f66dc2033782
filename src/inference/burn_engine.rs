//! Burn inference engine
//!
//! Loads `AnimalClassifier` weights saved with `CompactRecorder`. The architecture is read
//! from a JSON config next to the weights (`tl_model.mpk` → `tl_model.json`); without one
//! the default architecture sized to the label count is assumed.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use burn::config::Config;
use burn::module::Module;
use burn::record::CompactRecorder;
use burn::tensor::{backend::Backend, Tensor, TensorData};
use tracing::{debug, info};

use crate::backend::{backend_name, default_device, DefaultBackend};
use crate::inference::engine::InferenceEngine;
use crate::model::cnn::{AnimalClassifier, AnimalClassifierConfig};
use crate::preprocess::ImageTensor;
use crate::utils::error::{ClassifierError, Result, ResultExt};
use crate::{IMAGE_SIZE, NUM_CHANNELS};

/// Extension `CompactRecorder` uses for weight files
const RECORD_EXTENSION: &str = "mpk";

/// Extension of the architecture config saved next to the weights
const CONFIG_EXTENSION: &str = "json";

/// Engine running the bundled CNN on a Burn backend
pub struct BurnEngine<B: Backend> {
    // Burn modules are Send but not necessarily Sync
    model: Mutex<AnimalClassifier<B>>,
    device: B::Device,
    name: String,
}

impl BurnEngine<DefaultBackend> {
    /// Load weights for `num_classes` outputs on the default backend
    pub fn load_default(path: &Path, num_classes: usize) -> Result<Self> {
        Self::load(path, num_classes, default_device())
    }
}

impl<B: Backend> BurnEngine<B> {
    /// Load a trained model from disk
    pub fn load(path: &Path, num_classes: usize, device: B::Device) -> Result<Self> {
        let record_path = path.with_extension(RECORD_EXTENSION);
        if !record_path.exists() {
            return Err(ClassifierError::PathNotFound(record_path));
        }

        let config = load_config(path, num_classes)?;
        if config.input_size != IMAGE_SIZE || config.in_channels != NUM_CHANNELS {
            return Err(ClassifierError::ModelLoad {
                path: path.to_path_buf(),
                reason: format!(
                    "model expects {}x{}x{} input, preprocessing produces {}x{}x{}",
                    config.input_size,
                    config.input_size,
                    config.in_channels,
                    IMAGE_SIZE,
                    IMAGE_SIZE,
                    NUM_CHANNELS
                ),
            });
        }
        if config.num_classes != num_classes {
            return Err(ClassifierError::ClassCountMismatch {
                expected: num_classes,
                actual: config.num_classes,
            });
        }

        let model = config.init::<B>(&device)
            .load_file(&record_path, &CompactRecorder::new(), &device)
            .map_err(|e| ClassifierError::ModelLoad {
                path: record_path.clone(),
                reason: format!("{:?}", e),
            })?;

        info!(
            "Loaded Burn model from {:?} ({} classes, base filters {})",
            record_path, config.num_classes, config.base_filters
        );

        Ok(Self::from_model(model, device))
    }

    /// Wrap an already constructed model
    pub fn from_model(model: AnimalClassifier<B>, device: B::Device) -> Self {
        Self {
            model: Mutex::new(model),
            device,
            name: format!("burn ({})", backend_name()),
        }
    }
}

impl<B: Backend> InferenceEngine for BurnEngine<B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, input: &ImageTensor) -> Result<Vec<f32>> {
        let start = Instant::now();

        // NHWC -> NCHW
        let data = TensorData::new(input.as_slice().to_vec(), input.shape());
        let tensor = Tensor::<B, 4>::from_data(data, &self.device).permute([0, 3, 1, 2]);

        let probs = {
            let model = self
                .model
                .lock()
                .map_err(|_| ClassifierError::Inference("model lock poisoned".to_string()))?;
            model.forward_softmax(tensor)
        };

        let scores: Vec<f32> = probs
            .into_data()
            .convert::<f32>()
            .to_vec()
            .context("Failed to extract probabilities")?;

        debug!("Forward pass took {:.2} ms", start.elapsed().as_secs_f64() * 1000.0);
        Ok(scores)
    }
}

/// Architecture config path for a weights path
pub fn config_path(path: &Path) -> PathBuf {
    path.with_extension(CONFIG_EXTENSION)
}

fn load_config(path: &Path, num_classes: usize) -> Result<AnimalClassifierConfig> {
    let config_path = config_path(path);
    if config_path.exists() {
        AnimalClassifierConfig::load(&config_path).map_err(|e| ClassifierError::ModelLoad {
            path: config_path.clone(),
            reason: format!("{:?}", e),
        })
    } else {
        debug!(
            "No architecture config at {:?}, using defaults for {} classes",
            config_path, num_classes
        );
        Ok(AnimalClassifierConfig::new(num_classes))
    }
}

/// Save a model's weights and architecture config side by side
pub fn save_model<B: Backend>(
    model: AnimalClassifier<B>,
    config: &AnimalClassifierConfig,
    path: &Path,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    model
        .save_file(path.with_extension(RECORD_EXTENSION), &CompactRecorder::new())
        .map_err(|e| ClassifierError::ModelLoad {
            path: path.to_path_buf(),
            reason: format!("failed to save weights: {:?}", e),
        })?;
    config.save(config_path(path))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use tempfile::TempDir;

    type TestBackend = NdArray;

    fn small_config(num_classes: usize) -> AnimalClassifierConfig {
        AnimalClassifierConfig::new(num_classes)
            .with_base_filters(4)
            .with_hidden_units(16)
    }

    #[test]
    fn test_predict_returns_one_probability_per_class() {
        let device = Default::default();
        let model = small_config(6).init::<TestBackend>(&device);
        let engine = BurnEngine::from_model(model, device);

        let scores = engine.predict(&ImageTensor::zeros()).unwrap();
        assert_eq!(scores.len(), 6);
        assert!((scores.iter().sum::<f32>() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_predict_is_deterministic() {
        let device = Default::default();
        let model = small_config(3).init::<TestBackend>(&device);
        let engine = BurnEngine::from_model(model, device);

        let input = ImageTensor::from_vec(
            (0..128 * 128 * 3).map(|i| ((i % 255) as f32 / 127.5) - 1.0).collect(),
        )
        .unwrap();
        assert_eq!(engine.predict(&input).unwrap(), engine.predict(&input).unwrap());
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tl_model.mpk");
        let device: <TestBackend as Backend>::Device = Default::default();
        let config = small_config(4);

        let model = config.init::<TestBackend>(&device);
        save_model(model, &config, &path).unwrap();
        assert!(config_path(&path).exists());

        let engine = BurnEngine::<TestBackend>::load(&path, 4, device).unwrap();
        assert_eq!(engine.predict(&ImageTensor::zeros()).unwrap().len(), 4);
    }

    #[test]
    fn test_load_rejects_wrong_class_count() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tl_model.mpk");
        let device: <TestBackend as Backend>::Device = Default::default();
        let config = small_config(4);

        save_model(config.init::<TestBackend>(&device), &config, &path).unwrap();

        let result = BurnEngine::<TestBackend>::load(&path, 7, device);
        assert!(matches!(
            result,
            Err(ClassifierError::ClassCountMismatch {
                expected: 7,
                actual: 4
            })
        ));
    }

    #[test]
    fn test_load_missing_weights() {
        let result = BurnEngine::<TestBackend>::load(
            Path::new("/nonexistent/tl_model.mpk"),
            3,
            Default::default(),
        );
        assert!(matches!(result, Err(ClassifierError::PathNotFound(_))));
    }

    #[test]
    fn test_load_corrupt_weights() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tl_model.mpk");
        std::fs::write(&path, b"definitely not msgpack").unwrap();

        let result = BurnEngine::<TestBackend>::load(&path, 3, Default::default());
        assert!(matches!(result, Err(ClassifierError::ModelLoad { .. })));
    }
}
