//! ONNX inference engine (feature `onnx`)
//!
//! Runs an ONNX export of the trained network with tract. Keras exports keep the
//! channels-last layout, so the preprocessed NHWC tensor is fed as is.

use std::path::Path;
use std::time::Instant;

use tract_onnx::prelude::*;
use tracing::{debug, info};

use crate::inference::engine::InferenceEngine;
use crate::inference::scores::softmax;
use crate::preprocess::ImageTensor;
use crate::utils::error::{ClassifierError, Result};

/// Engine running an optimized tract plan
pub struct OnnxEngine {
    plan: TypedRunnableModel<TypedModel>,
    apply_softmax: bool,
    name: String,
}

impl OnnxEngine {
    /// Load and optimize an ONNX model with a fixed `[1, 128, 128, 3]` input
    ///
    /// Set `apply_softmax` when the exported graph ends in logits instead of probabilities.
    pub fn load(path: &Path, apply_softmax: bool) -> Result<Self> {
        if !path.exists() {
            return Err(ClassifierError::PathNotFound(path.to_path_buf()));
        }

        let engine = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| Self::from_model(model, apply_softmax))
            .map_err(|e| ClassifierError::ModelLoad {
                path: path.to_path_buf(),
                reason: format!("{:?}", e),
            })?;

        info!("Loaded ONNX model from {:?}", path);
        Ok(engine)
    }

    /// Pin the input fact, optimize and build a runnable plan
    pub fn from_model(model: InferenceModel, apply_softmax: bool) -> TractResult<Self> {
        let [n, h, w, c] = ImageTensor::SHAPE;
        let plan = model
            .with_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), tvec!(n, h, w, c)))?
            .into_optimized()?
            .into_runnable()?;

        Ok(Self {
            plan,
            apply_softmax,
            name: "onnx (tract)".to_string(),
        })
    }
}

impl InferenceEngine for OnnxEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, input: &ImageTensor) -> Result<Vec<f32>> {
        let start = Instant::now();

        let [n, h, w, c] = input.shape();
        let array = tract_ndarray::Array4::from_shape_vec((n, h, w, c), input.as_slice().to_vec())
            .map_err(|e| inference_error("Failed to build input array", e))?;
        let outputs = self
            .plan
            .run(tvec!(array.into_tensor().into()))
            .map_err(|e| inference_error("ONNX forward pass failed", e))?;

        let output = outputs.first().ok_or_else(|| {
            ClassifierError::Inference("ONNX model produced no outputs".to_string())
        })?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| inference_error("ONNX output is not f32", e))?;
        let raw: Vec<f32> = view.iter().copied().collect();

        debug!("Forward pass took {:.2} ms", start.elapsed().as_secs_f64() * 1000.0);

        if self.apply_softmax {
            Ok(softmax(&raw))
        } else {
            Ok(raw)
        }
    }
}

fn inference_error<E: std::fmt::Debug>(msg: &str, err: E) -> ClassifierError {
    ClassifierError::Inference(format!("{}: {:?}", msg, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tract_onnx::pb;

    fn dim(value: i64) -> pb::tensor_shape_proto::Dimension {
        pb::tensor_shape_proto::Dimension {
            value: Some(pb::tensor_shape_proto::dimension::Value::DimValue(value)),
            ..Default::default()
        }
    }

    fn float_tensor(name: &str, shape: &[i64]) -> pb::ValueInfoProto {
        pb::ValueInfoProto {
            name: name.to_string(),
            r#type: Some(pb::TypeProto {
                value: Some(pb::type_proto::Value::TensorType(pb::type_proto::Tensor {
                    elem_type: pb::tensor_proto::DataType::Float as i32,
                    shape: Some(pb::TensorShapeProto {
                        dim: shape.iter().copied().map(dim).collect(),
                    }),
                })),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Graph averaging each channel over H and W: one score per RGB channel
    fn channel_mean_model() -> InferenceModel {
        let reduce = pb::NodeProto {
            input: vec!["image".to_string()],
            output: vec!["scores".to_string()],
            op_type: "ReduceMean".to_string(),
            attribute: vec![
                pb::AttributeProto {
                    name: "axes".to_string(),
                    r#type: pb::attribute_proto::AttributeType::Ints as i32,
                    ints: vec![1, 2],
                    ..Default::default()
                },
                pb::AttributeProto {
                    name: "keepdims".to_string(),
                    r#type: pb::attribute_proto::AttributeType::Int as i32,
                    i: 0,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let proto = pb::ModelProto {
            ir_version: 7,
            opset_import: vec![pb::OperatorSetIdProto {
                domain: String::new(),
                version: 13,
            }],
            graph: Some(pb::GraphProto {
                name: "channel_mean".to_string(),
                node: vec![reduce],
                input: vec![float_tensor("image", &[1, 128, 128, 3])],
                output: vec![float_tensor("scores", &[1, 3])],
                ..Default::default()
            }),
            ..Default::default()
        };

        tract_onnx::onnx().model_for_proto_model(&proto).unwrap()
    }

    /// Solid red image after MobileNetV2 scaling: R = 1, G = B = -1
    fn red_input() -> ImageTensor {
        let data = (0..128 * 128)
            .flat_map(|_| [1.0f32, -1.0, -1.0])
            .collect();
        ImageTensor::from_vec(data).unwrap()
    }

    #[test]
    fn test_load_missing_path() {
        let result = OnnxEngine::load(Path::new("/nonexistent/tl_model.onnx"), false);
        assert!(matches!(result, Err(ClassifierError::PathNotFound(_))));
    }

    #[test]
    fn test_load_garbage_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tl_model.onnx");
        std::fs::write(&path, b"this is not an onnx model").unwrap();

        let result = OnnxEngine::load(&path, false);
        assert!(matches!(result, Err(ClassifierError::ModelLoad { .. })));
    }

    #[test]
    fn test_raw_outputs_pass_through() {
        let engine = OnnxEngine::from_model(channel_mean_model(), false).unwrap();
        let scores = engine.predict(&red_input()).unwrap();

        assert_eq!(scores.len(), 3);
        assert!((scores[0] - 1.0).abs() < 1e-5);
        assert!((scores[1] + 1.0).abs() < 1e-5);
        assert!((scores[2] + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_softmax_applied_to_logits() {
        let engine = OnnxEngine::from_model(channel_mean_model(), true).unwrap();
        let scores = engine.predict(&red_input()).unwrap();

        assert_eq!(scores.len(), 3);
        let sum: f32 = scores.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(scores.iter().all(|&p| (0.0..=1.0).contains(&p)));
        assert!(scores[0] > scores[1]);
        assert!((scores[1] - scores[2]).abs() < 1e-6);
    }
}
