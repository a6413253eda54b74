//! ONNX Runtime backend for exported temporal models.
//!
//! Hand-landmark windows are fed as `[1, frames, 21, 3]`; any other arity is
//! fed as `[1, frames, feature_dim]`. The first output must be a probability
//! vector over classes (batch dimension included).

use super::{Classifier, InferenceError};
use crate::core::{Window, FEATURE_DIM, LANDMARK_DIMS, NUM_LANDMARKS};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::path::Path;
use std::sync::Mutex;

/// ONNX Runtime session wrapper. The session is guarded by a mutex so the
/// classifier can be shared across sessions.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    labels: Vec<String>,
}

impl OnnxClassifier {
    pub fn load(path: &Path, labels: Vec<String>) -> Result<Self, InferenceError> {
        if !path.exists() {
            return Err(InferenceError::ModelLoad(format!(
                "Model file not found: {}",
                path.display()
            )));
        }

        let _ = ort::init().commit();

        let session = Session::builder()
            .map_err(|e| InferenceError::ModelLoad(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| InferenceError::ModelLoad(format!("Failed to set optimization level: {e}")))?
            .commit_from_file(path)
            .map_err(|e| InferenceError::ModelLoad(format!("Failed to load ONNX model: {e}")))?;

        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .unwrap_or_else(|| "input".to_string());
        let output_name = session
            .outputs()
            .first()
            .map(|o| o.name().to_string())
            .unwrap_or_else(|| "output".to_string());

        tracing::info!(
            model = %path.display(),
            input = %input_name,
            output = %output_name,
            "ONNX model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            labels,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        "onnx"
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn forward(&self, window: &Window) -> Result<Vec<f32>, InferenceError> {
        let frames = window.len();
        let dim = window.feature_dim();

        let input = if dim == FEATURE_DIM {
            Value::from_array(
                ndarray::Array4::from_shape_vec(
                    (1, frames, NUM_LANDMARKS, LANDMARK_DIMS),
                    window.to_flat(),
                )
                .map_err(|e| InferenceError::Backend(format!("Failed to shape input: {e}")))?,
            )
        } else {
            Value::from_array(
                ndarray::Array3::from_shape_vec((1, frames, dim), window.to_flat())
                    .map_err(|e| InferenceError::Backend(format!("Failed to shape input: {e}")))?,
            )
        }
        .map_err(|e| InferenceError::Backend(format!("Failed to create input tensor: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| InferenceError::Backend(format!("Failed to lock session: {e}")))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(|e| InferenceError::Backend(format!("ONNX Runtime inference failed: {e}")))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            InferenceError::Backend(format!("Missing '{}' in results", self.output_name))
        })?;
        let (_, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Backend(format!("Failed to extract output: {e}")))?;

        Ok(data.to_vec())
    }
}
