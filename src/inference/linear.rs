//! Linear softmax classifier loaded from a JSON weights file.
//!
//! The window is pooled over time (per-feature mean and standard deviation),
//! giving a `2 × feature_dim` vector that is fed through one dense layer.
//!
//! ```json
//! {
//!   "labels": ["hello", "thanks"],
//!   "feature_dim": 63,
//!   "weights": [[...126 values...], [...126 values...]],
//!   "bias": [0.0, 0.0]
//! }
//! ```

use super::{Classifier, InferenceError};
use crate::core::Window;
use ndarray::{concatenate, Array1, Array2, Axis};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct LinearModelFile {
    #[serde(default)]
    labels: Vec<String>,
    feature_dim: usize,
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
}

/// Dense layer over temporally pooled landmark features.
#[derive(Debug, Clone)]
pub struct LinearModel {
    feature_dim: usize,
    /// `[num_classes × 2·feature_dim]`
    weights: Array2<f32>,
    bias: Array1<f32>,
    labels: Vec<String>,
}

impl LinearModel {
    /// Load a model from a JSON weights file.
    pub fn load(path: &Path) -> Result<Self, InferenceError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            InferenceError::ModelLoad(format!("Failed to read {}: {e}", path.display()))
        })?;
        let file: LinearModelFile = serde_json::from_str(&content).map_err(|e| {
            InferenceError::ModelLoad(format!("Invalid model file {}: {e}", path.display()))
        })?;
        Self::from_parts(file.feature_dim, file.weights, file.bias, file.labels)
    }

    /// Build a model from raw weight rows (one row per class).
    pub fn from_parts(
        feature_dim: usize,
        weights: Vec<Vec<f32>>,
        bias: Vec<f32>,
        labels: Vec<String>,
    ) -> Result<Self, InferenceError> {
        let num_classes = weights.len();
        let input_dim = feature_dim * 2;

        if num_classes == 0 || feature_dim == 0 {
            return Err(InferenceError::ModelLoad(
                "Model must have at least one class and one feature".to_string(),
            ));
        }
        if let Some(row) = weights.iter().position(|r| r.len() != input_dim) {
            return Err(InferenceError::ModelLoad(format!(
                "Weight row {row} has {} values, expected {input_dim}",
                weights[row].len()
            )));
        }
        if bias.len() != num_classes {
            return Err(InferenceError::ModelLoad(format!(
                "Bias has {} values, expected {num_classes}",
                bias.len()
            )));
        }

        let flat: Vec<f32> = weights.into_iter().flatten().collect();
        let weights = Array2::from_shape_vec((num_classes, input_dim), flat)
            .map_err(|e| InferenceError::ModelLoad(e.to_string()))?;

        Ok(Self {
            feature_dim,
            weights,
            bias: Array1::from(bias),
            labels,
        })
    }

    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    pub fn num_classes(&self) -> usize {
        self.weights.nrows()
    }

    /// Per-feature mean followed by per-feature standard deviation.
    fn pool(&self, window: &Window) -> Result<Array1<f32>, InferenceError> {
        if window.is_empty() || window.feature_dim() != self.feature_dim {
            return Err(InferenceError::ShapeMismatch {
                expected: self.feature_dim,
                got: window.feature_dim(),
            });
        }
        let frames = Array2::from_shape_vec((window.len(), self.feature_dim), window.to_flat())
            .map_err(|e| InferenceError::Backend(e.to_string()))?;

        let mean = frames
            .mean_axis(Axis(0))
            .ok_or_else(|| InferenceError::Backend("empty window".to_string()))?;
        let std = frames.std_axis(Axis(0), 0.0);

        concatenate(Axis(0), &[mean.view(), std.view()])
            .map_err(|e| InferenceError::Backend(e.to_string()))
    }
}

impl Classifier for LinearModel {
    fn name(&self) -> &str {
        "linear"
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn forward(&self, window: &Window) -> Result<Vec<f32>, InferenceError> {
        let pooled = self.pool(window)?;
        let logits = (self.weights.dot(&pooled) + &self.bias).to_vec();
        Ok(super::ranking::softmax(&logits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FeatureFrame;
    use std::io::Write;

    fn window(values: &[[f32; 2]]) -> Window {
        Window::new(values.iter().map(|v| FeatureFrame::new(v.to_vec())).collect())
    }

    #[test]
    fn test_forward_prefers_matching_class() {
        // class 0 fires on a high first feature, class 1 on a high second feature
        let model = LinearModel::from_parts(
            2,
            vec![vec![4.0, 0.0, 0.0, 0.0], vec![0.0, 4.0, 0.0, 0.0]],
            vec![0.0, 0.0],
            vec![],
        )
        .unwrap();

        let probs = model.forward(&window(&[[1.0, 0.0], [1.0, 0.0]])).unwrap();
        assert!(probs[0] > probs[1]);
        let probs = model.forward(&window(&[[0.0, 1.0], [0.0, 1.0]])).unwrap();
        assert!(probs[1] > probs[0]);
    }

    #[test]
    fn test_pooling_uses_std() {
        let model = LinearModel::from_parts(
            1,
            vec![vec![0.0, 10.0], vec![0.0, 0.0]],
            vec![0.0, 0.0],
            vec![],
        )
        .unwrap();
        assert!(model.forward(&window(&[[1.0, 0.0]])).is_err());

        let moving = Window::new(vec![FeatureFrame::new(vec![0.0]), FeatureFrame::new(vec![2.0])]);
        let probs = model.forward(&moving).unwrap();
        assert!(probs[0] > probs[1]);
    }

    #[test]
    fn test_rejects_bad_shapes() {
        assert!(LinearModel::from_parts(2, vec![vec![0.0; 3]], vec![0.0], vec![]).is_err());
        assert!(LinearModel::from_parts(2, vec![vec![0.0; 4]], vec![], vec![]).is_err());
        assert!(LinearModel::from_parts(2, vec![], vec![], vec![]).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"labels": ["left", "right"], "feature_dim": 1,
                "weights": [[1.0, 0.0], [-1.0, 0.0]], "bias": [0.0, 0.0]}}"#
        )
        .unwrap();

        let model = LinearModel::load(file.path()).unwrap();
        assert_eq!(model.num_classes(), 2);
        assert_eq!(model.labels(), &["left".to_string(), "right".to_string()]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = LinearModel::load(Path::new("/nonexistent/model.json")).unwrap_err();
        assert!(matches!(err, InferenceError::ModelLoad(_)));
    }
}
