//! Inference port: classify a window of frames into ranked gesture candidates.
//!
//! Two interchangeable backends sit behind one handle:
//! - a real model (`linear` JSON weights, or ONNX with the `onnx` feature)
//! - a deterministic fallback used when no model is configured or it fails to load
//!
//! The backend is resolved once when the port is built. Callers only see
//! which one is active through [`BackendStatus`] in every result.

mod fallback;
mod linear;
#[cfg(feature = "onnx")]
mod onnx;
pub mod ranking;

pub use fallback::FallbackClassifier;
pub use linear::LinearModel;
#[cfg(feature = "onnx")]
pub use onnx::OnnxClassifier;

use crate::config::InferenceConfig;
use crate::core::latency::{summarize, LatencySummary};
use crate::core::{FeatureFrame, Window};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::sync::Arc;
use std::time::Instant;

/// Median latency budget for one forward pass.
pub const TARGET_LATENCY_MS: f64 = 100.0;

/// Demo vocabulary used when no labels are configured.
pub const DEFAULT_LABELS: [&str; 10] = [
    "hello", "thank_you", "yes", "no", "please", "sorry", "help", "more", "stop", "goodbye",
];

/// Which backend produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStatus {
    Real,
    Fallback,
}

impl std::fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendStatus::Real => write!(f, "real"),
            BackendStatus::Fallback => write!(f, "fallback"),
        }
    }
}

/// One ranked class prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionCandidate {
    pub class_index: usize,
    #[serde(rename = "class_name")]
    pub label: String,
    /// Confidence in `[0, 1]`
    pub confidence: f32,
}

/// Output of one `classify` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    /// Top-k candidates, highest confidence first
    pub predictions: Vec<PredictionCandidate>,
    /// Wall-clock duration of the forward pass
    pub latency_ms: f64,
    pub backend_status: BackendStatus,
}

/// Inference errors.
#[derive(Debug)]
pub enum InferenceError {
    /// Neither a real nor a fallback backend could be built
    Unavailable(String),
    /// A configured model could not be loaded
    ModelLoad(String),
    /// The window does not match the model's input shape
    ShapeMismatch { expected: usize, got: usize },
    /// The backend failed during a forward pass
    Backend(String),
}

impl std::fmt::Display for InferenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InferenceError::Unavailable(e) => write!(f, "Inference unavailable: {e}"),
            InferenceError::ModelLoad(e) => write!(f, "Model load error: {e}"),
            InferenceError::ShapeMismatch { expected, got } => {
                write!(f, "Shape mismatch: expected feature dim {expected}, got {got}")
            }
            InferenceError::Backend(e) => write!(f, "Inference failed: {e}"),
        }
    }
}

impl std::error::Error for InferenceError {}

/// A trained model performing a fixed-shape forward pass.
///
/// Implementations must be callable from several sessions at once.
pub trait Classifier: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Class labels bundled with the model (may be empty).
    fn labels(&self) -> &[String] {
        &[]
    }

    /// Probability-like scores over all classes.
    fn forward(&self, window: &Window) -> Result<Vec<f32>, InferenceError>;
}

/// The backend selected at construction time.
pub enum Backend {
    Real(Box<dyn Classifier>),
    Fallback(FallbackClassifier),
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Real(model) => f.debug_tuple("Real").field(&model.name()).finish(),
            Backend::Fallback(fallback) => f.debug_tuple("Fallback").field(fallback).finish(),
        }
    }
}

/// Shared inference handle passed to every session.
pub type SharedInferencePort = Arc<InferencePort>;

/// Classifies windows with whichever backend was resolved at startup.
#[derive(Debug)]
pub struct InferencePort {
    backend: Backend,
    labels: Vec<String>,
    sum_tolerance: f32,
}

impl InferencePort {
    /// Wrap a real model. Labels bundled with the model win over `labels`.
    pub fn with_model(model: Box<dyn Classifier>, labels: Vec<String>) -> Self {
        let labels = if model.labels().is_empty() {
            labels
        } else {
            model.labels().to_vec()
        };
        Self {
            backend: Backend::Real(model),
            labels,
            sum_tolerance: 0.05,
        }
    }

    /// Build the fallback backend over `labels`.
    pub fn fallback(labels: Vec<String>) -> Result<Self, InferenceError> {
        let classifier = FallbackClassifier::new(labels.len()).ok_or_else(|| {
            InferenceError::Unavailable("fallback backend needs at least one class label".to_string())
        })?;
        Ok(Self {
            backend: Backend::Fallback(classifier),
            labels,
            sum_tolerance: 0.05,
        })
    }

    /// Resolve the backend from configuration.
    ///
    /// A configured model that fails to load is logged and replaced by the
    /// fallback; only an unusable fallback is an error.
    pub fn from_config(config: &InferenceConfig) -> Result<Self, InferenceError> {
        let labels = config.labels.clone();

        let port = match &config.model_path {
            Some(path) => match load_model(path, labels.clone()) {
                Ok(model) => {
                    tracing::info!(backend = model.name(), model = %path.display(), "inference backend ready");
                    Ok(Self::with_model(model, labels))
                }
                Err(e) => {
                    tracing::warn!(error = %e, "falling back to demo inference backend");
                    Self::fallback(labels)
                }
            },
            None => {
                tracing::warn!("no model configured, using demo inference backend");
                Self::fallback(labels)
            }
        }?;

        Ok(port.with_sum_tolerance(config.sum_tolerance))
    }

    /// Tolerance for the "probabilities do not sum to 1" warning.
    pub fn with_sum_tolerance(mut self, tolerance: f32) -> Self {
        self.sum_tolerance = tolerance;
        self
    }

    pub fn status(&self) -> BackendStatus {
        match self.backend {
            Backend::Real(_) => BackendStatus::Real,
            Backend::Fallback(_) => BackendStatus::Fallback,
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Classify one window and return the `top_k` ranked candidates.
    pub fn classify(&self, window: &Window, top_k: usize) -> Result<InferenceResult, InferenceError> {
        let start = Instant::now();
        let probabilities = match &self.backend {
            Backend::Real(model) => model.forward(window)?,
            Backend::Fallback(fallback) => fallback.forward(window),
        };
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        if matches!(self.backend, Backend::Real(_)) {
            let sum: f32 = probabilities.iter().sum();
            if (sum - 1.0).abs() > self.sum_tolerance {
                tracing::warn!(sum, "model output does not look normalized");
            }
        }

        Ok(InferenceResult {
            predictions: ranking::rank_top_k(&probabilities, top_k, &self.labels),
            latency_ms,
            backend_status: self.status(),
        })
    }

    /// Time repeated `classify` calls over a synthetic window.
    pub fn benchmark(
        &self,
        iterations: usize,
        window_size: usize,
        feature_dim: usize,
    ) -> Result<BenchmarkReport, InferenceError> {
        let window = synthetic_window(window_size, feature_dim);

        for _ in 0..iterations.min(10) {
            self.classify(&window, 1)?;
        }

        let mut times = Vec::with_capacity(iterations);
        for _ in 0..iterations {
            let start = Instant::now();
            self.classify(&window, 1)?;
            times.push(start.elapsed().as_secs_f64() * 1000.0);
        }

        let summary = summarize(&times);
        let std_ms = if times.is_empty() {
            0.0
        } else {
            times.iter().population_std_dev()
        };

        Ok(BenchmarkReport {
            iterations,
            backend_status: self.status(),
            summary,
            std_ms,
            target_met: summary.median_ms <= TARGET_LATENCY_MS,
        })
    }
}

/// Result of [`InferencePort::benchmark`].
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub iterations: usize,
    pub backend_status: BackendStatus,
    pub summary: LatencySummary,
    pub std_ms: f64,
    /// Median at or under [`TARGET_LATENCY_MS`]
    pub target_met: bool,
}

/// Pick a real backend by file extension.
fn load_model(path: &std::path::Path, labels: Vec<String>) -> Result<Box<dyn Classifier>, InferenceError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(Box::new(LinearModel::load(path)?)),
        #[cfg(feature = "onnx")]
        Some("onnx") => Ok(Box::new(OnnxClassifier::load(path, labels)?)),
        #[cfg(not(feature = "onnx"))]
        Some("onnx") => {
            let _ = labels;
            Err(InferenceError::ModelLoad(
                "ONNX models need the `onnx` feature".to_string(),
            ))
        }
        _ => Err(InferenceError::ModelLoad(format!(
            "Unsupported model format: {}",
            path.display()
        ))),
    }
}

/// Deterministic non-trivial window for benchmarking.
fn synthetic_window(window_size: usize, feature_dim: usize) -> Window {
    let frames = (0..window_size)
        .map(|t| {
            FeatureFrame::new(
                (0..feature_dim)
                    .map(|i| ((t * feature_dim + i) as f32 * 0.37).sin() * 0.5 + 0.5)
                    .collect(),
            )
        })
        .collect();
    Window::new(frames)
}
