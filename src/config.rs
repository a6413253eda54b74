//! Configuration for the gesture streaming service.

use crate::inference::DEFAULT_LABELS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Windowing and result filtering
    pub recognition: RecognitionConfig,

    /// Model selection
    pub inference: InferenceConfig,

    /// HTTP / WebSocket listener
    pub server: ServerSettings,

    /// Path for feedback and dataset files
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gesture-stream");

        Self {
            recognition: RecognitionConfig::default(),
            inference: InferenceConfig::default(),
            server: ServerSettings::default(),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when absent.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Write configuration as pretty JSON to `path`, creating parent directories.
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gesture-stream")
            .join("config.json")
    }

    /// Ensure the data directory exists.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.recognition.validate()
    }
}

/// Recognition options negotiated per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Frames per inference window
    pub window_size: usize,
    /// Frames between inference triggers (1..=window_size)
    pub stride: usize,
    /// Candidates below this confidence are dropped
    pub min_confidence: f32,
    /// Number of ranked candidates requested per window
    pub top_k: usize,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            window_size: 30,
            stride: 10,
            min_confidence: 0.3,
            top_k: 5,
        }
    }
}

impl RecognitionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::Invalid("window_size must be at least 1".into()));
        }
        if self.stride == 0 || self.stride > self.window_size {
            return Err(ConfigError::Invalid(format!(
                "stride must be between 1 and window_size ({}), got {}",
                self.window_size, self.stride
            )));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::Invalid(format!(
                "min_confidence must be within [0, 1], got {}",
                self.min_confidence
            )));
        }
        if self.top_k == 0 {
            return Err(ConfigError::Invalid("top_k must be at least 1".into()));
        }
        Ok(())
    }
}

/// Inference backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Trained model (`.json` linear weights or `.onnx`); `None` = demo backend
    pub model_path: Option<PathBuf>,
    /// Class labels by index
    pub labels: Vec<String>,
    /// Allowed deviation of the model output sum from 1.0 before warning
    pub sum_tolerance: f32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            labels: DEFAULT_LABELS.iter().map(|s| s.to_string()).collect(),
            sum_tolerance: 0.05,
        }
    }
}

/// Listener and connection-handler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Emit a stats event every N frames (0 disables)
    pub heartbeat_every: u64,
    /// Frames larger than this are rejected
    pub max_frame_bytes: usize,
    /// Re-centre landmarks on the wrist before windowing
    pub wrist_relative: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            heartbeat_every: 100,
            max_frame_bytes: 5 * 1024 * 1024,
            wrist_relative: false,
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.recognition.window_size, 30);
        assert_eq!(config.recognition.stride, 10);
        assert_eq!(config.recognition.min_confidence, 0.3);
        assert_eq!(config.recognition.top_k, 5);
        assert!(config.inference.model_path.is_none());
        assert_eq!(config.server.heartbeat_every, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_stride_bounds() {
        let mut recognition = RecognitionConfig {
            stride: 31,
            ..Default::default()
        };
        assert!(matches!(recognition.validate(), Err(ConfigError::Invalid(_))));

        recognition.stride = 0;
        assert!(recognition.validate().is_err());

        recognition.stride = 30;
        assert!(recognition.validate().is_ok());
    }

    #[test]
    fn test_confidence_and_top_k_bounds() {
        let recognition = RecognitionConfig {
            min_confidence: 1.5,
            ..Default::default()
        };
        assert!(recognition.validate().is_err());

        let recognition = RecognitionConfig {
            top_k: 0,
            ..Default::default()
        };
        assert!(recognition.validate().is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"recognition": {"window_size": 4, "stride": 2}}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.recognition.window_size, 4);
        assert_eq!(config.recognition.stride, 2);
        assert_eq!(config.recognition.top_k, 5);
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"recognition": {"window_size": 4, "stride": 8}}"#).unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_saved_file_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.recognition.window_size = 12;
        config.recognition.stride = 3;
        config.server.port = 9100;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.recognition, config.recognition);
        assert_eq!(loaded.server.port, 9100);
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = Config::load_from(std::path::Path::new("/nonexistent/config.json")).unwrap();
        assert_eq!(config.recognition, RecognitionConfig::default());
    }
}
