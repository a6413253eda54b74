//! In-memory feedback and dataset sink with optional JSON Lines persistence.
//!
//! A failing disk never fails the request that produced the record, it is
//! only logged. Records are appended while the store lock is held, so the
//! line order in each file matches the returned ids. File IO is blocking;
//! async callers run these methods on the blocking pool.

use crate::core::{LANDMARK_DIMS, NUM_LANDMARKS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const FEEDBACK_FILE: &str = "feedback.jsonl";
const DATASET_FILE: &str = "dataset.jsonl";

/// How many confusion pairs the summary reports.
const TOP_CONFUSIONS: usize = 10;

/// User feedback on a streamed prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub session_id: String,
    pub timestamp: String,
    pub predicted_sign: Option<String>,
    pub correct_sign: String,
    pub confidence: f32,
    pub was_correct: bool,
    #[serde(default)]
    pub user_comment: Option<String>,
}

/// A stored feedback entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    #[serde(flatten)]
    pub feedback: FeedbackRequest,
    pub submitted_at: DateTime<Utc>,
}

/// A labelled landmark sequence offered for retraining.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetEntry {
    pub session_id: String,
    pub correct_sign: String,
    /// `(frames, 21, 3)`
    pub landmarks_sequence: Vec<Vec<Vec<f32>>>,
    pub timestamp: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl DatasetEntry {
    /// Check the `(T, 21, 3)` shape with `T >= 1`.
    pub fn validate(&self) -> Result<(), FeedbackError> {
        if self.landmarks_sequence.is_empty() {
            return Err(FeedbackError::InvalidShape(
                "Expected (T, 21, 3), got an empty sequence".to_string(),
            ));
        }
        for (t, frame) in self.landmarks_sequence.iter().enumerate() {
            if frame.len() != NUM_LANDMARKS || frame.iter().any(|p| p.len() != LANDMARK_DIMS) {
                return Err(FeedbackError::InvalidShape(format!(
                    "Expected (T, 21, 3), frame {t} has {} landmarks",
                    frame.len()
                )));
            }
        }
        Ok(())
    }
}

/// A stored dataset entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetRecord {
    #[serde(flatten)]
    pub entry: DatasetEntry,
    pub stored_at: DateTime<Utc>,
}

/// One `predicted -> correct` confusion and how often it occurred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confusion {
    pub pair: String,
    pub count: usize,
}

/// Accuracy figures over all feedback received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackSummary {
    pub total_feedback: usize,
    pub correct_predictions: usize,
    pub incorrect_predictions: usize,
    pub accuracy: f64,
    pub common_confusions: Vec<Confusion>,
}

/// Dataset contents grouped by sign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetExport {
    pub total_entries: usize,
    pub unique_signs: usize,
    pub signs_distribution: BTreeMap<String, usize>,
    pub entries: Vec<DatasetRecord>,
}

/// Feedback store errors.
#[derive(Debug)]
pub enum FeedbackError {
    InvalidShape(String),
    Io(String),
}

impl std::fmt::Display for FeedbackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedbackError::InvalidShape(e) => write!(f, "Invalid landmarks shape: {e}"),
            FeedbackError::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for FeedbackError {}

/// Collected feedback and dataset samples.
#[derive(Debug, Default)]
pub struct FeedbackStore {
    feedback: Mutex<Vec<FeedbackRecord>>,
    dataset: Mutex<Vec<DatasetRecord>>,
    /// Directory for JSON Lines files
    persist_dir: Option<PathBuf>,
}

impl FeedbackStore {
    /// Create an in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that appends every record under `dir` and reloads
    /// previously written records.
    pub fn with_persistence(dir: PathBuf) -> Self {
        let store = Self {
            persist_dir: Some(dir),
            ..Self::default()
        };

        if let Err(e) = store.load() {
            tracing::warn!(error = %e, "could not load previous feedback");
        }

        store
    }

    /// Record feedback and return its id.
    pub fn submit_feedback(&self, feedback: FeedbackRequest) -> usize {
        let record = FeedbackRecord {
            feedback,
            submitted_at: Utc::now(),
        };
        let mut entries = lock(&self.feedback);
        self.persist(FEEDBACK_FILE, &record);
        entries.push(record);
        entries.len() - 1
    }

    /// Validate and record a dataset sample, returning its id.
    pub fn append_dataset(&self, entry: DatasetEntry) -> Result<usize, FeedbackError> {
        entry.validate()?;
        let record = DatasetRecord {
            entry,
            stored_at: Utc::now(),
        };
        let mut entries = lock(&self.dataset);
        self.persist(DATASET_FILE, &record);
        entries.push(record);
        Ok(entries.len() - 1)
    }

    pub fn feedback_count(&self) -> usize {
        lock(&self.feedback).len()
    }

    pub fn dataset_count(&self) -> usize {
        lock(&self.dataset).len()
    }

    /// Accuracy and the most frequent confusions.
    pub fn summary(&self) -> FeedbackSummary {
        let entries = lock(&self.feedback);
        let total = entries.len();
        let correct = entries.iter().filter(|r| r.feedback.was_correct).count();

        let mut confusions: HashMap<String, usize> = HashMap::new();
        for record in entries.iter() {
            let predicted = record.feedback.predicted_sign.as_deref();
            if predicted != Some(record.feedback.correct_sign.as_str()) {
                let pair = format!(
                    "{} -> {}",
                    predicted.unwrap_or("none"),
                    record.feedback.correct_sign
                );
                *confusions.entry(pair).or_default() += 1;
            }
        }

        let mut common_confusions: Vec<Confusion> = confusions
            .into_iter()
            .map(|(pair, count)| Confusion { pair, count })
            .collect();
        common_confusions.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.pair.cmp(&b.pair)));
        common_confusions.truncate(TOP_CONFUSIONS);

        FeedbackSummary {
            total_feedback: total,
            correct_predictions: correct,
            incorrect_predictions: total - correct,
            accuracy: if total == 0 {
                0.0
            } else {
                correct as f64 / total as f64
            },
            common_confusions,
        }
    }

    /// All dataset samples with a per-sign histogram.
    pub fn export_dataset(&self) -> DatasetExport {
        let entries = lock(&self.dataset).clone();
        let mut signs_distribution = BTreeMap::new();
        for record in &entries {
            *signs_distribution
                .entry(record.entry.correct_sign.clone())
                .or_insert(0) += 1;
        }

        DatasetExport {
            total_entries: entries.len(),
            unique_signs: signs_distribution.len(),
            signs_distribution,
            entries,
        }
    }

    /// Append one JSON line; failures are logged, never returned.
    fn persist<T: Serialize>(&self, file: &str, record: &T) {
        let Some(dir) = &self.persist_dir else {
            return;
        };
        if let Err(e) = append_line(&dir.join(file), record) {
            tracing::warn!(file, error = %e, "failed to persist record");
        }
    }

    fn load(&self) -> Result<(), FeedbackError> {
        if let Some(dir) = &self.persist_dir {
            *lock(&self.feedback) = read_lines(&dir.join(FEEDBACK_FILE))?;
            *lock(&self.dataset) = read_lines(&dir.join(DATASET_FILE))?;
        }
        Ok(())
    }
}

/// Thread-safe shared feedback store.
pub type SharedFeedbackStore = Arc<FeedbackStore>;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn append_line<T: Serialize>(path: &Path, record: &T) -> Result<(), FeedbackError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| FeedbackError::Io(e.to_string()))?;
    }
    let line = serde_json::to_string(record).map_err(|e| FeedbackError::Io(e.to_string()))?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| FeedbackError::Io(e.to_string()))?;
    writeln!(file, "{line}").map_err(|e| FeedbackError::Io(e.to_string()))
}

/// Read every parseable line; corrupt lines are skipped.
fn read_lines<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>, FeedbackError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path).map_err(|e| FeedbackError::Io(e.to_string()))?;
    Ok(content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect())
}
