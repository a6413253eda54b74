//! Per-connection streaming session.
//!
//! A [`SessionController`] owns one window buffer and one latency tracker and
//! turns each raw frame into at most one recognition result:
//!
//! ```text
//! raw bytes ─▶ decode ─▶ extract ─▶ WindowBuffer ─[ready]─▶ snapshot
//!                                                             │
//!          result ◀─ LatencyTracker ◀─ confidence filter ◀─ classify
//! ```
//!
//! Lifecycle: `Idle ─start─▶ Active ─stop─▶ Closed`.

use crate::config::{ConfigError, RecognitionConfig};
use crate::core::latency::{LatencySummary, LatencyTracker};
use crate::core::windowing::WindowBuffer;
use crate::extract::{FeatureExtractor, FrameDecoder, LandmarkCodec};
use crate::inference::{BackendStatus, InferenceError, PredictionCandidate, SharedInferencePort};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Active,
    Closed,
}

/// A filtered, ranked result for one ready window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    /// Top surviving candidate, if any passed the confidence threshold
    pub sign: Option<String>,
    /// Confidence of `sign`, 0.0 when absent
    pub confidence: f32,
    /// Candidates at or above the threshold, highest first
    pub predictions: Vec<PredictionCandidate>,
    pub inference_time_ms: f64,
    pub backend_status: BackendStatus,
    /// Frames seen by the session when this window was captured
    pub frame_count: u64,
    /// Whether the frame that completed the window had a hand in it
    pub landmarks_detected: bool,
    pub timestamp: DateTime<Utc>,
}

/// Session errors surfaced to the caller.
#[derive(Debug)]
pub enum SessionError {
    /// `process_frame` before `start`
    NotStarted,
    /// `start` on a session that is already active
    AlreadyStarted,
    /// Operation after `stop`
    Closed,
    /// The backend failed on this window; the session continues
    Inference(InferenceError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::NotStarted => write!(f, "Session has not been started"),
            SessionError::AlreadyStarted => write!(f, "Session is already active"),
            SessionError::Closed => write!(f, "Session is closed"),
            SessionError::Inference(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Inference(e) => Some(e),
            _ => None,
        }
    }
}

impl From<InferenceError> for SessionError {
    fn from(e: InferenceError) -> Self {
        SessionError::Inference(e)
    }
}

/// Closes a session from outside the task driving it.
///
/// Safe to use while `process_frame` is awaiting inference: the in-flight
/// inference runs to completion and its result is dropped.
#[derive(Debug, Clone)]
pub struct StopHandle {
    closed: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Orchestrates windowing, inference and latency tracking for one connection.
pub struct SessionController {
    id: Option<String>,
    state: SessionState,
    closed: Arc<AtomicBool>,
    config: RecognitionConfig,
    buffer: WindowBuffer,
    latency: LatencyTracker,
    port: SharedInferencePort,
    decoder: Arc<dyn FrameDecoder>,
    extractor: Arc<dyn FeatureExtractor>,
}

impl SessionController {
    /// Create an idle session. Rejects configurations that fail
    /// [`RecognitionConfig::validate`].
    pub fn new(
        config: RecognitionConfig,
        port: SharedInferencePort,
        decoder: Arc<dyn FrameDecoder>,
        extractor: Arc<dyn FeatureExtractor>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let buffer = WindowBuffer::new(config.window_size, config.stride, extractor.feature_dim());
        Ok(Self {
            id: None,
            state: SessionState::Idle,
            closed: Arc::new(AtomicBool::new(false)),
            config,
            buffer,
            latency: LatencyTracker::new(),
            port,
            decoder,
            extractor,
        })
    }

    /// Create an idle session using one codec for decoding and extraction.
    pub fn with_codec(
        config: RecognitionConfig,
        port: SharedInferencePort,
        codec: LandmarkCodec,
    ) -> Result<Self, ConfigError> {
        let codec = Arc::new(codec);
        Self::new(config, port, codec.clone(), codec)
    }

    /// `Idle → Active`. Clears the buffer and the latency tracker.
    pub fn start(&mut self, session_id: impl Into<String>) -> Result<(), SessionError> {
        match self.state() {
            SessionState::Closed => return Err(SessionError::Closed),
            SessionState::Active => return Err(SessionError::AlreadyStarted),
            SessionState::Idle => {}
        }

        let session_id = session_id.into();
        self.buffer.reset();
        self.latency.reset();
        self.state = SessionState::Active;

        tracing::info!(
            session_id = %session_id,
            window_size = self.config.window_size,
            stride = self.config.stride,
            backend = %self.port.status(),
            "started streaming session"
        );
        self.id = Some(session_id);
        Ok(())
    }

    /// Feed one raw frame.
    ///
    /// Returns `Ok(None)` when no window is ready yet, when the frame could not
    /// be decoded, or when the session was stopped while inference was running.
    /// Inference failures are returned as errors but leave the session usable.
    pub async fn process_frame(&mut self, raw: &[u8]) -> Result<Option<RecognitionResult>, SessionError> {
        match self.state() {
            SessionState::Closed => return Err(SessionError::Closed),
            SessionState::Idle => return Err(SessionError::NotStarted),
            SessionState::Active => {}
        }

        let packet = match self.decoder.decode(raw) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::warn!(session_id = self.id(), error = %e, "failed to decode frame");
                return Ok(None);
            }
        };

        let features = self.extractor.extract(&packet);
        let landmarks_detected = features.is_some();
        if !self.buffer.add_frame(features) {
            return Ok(None);
        }

        let window = self.buffer.snapshot();
        let frame_count = self.buffer.frames_seen();
        let top_k = self.config.top_k;
        let port = Arc::clone(&self.port);

        let outcome = tokio::task::spawn_blocking(move || port.classify(&window, top_k))
            .await
            .unwrap_or_else(|e| Err(InferenceError::Backend(format!("inference task failed: {e}"))));

        if self.closed.load(Ordering::SeqCst) {
            tracing::debug!(
                session_id = self.id(),
                frame_count,
                "session stopped during inference, discarding result"
            );
            return Ok(None);
        }

        let inference = outcome.map_err(|e| {
            tracing::error!(session_id = self.id(), frame_count, error = %e, "inference failed");
            SessionError::Inference(e)
        })?;

        self.latency.record(inference.latency_ms);

        let min_confidence = self.config.min_confidence;
        let predictions: Vec<PredictionCandidate> = inference
            .predictions
            .into_iter()
            .filter(|c| c.confidence >= min_confidence)
            .collect();

        let (sign, confidence) = predictions
            .first()
            .map(|top| (Some(top.label.clone()), top.confidence))
            .unwrap_or((None, 0.0));

        tracing::debug!(
            session_id = self.id(),
            frame_count,
            sign = sign.as_deref().unwrap_or("-"),
            confidence,
            latency_ms = inference.latency_ms,
            "window classified"
        );

        Ok(Some(RecognitionResult {
            sign,
            confidence,
            predictions,
            inference_time_ms: inference.latency_ms,
            backend_status: inference.backend_status,
            frame_count,
            landmarks_detected,
            timestamp: Utc::now(),
        }))
    }

    /// Clear the window buffer and its counters (client-requested reset).
    pub fn reset(&mut self) -> Result<(), SessionError> {
        match self.state() {
            SessionState::Closed => Err(SessionError::Closed),
            SessionState::Idle => Err(SessionError::NotStarted),
            SessionState::Active => {
                self.buffer.reset();
                tracing::debug!(session_id = self.id(), "buffer reset");
                Ok(())
            }
        }
    }

    /// `→ Closed`. Idempotent; logs the final latency summary once.
    pub fn stop(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.closed.store(true, Ordering::SeqCst);
        self.state = SessionState::Closed;

        let summary = self.latency.summary();
        tracing::info!(
            session_id = self.id(),
            frames = self.buffer.frames_seen(),
            inferences = summary.count,
            mean_ms = summary.mean_ms,
            p95_ms = summary.p95_ms,
            "stopped streaming session"
        );
    }

    /// Handle for stopping this session from another task.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            closed: Arc::clone(&self.closed),
        }
    }

    pub fn state(&self) -> SessionState {
        if self.closed.load(Ordering::SeqCst) {
            SessionState::Closed
        } else {
            self.state
        }
    }

    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or("")
    }

    /// Latency statistics for this session so far.
    pub fn summary(&self) -> LatencySummary {
        self.latency.summary()
    }

    pub fn frames_seen(&self) -> u64 {
        self.buffer.frames_seen()
    }

    pub fn buffered_frames(&self) -> usize {
        self.buffer.len()
    }

    pub fn backend_status(&self) -> BackendStatus {
        self.port.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::LandmarkPacket;
    use crate::inference::{Classifier, InferencePort};
    use crate::core::{Window, NUM_LANDMARKS};

    fn hand() -> Vec<u8> {
        let landmarks: Vec<[f32; 3]> = (0..NUM_LANDMARKS).map(|i| [i as f32 * 0.01, 0.4, 0.0]).collect();
        LandmarkPacket::encode(&landmarks)
    }

    fn config(window_size: usize, stride: usize, min_confidence: f32) -> RecognitionConfig {
        RecognitionConfig {
            window_size,
            stride,
            min_confidence,
            top_k: 3,
        }
    }

    struct Uniform;

    impl Classifier for Uniform {
        fn name(&self) -> &str {
            "uniform"
        }

        fn forward(&self, _window: &Window) -> Result<Vec<f32>, InferenceError> {
            Ok(vec![0.25; 4])
        }
    }

    struct Broken;

    impl Classifier for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn forward(&self, _window: &Window) -> Result<Vec<f32>, InferenceError> {
            Err(InferenceError::Backend("kaput".to_string()))
        }
    }

    fn session(model: Box<dyn Classifier>, config: RecognitionConfig) -> SessionController {
        let labels = vec!["a".into(), "b".into(), "c".into(), "d".into()];
        let port = Arc::new(InferencePort::with_model(model, labels));
        SessionController::with_codec(config, port, LandmarkCodec::new()).unwrap()
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let port = Arc::new(InferencePort::fallback(vec!["a".into()]).unwrap());
        for (window_size, stride) in [(1, 0), (0, 1), (2, 3)] {
            let result = SessionController::with_codec(
                config(window_size, stride, 0.0),
                Arc::clone(&port),
                LandmarkCodec::new(),
            );
            assert!(matches!(result, Err(ConfigError::Invalid(_))));
        }
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let mut s = session(Box::new(Uniform), config(2, 1, 0.0));
        assert_eq!(s.state(), SessionState::Idle);
        assert!(matches!(s.process_frame(&hand()).await, Err(SessionError::NotStarted)));

        s.start("abc").unwrap();
        assert_eq!(s.state(), SessionState::Active);
        assert!(matches!(s.start("again"), Err(SessionError::AlreadyStarted)));

        s.stop();
        s.stop();
        assert_eq!(s.state(), SessionState::Closed);
        assert!(matches!(s.start("abc"), Err(SessionError::Closed)));
        assert!(matches!(s.reset(), Err(SessionError::Closed)));
    }

    #[tokio::test]
    async fn test_filter_empties_to_absent_sign() {
        let mut s = session(Box::new(Uniform), config(2, 1, 0.5));
        s.start("filter").unwrap();
        assert!(s.process_frame(&hand()).await.unwrap().is_none());

        let result = s.process_frame(&hand()).await.unwrap().unwrap();
        assert!(result.predictions.is_empty());
        assert_eq!(result.sign, None);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.backend_status, BackendStatus::Real);
        assert!(result.inference_time_ms >= 0.0);
        assert_eq!(s.summary().count, 1);
    }

    #[tokio::test]
    async fn test_ties_keep_index_order_after_filter() {
        let mut s = session(Box::new(Uniform), config(1, 1, 0.25));
        s.start("ties").unwrap();
        let result = s.process_frame(&hand()).await.unwrap().unwrap();
        let order: Vec<usize> = result.predictions.iter().map(|p| p.class_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(result.sign.as_deref(), Some("a"));
        assert_eq!(result.confidence, 0.25);
    }

    #[tokio::test]
    async fn test_inference_failure_keeps_session_alive() {
        let mut s = session(Box::new(Broken), config(1, 1, 0.0));
        s.start("broken").unwrap();
        let err = s.process_frame(&hand()).await.unwrap_err();
        assert!(matches!(err, SessionError::Inference(_)));
        assert_eq!(s.state(), SessionState::Active);
        assert_eq!(s.frames_seen(), 1);
        assert_eq!(s.summary().count, 0);
    }

    #[tokio::test]
    async fn test_decode_failure_is_skipped() {
        let mut s = session(Box::new(Uniform), config(2, 1, 0.0));
        s.start("decode").unwrap();
        assert!(s.process_frame(&[1, 2, 3]).await.unwrap().is_none());
        assert_eq!(s.frames_seen(), 0);
    }

    #[tokio::test]
    async fn test_stop_handle_discards_results() {
        let mut s = session(Box::new(Uniform), config(1, 1, 0.0));
        s.start("remote").unwrap();
        let handle = s.stop_handle();
        handle.stop();
        assert!(handle.is_stopped());
        assert_eq!(s.state(), SessionState::Closed);
        assert!(matches!(s.process_frame(&hand()).await, Err(SessionError::Closed)));
        s.stop();
        assert_eq!(s.summary().count, 0);
    }

    #[tokio::test]
    async fn test_reset_restarts_cadence() {
        let mut s = session(Box::new(Uniform), config(2, 2, 0.0));
        s.start("reset").unwrap();
        s.process_frame(&hand()).await.unwrap();
        s.reset().unwrap();
        assert_eq!(s.frames_seen(), 0);
        assert_eq!(s.buffered_frames(), 0);
        assert!(s.process_frame(&hand()).await.unwrap().is_none());
        assert!(s.process_frame(&hand()).await.unwrap().is_some());
    }
}
