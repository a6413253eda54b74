//! Gesture Stream - near-real-time hand gesture recognition.
//!
//! Clients stream one frame of hand landmarks at a time over a WebSocket.
//! Each connection owns a session that buffers frames into a rolling window
//! and, every `stride` frames once the window is full, classifies it and
//! streams back a ranked, confidence-filtered result.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Gesture Stream                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │  Landmark   │──▶│   Window    │──▶│  Inference  │        │
//! │  │   Codec     │   │   Buffer    │   │    Port     │        │
//! │  └─────────────┘   └─────────────┘   └─────────────┘        │
//! │         ▲                                    │              │
//! │         │                                    ▼              │
//! │  ┌─────────────┐                     ┌─────────────┐        │
//! │  │  WebSocket  │◀────────────────────│   Latency   │        │
//! │  │   Session   │   SessionEvent      │   Tracker   │        │
//! │  └─────────────┘                     └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use gesture_stream::{config::RecognitionConfig, extract::LandmarkCodec};
//! use gesture_stream::{InferencePort, SessionController};
//! use std::sync::Arc;
//!
//! # async fn demo(frame: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! let port = Arc::new(InferencePort::fallback(vec!["hello".into(), "yes".into()])?);
//! let mut session = SessionController::with_codec(RecognitionConfig::default(), port, LandmarkCodec::new())?;
//! session.start("demo")?;
//!
//! if let Some(result) = session.process_frame(frame).await? {
//!     println!("{:?} ({:.2})", result.sign, result.confidence);
//! }
//! session.stop();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod extract;
pub mod feedback;
pub mod inference;
pub mod protocol;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError, RecognitionConfig};
pub use core::{
    FeatureFrame, LatencySummary, LatencyTracker, RecognitionResult, SessionController,
    SessionError, SessionState, StopHandle, Window, WindowBuffer,
};
pub use extract::{DecodeError, FeatureExtractor, FrameDecoder, LandmarkCodec, LandmarkPacket};
pub use feedback::{FeedbackError, FeedbackStore, SharedFeedbackStore};
pub use inference::{
    BackendStatus, Classifier, InferenceError, InferencePort, InferenceResult,
    PredictionCandidate, SharedInferencePort,
};
pub use protocol::{ControlMessage, SessionEvent};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
