//! Core streaming pipeline.
//!
//! This module contains:
//! - Feature frames and frozen windows
//! - The rolling window buffer that decides when to run inference
//! - Per-session latency statistics
//! - The session controller tying them to the inference port

pub mod frame;
pub mod latency;
pub mod session;
pub mod windowing;

// Re-export commonly used types
pub use frame::{FeatureFrame, Window, FEATURE_DIM, LANDMARK_DIMS, NUM_LANDMARKS};
pub use latency::{LatencySummary, LatencyTracker};
pub use session::{RecognitionResult, SessionController, SessionError, SessionState, StopHandle};
pub use windowing::WindowBuffer;
