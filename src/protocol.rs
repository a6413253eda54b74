//! JSON messages exchanged with streaming clients.
//!
//! Server → client messages are [`SessionEvent`]s, tagged by `type`.
//! Client → server text messages are [`ControlMessage`]s; binary messages
//! carry landmark frames (see [`crate::extract`]).

use crate::core::{LatencySummary, RecognitionResult};
use crate::inference::BackendStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events emitted to the client during a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Sent once when the session starts
    Connection {
        session_id: String,
        message: String,
        backend_status: BackendStatus,
        timestamp: DateTime<Utc>,
    },
    /// One classified window
    Recognition {
        session_id: String,
        #[serde(flatten)]
        result: RecognitionResult,
    },
    /// Latency statistics, on request or every N frames
    Stats {
        session_id: String,
        frame_count: u64,
        summary: LatencySummary,
        timestamp: DateTime<Utc>,
    },
    /// Buffer was cleared on request
    Reset {
        session_id: String,
        timestamp: DateTime<Utc>,
    },
    Pong {
        timestamp: DateTime<Utc>,
    },
    /// A per-frame or per-message failure; the session keeps running
    Error {
        session_id: String,
        detail: String,
        timestamp: DateTime<Utc>,
    },
}

impl SessionEvent {
    pub fn connection(session_id: &str, backend_status: BackendStatus) -> Self {
        SessionEvent::Connection {
            session_id: session_id.to_string(),
            message: "Connected to streaming recognition service".to_string(),
            backend_status,
            timestamp: Utc::now(),
        }
    }

    pub fn recognition(session_id: &str, result: RecognitionResult) -> Self {
        SessionEvent::Recognition {
            session_id: session_id.to_string(),
            result,
        }
    }

    pub fn stats(session_id: &str, frame_count: u64, summary: LatencySummary) -> Self {
        SessionEvent::Stats {
            session_id: session_id.to_string(),
            frame_count,
            summary,
            timestamp: Utc::now(),
        }
    }

    pub fn reset(session_id: &str) -> Self {
        SessionEvent::Reset {
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn pong() -> Self {
        SessionEvent::Pong {
            timestamp: Utc::now(),
        }
    }

    pub fn error(session_id: &str, detail: impl Into<String>) -> Self {
        SessionEvent::Error {
            session_id: session_id.to_string(),
            detail: detail.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Control messages sent by the client as JSON text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    Ping,
    GetStats,
    Reset,
    Stop,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::PredictionCandidate;

    #[test]
    fn test_recognition_event_shape() {
        let result = RecognitionResult {
            sign: Some("hello".to_string()),
            confidence: 0.8,
            predictions: vec![PredictionCandidate {
                class_index: 0,
                label: "hello".to_string(),
                confidence: 0.8,
            }],
            inference_time_ms: 1.5,
            backend_status: BackendStatus::Fallback,
            frame_count: 30,
            landmarks_detected: true,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(SessionEvent::recognition("s1", result)).unwrap();
        assert_eq!(json["type"], "recognition");
        assert_eq!(json["session_id"], "s1");
        assert_eq!(json["backend_status"], "fallback");
        assert_eq!(json["frame_count"], 30);
        assert_eq!(json["predictions"][0]["class_name"], "hello");
        assert_eq!(json["inference_time_ms"], 1.5);
    }

    #[test]
    fn test_error_event_shape() {
        let json = serde_json::to_value(SessionEvent::error("s1", "boom")).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["detail"], "boom");
    }

    #[test]
    fn test_control_messages_parse() {
        let parse = |s: &str| serde_json::from_str::<ControlMessage>(s).unwrap();
        assert_eq!(parse(r#"{"type": "ping"}"#), ControlMessage::Ping);
        assert_eq!(parse(r#"{"type": "get_stats"}"#), ControlMessage::GetStats);
        assert_eq!(parse(r#"{"type": "reset"}"#), ControlMessage::Reset);
        assert_eq!(parse(r#"{"type": "stop"}"#), ControlMessage::Stop);
        assert!(serde_json::from_str::<ControlMessage>(r#"{"type": "dance"}"#).is_err());
    }
}
