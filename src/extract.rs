//! Frame decoding and hand-landmark extraction.
//!
//! Clients run the hand tracker locally and stream the landmarks as binary
//! frames: a packed sequence of little-endian `f32` values, `x, y, z` per
//! landmark. An empty frame means no hand was detected.

use crate::core::{FeatureFrame, LANDMARK_DIMS, NUM_LANDMARKS};

/// A decoded (but not yet validated) frame payload.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkPacket {
    pub values: Vec<f32>,
}

impl LandmarkPacket {
    /// Encode landmark triples into the binary wire layout.
    pub fn encode(landmarks: &[[f32; LANDMARK_DIMS]]) -> Vec<u8> {
        landmarks
            .iter()
            .flatten()
            .flat_map(|v| v.to_le_bytes())
            .collect()
    }
}

/// Raw frame bytes could not be decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Payload length is not a whole number of values
    Truncated { len: usize },
    /// Payload exceeds the configured frame size limit
    TooLarge { len: usize, max: usize },
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Truncated { len } => {
                write!(f, "Frame of {len} bytes is not a sequence of f32 values")
            }
            DecodeError::TooLarge { len, max } => {
                write!(f, "Frame of {len} bytes exceeds limit of {max} bytes")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Turns raw transport bytes into a packet.
pub trait FrameDecoder: Send + Sync {
    fn decode(&self, raw: &[u8]) -> Result<LandmarkPacket, DecodeError>;
}

/// Turns a packet into a feature vector, or `None` when nothing usable was
/// detected. Never fails: malformed packets map to `None`.
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, packet: &LandmarkPacket) -> Option<FeatureFrame>;

    /// Arity of every frame this extractor produces.
    fn feature_dim(&self) -> usize;
}

/// Decoder + extractor for the packed `f32` landmark format.
#[derive(Debug, Clone)]
pub struct LandmarkCodec {
    num_landmarks: usize,
    max_frame_bytes: usize,
    wrist_relative: bool,
}

impl Default for LandmarkCodec {
    fn default() -> Self {
        Self {
            num_landmarks: NUM_LANDMARKS,
            max_frame_bytes: 5 * 1024 * 1024,
            wrist_relative: false,
        }
    }
}

impl LandmarkCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject frames above `max` bytes.
    pub fn with_max_frame_bytes(mut self, max: usize) -> Self {
        self.max_frame_bytes = max;
        self
    }

    /// Re-centre every landmark on the wrist (landmark 0).
    pub fn with_wrist_relative(mut self, enabled: bool) -> Self {
        self.wrist_relative = enabled;
        self
    }
}

impl FrameDecoder for LandmarkCodec {
    fn decode(&self, raw: &[u8]) -> Result<LandmarkPacket, DecodeError> {
        if raw.len() > self.max_frame_bytes {
            return Err(DecodeError::TooLarge {
                len: raw.len(),
                max: self.max_frame_bytes,
            });
        }
        if raw.len() % 4 != 0 {
            return Err(DecodeError::Truncated { len: raw.len() });
        }

        let values = raw
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Ok(LandmarkPacket { values })
    }
}

impl FeatureExtractor for LandmarkCodec {
    fn extract(&self, packet: &LandmarkPacket) -> Option<FeatureFrame> {
        if packet.values.len() != self.feature_dim() {
            if !packet.values.is_empty() {
                tracing::debug!(values = packet.values.len(), "unexpected landmark count");
            }
            return None;
        }
        if !packet.values.iter().all(|v| v.is_finite()) {
            return None;
        }

        let mut values = packet.values.clone();
        if self.wrist_relative {
            let wrist = [values[0], values[1], values[2]];
            for point in values.chunks_exact_mut(LANDMARK_DIMS) {
                for (v, origin) in point.iter_mut().zip(wrist) {
                    *v -= origin;
                }
            }
        }
        Some(FeatureFrame::new(values))
    }

    fn feature_dim(&self) -> usize {
        self.num_landmarks * LANDMARK_DIMS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FEATURE_DIM;

    fn hand(offset: f32) -> Vec<[f32; 3]> {
        (0..NUM_LANDMARKS)
            .map(|i| [offset + i as f32 * 0.01, 0.5, -0.1])
            .collect()
    }

    #[test]
    fn test_decode_and_extract_hand() {
        let codec = LandmarkCodec::new();
        let packet = codec.decode(&LandmarkPacket::encode(&hand(0.2))).unwrap();
        assert_eq!(packet.values.len(), FEATURE_DIM);

        let frame = codec.extract(&packet).unwrap();
        assert_eq!(frame.dim(), FEATURE_DIM);
        assert!((frame.values()[3] - 0.21).abs() < 1e-6);
    }

    #[test]
    fn test_empty_frame_is_no_detection() {
        let codec = LandmarkCodec::new();
        let packet = codec.decode(&[]).unwrap();
        assert!(codec.extract(&packet).is_none());
    }

    #[test]
    fn test_truncated_payload_fails_decode() {
        let codec = LandmarkCodec::new();
        assert_eq!(codec.decode(&[0, 1, 2]), Err(DecodeError::Truncated { len: 3 }));
    }

    #[test]
    fn test_oversized_payload_fails_decode() {
        let codec = LandmarkCodec::new().with_max_frame_bytes(8);
        assert!(matches!(codec.decode(&[0; 12]), Err(DecodeError::TooLarge { .. })));
    }

    #[test]
    fn test_malformed_packets_map_to_none() {
        let codec = LandmarkCodec::new();
        let short = LandmarkPacket { values: vec![0.5; 10] };
        assert!(codec.extract(&short).is_none());

        let mut values = vec![0.5; FEATURE_DIM];
        values[7] = f32::NAN;
        assert!(codec.extract(&LandmarkPacket { values }).is_none());
    }

    #[test]
    fn test_wrist_relative() {
        let codec = LandmarkCodec::new().with_wrist_relative(true);
        let packet = codec.decode(&LandmarkPacket::encode(&hand(0.2))).unwrap();
        let frame = codec.extract(&packet).unwrap();
        assert_eq!(&frame.values()[..3], &[0.0, 0.0, 0.0]);
        assert!((frame.values()[3] - 0.01).abs() < 1e-6);
    }
}
