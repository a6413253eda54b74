//! Per-frame feature vectors and the windows built from them.

use std::sync::Arc;

/// Number of hand landmarks produced by the extractor.
pub const NUM_LANDMARKS: usize = 21;

/// Coordinates per landmark (x, y, z).
pub const LANDMARK_DIMS: usize = 3;

/// Flattened length of one hand-landmark frame.
pub const FEATURE_DIM: usize = NUM_LANDMARKS * LANDMARK_DIMS;

/// A fixed-arity numeric record for a single video frame.
///
/// Immutable once built. The arity is not fixed at the type level so the
/// pipeline works for any extractor, but every frame in one buffer must
/// share the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    values: Arc<[f32]>,
}

impl FeatureFrame {
    /// Wrap an extracted feature vector.
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values: values.into(),
        }
    }

    /// The all-zero frame used as padding when no hand was detected.
    pub fn zeros(dim: usize) -> Self {
        Self::new(vec![0.0; dim])
    }

    /// Build a frame from `[x, y, z]` landmark triples.
    pub fn from_landmarks(landmarks: &[[f32; LANDMARK_DIMS]]) -> Self {
        Self::new(landmarks.iter().flatten().copied().collect())
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// True when every value is exactly zero (padding).
    pub fn is_padding(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0)
    }
}

/// An ordered, frozen sequence of frames, most-recent-last.
///
/// Windows are snapshots: they share frame storage with the buffer they
/// were taken from but can never observe later appends.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    frames: Arc<[FeatureFrame]>,
}

impl Window {
    pub fn new(frames: Vec<FeatureFrame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    pub fn frames(&self) -> &[FeatureFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Feature arity of the frames in this window (0 for an empty window).
    pub fn feature_dim(&self) -> usize {
        self.frames.first().map(FeatureFrame::dim).unwrap_or(0)
    }

    /// Row-major `[frames × feature_dim]` copy of the window contents.
    pub fn to_flat(&self) -> Vec<f32> {
        let mut flat = Vec::with_capacity(self.len() * self.feature_dim());
        for frame in self.frames.iter() {
            flat.extend_from_slice(frame.values());
        }
        flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_frame_is_padding() {
        let frame = FeatureFrame::zeros(FEATURE_DIM);
        assert_eq!(frame.dim(), 63);
        assert!(frame.is_padding());
        assert!(!FeatureFrame::new(vec![0.0, 0.5]).is_padding());
    }

    #[test]
    fn test_from_landmarks_flattens_in_order() {
        let frame = FeatureFrame::from_landmarks(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        assert_eq!(frame.values(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_window_flat_layout() {
        let window = Window::new(vec![
            FeatureFrame::new(vec![1.0, 2.0]),
            FeatureFrame::new(vec![3.0, 4.0]),
        ]);
        assert_eq!(window.len(), 2);
        assert_eq!(window.feature_dim(), 2);
        assert_eq!(window.to_flat(), vec![1.0, 2.0, 3.0, 4.0]);
    }
}
