//! Rolling temporal window over per-frame feature vectors.
//!
//! Frames are collected into a fixed-capacity ring (default 30 frames).
//! Once the ring first fills, a window becomes ready for inference every
//! `stride` frames, so consecutive windows overlap when `stride < window_size`.

use crate::core::frame::{FeatureFrame, Window};
use std::collections::VecDeque;

/// Fixed-capacity rolling buffer that decides when a window is ready.
#[derive(Debug)]
pub struct WindowBuffer {
    /// Maximum number of frames held
    window_size: usize,
    /// Frames between successive inference triggers
    stride: usize,
    /// Arity of every frame (used for zero padding)
    feature_dim: usize,
    /// Frames in arrival order, oldest first
    frames: VecDeque<FeatureFrame>,
    /// Every `add_frame` call since the last reset, detected or not
    frames_seen: u64,
}

impl WindowBuffer {
    /// Create a buffer. `window_size` and `stride` must already be validated
    /// (`1 <= stride <= window_size`).
    pub fn new(window_size: usize, stride: usize, feature_dim: usize) -> Self {
        debug_assert!(window_size >= 1 && stride >= 1 && stride <= window_size);
        Self {
            window_size,
            stride,
            feature_dim,
            frames: VecDeque::with_capacity(window_size),
            frames_seen: 0,
        }
    }

    /// Append one frame and report whether a window is ready.
    ///
    /// A missing detection is stored as a zero frame: it still advances time
    /// and the stride counter.
    pub fn add_frame(&mut self, frame: Option<FeatureFrame>) -> bool {
        let frame = match frame {
            Some(frame) if frame.dim() == self.feature_dim => frame,
            Some(frame) => {
                tracing::warn!(
                    expected = self.feature_dim,
                    got = frame.dim(),
                    "feature arity mismatch, padding frame"
                );
                FeatureFrame::zeros(self.feature_dim)
            }
            None => FeatureFrame::zeros(self.feature_dim),
        };

        if self.frames.len() == self.window_size {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
        self.frames_seen += 1;

        self.is_ready()
    }

    /// Readiness depends only on the counters, never on frame contents.
    fn is_ready(&self) -> bool {
        let window = self.window_size as u64;
        self.frames.len() == self.window_size
            && self.frames_seen >= window
            && (self.frames_seen - window) % self.stride as u64 == 0
    }

    /// Frozen copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Window {
        Window::new(self.frames.iter().cloned().collect())
    }

    /// Clear frames and counters.
    pub fn reset(&mut self) {
        self.frames.clear();
        self.frames_seen = 0;
    }

    /// Number of frames currently held.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Total frames offered since the last reset.
    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(v: f32) -> Option<FeatureFrame> {
        Some(FeatureFrame::new(vec![v, v]))
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut buffer = WindowBuffer::new(5, 2, 2);
        for i in 0..50 {
            buffer.add_frame(frame(i as f32));
            assert!(buffer.len() <= 5);
        }
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.frames_seen(), 50);
    }

    #[test]
    fn test_readiness_cadence() {
        let mut buffer = WindowBuffer::new(30, 10, 2);
        let ready: Vec<u64> = (1..=80u64)
            .filter(|_| buffer.add_frame(frame(1.0)))
            .collect();
        assert_eq!(ready, vec![30, 40, 50, 60, 70, 80]);
    }

    #[test]
    fn test_stride_one_fires_every_frame_once_full() {
        let mut buffer = WindowBuffer::new(3, 1, 2);
        let ready: Vec<bool> = (0..6).map(|_| buffer.add_frame(None)).collect();
        assert_eq!(ready, vec![false, false, true, true, true, true]);
    }

    #[test]
    fn test_snapshot_is_frozen() {
        let mut buffer = WindowBuffer::new(3, 1, 2);
        buffer.add_frame(frame(1.0));
        buffer.add_frame(frame(2.0));
        buffer.add_frame(frame(3.0));
        let snapshot = buffer.snapshot();

        buffer.add_frame(frame(4.0));
        buffer.add_frame(frame(5.0));

        let firsts: Vec<f32> = snapshot.frames().iter().map(|f| f.values()[0]).collect();
        assert_eq!(firsts, vec![1.0, 2.0, 3.0]);
        assert_eq!(buffer.snapshot().frames()[0].values()[0], 3.0);
    }

    #[test]
    fn test_missing_detection_pads_with_zeros() {
        let mut buffer = WindowBuffer::new(4, 2, 3);
        buffer.add_frame(None);
        assert_eq!(buffer.frames_seen(), 1);
        assert!(buffer.snapshot().frames()[0].is_padding());
        assert_eq!(buffer.snapshot().frames()[0].dim(), 3);
    }

    #[test]
    fn test_wrong_arity_is_padded() {
        let mut buffer = WindowBuffer::new(2, 1, 3);
        buffer.add_frame(Some(FeatureFrame::new(vec![1.0])));
        assert_eq!(buffer.snapshot().frames()[0].dim(), 3);
    }

    #[test]
    fn test_reset_clears_counters() {
        let mut buffer = WindowBuffer::new(2, 1, 2);
        buffer.add_frame(frame(1.0));
        buffer.add_frame(frame(1.0));
        buffer.reset();
        assert!(buffer.is_empty());
        assert_eq!(buffer.frames_seen(), 0);
        assert!(!buffer.add_frame(frame(1.0)));
        assert!(buffer.add_frame(frame(1.0)));
    }
}
