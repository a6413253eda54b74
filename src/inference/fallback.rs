//! Deterministic demo backend used when no trained model is available.
//!
//! Scores are derived from a hash of the window contents, so identical
//! windows always produce identical rankings.

use super::ranking::softmax;
use crate::core::Window;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Spread of the pseudo-logits. Wide enough that one class usually stands
/// out above the default confidence threshold.
const LOGIT_SCALE: f32 = 6.0;

/// Stand-in classifier producing reproducible probability vectors.
#[derive(Debug, Clone)]
pub struct FallbackClassifier {
    num_classes: usize,
}

impl FallbackClassifier {
    /// Returns `None` when there are no classes to score.
    pub fn new(num_classes: usize) -> Option<Self> {
        (num_classes > 0).then_some(Self { num_classes })
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Probability vector over all classes for `window`.
    pub fn forward(&self, window: &Window) -> Vec<f32> {
        // ChaCha output is fixed across platforms and crate versions.
        let mut rng = ChaCha8Rng::seed_from_u64(window_fingerprint(window));
        let logits: Vec<f32> = (0..self.num_classes)
            .map(|_| rng.gen::<f32>() * LOGIT_SCALE)
            .collect();
        softmax(&logits)
    }
}

/// FNV-1a over the bit patterns of every value in the window.
fn window_fingerprint(window: &Window) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = OFFSET;
    for frame in window.frames() {
        for value in frame.values() {
            // Fold -0.0 into 0.0 so padding hashes consistently.
            let bits = if *value == 0.0 { 0 } else { value.to_bits() };
            for byte in bits.to_le_bytes() {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(PRIME);
            }
        }
    }
    hash ^ window.len() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FeatureFrame;

    fn window(v: f32) -> Window {
        Window::new(vec![FeatureFrame::new(vec![v, v * 2.0]); 4])
    }

    #[test]
    fn test_requires_classes() {
        assert!(FallbackClassifier::new(0).is_none());
        assert_eq!(FallbackClassifier::new(3).map(|c| c.num_classes()), Some(3));
    }

    #[test]
    fn test_deterministic_for_identical_windows() {
        let classifier = FallbackClassifier::new(8).unwrap();
        assert_eq!(classifier.forward(&window(0.5)), classifier.forward(&window(0.5)));
    }

    #[test]
    fn test_depends_on_content() {
        let classifier = FallbackClassifier::new(8).unwrap();
        assert_ne!(classifier.forward(&window(0.5)), classifier.forward(&window(0.25)));
    }

    #[test]
    fn test_scores_follow_seeded_generator() {
        let classifier = FallbackClassifier::new(4).unwrap();
        let w = window(0.3);
        let mut rng = ChaCha8Rng::seed_from_u64(window_fingerprint(&w));
        let logits: Vec<f32> = (0..4).map(|_| rng.gen::<f32>() * LOGIT_SCALE).collect();
        assert_eq!(classifier.forward(&w), softmax(&logits));
    }

    #[test]
    fn test_outputs_probabilities() {
        let classifier = FallbackClassifier::new(5).unwrap();
        let probs = classifier.forward(&window(0.1));
        assert_eq!(probs.len(), 5);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
    }
}
