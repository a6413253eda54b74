//! Top-k ranking of class probability vectors.

use super::PredictionCandidate;

/// Label for a class index, falling back to `class_{idx}` when unnamed.
pub fn class_label(labels: &[String], index: usize) -> String {
    labels
        .get(index)
        .cloned()
        .unwrap_or_else(|| format!("class_{index}"))
}

/// Rank `probabilities` and keep the `top_k` highest.
///
/// Order is descending by confidence with ties broken by ascending class
/// index. Non-finite values are treated as zero confidence and all values
/// are clamped into `[0, 1]`.
pub fn rank_top_k(probabilities: &[f32], top_k: usize, labels: &[String]) -> Vec<PredictionCandidate> {
    let mut scored: Vec<(usize, f32)> = probabilities
        .iter()
        .enumerate()
        .map(|(index, &p)| {
            let confidence = if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 };
            (index, confidence)
        })
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored.truncate(top_k);

    scored
        .into_iter()
        .map(|(class_index, confidence)| PredictionCandidate {
            class_index,
            label: class_label(labels, class_index),
            confidence,
        })
        .collect()
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum > 0.0 && sum.is_finite() {
        exps.into_iter().map(|e| e / sum).collect()
    } else {
        vec![0.0; logits.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        vec!["a".into(), "b".into(), "c".into()]
    }

    #[test]
    fn test_ranking_descending() {
        let ranked = rank_top_k(&[0.1, 0.7, 0.2], 3, &labels());
        let order: Vec<usize> = ranked.iter().map(|c| c.class_index).collect();
        assert_eq!(order, vec![1, 2, 0]);
        assert_eq!(ranked[0].label, "b");
    }

    #[test]
    fn test_ties_break_by_ascending_index() {
        let ranked = rank_top_k(&[0.25, 0.25, 0.25, 0.25], 4, &labels());
        let order: Vec<usize> = ranked.iter().map(|c| c.class_index).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
        assert_eq!(ranked[3].label, "class_3");
    }

    #[test]
    fn test_top_k_truncates() {
        let ranked = rank_top_k(&[0.1, 0.5, 0.4], 2, &labels());
        assert_eq!(ranked.len(), 2);
        assert!(rank_top_k(&[0.1], 0, &labels()).is_empty());
        assert_eq!(rank_top_k(&[0.1, 0.9], 10, &labels()).len(), 2);
    }

    #[test]
    fn test_non_finite_sinks_to_bottom() {
        let ranked = rank_top_k(&[f32::NAN, 0.3, 1.5], 3, &labels());
        assert_eq!(ranked[0].class_index, 2);
        assert_eq!(ranked[0].confidence, 1.0);
        assert_eq!(ranked[2].class_index, 0);
        assert_eq!(ranked[2].confidence, 0.0);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }
}
