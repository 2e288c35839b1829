//! Turning raw classifier logits into probabilities and a class ranking.

use serde::Serialize;

/// Probability distribution over classes plus the class ranking derived from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scores {
    /// Softmax of the raw logits, in class-index order.
    pub probabilities: Vec<f32>,
    /// Class indices ordered by descending probability.
    pub ranking: Vec<usize>,
}

impl Scores {
    /// Index of the most probable class, if any.
    pub fn top(&self) -> Option<usize> {
        self.ranking.first().copied()
    }
}

/// Numerically stable softmax.
///
/// The maximum logit is subtracted before exponentiation so large inputs do
/// not overflow. An empty slice yields an empty vector.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let Some(max) = logits.iter().copied().reduce(f32::max) else {
        return Vec::new();
    };
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Class indices sorted by descending probability.
///
/// The sort is stable, so on exact ties the lower class index comes first.
pub fn rank(probabilities: &[f32]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..probabilities.len()).collect();
    indices.sort_by(|&a, &b| probabilities[b].total_cmp(&probabilities[a]));
    indices
}

/// Softmax followed by ranking.
pub fn interpret(logits: &[f32]) -> Scores {
    let probabilities = softmax(logits);
    let ranking = rank(&probabilities);
    Scores {
        probabilities,
        ranking,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: [[f32; 8]; 5] = [
        [2.0, 1.0, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1],
        [0.0; 8],
        [-3.5, 12.0, 7.25, -0.5, 0.0, 1.0, 4.0, -9.0],
        [1000.0, 999.0, 998.0, -1000.0, 0.0, 500.0, 1.0, 2.0],
        [-80.0, -81.0, -90.0, -79.5, -100.0, -85.0, -82.0, -80.0],
    ];

    #[test]
    fn softmax_is_a_distribution() {
        for logits in SAMPLES {
            let probs = softmax(&logits);
            assert_eq!(probs.len(), logits.len());
            assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)), "{probs:?}");
            let sum: f32 = probs.iter().sum();
            assert!((sum - 1.0).abs() <= 1e-6, "sum {sum} for {logits:?}");
        }
    }

    #[test]
    fn softmax_is_shift_invariant() {
        for logits in SAMPLES {
            let base = softmax(&logits);
            for shift in [-50.0f32, 3.0, 250.0] {
                let shifted: Vec<f32> = logits.iter().map(|x| x + shift).collect();
                let probs = softmax(&shifted);
                for (a, b) in base.iter().zip(&probs) {
                    assert!((a - b).abs() <= 1e-5, "{a} vs {b} (shift {shift})");
                }
            }
        }
    }

    #[test]
    fn softmax_does_not_overflow_large_logits() {
        let probs = softmax(&[1.0e4, 1.0e4 - 1.0, -1.0e4]);
        assert!(probs.iter().all(|p| p.is_finite()));
        assert!(probs[0] > probs[1]);
        assert_eq!(probs[2], 0.0);
    }

    #[test]
    fn softmax_of_empty_is_empty() {
        assert!(softmax(&[]).is_empty());
    }

    #[test]
    fn rank_is_a_descending_permutation() {
        for logits in SAMPLES {
            let probs = softmax(&logits);
            let ranking = rank(&probs);

            let mut sorted = ranking.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, (0..8).collect::<Vec<_>>());

            for pair in ranking.windows(2) {
                assert!(probs[pair[0]] >= probs[pair[1]]);
            }
        }
    }

    #[test]
    fn ties_prefer_lower_index() {
        let scores = interpret(&[1.0, 3.0, 3.0, 0.0, 3.0, 0.0, 0.0, 0.0]);
        assert_eq!(&scores.ranking[..3], &[1, 2, 4]);
        assert_eq!(&scores.ranking[3..], &[0, 3, 5, 6, 7]);

        let uniform = interpret(&[0.5; 8]);
        assert_eq!(uniform.ranking, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn dominant_first_logit_ranks_first() {
        let scores = interpret(&[2.0, 1.0, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1]);
        assert_eq!(scores.top(), Some(0));
        assert_eq!(scores.ranking[1], 1);
    }
}
