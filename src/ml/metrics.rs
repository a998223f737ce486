//! Binary classification metrics

use serde::{Deserialize, Serialize};

/// F1, precision and recall for the positive class (label 1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub f1_score: f64,
    pub precision_score: f64,
    pub recall_score: f64,
}

fn is_positive(v: f64) -> bool {
    v > 0.5
}

/// Score predictions against true labels.
///
/// A ratio with a zero denominator scores 0.0.
pub fn classification_score(y_true: &[f64], y_pred: &[f64]) -> ClassificationMetrics {
    let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
    for (&t, &p) in y_true.iter().zip(y_pred) {
        match (is_positive(t), is_positive(p)) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }

    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = ratio(2 * tp, 2 * tp + fp + fn_);

    ClassificationMetrics {
        f1_score: f1,
        precision_score: precision,
        recall_score: recall,
    }
}

/// Fraction of matching labels
pub fn accuracy(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred)
        .filter(|(&t, &p)| is_positive(t) == is_positive(p))
        .count();
    correct as f64 / y_true.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_predictions() {
        let y = [0.0, 1.0, 1.0, 0.0];
        let m = classification_score(&y, &y);
        assert_eq!(m.f1_score, 1.0);
        assert_eq!(m.precision_score, 1.0);
        assert_eq!(m.recall_score, 1.0);
    }

    #[test]
    fn test_known_confusion() {
        // tp = 2, fp = 1, fn = 1
        let y_true = [1.0, 1.0, 1.0, 0.0, 0.0];
        let y_pred = [1.0, 1.0, 0.0, 1.0, 0.0];
        let m = classification_score(&y_true, &y_pred);

        assert!((m.precision_score - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.recall_score - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.f1_score - 2.0 / 3.0).abs() < 1e-12);
        assert!((accuracy(&y_true, &y_pred) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_no_positive_predictions_scores_zero() {
        let m = classification_score(&[1.0, 0.0], &[0.0, 0.0]);
        assert_eq!(m.precision_score, 0.0);
        assert_eq!(m.f1_score, 0.0);
    }
}
