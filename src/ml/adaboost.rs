//! SAMME boosting over decision stumps

use faer::Mat;
use serde::{Deserialize, Serialize};

use super::tree::{Criterion, DecisionTree};
use super::{check_training_data, check_width, Classifier, MlError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoost {
    pub learning_rate: f64,
    pub n_estimators: usize,
    n_features: usize,
    stumps: Vec<DecisionTree>,
    alphas: Vec<f64>,
}

impl Default for AdaBoost {
    fn default() -> Self {
        Self::new(1.0, 50)
    }
}

impl AdaBoost {
    pub fn new(learning_rate: f64, n_estimators: usize) -> Self {
        Self {
            learning_rate,
            n_estimators,
            n_features: 0,
            stumps: Vec::new(),
            alphas: Vec::new(),
        }
    }

    pub fn n_stumps(&self) -> usize {
        self.stumps.len()
    }
}

impl Classifier for AdaBoost {
    fn fit(&mut self, x: &Mat<f64>, y: &[f64]) -> Result<(), MlError> {
        check_training_data(x, y)?;
        if self.learning_rate <= 0.0 {
            return Err(MlError::InvalidParam {
                name: "learning_rate".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let n = y.len();
        self.n_features = x.ncols();
        self.stumps.clear();
        self.alphas.clear();
        let mut weights = vec![1.0 / n as f64; n];

        for m in 0..self.n_estimators {
            let mut stump = DecisionTree::new(Criterion::Gini, Some(1));
            stump.fit_weighted(x, y, &weights)?;
            let pred = stump.predict(x)?;

            let total: f64 = weights.iter().sum();
            let error: f64 = (0..n)
                .filter(|&i| pred[i] != y[i])
                .map(|i| weights[i])
                .sum::<f64>()
                / total;

            if error <= 0.0 {
                // perfect stump ends boosting
                self.stumps.push(stump);
                self.alphas.push(1.0);
                break;
            }
            if error >= 0.5 {
                if m == 0 {
                    return Err(MlError::Numeric(
                        "first weak learner is no better than chance".to_string(),
                    ));
                }
                break;
            }

            let alpha = self.learning_rate * ((1.0 - error) / error).ln();
            for i in 0..n {
                if pred[i] != y[i] {
                    weights[i] *= alpha.exp();
                }
            }
            let sum: f64 = weights.iter().sum();
            weights.iter_mut().for_each(|w| *w /= sum);

            self.stumps.push(stump);
            self.alphas.push(alpha);
        }
        Ok(())
    }

    fn predict(&self, x: &Mat<f64>) -> Result<Vec<f64>, MlError> {
        if self.stumps.is_empty() {
            return Err(MlError::NotFitted);
        }
        check_width(x, self.n_features)?;

        let mut votes = vec![0.0; x.nrows()];
        for (stump, &alpha) in self.stumps.iter().zip(&self.alphas) {
            for (v, p) in votes.iter_mut().zip(stump.predict(x)?) {
                *v += if p > 0.5 { alpha } else { -alpha };
            }
        }
        Ok(votes
            .into_iter()
            .map(|v| if v > 0.0 { 1.0 } else { 0.0 })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_stump_stops_early() {
        let x = Mat::from_fn(6, 1, |i, _| i as f64);
        let y = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut model = AdaBoost::new(1.0, 16);
        model.fit(&x, &y).unwrap();

        assert_eq!(model.n_stumps(), 1);
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_boosting_combines_stumps() {
        // class 1 inside an interval: no single stump separates it
        let x = Mat::from_fn(9, 1, |i, _| i as f64);
        let y = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0];
        let mut model = AdaBoost::new(1.0, 3);
        model.fit(&x, &y).unwrap();

        assert_eq!(model.n_stumps(), 3);
        assert_eq!(model.predict(&x).unwrap(), y);
    }
}
