//! Gradient-boosted tree ensembles on the binomial log-loss.
//!
//! [`GradientBoosting`] fits least-squares trees to the residuals `y - p` and
//! then replaces every leaf with a single Newton step. [`XgBoost`] grows each
//! tree directly on gradients and hessians with L2 leaf regularization.

use faer::Mat;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::tree::RegressionTree;
use super::{check_training_data, check_width, sigmoid, Classifier, MlError};

/// Probabilities are clamped away from 0 and 1 for the prior log-odds
const PROB_EPS: f64 = 1e-7;

fn invalid(name: &str, reason: &str) -> MlError {
    MlError::InvalidParam {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

fn raw_scores(base: f64, lr: f64, trees: &[RegressionTree], x: &Mat<f64>) -> Vec<f64> {
    (0..x.nrows())
        .map(|i| base + lr * trees.iter().map(|t| t.predict_row(x, i)).sum::<f64>())
        .collect()
}

fn threshold(raw: Vec<f64>) -> Vec<f64> {
    raw.into_iter()
        .map(|f| if sigmoid(f) > 0.5 { 1.0 } else { 0.0 })
        .collect()
}

// ============================================================================
// Gradient boosting
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoosting {
    pub learning_rate: f64,
    pub n_estimators: usize,
    /// Fraction of rows drawn (without replacement) for each tree
    pub subsample: f64,
    pub max_depth: usize,
    pub random_state: u64,
    init_score: f64,
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl Default for GradientBoosting {
    fn default() -> Self {
        Self::new(0.1, 100, 1.0)
    }
}

impl GradientBoosting {
    pub fn new(learning_rate: f64, n_estimators: usize, subsample: f64) -> Self {
        Self {
            learning_rate,
            n_estimators,
            subsample,
            max_depth: 3,
            random_state: 42,
            init_score: 0.0,
            n_features: 0,
            trees: Vec::new(),
        }
    }

    pub fn predict_proba(&self, x: &Mat<f64>) -> Result<Vec<f64>, MlError> {
        if self.n_features == 0 {
            return Err(MlError::NotFitted);
        }
        check_width(x, self.n_features)?;
        Ok(raw_scores(self.init_score, self.learning_rate, &self.trees, x)
            .into_iter()
            .map(sigmoid)
            .collect())
    }
}

impl Classifier for GradientBoosting {
    fn fit(&mut self, x: &Mat<f64>, y: &[f64]) -> Result<(), MlError> {
        check_training_data(x, y)?;
        if self.learning_rate <= 0.0 {
            return Err(invalid("learning_rate", "must be positive"));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(invalid("subsample", "must be in (0, 1]"));
        }

        let n = y.len();
        let prior = (y.iter().sum::<f64>() / n as f64).clamp(PROB_EPS, 1.0 - PROB_EPS);
        self.init_score = (prior / (1.0 - prior)).ln();
        self.n_features = x.ncols();
        self.trees.clear();

        let sample_size = ((self.subsample * n as f64).round() as usize).clamp(1, n);
        let mut rng = StdRng::seed_from_u64(self.random_state);
        let mut all_rows: Vec<usize> = (0..n).collect();
        let mut f = vec![self.init_score; n];
        let unit_hess = vec![1.0; n];

        for _ in 0..self.n_estimators {
            let p: Vec<f64> = f.iter().map(|&v| sigmoid(v)).collect();
            // negative residual so a leaf of -G/H is the mean residual
            let grad: Vec<f64> = (0..n).map(|i| p[i] - y[i]).collect();

            let rows: Vec<usize> = if sample_size < n {
                all_rows.shuffle(&mut rng);
                all_rows[..sample_size].to_vec()
            } else {
                all_rows.clone()
            };

            let mut tree = RegressionTree::new(self.max_depth, 0.0, 0.0);
            tree.fit_gradients(x, &grad, &unit_hess, &rows);

            // Newton step per leaf: sum(residual) / sum(p(1-p))
            let mut leaf_sums: std::collections::BTreeMap<usize, (f64, f64)> = Default::default();
            for &i in &rows {
                let entry = leaf_sums.entry(tree.leaf_index(x, i)).or_default();
                entry.0 += y[i] - p[i];
                entry.1 += p[i] * (1.0 - p[i]);
            }
            for (leaf, (num, den)) in leaf_sums {
                let value = if den.abs() < 1e-150 { 0.0 } else { num / den };
                tree.set_leaf_value(leaf, value);
            }

            for (i, fi) in f.iter_mut().enumerate() {
                *fi += self.learning_rate * tree.predict_row(x, i);
            }
            self.trees.push(tree);
        }
        Ok(())
    }

    fn predict(&self, x: &Mat<f64>) -> Result<Vec<f64>, MlError> {
        if self.n_features == 0 {
            return Err(MlError::NotFitted);
        }
        check_width(x, self.n_features)?;
        Ok(threshold(raw_scores(
            self.init_score,
            self.learning_rate,
            &self.trees,
            x,
        )))
    }
}

// ============================================================================
// Extreme gradient boosting
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XgBoost {
    pub learning_rate: f64,
    pub max_depth: usize,
    pub n_estimators: usize,
    /// L2 penalty on leaf weights
    pub lambda: f64,
    pub min_child_weight: f64,
    base_score: f64,
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl Default for XgBoost {
    fn default() -> Self {
        Self::new(0.3, 6, 100)
    }
}

impl XgBoost {
    pub fn new(learning_rate: f64, max_depth: usize, n_estimators: usize) -> Self {
        Self {
            learning_rate,
            max_depth,
            n_estimators,
            lambda: 1.0,
            min_child_weight: 1.0,
            base_score: 0.0,
            n_features: 0,
            trees: Vec::new(),
        }
    }

    pub fn predict_proba(&self, x: &Mat<f64>) -> Result<Vec<f64>, MlError> {
        if self.n_features == 0 {
            return Err(MlError::NotFitted);
        }
        check_width(x, self.n_features)?;
        Ok(raw_scores(self.base_score, self.learning_rate, &self.trees, x)
            .into_iter()
            .map(sigmoid)
            .collect())
    }
}

impl Classifier for XgBoost {
    fn fit(&mut self, x: &Mat<f64>, y: &[f64]) -> Result<(), MlError> {
        check_training_data(x, y)?;
        if self.learning_rate <= 0.0 {
            return Err(invalid("learning_rate", "must be positive"));
        }

        let n = y.len();
        self.n_features = x.ncols();
        self.base_score = 0.0;
        self.trees.clear();

        let rows: Vec<usize> = (0..n).collect();
        let mut f = vec![self.base_score; n];
        for _ in 0..self.n_estimators {
            let p: Vec<f64> = f.iter().map(|&v| sigmoid(v)).collect();
            let grad: Vec<f64> = (0..n).map(|i| p[i] - y[i]).collect();
            let hess: Vec<f64> = p.iter().map(|&pi| (pi * (1.0 - pi)).max(1e-16)).collect();

            let mut tree = RegressionTree::new(self.max_depth, self.lambda, self.min_child_weight);
            tree.fit_gradients(x, &grad, &hess, &rows);
            for (i, fi) in f.iter_mut().enumerate() {
                *fi += self.learning_rate * tree.predict_row(x, i);
            }
            self.trees.push(tree);
        }
        Ok(())
    }

    fn predict(&self, x: &Mat<f64>) -> Result<Vec<f64>, MlError> {
        if self.n_features == 0 {
            return Err(MlError::NotFitted);
        }
        check_width(x, self.n_features)?;
        Ok(threshold(raw_scores(
            self.base_score,
            self.learning_rate,
            &self.trees,
            x,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Mat<f64>, Vec<f64>) {
        let x = Mat::from_fn(20, 1, |i, _| i as f64);
        let y = (0..20).map(|i| if i >= 10 { 1.0 } else { 0.0 }).collect();
        (x, y)
    }

    #[test]
    fn test_gradient_boosting_learns_step() {
        let (x, y) = step_data();
        let mut model = GradientBoosting::new(0.1, 32, 1.0);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_gradient_boosting_prior_matches_class_balance() {
        let (x, y) = step_data();
        let mut model = GradientBoosting::new(0.1, 0, 1.0);
        model.fit(&x, &y).unwrap();
        let proba = model.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|p| (p - 0.5).abs() < 1e-9));
    }

    #[test]
    fn test_subsample_bounds() {
        let (x, y) = step_data();
        let mut model = GradientBoosting::new(0.1, 4, 0.0);
        assert!(model.fit(&x, &y).is_err());
    }

    #[test]
    fn test_xgboost_learns_step() {
        let (x, y) = step_data();
        let mut model = XgBoost::new(0.3, 3, 32);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
    }
}
