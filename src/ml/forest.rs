//! Bagged ensemble of randomized decision trees

use faer::Mat;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::tree::{Criterion, DecisionTree};
use super::{check_training_data, check_width, Classifier, MlError};

/// Random forest: each tree sees a bootstrap sample and `√d` features per split.
///
/// Trees are grown in parallel; tree `t` is seeded with `random_state + t` so
/// results do not depend on thread scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub n_estimators: usize,
    pub criterion: Criterion,
    pub max_depth: Option<usize>,
    pub random_state: u64,
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100, 42)
    }
}

impl RandomForest {
    pub fn new(n_estimators: usize, random_state: u64) -> Self {
        Self {
            n_estimators,
            criterion: Criterion::Gini,
            max_depth: None,
            random_state,
            n_features: 0,
            trees: Vec::new(),
        }
    }

    /// Mean of the per-tree class-1 probabilities
    pub fn predict_proba(&self, x: &Mat<f64>) -> Result<Vec<f64>, MlError> {
        if self.trees.is_empty() {
            return Err(MlError::NotFitted);
        }
        check_width(x, self.n_features)?;

        let mut sums = vec![0.0; x.nrows()];
        for tree in &self.trees {
            for (s, p) in sums.iter_mut().zip(tree.predict_proba(x)?) {
                *s += p;
            }
        }
        let n = self.trees.len() as f64;
        Ok(sums.into_iter().map(|s| s / n).collect())
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: &Mat<f64>, y: &[f64]) -> Result<(), MlError> {
        check_training_data(x, y)?;
        if self.n_estimators == 0 {
            return Err(MlError::InvalidParam {
                name: "n_estimators".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let n = y.len();
        let max_features = ((x.ncols() as f64).sqrt() as usize).max(1);
        self.n_features = x.ncols();

        self.trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|t| {
                let seed = self.random_state.wrapping_add(t as u64);
                let mut rng = StdRng::seed_from_u64(seed);

                // bootstrap as multiplicity weights
                let mut weights = vec![0.0; n];
                for _ in 0..n {
                    weights[rng.gen_range(0..n)] += 1.0;
                }

                let mut tree = DecisionTree::new(self.criterion, self.max_depth);
                tree.max_features = Some(max_features);
                tree.random_state = seed;
                tree.fit_weighted(x, y, &weights)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>, MlError>>()?;
        Ok(())
    }

    fn predict(&self, x: &Mat<f64>) -> Result<Vec<f64>, MlError> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| if p > 0.5 { 1.0 } else { 0.0 })
            .collect())
    }
}
