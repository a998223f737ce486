//! L2-regularized logistic regression fitted by Newton's method (IRLS)

use faer::prelude::*;
use faer::Mat;
use serde::{Deserialize, Serialize};

use super::{check_training_data, check_width, sigmoid, Classifier, MlError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Inverse regularization strength
    pub c: f64,
    pub max_iter: usize,
    pub tol: f64,
    coefficients: Vec<f64>,
    intercept: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 100,
            tol: 1e-8,
            coefficients: Vec::new(),
            intercept: 0.0,
        }
    }
}

impl LogisticRegression {
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    fn linear(&self, x: &Mat<f64>, i: usize) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .enumerate()
                .map(|(j, w)| w * x[(i, j)])
                .sum::<f64>()
    }

    pub fn predict_proba(&self, x: &Mat<f64>) -> Result<Vec<f64>, MlError> {
        if self.coefficients.is_empty() {
            return Err(MlError::NotFitted);
        }
        check_width(x, self.coefficients.len())?;
        Ok((0..x.nrows()).map(|i| sigmoid(self.linear(x, i))).collect())
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: &Mat<f64>, y: &[f64]) -> Result<(), MlError> {
        check_training_data(x, y)?;
        if self.c <= 0.0 {
            return Err(MlError::InvalidParam {
                name: "C".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let (n, d) = (x.nrows(), x.ncols());
        // parameter vector: [intercept, w_0, .., w_{d-1}]
        let dim = d + 1;
        let design = |i: usize, k: usize| if k == 0 { 1.0 } else { x[(i, k - 1)] };
        let penalty = 1.0 / self.c;
        let mut beta = vec![0.0; dim];

        for _ in 0..self.max_iter {
            let p: Vec<f64> = (0..n)
                .map(|i| sigmoid((0..dim).map(|k| beta[k] * design(i, k)).sum()))
                .collect();

            let mut grad = Mat::<f64>::zeros(dim, 1);
            let mut hess = Mat::<f64>::zeros(dim, dim);
            for i in 0..n {
                let r = p[i] - y[i];
                let s = p[i] * (1.0 - p[i]);
                for a in 0..dim {
                    let xa = design(i, a);
                    grad[(a, 0)] += r * xa;
                    for b in a..dim {
                        hess[(a, b)] += s * xa * design(i, b);
                    }
                }
            }
            for a in 0..dim {
                for b in 0..a {
                    hess[(a, b)] = hess[(b, a)];
                }
            }
            // intercept is not penalized; a tiny ridge keeps it solvable
            hess[(0, 0)] += 1e-10;
            for k in 1..dim {
                grad[(k, 0)] += penalty * beta[k];
                hess[(k, k)] += penalty;
            }

            let step = hess.partial_piv_lu().solve(&grad);
            let mut max_step: f64 = 0.0;
            for k in 0..dim {
                let delta = step[(k, 0)];
                if !delta.is_finite() {
                    return Err(MlError::Numeric("Newton step is not finite".to_string()));
                }
                beta[k] -= delta;
                max_step = max_step.max(delta.abs());
            }
            if max_step < self.tol {
                break;
            }
        }

        self.intercept = beta[0];
        self.coefficients = beta[1..].to_vec();
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_learns_sign_of_feature() {
        let x = Mat::from_fn(10, 1, |i, _| i as f64 - 4.5);
        let y: Vec<f64> = (0..10).map(|i| if i >= 5 { 1.0 } else { 0.0 }).collect();
        let mut model = LogisticRegression::default();
        model.fit(&x, &y).unwrap();

        assert!(model.coefficients()[0] > 0.0);
        assert!(model.intercept().abs() < 1e-6, "symmetric data has no offset");
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_constant_labels_fit_intercept_only() {
        let x = Mat::from_fn(6, 2, |i, j| (i + j) as f64);
        let y = vec![1.0; 6];
        let mut model = LogisticRegression::default();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
    }
}
