//! Nearest-neighbor imputation of missing feature values.
//!
//! Missing cells are NaN. The distance between two rows only uses the
//! coordinates present in both and is scaled up for the absent ones:
//! `sqrt(n_features / n_present * Σ (a - b)²)`. A missing cell is filled with
//! the mean of that column over the `k` nearest fitted rows that have it.

use faer::Mat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{row, MlError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputerWeights {
    Uniform,
    Distance,
}

/// Fitted state is the training matrix itself. JSON has no NaN, so missing
/// cells are stored as `null`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnImputer {
    pub n_neighbors: usize,
    pub weights: ImputerWeights,
    feature_names: Vec<String>,
    fit_rows: Vec<Vec<Option<f64>>>,
    column_means: Vec<f64>,
}

fn present(v: f64) -> Option<f64> {
    if v.is_nan() {
        None
    } else {
        Some(v)
    }
}

impl KnnImputer {
    pub fn new(n_neighbors: usize, weights: ImputerWeights) -> Self {
        Self {
            n_neighbors,
            weights,
            feature_names: Vec::new(),
            fit_rows: Vec::new(),
            column_means: Vec::new(),
        }
    }

    pub fn is_fitted(&self) -> bool {
        !self.feature_names.is_empty()
    }

    /// Column names seen at fit time, in order
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Remember the training rows; refitting replaces all previous state
    pub fn fit(&mut self, x: &Mat<f64>, feature_names: &[String]) -> Result<(), MlError> {
        if x.nrows() == 0 {
            return Err(MlError::EmptyInput);
        }
        if feature_names.len() != x.ncols() {
            return Err(MlError::ShapeMismatch(format!(
                "{} feature names for {} columns",
                feature_names.len(),
                x.ncols()
            )));
        }
        if self.n_neighbors == 0 {
            return Err(MlError::InvalidParam {
                name: "n_neighbors".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        self.feature_names = feature_names.to_vec();
        self.fit_rows = (0..x.nrows())
            .map(|i| row(x, i).into_iter().map(present).collect())
            .collect();
        self.column_means = (0..x.ncols())
            .map(|j| {
                let values: Vec<f64> = self.fit_rows.iter().filter_map(|r| r[j]).collect();
                if values.is_empty() {
                    0.0
                } else {
                    values.iter().sum::<f64>() / values.len() as f64
                }
            })
            .collect();
        Ok(())
    }

    fn distance(query: &[f64], donor: &[Option<f64>]) -> f64 {
        let mut sum = 0.0;
        let mut n_present = 0usize;
        for (q, d) in query.iter().zip(donor) {
            if let (false, Some(d)) = (q.is_nan(), d) {
                sum += (q - d) * (q - d);
                n_present += 1;
            }
        }
        if n_present == 0 {
            return f64::INFINITY;
        }
        (query.len() as f64 / n_present as f64 * sum).sqrt()
    }

    fn impute_row(&self, query: &mut [f64]) {
        let missing: Vec<usize> = (0..query.len()).filter(|&j| query[j].is_nan()).collect();
        if missing.is_empty() {
            return;
        }

        let distances: Vec<f64> = self
            .fit_rows
            .iter()
            .map(|donor| Self::distance(query, donor))
            .collect();

        for j in missing {
            let mut donors: Vec<(f64, usize)> = self
                .fit_rows
                .iter()
                .enumerate()
                .filter(|(idx, r)| r[j].is_some() && distances[*idx].is_finite())
                .map(|(idx, _)| (distances[idx], idx))
                .collect();

            if donors.is_empty() {
                query[j] = self.column_means[j];
                continue;
            }
            donors.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            donors.truncate(self.n_neighbors);

            let exact = donors.iter().any(|(d, _)| *d == 0.0);
            let (mut num, mut den) = (0.0, 0.0);
            for &(d, idx) in &donors {
                let w = match self.weights {
                    ImputerWeights::Uniform => 1.0,
                    ImputerWeights::Distance if exact => f64::from(d == 0.0),
                    ImputerWeights::Distance => 1.0 / d,
                };
                num += w * self.fit_rows[idx][j].unwrap_or(0.0);
                den += w;
            }
            query[j] = num / den;
        }
    }

    /// Fill every NaN cell of `x`
    pub fn transform(&self, x: &Mat<f64>) -> Result<Mat<f64>, MlError> {
        if !self.is_fitted() {
            return Err(MlError::NotFitted);
        }
        if x.ncols() != self.feature_names.len() {
            return Err(MlError::ShapeMismatch(format!(
                "imputer was fitted on {} features, got {}",
                self.feature_names.len(),
                x.ncols()
            )));
        }

        let rows: Vec<Vec<f64>> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let mut r = row(x, i);
                self.impute_row(&mut r);
                r
            })
            .collect();
        Ok(Mat::from_fn(x.nrows(), x.ncols(), |i, j| rows[i][j]))
    }

    pub fn fit_transform(&mut self, x: &Mat<f64>, feature_names: &[String]) -> Result<Mat<f64>, MlError> {
        self.fit(x, feature_names)?;
        self.transform(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|j| format!("f{}", j)).collect()
    }

    #[test]
    fn test_refit_gives_identical_output() {
        let nan = f64::NAN;
        let train = Mat::from_fn(6, 3, |i, j| if (i + j) % 4 == 0 { nan } else { (i * 3 + j) as f64 });
        let test = Mat::from_fn(3, 3, |i, j| if i == j { nan } else { (i + j) as f64 });

        let mut imputer = KnnImputer::new(3, ImputerWeights::Uniform);
        imputer.fit(&train, &names(3)).unwrap();
        let first = imputer.transform(&test).unwrap();
        imputer.fit(&train, &names(3)).unwrap();
        let second = imputer.transform(&test).unwrap();

        for i in 0..3 {
            for j in 0..3 {
                assert!(!first[(i, j)].is_nan());
                assert_eq!(first[(i, j)].to_bits(), second[(i, j)].to_bits());
            }
        }
    }

    #[test]
    fn test_fills_from_nearest_rows() {
        let nan = f64::NAN;
        let data = [
            [1.0, 10.0],
            [1.1, 12.0],
            [0.9, 14.0],
            [9.0, 100.0],
            [1.0, nan],
        ];
        let x = Mat::from_fn(5, 2, |i, j| data[i][j]);
        let mut imputer = KnnImputer::new(3, ImputerWeights::Uniform);
        let out = imputer.fit_transform(&x, &names(2)).unwrap();

        assert_eq!(out[(4, 1)], 12.0);
        assert_eq!(out[(3, 1)], 100.0, "present cells are untouched");
    }

    #[test]
    fn test_row_without_overlap_uses_column_mean() {
        let nan = f64::NAN;
        let x = Mat::from_fn(3, 2, |i, j| match (i, j) {
            (0, _) => 2.0,
            (1, _) => 4.0,
            _ => nan,
        });
        let mut imputer = KnnImputer::new(3, ImputerWeights::Uniform);
        let out = imputer.fit_transform(&x, &names(2)).unwrap();
        assert_eq!(out[(2, 0)], 3.0);
        assert_eq!(out[(2, 1)], 3.0);
    }

    #[test]
    fn test_column_without_values_becomes_zero() {
        let x = Mat::from_fn(2, 2, |_, j| if j == 0 { 1.0 } else { f64::NAN });
        let mut imputer = KnnImputer::new(3, ImputerWeights::Uniform);
        let out = imputer.fit_transform(&x, &names(2)).unwrap();
        assert_eq!(out[(0, 1)], 0.0);
    }

    #[test]
    fn test_survives_json_round_trip() {
        let x = Mat::from_fn(3, 1, |i, _| if i == 1 { f64::NAN } else { i as f64 });
        let mut imputer = KnnImputer::new(2, ImputerWeights::Uniform);
        imputer.fit(&x, &names(1)).unwrap();

        let json = serde_json::to_string(&imputer).unwrap();
        let restored: KnnImputer = serde_json::from_str(&json).unwrap();
        let a = imputer.transform(&x).unwrap();
        let b = restored.transform(&x).unwrap();
        assert_eq!(a[(1, 0)], b[(1, 0)]);
    }
}
