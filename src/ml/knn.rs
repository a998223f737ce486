//! k-nearest-neighbors classifier (euclidean, brute force)

use faer::Mat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{check_training_data, check_width, row, Classifier, MlError};

/// Vote weighting of the neighbors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborWeights {
    Uniform,
    /// Inverse distance; exact matches take the whole vote
    Distance,
}

impl NeighborWeights {
    pub fn parse(name: &str) -> Result<Self, MlError> {
        match name {
            "uniform" => Ok(NeighborWeights::Uniform),
            "distance" => Ok(NeighborWeights::Distance),
            other => Err(MlError::InvalidParam {
                name: "weights".to_string(),
                reason: format!("unknown weighting '{}'", other),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNearestNeighbors {
    pub n_neighbors: usize,
    pub weights: NeighborWeights,
    train_rows: Vec<Vec<f64>>,
    train_labels: Vec<f64>,
}

impl Default for KNearestNeighbors {
    fn default() -> Self {
        Self::new(5, NeighborWeights::Uniform)
    }
}

impl KNearestNeighbors {
    pub fn new(n_neighbors: usize, weights: NeighborWeights) -> Self {
        Self {
            n_neighbors,
            weights,
            train_rows: Vec::new(),
            train_labels: Vec::new(),
        }
    }

    fn classify(&self, query: &[f64]) -> f64 {
        let mut dists: Vec<(f64, usize)> = self
            .train_rows
            .iter()
            .enumerate()
            .map(|(idx, r)| {
                let d2: f64 = r.iter().zip(query).map(|(a, b)| (a - b) * (a - b)).sum();
                (d2.sqrt(), idx)
            })
            .collect();
        dists.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        let neighbors = &dists[..self.n_neighbors];

        let (mut pos, mut neg) = (0.0, 0.0);
        let exact = neighbors.iter().any(|(d, _)| *d == 0.0);
        for &(d, idx) in neighbors {
            let w = match self.weights {
                NeighborWeights::Uniform => 1.0,
                NeighborWeights::Distance if exact => {
                    if d == 0.0 {
                        1.0
                    } else {
                        0.0
                    }
                }
                NeighborWeights::Distance => 1.0 / d,
            };
            if self.train_labels[idx] > 0.5 {
                pos += w;
            } else {
                neg += w;
            }
        }
        // ties go to the smaller label
        if pos > neg {
            1.0
        } else {
            0.0
        }
    }
}

impl Classifier for KNearestNeighbors {
    fn fit(&mut self, x: &Mat<f64>, y: &[f64]) -> Result<(), MlError> {
        check_training_data(x, y)?;
        if self.n_neighbors == 0 || self.n_neighbors > y.len() {
            return Err(MlError::InvalidParam {
                name: "n_neighbors".to_string(),
                reason: format!("must be in 1..={}, got {}", y.len(), self.n_neighbors),
            });
        }
        self.train_rows = (0..x.nrows()).map(|i| row(x, i)).collect();
        self.train_labels = y.to_vec();
        Ok(())
    }

    fn predict(&self, x: &Mat<f64>) -> Result<Vec<f64>, MlError> {
        let Some(first) = self.train_rows.first() else {
            return Err(MlError::NotFitted);
        };
        check_width(x, first.len())?;

        let queries: Vec<Vec<f64>> = (0..x.nrows()).map(|i| row(x, i)).collect();
        Ok(queries.par_iter().map(|q| self.classify(q)).collect())
    }
}
