//! Machine-learning core: imputation, classifiers, hyperparameter search.
//!
//! All estimators work on dense `faer::Mat<f64>` feature matrices and `f64`
//! label slices holding binary 0/1 classes.

pub mod adaboost;
pub mod boosting;
pub mod estimator;
pub mod forest;
pub mod grid;
pub mod imputer;
pub mod knn;
pub mod logistic;
pub mod metrics;
pub mod model;
pub mod tree;

pub use adaboost::AdaBoost;
pub use boosting::{GradientBoosting, XgBoost};
pub use estimator::NetworkModel;
pub use forest::RandomForest;
pub use grid::{expand_grid, stratified_folds, CandidateScore, GridSearch, SearchResult};
pub use imputer::{ImputerWeights, KnnImputer};
pub use knn::{KNearestNeighbors, NeighborWeights};
pub use logistic::LogisticRegression;
pub use metrics::{accuracy, classification_score, ClassificationMetrics};
pub use model::{Model, ModelFamily, ParamGrid, Params};
pub use tree::{Criterion, DecisionTree, RegressionTree};

use faer::Mat;
use thiserror::Error;

/// Errors raised while fitting or applying an estimator.
#[derive(Debug, Error)]
pub enum MlError {
    #[error("cannot fit on an empty dataset")]
    EmptyInput,

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("labels must be binary 0/1, found {0}")]
    NonBinaryLabels(f64),

    #[error("invalid hyperparameter '{name}': {reason}")]
    InvalidParam { name: String, reason: String },

    #[error("estimator is not fitted")]
    NotFitted,

    #[error("numerical failure: {0}")]
    Numeric(String),
}

/// Common interface of every classifier in the roster
pub trait Classifier {
    fn fit(&mut self, x: &Mat<f64>, y: &[f64]) -> Result<(), MlError>;
    fn predict(&self, x: &Mat<f64>) -> Result<Vec<f64>, MlError>;
}

/// Check that `x` and `y` agree in length and that `y` is binary.
pub(crate) fn check_training_data(x: &Mat<f64>, y: &[f64]) -> Result<(), MlError> {
    if x.nrows() == 0 || y.is_empty() {
        return Err(MlError::EmptyInput);
    }
    if x.nrows() != y.len() {
        return Err(MlError::ShapeMismatch(format!(
            "{} feature rows but {} labels",
            x.nrows(),
            y.len()
        )));
    }
    if let Some(&bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
        return Err(MlError::NonBinaryLabels(bad));
    }
    Ok(())
}

/// Check the feature width of a prediction input
pub(crate) fn check_width(x: &Mat<f64>, expected: usize) -> Result<(), MlError> {
    if x.ncols() != expected {
        return Err(MlError::ShapeMismatch(format!(
            "model was fitted on {} features, got {}",
            expected,
            x.ncols()
        )));
    }
    Ok(())
}

/// Copy one row of a matrix
pub fn row(x: &Mat<f64>, i: usize) -> Vec<f64> {
    (0..x.ncols()).map(|j| x[(i, j)]).collect()
}

/// Gather a subset of rows into a new matrix
pub fn take_rows(x: &Mat<f64>, rows: &[usize]) -> Mat<f64> {
    Mat::from_fn(rows.len(), x.ncols(), |i, j| x[(rows[i], j)])
}

/// Build a matrix from row vectors; all rows must have `cols` entries
pub fn from_rows(rows: &[Vec<f64>], cols: usize) -> Mat<f64> {
    Mat::from_fn(rows.len(), cols, |i, j| rows[i][j])
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
