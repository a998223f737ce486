//! Servable bundle of a fitted imputer and a fitted classifier

use faer::Mat;
use serde::{Deserialize, Serialize};

use super::{Classifier, KnnImputer, MlError, Model};

/// Imputes raw features, then classifies them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkModel {
    pub preprocessor: KnnImputer,
    pub model: Model,
}

impl NetworkModel {
    pub fn new(preprocessor: KnnImputer, model: Model) -> Self {
        Self { preprocessor, model }
    }

    /// Feature columns the bundle expects, in order
    pub fn feature_names(&self) -> &[String] {
        self.preprocessor.feature_names()
    }

    /// Predict 0/1 labels for raw rows that may contain NaN cells
    pub fn predict(&self, raw: &Mat<f64>) -> Result<Vec<f64>, MlError> {
        let imputed = self.preprocessor.transform(raw)?;
        self.model.predict(&imputed)
    }
}
