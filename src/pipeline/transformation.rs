//! Data transformation: target re-encoding, KNN imputation, array export.
//!
//! The imputer is fitted on the training features only and then applied
//! unchanged to the test features.

use std::collections::BTreeSet;

use faer::Mat;
use polars::prelude::*;
use tracing::{debug, info};

use super::artifact::{require_file, TransformationArtifact, ValidationArtifact};
use super::ml_failure;
use crate::config::TransformationConfig;
use crate::error::{PipelineError, Result, Stage};
use crate::io::{column_as_f64, column_names, columns_to_matrix, load_dataset, save_numpy_array, save_object};
use crate::ml::{ImputerWeights, KnnImputer};

const STAGE: Stage = Stage::Transformation;

/// Map the label `-1` to `0`; anything other than 0/1 afterwards is an error
pub fn encode_target(values: &[f64]) -> Result<Vec<f64>> {
    values
        .iter()
        .map(|&v| {
            let v = if v == -1.0 { 0.0 } else { v };
            if v == 0.0 || v == 1.0 {
                Ok(v)
            } else {
                Err(PipelineError::validation(
                    STAGE,
                    format!("target must hold -1/0/1 labels, found {}", v),
                ))
            }
        })
        .collect()
}

/// Append `target` as the last column of `features`
pub fn concat_target(features: &Mat<f64>, target: &[f64]) -> Mat<f64> {
    let d = features.ncols();
    Mat::from_fn(features.nrows(), d + 1, |i, j| if j < d { features[(i, j)] } else { target[i] })
}

pub struct DataTransformation {
    config: TransformationConfig,
}

impl DataTransformation {
    pub fn new(config: TransformationConfig) -> Self {
        Self { config }
    }

    /// Fresh, unfitted imputer
    pub fn get_data_transformer_object(&self) -> KnnImputer {
        KnnImputer::new(self.config.imputer_neighbors, ImputerWeights::Uniform)
    }

    fn feature_columns(&self, train: &DataFrame, test: &DataFrame) -> Result<Vec<String>> {
        let target = &self.config.target_column;
        for (df, split) in [(train, "train"), (test, "test")] {
            if df.column(target).is_err() {
                return Err(PipelineError::validation(
                    STAGE,
                    format!("{} split has no target column '{}'", split, target),
                ));
            }
        }

        let features: Vec<String> = column_names(train).into_iter().filter(|c| c != target).collect();
        let train_set: BTreeSet<&String> = features.iter().collect();
        let test_names: Vec<String> = column_names(test).into_iter().filter(|c| c != target).collect();
        let test_set: BTreeSet<&String> = test_names.iter().collect();
        if train_set != test_set {
            return Err(PipelineError::validation(
                STAGE,
                format!(
                    "train and test feature columns differ: only in train {:?}, only in test {:?}",
                    train_set.difference(&test_set).collect::<Vec<_>>(),
                    test_set.difference(&train_set).collect::<Vec<_>>()
                ),
            ));
        }
        if features.is_empty() {
            return Err(PipelineError::validation(STAGE, "no feature columns besides the target"));
        }
        Ok(features)
    }

    pub fn run(&self, validation: &ValidationArtifact) -> Result<TransformationArtifact> {
        info!("data transformation started");
        if !validation.validation_status {
            return Err(PipelineError::validation_at(
                STAGE,
                &validation.drift_report_file_path,
                "data validation did not pass; refusing to transform invalid data",
            ));
        }
        let (Some(train_path), Some(test_path)) =
            (&validation.valid_train_file_path, &validation.valid_test_file_path)
        else {
            return Err(PipelineError::validation(STAGE, "validation artifact has no valid file paths"));
        };
        require_file(STAGE, train_path)?;
        require_file(STAGE, test_path)?;

        let train = load_dataset(train_path, STAGE)?;
        let test = load_dataset(test_path, STAGE)?;
        debug!(train = ?train.shape(), test = ?test.shape(), "validated splits loaded");

        let features = self.feature_columns(&train, &test)?;
        let y_train = encode_target(&column_as_f64(&train, &self.config.target_column, STAGE)?)?;
        let y_test = encode_target(&column_as_f64(&test, &self.config.target_column, STAGE)?)?;
        let x_train = columns_to_matrix(&train, &features, STAGE)?;
        let x_test = columns_to_matrix(&test, &features, STAGE)?;

        let mut imputer = self.get_data_transformer_object();
        let x_train = imputer
            .fit_transform(&x_train, &features)
            .map_err(|e| ml_failure(STAGE, e))?;
        let x_test = imputer.transform(&x_test).map_err(|e| ml_failure(STAGE, e))?;

        let train_arr = concat_target(&x_train, &y_train);
        let test_arr = concat_target(&x_test, &y_test);
        save_numpy_array(&self.config.transformed_train_file_path, &train_arr, STAGE)?;
        save_numpy_array(&self.config.transformed_test_file_path, &test_arr, STAGE)?;

        save_object(&self.config.transformed_object_file_path, &imputer, STAGE)?;
        save_object(&self.config.final_preprocessor_file_path, &imputer, STAGE)?;

        let artifact = TransformationArtifact {
            transformed_object_file_path: self.config.transformed_object_file_path.clone(),
            transformed_train_file_path: self.config.transformed_train_file_path.clone(),
            transformed_test_file_path: self.config.transformed_test_file_path.clone(),
        };
        info!(?artifact, features = features.len(), "data transformation finished");
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_target_maps_minus_one() {
        assert_eq!(encode_target(&[-1.0, 1.0, 0.0]).unwrap(), vec![0.0, 1.0, 0.0]);
        assert!(encode_target(&[2.0]).is_err());
        assert!(encode_target(&[f64::NAN]).is_err());
    }

    #[test]
    fn test_concat_target_appends_last_column() {
        let x = Mat::from_fn(2, 2, |i, j| (i * 2 + j) as f64);
        let arr = concat_target(&x, &[1.0, 0.0]);
        assert_eq!(arr.ncols(), 3);
        assert_eq!(arr[(0, 2)], 1.0);
        assert_eq!(arr[(1, 1)], 3.0);
    }
}
