//! Batch prediction with the production model directory

use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::info;

use super::artifact::require_file;
use super::ml_failure;
use crate::config::{FINAL_PREPROCESSOR_FILE_NAME, MODEL_FILE_NAME};
use crate::error::{PipelineError, Result, Stage};
use crate::io::{columns_to_matrix, load_dataset, load_object, save_dataset};
use crate::ml::{KnnImputer, Model, NetworkModel};

const STAGE: Stage = Stage::Prediction;

/// Column appended to the input frame
pub const PREDICTION_COLUMN: &str = "predicted_column";
pub const PREDICTION_OUTPUT_DIR: &str = "prediction_output";
pub const PREDICTION_OUTPUT_FILE: &str = "output.csv";

/// Default output path for a prediction run
pub fn default_output_path() -> PathBuf {
    Path::new(PREDICTION_OUTPUT_DIR).join(PREDICTION_OUTPUT_FILE)
}

/// Load `preprocessor.json` and `model.json` from a model directory
pub fn load_network_model(model_dir: &Path) -> Result<NetworkModel> {
    let preprocessor_path = model_dir.join(FINAL_PREPROCESSOR_FILE_NAME);
    let model_path = model_dir.join(MODEL_FILE_NAME);
    require_file(STAGE, &preprocessor_path)?;
    require_file(STAGE, &model_path)?;

    let preprocessor: KnnImputer = load_object(&preprocessor_path, STAGE)?;
    let model: Model = load_object(&model_path, STAGE)?;
    if !preprocessor.is_fitted() {
        return Err(PipelineError::validation_at(STAGE, &preprocessor_path, "preprocessor is not fitted"));
    }
    Ok(NetworkModel::new(preprocessor, model))
}

/// Predict every row of `df`, reading features by name
pub fn predict_frame(network: &NetworkModel, df: &DataFrame) -> Result<Vec<f64>> {
    let features = network.feature_names();
    let missing: Vec<&String> = features.iter().filter(|f| df.column(f).is_err()).collect();
    if !missing.is_empty() {
        return Err(PipelineError::validation(
            STAGE,
            format!("input is missing feature columns {:?}", missing),
        ));
    }
    let x = columns_to_matrix(df, features, STAGE)?;
    network.predict(&x).map_err(|e| ml_failure(STAGE, e))
}

/// Predict a CSV file and write it back with a `predicted_column`.
///
/// Returns the number of rows written.
pub fn predict_file(model_dir: &Path, input: &Path, output: &Path) -> Result<usize> {
    require_file(STAGE, input)?;
    let network = load_network_model(model_dir)?;
    let mut df = load_dataset(input, STAGE)?;
    let predictions = predict_frame(&network, &df)?;

    df.with_column(Column::new(PREDICTION_COLUMN.into(), predictions))
        .map_err(|e| PipelineError::io(STAGE, input, e))?;
    save_dataset(&mut df, output, STAGE)?;
    info!(rows = df.height(), output = %output.display(), "predictions written");
    Ok(df.height())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_dir_is_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_network_model(dir.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Validation { stage: Stage::Prediction, .. }));
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(default_output_path(), PathBuf::from("prediction_output/output.csv"));
    }
}
