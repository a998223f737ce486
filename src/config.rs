//! Run configuration: constants, user settings and the per-run path tree.
//!
//! Every path a stage reads or writes is derived from one [`RunConfig`], which
//! is keyed by the process-start timestamp. Nothing here touches the file
//! system; writers create parent directories on demand.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result, Stage, StageContext};

pub const TARGET_COLUMN: &str = "Result";
pub const PIPELINE_NAME: &str = "NetworkSecurity";
pub const ARTIFACT_DIR: &str = "Artifacts";
pub const FINAL_MODEL_DIR: &str = "final_model";
pub const FILE_NAME: &str = "phishingData.csv";
pub const TRAIN_FILE_NAME: &str = "train.csv";
pub const TEST_FILE_NAME: &str = "test.csv";
pub const SCHEMA_FILE_PATH: &str = "data_schema/schema.yaml";
pub const TIMESTAMP_FORMAT: &str = "%m_%d_%Y_%H_%M_%S";

pub const DATA_INGESTION_DATABASE_NAME: &str = "ML_AI_Journey";
pub const DATA_INGESTION_COLLECTION_NAME: &str = "NetworkData";
pub const DATA_INGESTION_DIR_NAME: &str = "data_ingestion";
pub const DATA_INGESTION_FEATURE_STORE_DIR: &str = "feature_store";
pub const DATA_INGESTION_INGESTED_DIR: &str = "ingested";
pub const DATA_INGESTION_TRAIN_TEST_SPLIT_RATIO: f64 = 0.2;

pub const DATA_VALIDATION_DIR_NAME: &str = "data_validation";
pub const DATA_VALIDATION_VALID_DIR: &str = "validated";
pub const DATA_VALIDATION_INVALID_DIR: &str = "invalid";
pub const DATA_VALIDATION_DRIFT_REPORT_DIR: &str = "drift_report";
pub const DATA_VALIDATION_DRIFT_REPORT_FILE_NAME: &str = "report.yaml";
pub const DATA_VALIDATION_DRIFT_THRESHOLD: f64 = 0.05;

pub const DATA_TRANSFORMATION_DIR_NAME: &str = "data_transformation";
pub const DATA_TRANSFORMATION_TRANSFORMED_DATA_DIR: &str = "transformed";
pub const DATA_TRANSFORMATION_TRANSFORMED_OBJECT_DIR: &str = "transformed_object";
pub const PREPROCESSING_OBJECT_FILE_NAME: &str = "preprocessing.json";
pub const FINAL_PREPROCESSOR_FILE_NAME: &str = "preprocessor.json";
pub const IMPUTER_NEIGHBORS: usize = 3;

pub const MODEL_TRAINER_DIR_NAME: &str = "model_trainer";
pub const MODEL_TRAINER_TRAINED_MODEL_DIR: &str = "trained_model";
pub const MODEL_FILE_NAME: &str = "model.json";
pub const MODEL_TRAINER_EXPECTED_SCORE: f64 = 0.6;
pub const MODEL_TRAINER_OVERFITTING_THRESHOLD: f64 = 0.05;
pub const MODEL_TRAINER_CV_FOLDS: usize = 3;
pub const MODEL_TRAINER_RANDOM_STATE: u64 = 42;

pub const TRACKING_DIR: &str = "mlruns";
pub const EXPERIMENT_NAME: &str = "network_security_experiment";
pub const LOG_DIR: &str = "logs";
pub const STORE_DIR: &str = "data_store";
pub const STORE_DIR_ENV: &str = "DOCUMENT_STORE_DIR";

/// Tunable knobs for a pipeline run.
///
/// Defaults mirror the constants above. A YAML file may override any subset
/// of fields; CLI flags are applied last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub store_dir: PathBuf,
    pub database: String,
    pub collection: String,
    pub schema_path: PathBuf,
    pub artifact_dir: PathBuf,
    pub model_dir: PathBuf,
    pub tracking_dir: PathBuf,
    pub experiment_name: String,
    pub target_column: String,
    pub test_ratio: f64,
    /// `None` draws the split from an unseeded generator
    pub split_seed: Option<u64>,
    pub drift_threshold: f64,
    pub imputer_neighbors: usize,
    pub cv_folds: usize,
    pub random_state: u64,
    pub expected_score: f64,
    pub overfitting_threshold: f64,
    /// Bucket for the trailing remote sync; `None` skips it
    pub bucket: Option<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from(STORE_DIR),
            database: DATA_INGESTION_DATABASE_NAME.to_string(),
            collection: DATA_INGESTION_COLLECTION_NAME.to_string(),
            schema_path: PathBuf::from(SCHEMA_FILE_PATH),
            artifact_dir: PathBuf::from(ARTIFACT_DIR),
            model_dir: PathBuf::from(FINAL_MODEL_DIR),
            tracking_dir: PathBuf::from(TRACKING_DIR),
            experiment_name: EXPERIMENT_NAME.to_string(),
            target_column: TARGET_COLUMN.to_string(),
            test_ratio: DATA_INGESTION_TRAIN_TEST_SPLIT_RATIO,
            split_seed: None,
            drift_threshold: DATA_VALIDATION_DRIFT_THRESHOLD,
            imputer_neighbors: IMPUTER_NEIGHBORS,
            cv_folds: MODEL_TRAINER_CV_FOLDS,
            random_state: MODEL_TRAINER_RANDOM_STATE,
            expected_score: MODEL_TRAINER_EXPECTED_SCORE,
            overfitting_threshold: MODEL_TRAINER_OVERFITTING_THRESHOLD,
            bucket: None,
        }
    }
}

impl PipelineSettings {
    /// Load settings from a YAML file; missing fields keep their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).at_path(Stage::Ingestion, path)?;
        let settings: Self = serde_yaml::from_str(&content).at_path(Stage::Ingestion, path)?;
        settings.check()?;
        Ok(settings)
    }

    /// Reject values no stage can work with.
    pub fn check(&self) -> Result<()> {
        if !(self.test_ratio > 0.0 && self.test_ratio < 1.0) {
            return Err(PipelineError::validation(
                Stage::Ingestion,
                format!("test_ratio must be in (0, 1), got {}", self.test_ratio),
            ));
        }
        if !(0.0..=1.0).contains(&self.drift_threshold) {
            return Err(PipelineError::validation(
                Stage::Validation,
                format!("drift_threshold must be in [0, 1], got {}", self.drift_threshold),
            ));
        }
        if self.imputer_neighbors == 0 {
            return Err(PipelineError::validation(
                Stage::Transformation,
                "imputer_neighbors must be at least 1",
            ));
        }
        if self.cv_folds < 2 {
            return Err(PipelineError::validation(
                Stage::Training,
                format!("cv_folds must be at least 2, got {}", self.cv_folds),
            ));
        }
        Ok(())
    }
}

/// Root of one pipeline run: `<artifact_dir>/<timestamp>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub pipeline_name: String,
    pub timestamp: String,
    pub artifact_dir: PathBuf,
    pub model_dir: PathBuf,
}

impl RunConfig {
    pub fn new(timestamp: DateTime<Local>, artifact_root: &Path, model_dir: &Path) -> Self {
        Self::with_timestamp(&timestamp.format(TIMESTAMP_FORMAT).to_string(), artifact_root, model_dir)
    }

    /// Build from an already formatted timestamp
    pub fn with_timestamp(timestamp: &str, artifact_root: &Path, model_dir: &Path) -> Self {
        Self {
            pipeline_name: PIPELINE_NAME.to_string(),
            timestamp: timestamp.to_string(),
            artifact_dir: artifact_root.join(timestamp),
            model_dir: model_dir.to_path_buf(),
        }
    }

    fn stage_dir(&self, name: &str) -> PathBuf {
        self.artifact_dir.join(name)
    }
}

#[derive(Debug, Clone)]
pub struct IngestionConfig {
    pub data_ingestion_dir: PathBuf,
    pub feature_store_file_path: PathBuf,
    pub training_file_path: PathBuf,
    pub testing_file_path: PathBuf,
    pub database_name: String,
    pub collection_name: String,
    pub train_test_split_ratio: f64,
    pub split_seed: Option<u64>,
}

impl IngestionConfig {
    pub fn new(run: &RunConfig, settings: &PipelineSettings) -> Self {
        let dir = run.stage_dir(DATA_INGESTION_DIR_NAME);
        let ingested = dir.join(DATA_INGESTION_INGESTED_DIR);
        Self {
            feature_store_file_path: dir.join(DATA_INGESTION_FEATURE_STORE_DIR).join(FILE_NAME),
            training_file_path: ingested.join(TRAIN_FILE_NAME),
            testing_file_path: ingested.join(TEST_FILE_NAME),
            data_ingestion_dir: dir,
            database_name: settings.database.clone(),
            collection_name: settings.collection.clone(),
            train_test_split_ratio: settings.test_ratio,
            split_seed: settings.split_seed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub data_validation_dir: PathBuf,
    pub valid_train_file_path: PathBuf,
    pub valid_test_file_path: PathBuf,
    pub invalid_train_file_path: PathBuf,
    pub invalid_test_file_path: PathBuf,
    pub drift_report_file_path: PathBuf,
    pub schema_file_path: PathBuf,
    pub drift_threshold: f64,
}

impl ValidationConfig {
    pub fn new(run: &RunConfig, settings: &PipelineSettings) -> Self {
        let dir = run.stage_dir(DATA_VALIDATION_DIR_NAME);
        let valid = dir.join(DATA_VALIDATION_VALID_DIR);
        let invalid = dir.join(DATA_VALIDATION_INVALID_DIR);
        Self {
            valid_train_file_path: valid.join(TRAIN_FILE_NAME),
            valid_test_file_path: valid.join(TEST_FILE_NAME),
            invalid_train_file_path: invalid.join(TRAIN_FILE_NAME),
            invalid_test_file_path: invalid.join(TEST_FILE_NAME),
            drift_report_file_path: dir
                .join(DATA_VALIDATION_DRIFT_REPORT_DIR)
                .join(DATA_VALIDATION_DRIFT_REPORT_FILE_NAME),
            data_validation_dir: dir,
            schema_file_path: settings.schema_path.clone(),
            drift_threshold: settings.drift_threshold,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransformationConfig {
    pub data_transformation_dir: PathBuf,
    pub transformed_train_file_path: PathBuf,
    pub transformed_test_file_path: PathBuf,
    pub transformed_object_file_path: PathBuf,
    pub final_preprocessor_file_path: PathBuf,
    pub target_column: String,
    pub imputer_neighbors: usize,
}

impl TransformationConfig {
    pub fn new(run: &RunConfig, settings: &PipelineSettings) -> Self {
        let dir = run.stage_dir(DATA_TRANSFORMATION_DIR_NAME);
        let transformed = dir.join(DATA_TRANSFORMATION_TRANSFORMED_DATA_DIR);
        Self {
            transformed_train_file_path: transformed.join(TRAIN_FILE_NAME.replace("csv", "npy")),
            transformed_test_file_path: transformed.join(TEST_FILE_NAME.replace("csv", "npy")),
            transformed_object_file_path: dir
                .join(DATA_TRANSFORMATION_TRANSFORMED_OBJECT_DIR)
                .join(PREPROCESSING_OBJECT_FILE_NAME),
            final_preprocessor_file_path: run.model_dir.join(FINAL_PREPROCESSOR_FILE_NAME),
            data_transformation_dir: dir,
            target_column: settings.target_column.clone(),
            imputer_neighbors: settings.imputer_neighbors,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainerConfig {
    pub model_trainer_dir: PathBuf,
    pub trained_model_file_path: PathBuf,
    pub final_model_file_path: PathBuf,
    pub cv_folds: usize,
    pub random_state: u64,
    pub expected_score: f64,
    pub overfitting_threshold: f64,
}

impl TrainerConfig {
    pub fn new(run: &RunConfig, settings: &PipelineSettings) -> Self {
        let dir = run.stage_dir(MODEL_TRAINER_DIR_NAME);
        Self {
            trained_model_file_path: dir.join(MODEL_TRAINER_TRAINED_MODEL_DIR).join(MODEL_FILE_NAME),
            final_model_file_path: run.model_dir.join(MODEL_FILE_NAME),
            model_trainer_dir: dir,
            cv_folds: settings.cv_folds,
            random_state: settings.random_state,
            expected_score: settings.expected_score,
            overfitting_threshold: settings.overfitting_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_pass_check() {
        assert!(PipelineSettings::default().check().is_ok());
    }

    #[test]
    fn test_check_rejects_bad_ratio() {
        let settings = PipelineSettings {
            test_ratio: 1.0,
            ..Default::default()
        };
        assert!(settings.check().is_err());
    }
}
