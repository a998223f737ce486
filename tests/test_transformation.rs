//! Tests for the transformation stage

use phishguard::config::{PipelineSettings, RunConfig, TransformationConfig, ValidationConfig};
use phishguard::io::{load_numpy_array, load_object};
use phishguard::ml::KnnImputer;
use phishguard::pipeline::{DataTransformation, DataValidation, ValidationArtifact};
use phishguard::{PipelineError, Stage};
use polars::prelude::*;

#[path = "common/mod.rs"]
mod common;

use common::*;

fn configs(root: &std::path::Path) -> (ValidationConfig, TransformationConfig) {
    let schema_path = root.join("schema.yaml");
    write_schema(&schema_path, &[]);
    let settings = PipelineSettings {
        schema_path,
        ..Default::default()
    };
    let run = RunConfig::with_timestamp("ts", &root.join("Artifacts"), &root.join("final_model"));
    (
        ValidationConfig::new(&run, &settings),
        TransformationConfig::new(&run, &settings),
    )
}

fn validated(root: &std::path::Path) -> (ValidationArtifact, TransformationConfig) {
    let ingestion = write_matching_splits(root, 51);
    let (validation_config, transformation_config) = configs(root);
    let artifact = DataValidation::new(validation_config).unwrap().run(&ingestion).unwrap();
    assert!(artifact.validation_status);
    (artifact, transformation_config)
}

#[test]
fn test_arrays_hold_imputed_features_and_binary_target() {
    let dir = tempfile::tempdir().unwrap();
    let (validation, config) = validated(dir.path());

    let artifact = DataTransformation::new(config.clone()).run(&validation).unwrap();

    let train = load_numpy_array(&artifact.transformed_train_file_path, Stage::Training).unwrap();
    let test = load_numpy_array(&artifact.transformed_test_file_path, Stage::Training).unwrap();
    assert_eq!((train.nrows(), train.ncols()), (204, FEATURES.len() + 1));
    assert_eq!((test.nrows(), test.ncols()), (51, FEATURES.len() + 1));

    for arr in [&train, &test] {
        for i in 0..arr.nrows() {
            for j in 0..arr.ncols() {
                assert!(!arr[(i, j)].is_nan(), "NaN left at ({}, {})", i, j);
            }
            let y = arr[(i, arr.ncols() - 1)];
            assert!(y == 0.0 || y == 1.0, "target {} not re-encoded", y);
        }
    }
}

#[test]
fn test_imputer_saved_to_stage_and_production_paths() {
    let dir = tempfile::tempdir().unwrap();
    let (validation, config) = validated(dir.path());
    let artifact = DataTransformation::new(config.clone()).run(&validation).unwrap();

    let staged: KnnImputer = load_object(&artifact.transformed_object_file_path, Stage::Prediction).unwrap();
    let production: KnnImputer = load_object(&config.final_preprocessor_file_path, Stage::Prediction).unwrap();
    assert!(staged.is_fitted());
    assert_eq!(staged.feature_names(), production.feature_names());
    assert!(!staged.feature_names().iter().any(|n| n == TARGET));
}

#[test]
fn test_failed_validation_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let (_, config) = configs(dir.path());
    let validation = ValidationArtifact {
        validation_status: false,
        valid_train_file_path: None,
        valid_test_file_path: None,
        invalid_train_file_path: Some(dir.path().join("invalid/train.csv")),
        invalid_test_file_path: Some(dir.path().join("invalid/test.csv")),
        drift_report_file_path: dir.path().join("report.yaml"),
    };

    let err = DataTransformation::new(config).run(&validation).unwrap_err();
    assert!(matches!(err, PipelineError::Validation { stage: Stage::Transformation, .. }));
}

#[test]
fn test_missing_target_column_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let (_, config) = configs(dir.path());
    let mut frame = phishing_dataframe(20, 1).drop(TARGET).unwrap();
    let train = dir.path().join("valid/train.csv");
    let test = dir.path().join("valid/test.csv");
    write_csv(&mut frame, &train);
    write_csv(&mut frame, &test);

    let validation = ValidationArtifact {
        validation_status: true,
        valid_train_file_path: Some(train),
        valid_test_file_path: Some(test),
        invalid_train_file_path: None,
        invalid_test_file_path: None,
        drift_report_file_path: dir.path().join("report.yaml"),
    };
    let err = DataTransformation::new(config).run(&validation).unwrap_err();
    assert!(err.to_string().contains("target column"));
}

#[test]
fn test_unexpected_label_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let (_, config) = configs(dir.path());
    let mut frame = phishing_dataframe(20, 1);
    frame
        .with_column(Column::new(TARGET.into(), vec![2i64; 20]))
        .unwrap();
    let train = dir.path().join("valid/train.csv");
    let test = dir.path().join("valid/test.csv");
    write_csv(&mut frame, &train);
    write_csv(&mut frame, &test);

    let validation = ValidationArtifact {
        validation_status: true,
        valid_train_file_path: Some(train),
        valid_test_file_path: Some(test),
        invalid_train_file_path: None,
        invalid_test_file_path: None,
        drift_report_file_path: dir.path().join("report.yaml"),
    };
    let err = DataTransformation::new(config).run(&validation).unwrap_err();
    assert!(matches!(err, PipelineError::Validation { .. }));
}
