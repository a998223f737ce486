//! Tests for batch prediction with the production model directory

use std::path::Path;

use phishguard::config::RunConfig;
use phishguard::ml::ModelFamily;
use phishguard::pipeline::{predict_file, PREDICTION_COLUMN};
use phishguard::store::JsonDocumentStore;
use phishguard::{PipelineError, Stage, TrainingPipeline};
use tempfile::TempDir;

#[path = "common/mod.rs"]
mod common;

use common::*;

/// Train on the fixture store and return the model directory
fn train(root: &Path) -> std::path::PathBuf {
    let settings = test_settings(root);
    seed_store(&settings.store_dir, 200, 21);
    let model_dir = settings.model_dir.clone();
    let run = RunConfig::with_timestamp("05_06_2026_07_08_09", &settings.artifact_dir, &settings.model_dir);
    let store = Box::new(JsonDocumentStore::new(&settings.store_dir));
    TrainingPipeline::new(settings, run, store)
        .with_roster(vec![ModelFamily::DecisionTree, ModelFamily::LogisticRegression])
        .run_pipeline()
        .unwrap();
    model_dir
}

#[test]
fn test_predict_appends_binary_column() {
    let temp_dir = TempDir::new().unwrap();
    let model_dir = train(temp_dir.path());

    let df = phishing_dataframe(40, 99);
    let truth: Vec<i64> = df.column(TARGET).unwrap().i64().unwrap().into_no_null_iter().collect();
    let mut df = df.drop(TARGET).unwrap();
    let input = temp_dir.path().join("incoming.csv");
    write_csv(&mut df, &input);
    let output = temp_dir.path().join("prediction_output").join("output.csv");

    let rows = predict_file(&model_dir, &input, &output).unwrap();
    assert_eq!(rows, 40);

    let predicted = read_csv(&output);
    assert_shape(&predicted, 40, FEATURES.len() + 1);
    assert_has_columns(&predicted, &[PREDICTION_COLUMN]);

    let values = phishguard::io::column_as_f64(&predicted, PREDICTION_COLUMN, Stage::Prediction).unwrap();
    assert!(values.iter().all(|&v| v == 0.0 || v == 1.0));
    let correct = values
        .iter()
        .zip(&truth)
        .filter(|(p, t)| (**p == 1.0) == (**t == 1))
        .count();
    assert!(correct as f64 / 40.0 > 0.8, "only {} of 40 correct", correct);
}

#[test]
fn test_predict_ignores_extra_columns() {
    let temp_dir = TempDir::new().unwrap();
    let model_dir = train(temp_dir.path());

    // the target column is still present; it is carried through untouched
    let mut df = phishing_dataframe(10, 3);
    let (_dir, input) = create_temp_csv(&mut df);
    let output = temp_dir.path().join("out.csv");

    predict_file(&model_dir, &input, &output).unwrap();
    let predicted = read_csv(&output);
    assert_shape(&predicted, 10, FEATURES.len() + 2);
    assert_has_columns(&predicted, &[TARGET, PREDICTION_COLUMN]);
}

#[test]
fn test_missing_feature_column_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let model_dir = train(temp_dir.path());

    let mut df = phishing_dataframe(10, 3).drop("SSLfinal_State").unwrap();
    let (_dir, input) = create_temp_csv(&mut df);
    let output = temp_dir.path().join("out.csv");

    let err = predict_file(&model_dir, &input, &output).unwrap_err();
    assert!(matches!(err, PipelineError::Validation { stage: Stage::Prediction, .. }));
    assert!(err.to_string().contains("SSLfinal_State"));
    assert!(!output.exists());
}

#[test]
fn test_missing_model_dir_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let mut df = phishing_dataframe(5, 1);
    let (_dir, input) = create_temp_csv(&mut df);

    let err = predict_file(&temp_dir.path().join("final_model"), &input, &temp_dir.path().join("o.csv")).unwrap_err();
    assert_eq!(err.stage(), Stage::Prediction);
}
