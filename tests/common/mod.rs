//! Shared test utilities and fixture generators

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use phishguard::config::{PipelineSettings, DATA_INGESTION_COLLECTION_NAME, DATA_INGESTION_DATABASE_NAME};
use phishguard::pipeline::IngestionArtifact;
use phishguard::store::{Document, DocumentStore, JsonDocumentStore};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use tempfile::TempDir;

/// Feature columns of the fixture data, a subset of the real phishing schema
pub const FEATURES: [&str; 5] = [
    "having_IP_Address",
    "URL_Length",
    "SSLfinal_State",
    "URL_of_Anchor",
    "web_traffic",
];
pub const TARGET: &str = "Result";

/// Every 17th row has no `URL_Length`
fn is_missing(row: usize) -> bool {
    row % 17 == 5
}

/// Feature values in {-1, 0, 1} per row; `None` marks a missing cell
fn fixture_rows(rows: usize, seed: u64) -> Vec<(Vec<Option<i64>>, i64)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..rows)
        .map(|i| {
            let features: Vec<Option<i64>> = FEATURES
                .iter()
                .enumerate()
                .map(|(j, _)| {
                    let v = rng.gen_range(-1i64..=1);
                    if j == 1 && is_missing(i) {
                        None
                    } else {
                        Some(v)
                    }
                })
                .collect();
            // SSL state and anchor quality decide the label
            let score = features[2].unwrap_or(0) + features[3].unwrap_or(0);
            let label = if score >= 0 { 1 } else { -1 };
            (features, label)
        })
        .collect()
}

/// Phishing-like frame: discrete features, `Result` in {-1, 1}
pub fn phishing_dataframe(rows: usize, seed: u64) -> DataFrame {
    let data = fixture_rows(rows, seed);
    let mut columns: Vec<Column> = FEATURES
        .iter()
        .enumerate()
        .map(|(j, name)| Column::new((*name).into(), data.iter().map(|(f, _)| f[j]).collect::<Vec<_>>()))
        .collect();
    columns.push(Column::new(TARGET.into(), data.iter().map(|(_, y)| *y).collect::<Vec<_>>()));
    DataFrame::new(columns).unwrap()
}

/// Same rows as [`phishing_dataframe`], as store documents with `"na"` for missing cells
pub fn phishing_documents(rows: usize, seed: u64) -> Vec<Document> {
    fixture_rows(rows, seed)
        .into_iter()
        .enumerate()
        .map(|(i, (features, label))| {
            let mut doc = Document::new();
            doc.insert("_id".to_string(), json!(format!("{:024x}", i)));
            for (name, value) in FEATURES.iter().zip(features) {
                doc.insert(name.to_string(), value.map_or(json!("na"), Value::from));
            }
            doc.insert(TARGET.to_string(), json!(label));
            doc
        })
        .collect()
}

/// Fill the default collection of a store rooted at `root`
pub fn seed_store(root: &Path, rows: usize, seed: u64) -> JsonDocumentStore {
    let store = JsonDocumentStore::new(root);
    store
        .insert_many(
            DATA_INGESTION_DATABASE_NAME,
            DATA_INGESTION_COLLECTION_NAME,
            &phishing_documents(rows, seed),
        )
        .unwrap();
    store
}

/// Write a schema declaring the fixture columns plus `extra`
pub fn write_schema(path: &Path, extra: &[&str]) {
    let names: Vec<&str> = FEATURES.iter().copied().chain([TARGET]).chain(extra.iter().copied()).collect();
    let mut yaml = String::from("columns:\n");
    for name in &names {
        yaml.push_str(&format!("  - {}: int64\n", name));
    }
    yaml.push_str("numerical_columns:\n");
    for name in &names {
        yaml.push_str(&format!("  - {}\n", name));
    }
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, yaml).unwrap();
}

/// Settings with every directory inside `root` and a seeded split.
///
/// Fixture features are discrete, so a tiny drift threshold keeps chance
/// splits from failing validation.
pub fn test_settings(root: &Path) -> PipelineSettings {
    let schema_path = root.join("data_schema").join("schema.yaml");
    write_schema(&schema_path, &[]);
    PipelineSettings {
        store_dir: root.join("store"),
        schema_path,
        artifact_dir: root.join("Artifacts"),
        model_dir: root.join("final_model"),
        tracking_dir: root.join("mlruns"),
        split_seed: Some(42),
        drift_threshold: 1e-4,
        ..Default::default()
    }
}

/// Train/test CSVs whose test split repeats the train rows, so no column can drift
pub fn write_matching_splits(dir: &Path, rows: usize) -> IngestionArtifact {
    let base = phishing_dataframe(rows, 7);
    let mut train = base.vstack(&base).unwrap().vstack(&base).unwrap().vstack(&base).unwrap();
    let mut test = base.clone();

    let train_path = dir.join("ingested").join("train.csv");
    let test_path = dir.join("ingested").join("test.csv");
    write_csv(&mut train, &train_path);
    write_csv(&mut test, &test_path);
    IngestionArtifact {
        trained_file_path: train_path,
        test_file_path: test_path,
    }
}

pub fn write_csv(df: &mut DataFrame, path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut file = std::fs::File::create(path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();
}

/// Create a temporary directory with a test CSV file
pub fn create_temp_csv(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("test_data.csv");
    write_csv(df, &csv_path);
    (temp_dir, csv_path)
}

pub fn read_csv(path: &Path) -> DataFrame {
    phishguard::io::load_dataset(path, phishguard::Stage::Ingestion).unwrap()
}

/// Assert that a DataFrame has expected shape
pub fn assert_shape(df: &DataFrame, expected_rows: usize, expected_cols: usize) {
    let (rows, cols) = df.shape();
    assert_eq!(rows, expected_rows, "Row count mismatch: expected {}, got {}", expected_rows, rows);
    assert_eq!(cols, expected_cols, "Column count mismatch: expected {}, got {}", expected_cols, cols);
}

/// Assert that a DataFrame contains specific columns
pub fn assert_has_columns(df: &DataFrame, expected_cols: &[&str]) {
    let actual_cols: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    for col in expected_cols {
        assert!(
            actual_cols.contains(&col.to_string()),
            "Missing expected column: '{}'. Actual columns: {:?}",
            col,
            actual_cols
        );
    }
}
