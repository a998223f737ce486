//! Tests for the ingestion stage and the document store import

use phishguard::config::{
    IngestionConfig, PipelineSettings, RunConfig, DATA_INGESTION_COLLECTION_NAME, DATA_INGESTION_DATABASE_NAME,
};
use phishguard::pipeline::{import_csv_into_store, DataIngestion};
use phishguard::store::{DocumentStore, JsonDocumentStore};
use phishguard::PipelineError;

#[path = "common/mod.rs"]
mod common;

use common::*;

fn ingestion_config(root: &std::path::Path, seed: Option<u64>) -> IngestionConfig {
    let settings = PipelineSettings {
        split_seed: seed,
        ..Default::default()
    };
    let run = RunConfig::with_timestamp("ts", &root.join("Artifacts"), &root.join("final_model"));
    IngestionConfig::new(&run, &settings)
}

#[test]
fn test_ingestion_writes_snapshot_and_split() {
    let dir = tempfile::tempdir().unwrap();
    let store = seed_store(&dir.path().join("store"), 200, 1);
    let config = ingestion_config(dir.path(), Some(3));

    let artifact = DataIngestion::new(config.clone(), &store).run().unwrap();

    let snapshot = read_csv(&config.feature_store_file_path);
    assert_shape(&snapshot, 200, FEATURES.len() + 1);
    assert!(snapshot.column("_id").is_err(), "_id must not reach the feature store");

    let train = read_csv(&artifact.trained_file_path);
    let test = read_csv(&artifact.test_file_path);
    assert_shape(&train, 160, FEATURES.len() + 1);
    assert_shape(&test, 40, FEATURES.len() + 1);
    assert_has_columns(&test, &FEATURES);
    assert!(train.column("URL_Length").unwrap().null_count() + test.column("URL_Length").unwrap().null_count() > 0);
}

#[test]
fn test_test_partition_rounds_up() {
    let dir = tempfile::tempdir().unwrap();
    let store = seed_store(&dir.path().join("store"), 11, 1);
    let artifact = DataIngestion::new(ingestion_config(dir.path(), Some(3)), &store)
        .run()
        .unwrap();

    assert_eq!(read_csv(&artifact.test_file_path).height(), 3);
    assert_eq!(read_csv(&artifact.trained_file_path).height(), 8);
}

#[test]
fn test_seeded_split_is_reproducible() {
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    let store_a = seed_store(&a.path().join("store"), 60, 1);
    let store_b = seed_store(&b.path().join("store"), 60, 1);

    let first = DataIngestion::new(ingestion_config(a.path(), Some(9)), &store_a).run().unwrap();
    let second = DataIngestion::new(ingestion_config(b.path(), Some(9)), &store_b).run().unwrap();

    assert!(read_csv(&first.test_file_path).equals_missing(&read_csv(&second.test_file_path)));
}

#[test]
fn test_missing_collection_fails() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonDocumentStore::new(dir.path().join("store"));
    let err = DataIngestion::new(ingestion_config(dir.path(), None), &store)
        .run()
        .unwrap_err();
    assert!(matches!(err, PipelineError::Validation { .. }));
}

#[test]
fn test_empty_collection_fails() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonDocumentStore::new(dir.path().join("store"));
    store
        .insert_many(DATA_INGESTION_DATABASE_NAME, DATA_INGESTION_COLLECTION_NAME, &[])
        .unwrap();

    let err = DataIngestion::new(ingestion_config(dir.path(), None), &store)
        .run()
        .unwrap_err();
    assert!(err.to_string().contains("empty"));
}

#[test]
fn test_import_csv_round_trips_through_store() {
    let mut df = phishing_dataframe(30, 2);
    let (dir, csv_path) = create_temp_csv(&mut df);
    let store = JsonDocumentStore::new(dir.path().join("store"));

    let written = import_csv_into_store(&csv_path, &store, "db", "urls").unwrap();
    assert_eq!(written, 30);

    let documents = store.find_all("db", "urls").unwrap();
    assert_eq!(documents.len(), 30);
    let back = phishguard::store::documents_to_dataframe(&documents).unwrap();
    assert_eq!(phishguard::io::column_names(&back), phishguard::io::column_names(&df));
    for name in FEATURES.iter().chain([&TARGET]) {
        let expected: Vec<Option<i64>> = df.column(name).unwrap().i64().unwrap().into_iter().collect();
        let actual: Vec<Option<i64>> = back.column(name).unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(actual, expected, "column {}", name);
    }
}
