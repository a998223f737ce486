//! Data ingestion: collection export, feature-store snapshot, train/test split

use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info};

use super::artifact::IngestionArtifact;
use crate::config::IngestionConfig;
use crate::error::{PipelineError, Result, Stage};
use crate::io::save_dataset;
use crate::store::{documents_to_dataframe, DocumentStore};

/// Row indices of a shuffled train/test split.
///
/// The test partition holds `ceil(test_ratio * n_rows)` rows. A fixed `seed`
/// makes the split reproducible; `None` draws from OS entropy.
pub fn train_test_split_indices(
    n_rows: usize,
    test_ratio: f64,
    seed: Option<u64>,
) -> Result<(Vec<usize>, Vec<usize>)> {
    // tolerance keeps float noise such as 40.000000000000004 from rounding up
    let n_test = (test_ratio * n_rows as f64 - 1e-9).ceil() as usize;
    if n_test == 0 || n_test >= n_rows {
        return Err(PipelineError::validation(
            Stage::Ingestion,
            format!(
                "cannot split {} rows with test ratio {}: both partitions need at least one row",
                n_rows, test_ratio
            ),
        ));
    }

    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let mut order: Vec<usize> = (0..n_rows).collect();
    order.shuffle(&mut rng);

    let train = order.split_off(n_test);
    Ok((train, order))
}

fn take_rows(df: &DataFrame, rows: &[usize]) -> Result<DataFrame> {
    let idx = IdxCa::from_vec("idx".into(), rows.iter().map(|&i| i as IdxSize).collect());
    df.take(&idx)
        .map_err(|e| PipelineError::validation(Stage::Ingestion, e.to_string()))
}

pub struct DataIngestion<'a> {
    config: IngestionConfig,
    store: &'a dyn DocumentStore,
}

impl<'a> DataIngestion<'a> {
    pub fn new(config: IngestionConfig, store: &'a dyn DocumentStore) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &IngestionConfig {
        &self.config
    }

    /// Read the whole collection into a DataFrame
    pub fn export_collection_as_dataframe(&self) -> Result<DataFrame> {
        let documents = self
            .store
            .find_all(&self.config.database_name, &self.config.collection_name)?;
        if documents.is_empty() {
            return Err(PipelineError::validation(
                Stage::Ingestion,
                format!(
                    "collection '{}.{}' is empty",
                    self.config.database_name, self.config.collection_name
                ),
            ));
        }
        let df = documents_to_dataframe(&documents)?;
        info!(rows = df.height(), columns = df.width(), "collection exported");
        Ok(df)
    }

    /// Write the full snapshot; nothing downstream reads it
    pub fn export_data_into_feature_store(&self, df: &mut DataFrame) -> Result<()> {
        save_dataset(df, &self.config.feature_store_file_path, Stage::Ingestion)?;
        debug!(path = %self.config.feature_store_file_path.display(), "feature store written");
        Ok(())
    }

    /// Split and write the train/test CSVs
    pub fn split_data_as_train_test(&self, df: &DataFrame) -> Result<(DataFrame, DataFrame)> {
        let (train_rows, test_rows) =
            train_test_split_indices(df.height(), self.config.train_test_split_ratio, self.config.split_seed)?;
        let mut train = take_rows(df, &train_rows)?;
        let mut test = take_rows(df, &test_rows)?;

        save_dataset(&mut train, &self.config.training_file_path, Stage::Ingestion)?;
        save_dataset(&mut test, &self.config.testing_file_path, Stage::Ingestion)?;
        info!(
            train_rows = train.height(),
            test_rows = test.height(),
            seeded = self.config.split_seed.is_some(),
            "train/test split written"
        );
        Ok((train, test))
    }

    pub fn run(&self) -> Result<IngestionArtifact> {
        info!("data ingestion started");
        let mut df = self.export_collection_as_dataframe()?;
        self.export_data_into_feature_store(&mut df)?;
        self.split_data_as_train_test(&df)?;

        let artifact = IngestionArtifact {
            trained_file_path: self.config.training_file_path.clone(),
            test_file_path: self.config.testing_file_path.clone(),
        };
        info!(?artifact, "data ingestion finished");
        Ok(artifact)
    }
}

/// Load a CSV and push it into the store, returning the documents written
pub fn import_csv_into_store(
    csv_path: &std::path::Path,
    store: &dyn DocumentStore,
    database: &str,
    collection: &str,
) -> Result<usize> {
    let df = crate::io::load_dataset(csv_path, Stage::Ingestion)?;
    let documents = crate::store::dataframe_to_documents(&df)?;
    store.insert_many(database, collection, &documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sizes_round_test_up() {
        let (train, test) = train_test_split_indices(11, 0.2, Some(1)).unwrap();
        assert_eq!(test.len(), 3);
        assert_eq!(train.len(), 8);

        let mut all: Vec<usize> = train.iter().chain(&test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..11).collect::<Vec<_>>());
    }

    #[test]
    fn test_seeded_split_is_reproducible() {
        let a = train_test_split_indices(50, 0.2, Some(7)).unwrap();
        let b = train_test_split_indices(50, 0.2, Some(7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_single_row_cannot_split() {
        assert!(train_test_split_indices(1, 0.2, None).is_err());
    }
}
