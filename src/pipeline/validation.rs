//! Data validation: schema shape checks and train/test drift detection

use std::collections::BTreeSet;

use polars::prelude::*;
use tracing::{debug, info, warn};

use super::artifact::{require_file, IngestionArtifact, ValidationArtifact};
use super::drift::{has_drift, is_drift, ks_2samp, ColumnDrift, DriftReport};
use super::schema::DataSchema;
use crate::config::ValidationConfig;
use crate::error::{Result, Stage};
use crate::io::{column_as_f64, is_categorical, load_dataset, save_dataset, write_yaml_file};

/// True iff the schema declares exactly as many columns as the frame has.
///
/// Only the count is compared, not names or order.
pub fn validate_number_of_columns(schema: &DataSchema, df: &DataFrame) -> bool {
    let ok = schema.column_count() == df.width();
    debug!(expected = schema.column_count(), found = df.width(), ok, "column count check");
    ok
}

/// True iff the schema's numerical names equal the frame's non-categorical columns, as sets
pub fn validate_numerical_columns(schema: &DataSchema, df: &DataFrame) -> bool {
    let expected: BTreeSet<&str> = schema.numerical_columns.iter().map(String::as_str).collect();
    let found: BTreeSet<&str> = df
        .get_columns()
        .iter()
        .filter(|c| !is_categorical(c.dtype()))
        .map(|c| c.name().as_str())
        .collect();

    if expected != found {
        let missing: Vec<_> = expected.difference(&found).collect();
        let unexpected: Vec<_> = found.difference(&expected).collect();
        debug!(?missing, ?unexpected, "numerical column mismatch");
    }
    expected == found
}

/// KS test of every numeric column present in both frames.
///
/// Returns `true` when no column drifts, along with the per-column report.
pub fn detect_data_drift(base: &DataFrame, current: &DataFrame, threshold: f64) -> Result<(bool, DriftReport)> {
    let mut report = DriftReport::new();
    for column in base.get_columns() {
        let name = column.name().as_str();
        let Ok(other) = current.column(name) else {
            continue;
        };
        if is_categorical(column.dtype()) || is_categorical(other.dtype()) {
            debug!(column = name, "categorical column skipped by drift test");
            continue;
        }

        let a = column_as_f64(base, name, Stage::Validation)?;
        let b = column_as_f64(current, name, Stage::Validation)?;
        let ks = ks_2samp(&a, &b);
        let drift_status = is_drift(ks.p_value, threshold);
        if drift_status {
            warn!(column = name, p_value = ks.p_value, statistic = ks.statistic, "drift detected");
        }
        report.insert(
            name.to_string(),
            ColumnDrift {
                p_value: ks.p_value,
                drift_status,
            },
        );
    }
    Ok((!has_drift(&report), report))
}

pub struct DataValidation {
    config: ValidationConfig,
    schema: DataSchema,
}

impl DataValidation {
    /// Load the schema; a missing schema file fails here
    pub fn new(config: ValidationConfig) -> Result<Self> {
        let schema = DataSchema::from_yaml_file(&config.schema_file_path)?;
        Ok(Self { config, schema })
    }

    pub fn schema(&self) -> &DataSchema {
        &self.schema
    }

    fn check_split(&self, df: &DataFrame, split: &str) -> bool {
        let count_ok = validate_number_of_columns(&self.schema, df);
        if !count_ok {
            warn!(split, "{} dataframe does not have the expected number of columns", split);
        }
        let numeric_ok = validate_numerical_columns(&self.schema, df);
        if !numeric_ok {
            warn!(split, "{} dataframe numerical columns do not match the schema", split);
        }
        count_ok && numeric_ok
    }

    pub fn run(&self, ingestion: &IngestionArtifact) -> Result<ValidationArtifact> {
        info!("data validation started");
        require_file(Stage::Validation, &ingestion.trained_file_path)?;
        require_file(Stage::Validation, &ingestion.test_file_path)?;

        let mut train = load_dataset(&ingestion.trained_file_path, Stage::Validation)?;
        let mut test = load_dataset(&ingestion.test_file_path, Stage::Validation)?;

        let shape_ok = self.check_split(&train, "train") & self.check_split(&test, "test");
        let (no_drift, report) = detect_data_drift(&train, &test, self.config.drift_threshold)?;
        write_yaml_file(&self.config.drift_report_file_path, &report, Stage::Validation)?;

        let status = shape_ok && no_drift;
        let (train_path, test_path) = if status {
            (&self.config.valid_train_file_path, &self.config.valid_test_file_path)
        } else {
            (&self.config.invalid_train_file_path, &self.config.invalid_test_file_path)
        };
        save_dataset(&mut train, train_path, Stage::Validation)?;
        save_dataset(&mut test, test_path, Stage::Validation)?;

        let artifact = ValidationArtifact {
            validation_status: status,
            valid_train_file_path: status.then(|| train_path.clone()),
            valid_test_file_path: status.then(|| test_path.clone()),
            invalid_train_file_path: (!status).then(|| train_path.clone()),
            invalid_test_file_path: (!status).then(|| test_path.clone()),
            drift_report_file_path: self.config.drift_report_file_path.clone(),
        };

        if status {
            info!(?artifact, "data validation passed");
        } else {
            warn!(shape_ok, no_drift, "data validation failed; frames written to invalid paths");
        }
        Ok(artifact)
    }
}
