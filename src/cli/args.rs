//! Command-line argument definitions using clap

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{PipelineSettings, LOG_DIR, STORE_DIR, STORE_DIR_ENV};

/// PhishGuard - Train phishing-URL classifiers from a document store
#[derive(Parser, Debug)]
#[command(name = "phishguard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Settings file (YAML). Any field left out keeps its default.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory of the JSON document store.
    /// Falls back to $DOCUMENT_STORE_DIR, then `data_store`.
    #[arg(long)]
    pub store_dir: Option<PathBuf>,

    /// Database holding the training collection
    #[arg(long)]
    pub database: Option<String>,

    /// Collection to train on
    #[arg(long)]
    pub collection: Option<String>,

    /// Schema file the ingested data is validated against
    #[arg(long)]
    pub schema: Option<PathBuf>,

    /// Root of the timestamped artifact trees
    #[arg(long)]
    pub artifact_dir: Option<PathBuf>,

    /// Directory receiving the production preprocessor and model
    #[arg(long)]
    pub model_dir: Option<PathBuf>,

    /// Root of the experiment tracker
    #[arg(long)]
    pub tracking_dir: Option<PathBuf>,

    /// Experiment name runs are logged under
    #[arg(long)]
    pub experiment: Option<String>,

    /// Seed for the train/test split. Without it every run draws a fresh split.
    #[arg(long)]
    pub seed: Option<u64>,

    /// p-value at or below which a column counts as drifted
    #[arg(long, value_parser = validate_unit_interval)]
    pub drift_threshold: Option<f64>,

    /// S3 bucket to sync artifacts and the final model to after training
    #[arg(long)]
    pub bucket: Option<String>,

    /// Directory for run log files
    #[arg(long, default_value = LOG_DIR)]
    pub log_dir: PathBuf,

    /// Also print log events to stderr
    #[arg(short, long, default_value = "false")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a CSV file into the document store collection
    Import {
        /// Input CSV file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Predict a CSV file with the production model
    Predict {
        /// Input CSV file with the feature columns
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV path (defaults to prediction_output/output.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    /// Merge defaults, the settings file, the environment and explicit flags, in that order
    pub fn resolve_settings(&self) -> Result<PipelineSettings> {
        let mut settings = match &self.config {
            Some(path) => PipelineSettings::from_yaml_file(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => PipelineSettings::default(),
        };

        if settings.store_dir == Path::new(STORE_DIR) {
            if let Ok(dir) = std::env::var(STORE_DIR_ENV) {
                if !dir.trim().is_empty() {
                    settings.store_dir = PathBuf::from(dir);
                }
            }
        }

        if let Some(v) = &self.store_dir {
            settings.store_dir = v.clone();
        }
        if let Some(v) = &self.database {
            settings.database = v.clone();
        }
        if let Some(v) = &self.collection {
            settings.collection = v.clone();
        }
        if let Some(v) = &self.schema {
            settings.schema_path = v.clone();
        }
        if let Some(v) = &self.artifact_dir {
            settings.artifact_dir = v.clone();
        }
        if let Some(v) = &self.model_dir {
            settings.model_dir = v.clone();
        }
        if let Some(v) = &self.tracking_dir {
            settings.tracking_dir = v.clone();
        }
        if let Some(v) = &self.experiment {
            settings.experiment_name = v.clone();
        }
        if self.seed.is_some() {
            settings.split_seed = self.seed;
        }
        if let Some(v) = self.drift_threshold {
            settings.drift_threshold = v;
        }
        if self.bucket.is_some() {
            settings.bucket = self.bucket.clone();
        }

        settings.check()?;
        Ok(settings)
    }
}

/// Validator for probability thresholds
fn validate_unit_interval(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;

    if !(0.0..=1.0).contains(&value) {
        Err(format!("threshold must be between 0.0 and 1.0, got {}", value))
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from([
            "phishguard",
            "--store-dir",
            "/tmp/store",
            "--seed",
            "7",
            "--drift-threshold",
            "0.01",
        ]);
        let settings = cli.resolve_settings().unwrap();
        assert_eq!(settings.store_dir, PathBuf::from("/tmp/store"));
        assert_eq!(settings.split_seed, Some(7));
        assert_eq!(settings.drift_threshold, 0.01);
        assert_eq!(settings.collection, "NetworkData");
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        assert!(validate_unit_interval("1.5").is_err());
        assert!(validate_unit_interval("abc").is_err());
        assert_eq!(validate_unit_interval("0.05"), Ok(0.05));
    }

    #[test]
    fn test_predict_subcommand() {
        let cli = Cli::parse_from(["phishguard", "predict", "-i", "in.csv"]);
        match cli.command {
            Some(Commands::Predict { input, output }) => {
                assert_eq!(input, PathBuf::from("in.csv"));
                assert!(output.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
