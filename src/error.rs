//! Error types shared by every pipeline stage.
//!
//! Each failure is classified into one of three kinds and tagged with the
//! stage that raised it. Foreign errors (polars, serde, io) are attached to a
//! stage and path through [`StageContext`].

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Boxed foreign error kept as the source of an I/O failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Pipeline stage that raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Ingestion,
    Validation,
    Transformation,
    Training,
    Sync,
    Prediction,
}

impl Stage {
    /// Directory-style name of the stage
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ingestion => "data_ingestion",
            Stage::Validation => "data_validation",
            Stage::Transformation => "data_transformation",
            Stage::Training => "model_trainer",
            Stage::Sync => "remote_sync",
            Stage::Prediction => "prediction",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the training pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Reading or writing a file, querying the store, or (de)serializing failed.
    #[error("[{stage}] I/O failure on {}: {source}", .path.display())]
    Io {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    /// Input data or a predecessor's artifact did not meet the stage's contract.
    #[error("[{stage}] validation failure{}: {message}", fmt_path(.path))]
    Validation {
        stage: Stage,
        path: Option<PathBuf>,
        message: String,
    },

    /// Fitting, searching or scoring a model failed.
    #[error("[{stage}] training failure: {message}")]
    Training { stage: Stage, message: String },
}

fn fmt_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => format!(" ({})", p.display()),
        None => String::new(),
    }
}

impl PipelineError {
    pub fn io(stage: Stage, path: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        Self::Io {
            stage,
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn validation(stage: Stage, message: impl Into<String>) -> Self {
        Self::Validation {
            stage,
            path: None,
            message: message.into(),
        }
    }

    pub fn validation_at(stage: Stage, path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Validation {
            stage,
            path: Some(path.into()),
            message: message.into(),
        }
    }

    pub fn training(stage: Stage, message: impl Into<String>) -> Self {
        Self::Training {
            stage,
            message: message.into(),
        }
    }

    /// A predecessor's artifact file is not on disk.
    pub fn missing_artifact(stage: Stage, path: &Path) -> Self {
        Self::validation_at(stage, path, "missing artifact file")
    }

    /// Stage that raised this error
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Io { stage, .. }
            | PipelineError::Validation { stage, .. }
            | PipelineError::Training { stage, .. } => *stage,
        }
    }
}

/// Attach a stage and file path to a foreign error.
pub trait StageContext<T> {
    fn at_path(self, stage: Stage, path: &Path) -> Result<T>;
}

impl<T, E> StageContext<T> for std::result::Result<T, E>
where
    E: Into<BoxError>,
{
    fn at_path(self, stage: Stage, path: &Path) -> Result<T> {
        self.map_err(|e| PipelineError::io(stage, path, e))
    }
}
