//! Immutable records handed from one stage to the next

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{PipelineError, Result, Stage};
use crate::ml::ClassificationMetrics;

/// Fail fast when a predecessor's file is not on disk.
pub fn require_file(stage: Stage, path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(PipelineError::missing_artifact(stage, path))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionArtifact {
    pub trained_file_path: PathBuf,
    pub test_file_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationArtifact {
    pub validation_status: bool,
    pub valid_train_file_path: Option<PathBuf>,
    pub valid_test_file_path: Option<PathBuf>,
    pub invalid_train_file_path: Option<PathBuf>,
    pub invalid_test_file_path: Option<PathBuf>,
    pub drift_report_file_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformationArtifact {
    pub transformed_object_file_path: PathBuf,
    pub transformed_train_file_path: PathBuf,
    pub transformed_test_file_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingArtifact {
    pub trained_model_file_path: PathBuf,
    pub train_metric_artifact: ClassificationMetrics,
    pub test_metric_artifact: ClassificationMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.csv");
        assert!(matches!(
            require_file(Stage::Validation, &path),
            Err(PipelineError::Validation { .. })
        ));

        std::fs::write(&path, "a\n1\n").unwrap();
        assert!(require_file(Stage::Validation, &path).is_ok());
        assert!(require_file(Stage::Validation, dir.path()).is_err(), "directories are not artifacts");
    }
}
