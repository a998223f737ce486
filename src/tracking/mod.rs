//! Experiment tracking for training runs.
//!
//! The tracker is created once by the orchestrator and handed to the trainer.
//! [`LocalTracker`] lays records out on disk as
//! `<root>/<experiment>/<run_id>/run.json` with logged files under
//! `<run_id>/artifacts/`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{PipelineError, Result, Stage, StageContext};
use crate::ml::{ClassificationMetrics, Params};

pub const RUN_FILE_NAME: &str = "run.json";
pub const ARTIFACTS_DIR_NAME: &str = "artifacts";

/// Final state of a logged run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Success,
    Failed,
}

/// What one logged run carries
#[derive(Debug, Clone)]
pub struct RunLog<'a> {
    /// Free-form label, e.g. `train` or `test`
    pub split: &'a str,
    pub model_name: &'a str,
    pub params: &'a Params,
    pub metrics: &'a ClassificationMetrics,
    /// Serialized model copied into the run
    pub model_path: Option<&'a Path>,
}

/// Persisted record of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub experiment: String,
    pub status: RunStatus,
    pub split: String,
    pub model_name: String,
    pub params: Params,
    pub metrics: BTreeMap<String, f64>,
    pub artifacts: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

/// Sink for logged metrics and model artifacts
pub trait ExperimentTracker {
    fn experiment(&self) -> &str;

    fn log_run(&self, run: RunLog<'_>) -> Result<RunRecord>;
}

/// Metric names as they appear in a run record
pub fn metric_map(metrics: &ClassificationMetrics) -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("f1_score".to_string(), metrics.f1_score),
        ("precision_score".to_string(), metrics.precision_score),
        ("recall_score".to_string(), metrics.recall_score),
    ])
}

/// File-system tracker
#[derive(Debug, Clone)]
pub struct LocalTracker {
    root: PathBuf,
    experiment: String,
}

impl LocalTracker {
    /// Register the experiment, creating its directory.
    ///
    /// # Arguments
    ///
    /// * `root` - Tracking root shared by all experiments
    /// * `experiment` - Experiment name; runs are grouped under it
    pub fn init(root: &Path, experiment: &str) -> Result<Self> {
        if experiment.trim().is_empty() {
            return Err(PipelineError::validation(
                Stage::Training,
                "experiment name must not be empty",
            ));
        }
        let dir = root.join(experiment);
        std::fs::create_dir_all(&dir).at_path(Stage::Training, &dir)?;
        info!(experiment, root = %root.display(), "experiment tracker ready");
        Ok(Self {
            root: root.to_path_buf(),
            experiment: experiment.to_string(),
        })
    }

    pub fn experiment_dir(&self) -> PathBuf {
        self.root.join(&self.experiment)
    }

    /// Every run recorded for the experiment, oldest first
    pub fn list_runs(&self) -> Result<Vec<RunRecord>> {
        let dir = self.experiment_dir();
        let mut runs = Vec::new();
        for entry in std::fs::read_dir(&dir).at_path(Stage::Training, &dir)? {
            let entry = entry.at_path(Stage::Training, &dir)?;
            let path = entry.path().join(RUN_FILE_NAME);
            if path.is_file() {
                runs.push(crate::io::load_object::<RunRecord>(&path, Stage::Training)?);
            }
        }
        runs.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.run_id.cmp(&b.run_id)));
        Ok(runs)
    }
}

impl ExperimentTracker for LocalTracker {
    fn experiment(&self) -> &str {
        &self.experiment
    }

    /// Record a run. A model that cannot be copied into the run still leaves
    /// a `Failed` record behind before the error is returned.
    fn log_run(&self, run: RunLog<'_>) -> Result<RunRecord> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4().simple().to_string();
        let run_dir = self.experiment_dir().join(&run_id);

        let mut artifacts = Vec::new();
        let copied = match run.model_path {
            Some(model_path) => copy_artifact(model_path, &run_dir).map(|name| artifacts.push(name)),
            None => Ok(()),
        };

        let record = RunRecord {
            run_id,
            experiment: self.experiment.clone(),
            status: if copied.is_ok() { RunStatus::Success } else { RunStatus::Failed },
            split: run.split.to_string(),
            model_name: run.model_name.to_string(),
            params: run.params.clone(),
            metrics: metric_map(run.metrics),
            artifacts,
            started_at,
            ended_at: Utc::now(),
        };
        crate::io::save_object(&run_dir.join(RUN_FILE_NAME), &record, Stage::Training)?;

        if let Err(e) = copied {
            warn!(run_id = %record.run_id, split = run.split, "run failed: {}", e);
            return Err(e);
        }
        info!(
            run_id = %record.run_id,
            split = run.split,
            f1 = run.metrics.f1_score,
            "tracked run"
        );
        Ok(record)
    }
}

/// Copy a model file into `<run_dir>/artifacts/`, returning its run-relative name
fn copy_artifact(model_path: &Path, run_dir: &Path) -> Result<String> {
    let file_name = model_path
        .file_name()
        .ok_or_else(|| PipelineError::validation_at(Stage::Training, model_path, "not a file path"))?;
    let target = run_dir.join(ARTIFACTS_DIR_NAME).join(file_name);
    crate::io::ensure_parent_dir(&target, Stage::Training)?;
    std::fs::copy(model_path, &target).at_path(Stage::Training, model_path)?;
    Ok(format!("{}/{}", ARTIFACTS_DIR_NAME, file_name.to_string_lossy()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_run_writes_record_and_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("model.json");
        std::fs::write(&model, "{}").unwrap();

        let tracker = LocalTracker::init(&dir.path().join("mlruns"), "exp").unwrap();
        let metrics = ClassificationMetrics {
            f1_score: 0.9,
            precision_score: 0.8,
            recall_score: 1.0,
        };
        let record = tracker
            .log_run(RunLog {
                split: "test",
                model_name: "KNN",
                params: &Params::new(),
                metrics: &metrics,
                model_path: Some(&model),
            })
            .unwrap();

        let run_dir = tracker.experiment_dir().join(&record.run_id);
        assert!(run_dir.join(RUN_FILE_NAME).is_file());
        assert!(run_dir.join("artifacts/model.json").is_file());
        assert_eq!(record.metrics["recall_score"], 1.0);
        assert_eq!(record.status, RunStatus::Success);
        assert_eq!(tracker.list_runs().unwrap(), vec![record]);
    }

    #[test]
    fn test_missing_model_leaves_failed_record() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = LocalTracker::init(&dir.path().join("mlruns"), "exp").unwrap();
        let metrics = ClassificationMetrics {
            f1_score: 0.5,
            precision_score: 0.5,
            recall_score: 0.5,
        };

        let result = tracker.log_run(RunLog {
            split: "train",
            model_name: "Decision Tree",
            params: &Params::new(),
            metrics: &metrics,
            model_path: Some(&dir.path().join("absent.json")),
        });
        assert!(matches!(result, Err(PipelineError::Io { stage: Stage::Training, .. })));

        let runs = tracker.list_runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, RunStatus::Failed);
        assert!(runs[0].artifacts.is_empty());
        assert_eq!(runs[0].metrics["f1_score"], 0.5);
    }

    #[test]
    fn test_empty_experiment_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LocalTracker::init(dir.path(), " ").is_err());
    }
}
