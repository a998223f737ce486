//! Pipeline module - runs ingestion, validation, transformation and training in order
//!
//! [`TrainingPipeline`] owns the run's path tree and moves through
//! [`PipelineState`] one stage at a time, handing each stage's artifact to the
//! next. The optional remote sync runs after training and never fails the run.

pub mod artifact;
pub mod drift;
pub mod ingestion;
pub mod prediction;
pub mod schema;
pub mod trainer;
pub mod transformation;
pub mod validation;

pub use artifact::*;
pub use drift::{ks_2samp, ColumnDrift, DriftReport, KsResult};
pub use ingestion::{import_csv_into_store, train_test_split_indices, DataIngestion};
pub use prediction::{predict_file, PREDICTION_COLUMN};
pub use schema::DataSchema;
pub use trainer::{ModelReport, ModelTrainer, TrainingReport};
pub use transformation::DataTransformation;
pub use validation::DataValidation;

use std::collections::HashMap;

use tracing::{info, warn};

use crate::config::{
    IngestionConfig, PipelineSettings, RunConfig, TrainerConfig, TransformationConfig, ValidationConfig,
};
use crate::error::{PipelineError, Result, Stage};
use crate::ml::{MlError, ModelFamily, ParamGrid};
use crate::store::DocumentStore;
use crate::sync::{RemoteSync, ARTIFACT_PREFIX, FINAL_MODEL_PREFIX};
use crate::tracking::{ExperimentTracker, LocalTracker};

/// Translate an estimator error into the stage's error kind.
///
/// Bad input shapes and labels are validation failures; the rest are training failures.
pub(crate) fn ml_failure(stage: Stage, err: MlError) -> PipelineError {
    classify_ml_failure(stage, &err, err.to_string())
}

/// [`ml_failure`] with the failing model family named in the message
pub(crate) fn ml_failure_for(stage: Stage, family: ModelFamily, err: MlError) -> PipelineError {
    classify_ml_failure(stage, &err, format!("{}: {}", family, err))
}

fn classify_ml_failure(stage: Stage, err: &MlError, message: String) -> PipelineError {
    match err {
        MlError::EmptyInput | MlError::ShapeMismatch(_) | MlError::NonBinaryLabels(_) => {
            PipelineError::validation(stage, message)
        }
        _ => PipelineError::training(stage, message),
    }
}

/// Where a pipeline run stands, carrying the latest stage output
#[derive(Debug, Clone)]
pub enum PipelineState {
    Pending,
    Ingested(IngestionArtifact),
    Validated(ValidationArtifact),
    Transformed(TransformationArtifact),
    Trained {
        artifact: TrainingArtifact,
        report: Box<TrainingReport>,
    },
}

impl PipelineState {
    /// Stage the next [`TrainingPipeline::advance`] call will run
    pub fn next_stage(&self) -> Option<Stage> {
        match self {
            PipelineState::Pending => Some(Stage::Ingestion),
            PipelineState::Ingested(_) => Some(Stage::Validation),
            PipelineState::Validated(_) => Some(Stage::Transformation),
            PipelineState::Transformed(_) => Some(Stage::Training),
            PipelineState::Trained { .. } => None,
        }
    }
}

/// Result of a finished run
#[derive(Debug)]
pub struct PipelineOutcome {
    pub training_artifact: TrainingArtifact,
    pub report: TrainingReport,
    /// Remote destinations that were written
    pub synced: Vec<String>,
    /// Sync failures; the trained model is kept regardless
    pub sync_errors: Vec<PipelineError>,
}

pub struct TrainingPipeline {
    settings: PipelineSettings,
    run: RunConfig,
    store: Box<dyn DocumentStore>,
    tracker: Option<Box<dyn ExperimentTracker>>,
    remote: Option<Box<dyn RemoteSync>>,
    roster: Vec<ModelFamily>,
    grids: HashMap<ModelFamily, ParamGrid>,
    state: PipelineState,
}

impl TrainingPipeline {
    pub fn new(settings: PipelineSettings, run: RunConfig, store: Box<dyn DocumentStore>) -> Self {
        Self {
            settings,
            run,
            store,
            tracker: None,
            remote: None,
            roster: ModelFamily::ROSTER.to_vec(),
            grids: HashMap::new(),
            state: PipelineState::Pending,
        }
    }

    /// Use this tracker instead of a [`LocalTracker`] under the tracking dir
    pub fn with_tracker(mut self, tracker: Box<dyn ExperimentTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Sync the artifact tree and model dir after training
    pub fn with_remote_sync(mut self, remote: Box<dyn RemoteSync>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_roster(mut self, roster: Vec<ModelFamily>) -> Self {
        self.roster = roster;
        self
    }

    pub fn with_grid(mut self, family: ModelFamily, grid: ParamGrid) -> Self {
        self.grids.insert(family, grid);
        self
    }

    pub fn run_config(&self) -> &RunConfig {
        &self.run
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn next_stage(&self) -> Option<Stage> {
        self.state.next_stage()
    }

    pub fn start_data_ingestion(&self) -> Result<IngestionArtifact> {
        let config = IngestionConfig::new(&self.run, &self.settings);
        DataIngestion::new(config, self.store.as_ref()).run()
    }

    pub fn start_data_validation(&self, ingestion: &IngestionArtifact) -> Result<ValidationArtifact> {
        let config = ValidationConfig::new(&self.run, &self.settings);
        DataValidation::new(config)?.run(ingestion)
    }

    pub fn start_data_transformation(&self, validation: &ValidationArtifact) -> Result<TransformationArtifact> {
        let config = TransformationConfig::new(&self.run, &self.settings);
        DataTransformation::new(config).run(validation)
    }

    /// Register the experiment once; later calls keep the existing tracker
    pub fn init_tracker(&mut self) -> Result<&dyn ExperimentTracker> {
        if self.tracker.is_none() {
            let tracker = LocalTracker::init(&self.settings.tracking_dir, &self.settings.experiment_name)?;
            self.tracker = Some(Box::new(tracker));
        }
        self.tracker
            .as_deref()
            .ok_or_else(|| PipelineError::training(Stage::Training, "experiment tracker unavailable"))
    }

    pub fn start_model_trainer(
        &mut self,
        transformation: &TransformationArtifact,
    ) -> Result<(TrainingArtifact, TrainingReport)> {
        let config = TrainerConfig::new(&self.run, &self.settings);
        let roster = self.roster.clone();
        let grids = self.grids.clone();
        let tracker = self.init_tracker()?;

        let mut trainer = ModelTrainer::new(config, tracker).with_roster(roster);
        for (family, grid) in grids {
            trainer = trainer.with_grid(family, grid);
        }
        trainer.run_with_report(transformation)
    }

    /// Run the next stage on the previous stage's artifact.
    ///
    /// On error the state is left where it was.
    pub fn advance(&mut self) -> Result<&PipelineState> {
        let next = match self.state.clone() {
            PipelineState::Pending => PipelineState::Ingested(self.start_data_ingestion()?),
            PipelineState::Ingested(artifact) => PipelineState::Validated(self.start_data_validation(&artifact)?),
            PipelineState::Validated(artifact) => {
                PipelineState::Transformed(self.start_data_transformation(&artifact)?)
            }
            PipelineState::Transformed(artifact) => {
                let (artifact, report) = self.start_model_trainer(&artifact)?;
                PipelineState::Trained {
                    artifact,
                    report: Box::new(report),
                }
            }
            PipelineState::Trained { .. } => {
                return Err(PipelineError::validation(Stage::Training, "pipeline has already finished"));
            }
        };
        self.state = next;
        Ok(&self.state)
    }

    /// Sync the timestamped artifact tree to `artifact/<ts>`
    pub fn sync_artifact_dir_to_remote(&self, remote: &dyn RemoteSync) -> Result<String> {
        remote.sync_folder(&self.run.artifact_dir, ARTIFACT_PREFIX, &self.run.timestamp)
    }

    /// Sync the production model dir to `final_model/<ts>`
    pub fn sync_saved_model_dir_to_remote(&self, remote: &dyn RemoteSync) -> Result<String> {
        remote.sync_folder(&self.run.model_dir, FINAL_MODEL_PREFIX, &self.run.timestamp)
    }

    /// Consume a trained pipeline, running the remote sync if one is configured
    pub fn finish(self) -> Result<PipelineOutcome> {
        let PipelineState::Trained { artifact, report } = self.state.clone() else {
            return Err(PipelineError::validation(
                Stage::Training,
                format!("pipeline is not trained yet (next stage: {:?})", self.next_stage()),
            ));
        };

        let mut synced = Vec::new();
        let mut sync_errors = Vec::new();
        if let Some(remote) = self.remote.as_deref() {
            for result in [
                self.sync_artifact_dir_to_remote(remote),
                self.sync_saved_model_dir_to_remote(remote),
            ] {
                match result {
                    Ok(destination) => synced.push(destination),
                    Err(e) => {
                        warn!(error = %e, "remote sync failed");
                        sync_errors.push(e);
                    }
                }
            }
        }

        Ok(PipelineOutcome {
            training_artifact: artifact,
            report: *report,
            synced,
            sync_errors,
        })
    }

    /// Ingest, validate, transform, train, then sync
    pub fn run_pipeline(mut self) -> Result<PipelineOutcome> {
        info!(timestamp = %self.run.timestamp, artifact_dir = %self.run.artifact_dir.display(), "training pipeline started");
        while self.next_stage().is_some() {
            self.advance()?;
        }
        let outcome = self.finish()?;
        info!(artifact = ?outcome.training_artifact, "training pipeline finished");
        Ok(outcome)
    }
}
