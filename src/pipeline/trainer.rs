//! Model training: grid search over the classifier roster, selection, persistence.
//!
//! Every family is searched with stratified cross-validation, refitted on the
//! full training split and scored on both splits. The winner is the family
//! with the highest test f1; on ties the earlier family in the roster wins.

use std::collections::HashMap;
use std::path::Path;

use faer::Mat;
use tracing::{debug, info, warn};

use super::artifact::{require_file, TrainingArtifact, TransformationArtifact};
use super::{ml_failure, ml_failure_for};
use crate::config::TrainerConfig;
use crate::error::{PipelineError, Result, Stage};
use crate::io::{load_numpy_array, save_object};
use crate::ml::{
    classification_score, Classifier, ClassificationMetrics, GridSearch, Model, ModelFamily, ParamGrid, Params,
};
use crate::tracking::{ExperimentTracker, RunLog};
use crate::utils::progress::create_progress_bar;

const STAGE: Stage = Stage::Training;

/// Outcome of searching one family
#[derive(Debug, Clone)]
pub struct ModelReport {
    pub family: ModelFamily,
    pub best_params: Params,
    pub cv_score: f64,
    pub train_metrics: ClassificationMetrics,
    pub test_metrics: ClassificationMetrics,
    pub model: Model,
}

/// Everything the trainer learned, including the losing families
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub models: Vec<ModelReport>,
    pub best_index: usize,
    /// Best test f1 is below the expected score
    pub below_expected: bool,
    /// Train and test f1 differ by more than the allowed gap
    pub overfitting: bool,
}

impl TrainingReport {
    pub fn best(&self) -> &ModelReport {
        &self.models[self.best_index]
    }
}

/// Index of the report with the highest test f1; the first one wins ties
pub fn select_best(reports: &[ModelReport]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, report) in reports.iter().enumerate() {
        let score = report.test_metrics.f1_score;
        if best.map_or(true, |b| score > reports[b].test_metrics.f1_score) {
            best = Some(i);
        }
    }
    best
}

/// Split a transformed array into features and the last-column target
pub fn split_features_target(arr: &Mat<f64>) -> (Mat<f64>, Vec<f64>) {
    let d = arr.ncols() - 1;
    let x = Mat::from_fn(arr.nrows(), d, |i, j| arr[(i, j)]);
    let y = (0..arr.nrows()).map(|i| arr[(i, d)]).collect();
    (x, y)
}

fn load_split(path: &Path) -> Result<Mat<f64>> {
    require_file(STAGE, path)?;
    let arr = load_numpy_array(path, STAGE)?;
    if arr.ncols() < 2 || arr.nrows() == 0 {
        return Err(PipelineError::validation_at(
            STAGE,
            path,
            format!(
                "expected a non-empty array with features and a target column, got shape ({}, {})",
                arr.nrows(),
                arr.ncols()
            ),
        ));
    }
    Ok(arr)
}

pub struct ModelTrainer<'a> {
    config: TrainerConfig,
    tracker: &'a dyn ExperimentTracker,
    roster: Vec<ModelFamily>,
    grids: HashMap<ModelFamily, ParamGrid>,
}

impl<'a> ModelTrainer<'a> {
    pub fn new(config: TrainerConfig, tracker: &'a dyn ExperimentTracker) -> Self {
        Self {
            config,
            tracker,
            roster: ModelFamily::ROSTER.to_vec(),
            grids: HashMap::new(),
        }
    }

    /// Restrict or reorder the families that are searched
    pub fn with_roster(mut self, roster: Vec<ModelFamily>) -> Self {
        self.roster = roster;
        self
    }

    /// Replace the search grid of one family
    pub fn with_grid(mut self, family: ModelFamily, grid: ParamGrid) -> Self {
        self.grids.insert(family, grid);
        self
    }

    /// Search, refit and score every family of the roster, in order
    pub fn evaluate_models(
        &self,
        x_train: &Mat<f64>,
        y_train: &[f64],
        x_test: &Mat<f64>,
        y_test: &[f64],
    ) -> Result<Vec<ModelReport>> {
        let pb = create_progress_bar(self.roster.len() as u64, "   Searching models");
        let mut reports = Vec::with_capacity(self.roster.len());

        for &family in &self.roster {
            pb.set_message(format!("   {}", family));
            let mut search = GridSearch::new(family, self.config.cv_folds, self.config.random_state);
            if let Some(grid) = self.grids.get(&family) {
                search = search.with_grid(grid.clone());
            }

            let (model, result) = search
                .fit_best(x_train, y_train)
                .map_err(|e| ml_failure_for(STAGE, family, e))?;
            let train_pred = model.predict(x_train).map_err(|e| ml_failure(STAGE, e))?;
            let test_pred = model.predict(x_test).map_err(|e| ml_failure(STAGE, e))?;

            let report = ModelReport {
                family,
                best_params: result.best_params,
                cv_score: result.best_score,
                train_metrics: classification_score(y_train, &train_pred),
                test_metrics: classification_score(y_test, &test_pred),
                model,
            };
            debug!(
                model = %family,
                params = ?report.best_params,
                cv = report.cv_score,
                train_f1 = report.train_metrics.f1_score,
                test_f1 = report.test_metrics.f1_score,
                "family evaluated"
            );
            reports.push(report);
            pb.inc(1);
        }
        pb.finish_and_clear();
        Ok(reports)
    }

    fn track(&self, report: &ModelReport) -> Result<()> {
        for (split, metrics) in [("train", &report.train_metrics), ("test", &report.test_metrics)] {
            self.tracker.log_run(RunLog {
                split,
                model_name: report.family.name(),
                params: &report.best_params,
                metrics,
                model_path: Some(&self.config.trained_model_file_path),
            })?;
        }
        Ok(())
    }

    pub fn run(&self, transformation: &TransformationArtifact) -> Result<TrainingArtifact> {
        self.run_with_report(transformation).map(|(artifact, _)| artifact)
    }

    /// Train and also return the per-family report
    pub fn run_with_report(&self, transformation: &TransformationArtifact) -> Result<(TrainingArtifact, TrainingReport)> {
        info!(families = self.roster.len(), "model training started");
        let train_arr = load_split(&transformation.transformed_train_file_path)?;
        let test_arr = load_split(&transformation.transformed_test_file_path)?;
        if train_arr.ncols() != test_arr.ncols() {
            return Err(PipelineError::validation(
                STAGE,
                format!(
                    "train array has {} columns but test array has {}",
                    train_arr.ncols(),
                    test_arr.ncols()
                ),
            ));
        }

        let (x_train, y_train) = split_features_target(&train_arr);
        let (x_test, y_test) = split_features_target(&test_arr);
        let models = self.evaluate_models(&x_train, &y_train, &x_test, &y_test)?;
        let best_index = select_best(&models)
            .ok_or_else(|| PipelineError::training(STAGE, "no model family to train"))?;
        let best = &models[best_index];

        save_object(&self.config.trained_model_file_path, &best.model, STAGE)?;
        save_object(&self.config.final_model_file_path, &best.model, STAGE)?;
        info!(
            model = %best.family,
            test_f1 = best.test_metrics.f1_score,
            path = %self.config.trained_model_file_path.display(),
            "best model saved"
        );

        let below_expected = best.test_metrics.f1_score < self.config.expected_score;
        if below_expected {
            warn!(
                test_f1 = best.test_metrics.f1_score,
                expected = self.config.expected_score,
                "best model is below the expected score"
            );
        }
        let gap = (best.train_metrics.f1_score - best.test_metrics.f1_score).abs();
        let overfitting = gap > self.config.overfitting_threshold;
        if overfitting {
            warn!(gap, threshold = self.config.overfitting_threshold, "train/test f1 gap suggests overfitting");
        }

        self.track(best)?;

        let artifact = TrainingArtifact {
            trained_model_file_path: self.config.trained_model_file_path.clone(),
            train_metric_artifact: best.train_metrics,
            test_metric_artifact: best.test_metrics,
        };
        let report = TrainingReport {
            models,
            best_index,
            below_expected,
            overfitting,
        };
        info!(?artifact, "model training finished");
        Ok((artifact, report))
    }
}
