//! PhishGuard: a batch training pipeline for phishing-URL classifiers.
//!
//! Records are pulled from a document store, split, validated against a
//! schema and for train/test drift, imputed with a KNN imputer, and used to
//! grid-search a roster of classifiers. The best model and the fitted
//! imputer are written to a production model directory.

pub mod cli;
pub mod config;
pub mod error;
pub mod io;
pub mod ml;
pub mod pipeline;
pub mod report;
pub mod store;
pub mod sync;
pub mod tracking;
pub mod utils;

pub use error::{PipelineError, Result, Stage};
pub use pipeline::{PipelineOutcome, PipelineState, TrainingPipeline};
