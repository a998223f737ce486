//! PhishGuard CLI: trains the phishing classifier, imports data, predicts

use std::time::Instant;

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use console::style;

use phishguard::cli::{self, Cli, Commands};
use phishguard::config::{RunConfig, TIMESTAMP_FORMAT};
use phishguard::pipeline::{PipelineState, TrainingPipeline};
use phishguard::report::TrainingSummary;
use phishguard::store::JsonDocumentStore;
use phishguard::sync::S3CliSync;
use phishguard::utils::{
    create_spinner, finish_with_success, finish_with_warning, init_logging, print_banner, print_completion,
    print_config, print_info, print_path, print_step_header, print_step_time, print_success, print_warning,
};
use phishguard::Stage;

fn stage_title(stage: Stage) -> &'static str {
    match stage {
        Stage::Ingestion => "Data Ingestion",
        Stage::Validation => "Data Validation",
        Stage::Transformation => "Data Transformation",
        Stage::Training => "Model Training",
        Stage::Sync => "Remote Sync",
        Stage::Prediction => "Prediction",
    }
}

fn report_state(state: &PipelineState) {
    match state {
        PipelineState::Pending => {}
        PipelineState::Ingested(artifact) => {
            print_path("train:", &artifact.trained_file_path);
            print_path("test: ", &artifact.test_file_path);
        }
        PipelineState::Validated(artifact) => {
            if artifact.validation_status {
                print_success("Schema and drift checks passed");
            } else {
                print_warning("Validation failed; frames written to the invalid paths");
            }
            print_path("drift report:", &artifact.drift_report_file_path);
        }
        PipelineState::Transformed(artifact) => {
            print_path("train array:", &artifact.transformed_train_file_path);
            print_path("test array: ", &artifact.transformed_test_file_path);
            print_path("imputer:    ", &artifact.transformed_object_file_path);
        }
        PipelineState::Trained { artifact, report } => {
            print_success(&format!(
                "Best model: {} (test f1 {:.4})",
                report.best().family,
                artifact.test_metric_artifact.f1_score
            ));
            print_path("model:", &artifact.trained_model_file_path);
        }
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let settings = cli.resolve_settings()?;
    // One timestamp names both the log file and the run's artifact directory
    let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
    let _guard = init_logging(&cli.log_dir, &timestamp, cli.verbose)?;

    // Handle subcommands
    if let Some(command) = &cli.command {
        return match command {
            Commands::Import { input } => cli::import::run_import(input, &settings).map(|_| ()),
            Commands::Predict { input, output } => {
                cli::predict::run_predict(input, output.as_deref(), &settings).map(|_| ())
            }
        };
    }

    let run = RunConfig::with_timestamp(&timestamp, &settings.artifact_dir, &settings.model_dir);
    print_banner(env!("CARGO_PKG_VERSION"));
    print_config(&settings, &run.timestamp);

    let store = Box::new(JsonDocumentStore::new(&settings.store_dir));
    let expected_score = settings.expected_score;
    let mut pipeline = TrainingPipeline::new(settings.clone(), run, store);
    if let Some(bucket) = &settings.bucket {
        pipeline = pipeline.with_remote_sync(Box::new(S3CliSync::new(bucket.clone())));
    }

    let mut step = 0u8;
    while let Some(stage) = pipeline.next_stage() {
        step += 1;
        print_step_header(step, stage_title(stage));
        let step_start = Instant::now();

        // Training draws its own progress bar
        let spinner = (stage != Stage::Training).then(|| create_spinner(&format!("Running {}...", stage)));
        let result = pipeline.advance();
        if let Some(spinner) = &spinner {
            match &result {
                Ok(_) => finish_with_success(spinner, &format!("{} complete", stage_title(stage))),
                Err(_) => finish_with_warning(spinner, &format!("{} failed", stage_title(stage))),
            }
        }
        report_state(result?);
        print_step_time(step_start.elapsed());
    }

    let outcome = pipeline.finish()?;
    for destination in &outcome.synced {
        print_info(&format!("Synced to {}", destination));
    }
    for error in &outcome.sync_errors {
        print_warning(&format!("Sync failed: {}", error));
    }

    println!("\n    {} Training artifact:", style("✧").cyan());
    println!("      {:?}", outcome.training_artifact);

    TrainingSummary::new(&outcome.report, expected_score).display();
    print_completion();

    Ok(())
}
