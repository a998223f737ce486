//! `phishguard predict`: batch predictions with the production model

use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use crate::config::PipelineSettings;
use crate::pipeline::prediction::{default_output_path, predict_file};
use crate::utils::create_spinner;

pub fn run_predict(input: &Path, output: Option<&Path>, settings: &PipelineSettings) -> Result<usize> {
    let output_path = output.map(Path::to_path_buf).unwrap_or_else(default_output_path);

    println!("\n {} Predicting with {}", style("◆").cyan().bold(), settings.model_dir.display());
    println!("   Input:  {}", style(input.display()).dim());
    println!("   Output: {}", style(output_path.display()).dim());
    println!();

    let spinner = create_spinner("Imputing and predicting...");
    let rows = predict_file(&settings.model_dir, input, &output_path)
        .with_context(|| format!("Failed to predict {}", input.display()))?;
    spinner.finish_with_message(format!("{} {} rows predicted", style("✓").green(), rows));

    Ok(rows)
}
