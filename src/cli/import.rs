//! `phishguard import`: load a CSV file into the document store

use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use crate::config::PipelineSettings;
use crate::pipeline::import_csv_into_store;
use crate::store::JsonDocumentStore;
use crate::utils::create_spinner;

/// Push every row of `input` into the configured collection.
///
/// Returns the number of documents written.
pub fn run_import(input: &Path, settings: &PipelineSettings) -> Result<usize> {
    let store = JsonDocumentStore::new(&settings.store_dir);
    let target = store.collection_path(&settings.database, &settings.collection);

    println!("\n {} Importing CSV into the document store", style("◆").cyan().bold());
    println!("   Input:      {}", style(input.display()).dim());
    println!("   Collection: {}", style(target.display()).dim());
    println!();

    let spinner = create_spinner("Writing documents...");
    let written = import_csv_into_store(input, &store, &settings.database, &settings.collection)
        .with_context(|| format!("Failed to import {}", input.display()))?;
    spinner.finish_with_message(format!("{} {} documents written", style("✓").green(), written));

    Ok(written)
}
