//! Dataset loader and writer for CSV and Parquet files

use std::path::Path;

use polars::prelude::*;

use super::ensure_parent_dir;
use crate::error::{PipelineError, Result, Stage, StageContext};

/// Rows used for CSV schema inference
pub const INFER_SCHEMA_LENGTH: usize = 10_000;

fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Load a dataset from a file (CSV or Parquet based on extension)
pub fn load_dataset(path: &Path, stage: Stage) -> Result<DataFrame> {
    let extension = file_extension(path);

    let lf = match extension.as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_infer_schema_length(Some(INFER_SCHEMA_LENGTH))
            .finish()
            .at_path(stage, path)?,
        "parquet" => LazyFrame::scan_parquet(path, Default::default()).at_path(stage, path)?,
        _ => {
            return Err(PipelineError::validation_at(
                stage,
                path,
                format!(
                    "Unsupported file format: {}. Supported formats: csv, parquet",
                    extension
                ),
            ))
        }
    };

    lf.collect().at_path(stage, path)
}

/// Save a dataset to file (CSV or Parquet based on extension), creating parent directories
pub fn save_dataset(df: &mut DataFrame, path: &Path, stage: Stage) -> Result<()> {
    let extension = file_extension(path);
    ensure_parent_dir(path, stage)?;

    match extension.as_str() {
        "csv" => {
            let mut file = std::fs::File::create(path).at_path(stage, path)?;
            CsvWriter::new(&mut file).finish(df).at_path(stage, path)?;
        }
        "parquet" => {
            let file = std::fs::File::create(path).at_path(stage, path)?;
            ParquetWriter::new(file).finish(df).at_path(stage, path)?;
        }
        _ => {
            return Err(PipelineError::validation_at(
                stage,
                path,
                format!(
                    "Unsupported output format: {}. Supported formats: csv, parquet",
                    extension
                ),
            ))
        }
    }

    Ok(())
}

/// Column names of a DataFrame as owned strings
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}

/// Whether a column holds categorical (non-numeric) data
pub fn is_categorical(dtype: &DataType) -> bool {
    matches!(dtype, DataType::String | DataType::Categorical(..))
}

/// Extract a column as `f64` values, nulls mapped to NaN
pub fn column_as_f64(df: &DataFrame, name: &str, stage: Stage) -> Result<Vec<f64>> {
    let column = df.column(name).map_err(|_| {
        PipelineError::validation(stage, format!("Column '{}' not found", name))
    })?;

    if is_categorical(column.dtype()) {
        return Err(PipelineError::validation(
            stage,
            format!("Column '{}' is not numeric (dtype {})", name, column.dtype()),
        ));
    }

    let float_col = column.cast(&DataType::Float64).map_err(|e| {
        PipelineError::validation(stage, format!("Column '{}' cannot be cast to Float64: {}", name, e))
    })?;
    let ca = float_col
        .f64()
        .map_err(|e| PipelineError::validation(stage, e.to_string()))?;

    Ok(ca.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

/// Gather named columns into a dense matrix, nulls mapped to NaN
pub fn columns_to_matrix(df: &DataFrame, names: &[String], stage: Stage) -> Result<faer::Mat<f64>> {
    let columns = names
        .iter()
        .map(|name| column_as_f64(df, name, stage))
        .collect::<Result<Vec<_>>>()?;
    Ok(faer::Mat::from_fn(df.height(), names.len(), |i, j| columns[j][i]))
}
