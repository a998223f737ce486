//! Document store holding the raw phishing records.
//!
//! Collections are JSON files under `<root>/<database>/`: either
//! `<collection>.json` holding an array of objects or `<collection>.jsonl`
//! with one object per line. Conversion to a DataFrame drops the `_id` key,
//! turns the string `"na"` into null and infers one dtype per column.

use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{PipelineError, Result, Stage, StageContext};

/// One stored record
pub type Document = Map<String, Value>;

/// Identifier key added by the store, never a feature
pub const ID_FIELD: &str = "_id";
/// String sentinel meaning "missing"
pub const NA_SENTINEL: &str = "na";

/// Read access to named collections, plus bulk insert for seeding
pub trait DocumentStore {
    /// Every document of a collection, in stored order
    fn find_all(&self, database: &str, collection: &str) -> Result<Vec<Document>>;

    /// Append documents to a collection, returning how many were written
    fn insert_many(&self, database: &str, collection: &str, documents: &[Document]) -> Result<usize>;
}

/// File-backed store rooted at a directory
#[derive(Debug, Clone)]
pub struct JsonDocumentStore {
    root: PathBuf,
}

impl JsonDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the `.json` collection file
    pub fn collection_path(&self, database: &str, collection: &str) -> PathBuf {
        self.root.join(database).join(format!("{}.json", collection))
    }

    fn lines_path(&self, database: &str, collection: &str) -> PathBuf {
        self.root.join(database).join(format!("{}.jsonl", collection))
    }
}

fn expect_object(value: Value, path: &Path) -> Result<Document> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(PipelineError::validation_at(
            Stage::Ingestion,
            path,
            format!("expected a JSON object, found {}", other),
        )),
    }
}

impl DocumentStore for JsonDocumentStore {
    fn find_all(&self, database: &str, collection: &str) -> Result<Vec<Document>> {
        let array_path = self.collection_path(database, collection);
        let lines_path = self.lines_path(database, collection);

        if array_path.exists() {
            let content = std::fs::read_to_string(&array_path).at_path(Stage::Ingestion, &array_path)?;
            let values: Vec<Value> = serde_json::from_str(&content).at_path(Stage::Ingestion, &array_path)?;
            values.into_iter().map(|v| expect_object(v, &array_path)).collect()
        } else if lines_path.exists() {
            let content = std::fs::read_to_string(&lines_path).at_path(Stage::Ingestion, &lines_path)?;
            content
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(|l| {
                    let v: Value = serde_json::from_str(l).at_path(Stage::Ingestion, &lines_path)?;
                    expect_object(v, &lines_path)
                })
                .collect()
        } else {
            Err(PipelineError::validation_at(
                Stage::Ingestion,
                &array_path,
                format!("collection '{}.{}' does not exist", database, collection),
            ))
        }
    }

    fn insert_many(&self, database: &str, collection: &str, documents: &[Document]) -> Result<usize> {
        let path = self.collection_path(database, collection);
        let mut existing = if path.exists() {
            self.find_all(database, collection)?
        } else {
            Vec::new()
        };
        existing.extend(documents.iter().cloned());

        crate::io::ensure_parent_dir(&path, Stage::Ingestion)?;
        let json = serde_json::to_string(&existing).at_path(Stage::Ingestion, &path)?;
        std::fs::write(&path, json).at_path(Stage::Ingestion, &path)?;
        debug!(path = %path.display(), inserted = documents.len(), total = existing.len(), "collection written");
        Ok(documents.len())
    }
}

// ============================================================================
// Documents <-> DataFrame
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InferredType {
    Int,
    Float,
    Bool,
    Text,
}

fn infer_type(values: &[&Value]) -> InferredType {
    let present: Vec<&&Value> = values.iter().filter(|v| !v.is_null()).collect();
    if present.is_empty() {
        return InferredType::Float;
    }
    if present.iter().all(|v| v.is_i64() || v.is_u64()) {
        InferredType::Int
    } else if present.iter().all(|v| v.is_number()) {
        InferredType::Float
    } else if present.iter().all(|v| v.is_boolean()) {
        InferredType::Bool
    } else {
        InferredType::Text
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Build a DataFrame from documents.
///
/// Columns follow the first-seen order of keys; a key absent from a document
/// reads as null.
pub fn documents_to_dataframe(documents: &[Document]) -> Result<DataFrame> {
    let mut names: Vec<String> = Vec::new();
    for doc in documents {
        for key in doc.keys() {
            if key != ID_FIELD && !names.contains(key) {
                names.push(key.clone());
            }
        }
    }

    let null = Value::Null;
    let mut columns: Vec<Column> = Vec::with_capacity(names.len());
    for name in &names {
        let raw: Vec<&Value> = documents
            .iter()
            .map(|d| match d.get(name) {
                Some(Value::String(s)) if s == NA_SENTINEL => &null,
                Some(v) => v,
                None => &null,
            })
            .collect();

        let column = match infer_type(&raw) {
            InferredType::Int => Column::new(name.as_str().into(), raw.iter().map(|v| v.as_i64()).collect::<Vec<_>>()),
            InferredType::Float => Column::new(name.as_str().into(), raw.iter().map(|v| v.as_f64()).collect::<Vec<_>>()),
            InferredType::Bool => Column::new(name.as_str().into(), raw.iter().map(|v| v.as_bool()).collect::<Vec<_>>()),
            InferredType::Text => Column::new(name.as_str().into(), raw.iter().map(|v| text_of(v)).collect::<Vec<_>>()),
        };
        columns.push(column);
    }

    DataFrame::new(columns).map_err(|e| PipelineError::validation(Stage::Ingestion, e.to_string()))
}

fn column_values(column: &Column) -> PolarsResult<Vec<Value>> {
    let dtype = column.dtype();
    let values = if dtype.is_integer() {
        let cast = column.cast(&DataType::Int64)?;
        cast.i64()?.into_iter().map(|v| v.map_or(Value::Null, Value::from)).collect()
    } else if dtype.is_float() {
        let cast = column.cast(&DataType::Float64)?;
        cast.f64()?
            .into_iter()
            .map(|v| v.map_or(Value::Null, Value::from))
            .collect()
    } else if matches!(dtype, DataType::Boolean) {
        column.bool()?.into_iter().map(|v| v.map_or(Value::Null, Value::from)).collect()
    } else {
        let cast = column.cast(&DataType::String)?;
        cast.str()?.into_iter().map(|v| v.map_or(Value::Null, Value::from)).collect()
    };
    Ok(values)
}

/// Turn every row of a DataFrame into a document
pub fn dataframe_to_documents(df: &DataFrame) -> Result<Vec<Document>> {
    let mut documents = vec![Document::new(); df.height()];
    for column in df.get_columns() {
        let values = column_values(column).map_err(|e| PipelineError::validation(Stage::Ingestion, e.to_string()))?;
        for (doc, value) in documents.iter_mut().zip(values) {
            doc.insert(column.name().to_string(), value);
        }
    }
    Ok(documents)
}
