//! Expected dataset layout, read from YAML.
//!
//! ```yaml
//! columns:
//!   - having_IP_Address: int64
//!   - URL_Length: int64
//! numerical_columns:
//!   - having_IP_Address
//!   - URL_Length
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{PipelineError, Result, Stage};
use crate::io::read_yaml_file;

#[derive(Debug, Deserialize)]
struct RawSchema {
    columns: Vec<BTreeMap<String, String>>,
    #[serde(default)]
    numerical_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataSchema {
    /// Column names with their declared kind, in file order
    pub columns: Vec<(String, String)>,
    pub numerical_columns: Vec<String>,
}

impl DataSchema {
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(PipelineError::validation_at(
                Stage::Validation,
                path,
                "schema file not found",
            ));
        }
        let raw: RawSchema = read_yaml_file(path, Stage::Validation)?;

        let mut columns = Vec::with_capacity(raw.columns.len());
        for entry in raw.columns {
            if entry.len() != 1 {
                return Err(PipelineError::validation_at(
                    Stage::Validation,
                    path,
                    format!("each column entry must map one name to a kind, got {:?}", entry),
                ));
            }
            columns.extend(entry);
        }
        Ok(Self {
            columns,
            numerical_columns: raw.numerical_columns,
        })
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }
}
