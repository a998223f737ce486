//! Persisted objects (fitted transformers, models, reports)

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::ensure_parent_dir;
use crate::error::{Result, Stage, StageContext};

/// Serialize an object to pretty JSON at `path`, creating parent directories
pub fn save_object<T: Serialize>(path: &Path, object: &T, stage: Stage) -> Result<()> {
    ensure_parent_dir(path, stage)?;
    let json = serde_json::to_string_pretty(object).at_path(stage, path)?;
    std::fs::write(path, json).at_path(stage, path)
}

/// Deserialize a JSON object from `path`
pub fn load_object<T: DeserializeOwned>(path: &Path, stage: Stage) -> Result<T> {
    let content = std::fs::read_to_string(path).at_path(stage, path)?;
    serde_json::from_str(&content).at_path(stage, path)
}

/// Serialize a value to YAML at `path`, creating parent directories
pub fn write_yaml_file<T: Serialize>(path: &Path, content: &T, stage: Stage) -> Result<()> {
    ensure_parent_dir(path, stage)?;
    let yaml = serde_yaml::to_string(content).at_path(stage, path)?;
    std::fs::write(path, yaml).at_path(stage, path)
}

/// Read a YAML file into `T`
pub fn read_yaml_file<T: DeserializeOwned>(path: &Path, stage: Stage) -> Result<T> {
    let content = std::fs::read_to_string(path).at_path(stage, path)?;
    serde_yaml::from_str(&content).at_path(stage, path)
}
