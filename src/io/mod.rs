//! File-system helpers: tabular data, numeric arrays, persisted objects

pub mod loader;
pub mod npy;
pub mod object;

pub use loader::*;
pub use npy::*;
pub use object::*;

use std::path::Path;

use crate::error::{Result, Stage, StageContext};

/// Create the parent directory of `path` if it does not exist yet
pub fn ensure_parent_dir(path: &Path, stage: Stage) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).at_path(stage, parent)?;
        }
    }
    Ok(())
}
