//! The actions behind each task.
//!
//! Every stage reads from the [`PathTable`](crate::paths::PathTable) in its
//! [`BuildContext`](crate::build::BuildContext) and returns a
//! [`StageResult`]. A stage stops at the first failing file; outputs already
//! written stay on disk.

pub mod assets;
pub mod clean;
pub mod deploy;
pub mod rev;
pub mod scripts;
pub mod styles;
pub mod templates;

use crate::build::discovery::{discover_files, DiscoveryError};
use crate::build::error::{ErrorOrigin, StageError};
use std::fs;
use std::path::{Path, PathBuf};

/// Files a stage produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageOutput {
    pub outputs: Vec<PathBuf>,
    /// False when the stage found nothing to do
    pub changed: bool,
}

impl StageOutput {
    pub fn written(outputs: Vec<PathBuf>) -> Self {
        Self { outputs, changed: true }
    }

    pub fn unchanged() -> Self {
        Self { outputs: vec![], changed: false }
    }
}

pub type StageResult = Result<StageOutput, StageError>;

/// FNV-1a hash algorithm.
pub fn fnv1a_hash(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    let mut hash = FNV_OFFSET;
    for byte in data {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Discover the inputs of a stage, mapping discovery failures to the stage.
pub(crate) fn sources(
    origin: ErrorOrigin,
    dir: &Path,
    extensions: &[String],
) -> Result<Vec<PathBuf>, StageError> {
    discover_files(dir, extensions).map_err(|e: DiscoveryError| StageError::new(origin, e.to_string()))
}

/// Path of `file` relative to `base`.
pub(crate) fn relative(origin: ErrorOrigin, base: &Path, file: &Path) -> Result<PathBuf, StageError> {
    file.strip_prefix(base)
        .map(Path::to_path_buf)
        .map_err(|_| StageError::new(origin, format!("{} is outside {}", file.display(), base.display())))
}

/// Write a file, creating parent directories.
pub(crate) fn write_output(origin: ErrorOrigin, path: &Path, contents: &[u8]) -> Result<(), StageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| StageError::io(origin, "Failed to create directory", parent, e))?;
    }
    fs::write(path, contents).map_err(|e| StageError::io(origin, "Failed to write", path, e))
}

pub(crate) fn read_source(origin: ErrorOrigin, path: &Path) -> Result<Vec<u8>, StageError> {
    fs::read(path).map_err(|e| StageError::io(origin, "Failed to read", path, e))
}
