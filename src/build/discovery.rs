//! Source file discovery for the build stages.
//!
//! Walks a source directory with a recursive glob and keeps the files whose
//! extension belongs to the stage.

use glob::glob;
use std::path::{Component, Path, PathBuf};

/// Error during source discovery.
#[derive(Debug)]
pub enum DiscoveryError {
    /// Invalid glob pattern
    InvalidPattern(String, glob::PatternError),
    /// IO error during file enumeration
    Io(std::io::Error),
}

impl std::fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryError::InvalidPattern(pattern, err) => {
                write!(f, "Invalid glob pattern '{}': {}", pattern, err)
            }
            DiscoveryError::Io(err) => write!(f, "IO error during discovery: {}", err),
        }
    }
}

impl std::error::Error for DiscoveryError {}

impl From<std::io::Error> for DiscoveryError {
    fn from(err: std::io::Error) -> Self {
        DiscoveryError::Io(err)
    }
}

/// Discover every file under `base_dir` with one of `extensions`.
///
/// Extensions are compared case-insensitively and without the leading dot.
/// An empty list matches every file. A missing `base_dir` yields no files.
pub fn discover_files(
    base_dir: &Path,
    extensions: &[String],
) -> Result<Vec<PathBuf>, DiscoveryError> {
    let pattern = format!("{}/**/*", glob::Pattern::escape(&base_dir.to_string_lossy()));

    let paths = glob(&pattern).map_err(|e| DiscoveryError::InvalidPattern(pattern.clone(), e))?;

    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) => {
                if path.is_file() && has_extension(&path, extensions) {
                    files.push(path);
                }
            }
            Err(e) => {
                tracing::warn!("error reading path: {}", e);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Check a path's extension against a list.
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => extensions.iter().any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// Whether any segment of a relative path starts with `_`.
///
/// Partials are inputs to other files and never produce output of their own.
pub fn is_partial(relative: &Path) -> bool {
    relative.components().any(|c| match c {
        Component::Normal(s) => s.to_string_lossy().starts_with('_'),
        _ => false,
    })
}
