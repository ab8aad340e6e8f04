//! Remove the build output.

use super::{StageOutput, StageResult};
use crate::build::error::{ErrorOrigin, StageError};
use crate::build::BuildContext;
use std::fs;
use std::path::{Path, PathBuf};

const ORIGIN: ErrorOrigin = ErrorOrigin::Clean;

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// The first of the project root and source directories that lives inside
/// `dist`, if any.
fn protected_inside(ctx: &BuildContext, dist: &Path) -> Option<PathBuf> {
    let paths = ctx.paths();
    let dist = canonical(dist);
    [paths.root(), paths.templates(), paths.styles(), paths.images(), paths.scripts()]
        .into_iter()
        .find(|p| canonical(p).starts_with(&dist))
        .map(Path::to_path_buf)
}

/// Delete the whole dist directory. A missing directory is not an error.
///
/// Refuses to delete a directory holding the project root or any source
/// directory.
pub fn run(ctx: &BuildContext) -> StageResult {
    let dist = ctx.paths().dist();
    if !dist.exists() {
        tracing::debug!(path = %dist.display(), "nothing to clean");
        return Ok(StageOutput::unchanged());
    }

    if let Some(protected) = protected_inside(ctx, dist) {
        return Err(StageError::new(
            ORIGIN,
            format!(
                "refusing to remove {}: it contains {}",
                dist.display(),
                protected.display()
            ),
        ));
    }

    fs::remove_dir_all(dist)
        .map_err(|e| StageError::io(ORIGIN, "Failed to remove", dist, e))?;
    Ok(StageOutput::written(vec![]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use crate::env::BuildFlags;
    use tempfile::TempDir;

    #[test]
    fn test_clean_removes_dist() {
        let temp = TempDir::new().unwrap();
        let ctx = BuildContext::new(default_config(), temp.path().to_path_buf(), BuildFlags::default());
        fs::create_dir_all(ctx.paths().css()).unwrap();
        fs::write(ctx.paths().css().join("index.css"), "").unwrap();

        let output = run(&ctx).unwrap();
        assert!(output.changed);
        assert!(!ctx.paths().dist().exists());
    }

    #[test]
    fn test_clean_refuses_project_root() {
        let temp = TempDir::new().unwrap();
        let mut config = default_config();
        config.project.dist = PathBuf::from(".");
        let ctx = BuildContext::new(config, temp.path().to_path_buf(), BuildFlags::default());
        fs::write(temp.path().join("site.toml"), "").unwrap();

        let err = run(&ctx).unwrap_err();
        assert_eq!(err.origin, ErrorOrigin::Clean);
        assert!(err.message.contains("refusing"));
        assert!(temp.path().join("site.toml").exists());
    }

    #[test]
    fn test_clean_refuses_parent_of_sources() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("site");
        let mut config = default_config();
        config.project.src = temp.path().join("shared/src");
        config.project.dist = temp.path().join("shared");
        let ctx = BuildContext::new(config, root.clone(), BuildFlags::default());
        fs::create_dir_all(ctx.paths().styles()).unwrap();
        fs::write(ctx.paths().styles().join("index.css"), "").unwrap();

        assert!(run(&ctx).is_err());
        assert!(ctx.paths().styles().join("index.css").exists());
    }

    #[test]
    fn test_clean_sibling_dist() {
        let temp = TempDir::new().unwrap();
        let mut config = default_config();
        config.project.dist = PathBuf::from("../out");
        let root = temp.path().join("site");
        fs::create_dir_all(&root).unwrap();
        let ctx = BuildContext::new(config, root.clone(), BuildFlags::default());
        fs::create_dir_all(ctx.paths().css()).unwrap();

        assert!(run(&ctx).unwrap().changed);
        assert!(!temp.path().join("out").exists());
        assert!(root.exists());
    }

    #[test]
    fn test_clean_without_dist() {
        let temp = TempDir::new().unwrap();
        let ctx = BuildContext::new(default_config(), temp.path().to_path_buf(), BuildFlags::default());

        let output = run(&ctx).unwrap();
        assert!(!output.changed);
    }
}
