//! Deployment rename: move the per-project build folder to the folder the
//! hosting service publishes.

use super::{StageOutput, StageResult};
use crate::build::error::{ErrorOrigin, StageError};
use crate::build::BuildContext;
use std::fs;

const ORIGIN: ErrorOrigin = ErrorOrigin::Deploy;

/// Rename `build_dest` to the deploy folder.
///
/// Fails when the build folder is missing. An existing deploy folder is an
/// error unless `deploy.overwrite` is set, in which case it is removed first.
pub fn run(ctx: &BuildContext) -> StageResult {
    let from = ctx.paths().build_dest();
    let to = ctx.paths().deploy();

    if !from.is_dir() {
        return Err(StageError::new(
            ORIGIN,
            format!("build folder {} does not exist", from.display()),
        ));
    }

    if to.exists() {
        if !ctx.config().deploy.overwrite {
            return Err(StageError::new(
                ORIGIN,
                format!("{} already exists (set deploy.overwrite to replace it)", to.display()),
            ));
        }
        tracing::info!(path = %to.display(), "replacing existing deploy folder");
        let removed = if to.is_dir() { fs::remove_dir_all(to) } else { fs::remove_file(to) };
        removed.map_err(|e| StageError::io(ORIGIN, "Failed to remove", to, e))?;
    }

    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| StageError::io(ORIGIN, "Failed to create directory", parent, e))?;
    }

    fs::rename(from, to).map_err(|e| {
        StageError::new(ORIGIN, format!("rename {} -> {}: {}", from.display(), to.display(), e))
    })?;

    Ok(StageOutput::written(vec![to.to_path_buf()]))
}
