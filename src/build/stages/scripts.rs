//! Script bundling.
//!
//! Entries are handed to the configured bundler command, or copied verbatim
//! when no bundler is configured.

use super::{read_source, write_output, StageOutput, StageResult};
use crate::build::error::{ErrorOrigin, StageError};
use crate::build::BuildContext;
use std::fs;
use std::path::Path;

const ORIGIN: ErrorOrigin = ErrorOrigin::Scripts;

/// Bundle every configured entry into the script output directory.
pub fn run(ctx: &BuildContext) -> StageResult {
    let scripts = &ctx.config().scripts;
    let mut outputs = Vec::new();

    for entry in &scripts.entries {
        let source = ctx.paths().scripts().join(entry);
        let Some(file_name) = source.file_name() else {
            return Err(StageError::new(ORIGIN, format!("invalid entry '{}'", entry.display())));
        };
        let outfile = ctx.paths().js().join(file_name);

        if !source.is_file() {
            return Err(StageError::new(ORIGIN, "entry not found").in_file(&source));
        }

        if scripts.bundler.is_empty() {
            let contents = read_source(ORIGIN, &source)?;
            write_output(ORIGIN, &outfile, &contents)?;
        } else {
            bundle(ctx, &source, &outfile)
                .map_err(|message| StageError::new(ORIGIN, message).in_file(&source))?;
        }

        outputs.push(outfile);
    }

    if outputs.is_empty() {
        return Ok(StageOutput::unchanged());
    }
    Ok(StageOutput::written(outputs))
}

/// Expand `{entry}` / `{outfile}` placeholders in a bundler argument.
pub fn expand_arg(arg: &str, entry: &Path, outfile: &Path) -> String {
    arg.replace("{entry}", &entry.to_string_lossy())
        .replace("{outfile}", &outfile.to_string_lossy())
}

fn bundle(ctx: &BuildContext, entry: &Path, outfile: &Path) -> Result<(), String> {
    let scripts = &ctx.config().scripts;
    let Some((program, rest)) = scripts.bundler.split_first() else {
        return Err("empty bundler command".to_string());
    };

    let mut args: Vec<String> = rest.iter().map(|a| expand_arg(a, entry, outfile)).collect();
    if ctx.minify() {
        args.extend(scripts.minify_args.iter().cloned());
    }

    if let Some(parent) = outfile.parent() {
        fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }

    let output = duct::cmd(program.as_str(), &args)
        .dir(ctx.project_root())
        .stdout_capture()
        .stderr_capture()
        .unchecked()
        .run()
        .map_err(|e| format!("failed to run '{}': {}", program, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("bundler exited with {}: {}", output.status, stderr.trim()));
    }
    if !outfile.exists() {
        return Err(format!("bundler did not write {}", outfile.display()));
    }
    Ok(())
}
