//! Task run command

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use super::{Cli, EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::build::{BuildContext, BuildError, TaskError, TaskRunner};
use crate::config::loader::{
    default_config, find_config, load_config, merge_cli_overrides, project_root, CliOverrides,
};
use crate::config::{ConfigError, SiteConfig};

/// Load the configuration and work out the project root.
///
/// An explicit `--config` must exist; otherwise site.toml is searched
/// upwards from the current directory and defaults apply when none is found.
pub(crate) fn resolve_config(
    explicit: Option<&Path>,
    verbose: bool,
) -> Result<(SiteConfig, PathBuf), ConfigError> {
    let cwd = std::env::current_dir()?;
    let config_path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(path) => {
            if verbose {
                println!("Using config: {}", path.display());
            }
            let config = load_config(Some(&path))?;
            let root = match project_root(&path) {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => cwd,
            };
            Ok((config, root))
        }
        None => {
            if verbose {
                println!("No site.toml found, using defaults");
            }
            Ok((default_config(), cwd))
        }
    }
}

/// Run the tasks named on the command line.
pub fn run_tasks(cli: &Cli) -> ExitCode {
    let (mut config, root) = match resolve_config(cli.config.as_deref(), cli.verbose) {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let overrides = CliOverrides { project: cli.project.clone(), port: cli.port };
    merge_cli_overrides(&mut config, &overrides);

    let root = root.canonicalize().unwrap_or(root);
    let context = BuildContext::new(config, root, cli.flags()).with_verbose(cli.verbose);
    tracing::debug!(
        environment = %context.environment(),
        root = %context.project_root().display(),
        "build context ready"
    );

    let mut runner = TaskRunner::new(context);
    if let Some(jobs) = cli.jobs {
        runner = runner.with_jobs(jobs);
    }

    match runner.run(&cli.tasks) {
        Ok(result) => {
            if result.is_success() {
                println!("{}", result.summary());
                ExitCode::from(EXIT_SUCCESS)
            } else {
                eprintln!("{}", result.summary());
                if cli.fail_on_error {
                    ExitCode::from(EXIT_ERROR)
                } else {
                    ExitCode::from(EXIT_SUCCESS)
                }
            }
        }
        Err(BuildError::Task(e @ TaskError::UnknownTask(_))) => {
            eprintln!("Error: {}", e);
            eprintln!("Run 'sitepipe --list' to see the available tasks");
            ExitCode::from(EXIT_INVALID_ARGS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
