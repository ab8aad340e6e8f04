//! Command-line interface implementation
//!
//! Parses the global flags and task names, then dispatches to the task
//! runner (`run`) or the task listing (`list`).

mod list;
mod run;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::env::BuildFlags;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// sitepipe - build, serve and ship a static site
#[derive(Debug, Parser)]
#[command(name = "sitepipe")]
#[command(about = "sitepipe - build, serve and ship a static site")]
#[command(version)]
pub struct Cli {
    /// Tasks to run (e.g. `default`, `build`, `styles templates`)
    #[arg(default_value = "default")]
    pub tasks: Vec<String>,

    /// Optimise images and minify stylesheets and scripts
    #[arg(long)]
    pub minify: bool,

    /// Build URLs for the staging site
    #[arg(long)]
    pub staging: bool,

    /// Build URLs for the production site (wins over --staging)
    #[arg(long)]
    pub prod: bool,

    /// Path to site.toml (default: search upwards from the current directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the project name used for the output folder
    #[arg(long)]
    pub project: Option<String>,

    /// Override the dev server port
    #[arg(long)]
    pub port: Option<u16>,

    /// Maximum number of tasks run at once
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// List the available tasks and exit
    #[arg(long)]
    pub list: bool,

    /// Exit with an error when any task failed
    #[arg(long)]
    pub fail_on_error: bool,
}

impl Cli {
    /// The build flags selected on the command line.
    pub fn flags(&self) -> BuildFlags {
        BuildFlags { minify: self.minify, staging: self.staging, prod: self.prod }
    }
}

/// Parse the command line and run.
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = crate::logging::init(cli.verbose) {
        eprintln!("Warning: logging unavailable: {}", e);
    }

    if cli.list {
        return list::run_list();
    }

    run::run_tasks(&cli)
}
