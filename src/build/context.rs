//! Build context containing configuration and state for a build.

use crate::config::SiteConfig;
use crate::env::{BuildFlags, Environment, UrlHelpers};
use crate::paths::PathTable;
use std::path::{Path, PathBuf};

/// Build context containing configuration and paths for a run.
///
/// The context is built once in `main` and shared read-only by every task,
/// watcher worker and the dev server.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// The loaded configuration
    config: SiteConfig,
    /// Project root directory (where site.toml is located)
    project_root: PathBuf,
    paths: PathTable,
    flags: BuildFlags,
    urls: UrlHelpers,
    /// Whether to run in verbose mode
    verbose: bool,
}

impl BuildContext {
    /// Create a new build context.
    ///
    /// # Arguments
    /// - `config` - The loaded configuration
    /// - `project_root` - The project root directory
    /// - `flags` - Build flags from the command line
    pub fn new(config: SiteConfig, project_root: PathBuf, flags: BuildFlags) -> Self {
        let paths = PathTable::new(&project_root, &config);
        let urls = UrlHelpers::new(&flags, &config.remote);
        Self { config, project_root, paths, flags, urls, verbose: false }
    }

    /// Get the configuration.
    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Get the project root directory.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn paths(&self) -> &PathTable {
        &self.paths
    }

    pub fn flags(&self) -> BuildFlags {
        self.flags
    }

    pub fn urls(&self) -> &UrlHelpers {
        &self.urls
    }

    pub fn environment(&self) -> Environment {
        self.urls.environment()
    }

    /// Whether outputs should be minified and images optimised.
    pub fn minify(&self) -> bool {
        self.flags.minify
    }

    /// Whether verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}
