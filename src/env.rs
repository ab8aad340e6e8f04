//! Environment resolution and URL helpers for templates.
//!
//! The three build flags collapse into one [`Environment`] tag with
//! `prod` taking precedence over `staging`. [`UrlHelpers`] turns the tag
//! and the remote configuration into the prefixes pages use for assets.

use crate::config::RemoteConfig;
use std::path::{Component, Path};

/// Global build flags, parsed once from the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildFlags {
    /// Optimise images, minify stylesheets and scripts
    pub minify: bool,
    /// Build for the staging site
    pub staging: bool,
    /// Build for the production site (wins over `staging`)
    pub prod: bool,
}

/// Deployment environment tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Environment {
    Dev,
    Staging,
    Production,
}

impl Environment {
    /// Resolve the tag: `prod` > `staging` > `dev`.
    pub fn resolve(flags: &BuildFlags) -> Self {
        if flags.prod {
            Environment::Production
        } else if flags.staging {
            Environment::Staging
        } else {
            Environment::Dev
        }
    }

    /// Whether pages are served from the remote deployment folder.
    pub fn is_remote(&self) -> bool {
        !matches!(self, Environment::Dev)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Dev => write!(f, "dev"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// URL construction shared by every page of one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlHelpers {
    environment: Environment,
    folder_prefix: String,
    root_path: String,
}

impl UrlHelpers {
    pub fn new(flags: &BuildFlags, remote: &RemoteConfig) -> Self {
        let environment = Environment::resolve(flags);
        let folder_prefix = if environment.is_remote() {
            format!("/{}", remote.folder_name)
        } else {
            String::new()
        };
        let root_path = match environment {
            Environment::Production => remote.production.clone(),
            Environment::Staging => remote.staging_root(),
            Environment::Dev => "/".to_string(),
        };

        Self { environment, folder_prefix, root_path }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// `/<folder>` on staging and production, empty in development.
    pub fn folder_prefix(&self) -> &str {
        &self.folder_prefix
    }

    pub fn image_url(&self, file: &str) -> String {
        format!("{}/assets/images/{}", self.folder_prefix, file)
    }

    pub fn css_url(&self, file: &str) -> String {
        format!("{}/assets/stylesheets/{}", self.folder_prefix, file)
    }

    pub fn js_url(&self, file: &str) -> String {
        format!("{}/assets/scripts/{}", self.folder_prefix, file)
    }

    /// Site root the current environment is served from.
    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    pub fn is_prod(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Helpers for one page.
    pub fn for_page(&self, page_path: String) -> PageHelpers {
        PageHelpers { urls: self.clone(), page_path }
    }
}

/// Values injected into a single template render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageHelpers {
    pub urls: UrlHelpers,
    pub page_path: String,
}

/// Derive the page path of a template.
///
/// The template root is stripped, the extension removed and the leading
/// segment (the project marker directory) dropped before the remaining
/// segments are joined with `/`. Returns `None` when `file` is not under
/// `template_root`.
pub fn page_path(template_root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(template_root).ok()?;
    let relative = relative.with_extension("");

    let segments: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    Some(segments.into_iter().skip(1).collect::<Vec<_>>().join("/"))
}
