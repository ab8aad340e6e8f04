//! Path table for a site project.
//!
//! Every directory the pipeline reads or writes is computed once from the
//! project root and the configuration, then shared read-only.

use crate::config::loader::resolve_path;
use crate::config::SiteConfig;
use std::path::{Path, PathBuf};

/// Logical asset categories with a source and an output directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Templates,
    Styles,
    Images,
    Scripts,
}

impl Category {
    /// All categories in watch-table order.
    pub const ALL: [Category; 4] =
        [Category::Templates, Category::Styles, Category::Images, Category::Scripts];
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "templates" => Ok(Category::Templates),
            "styles" => Ok(Category::Styles),
            "images" => Ok(Category::Images),
            "scripts" => Ok(Category::Scripts),
            other => Err(format!("unknown category '{}'", other)),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Templates => write!(f, "templates"),
            Category::Styles => write!(f, "styles"),
            Category::Images => write!(f, "images"),
            Category::Scripts => write!(f, "scripts"),
        }
    }
}

/// Immutable mapping from categories to absolute directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTable {
    root: PathBuf,
    templates: PathBuf,
    styles: PathBuf,
    images: PathBuf,
    scripts: PathBuf,
    dist: PathBuf,
    build_dest: PathBuf,
    assets: PathBuf,
    css: PathBuf,
    js: PathBuf,
    deploy: PathBuf,
}

impl PathTable {
    /// Compute the table for a project rooted at `project_root`.
    pub fn new(project_root: &Path, config: &SiteConfig) -> Self {
        let src = resolve_path(project_root, &config.project.src);
        let dist = resolve_path(project_root, &config.project.dist);
        let build_dest = dist.join(&config.project.name);
        let assets = build_dest.join("assets");

        Self {
            root: project_root.to_path_buf(),
            templates: src.join(&config.paths.templates),
            styles: src.join(&config.paths.styles),
            images: src.join(&config.paths.images),
            scripts: src.join(&config.paths.scripts),
            css: assets.join("stylesheets"),
            js: assets.join("scripts"),
            assets,
            build_dest,
            deploy: resolve_path(project_root, &config.deploy.folder),
            dist,
        }
    }

    /// Project root (directory holding site.toml).
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn templates(&self) -> &Path {
        &self.templates
    }

    pub fn styles(&self) -> &Path {
        &self.styles
    }

    pub fn images(&self) -> &Path {
        &self.images
    }

    pub fn scripts(&self) -> &Path {
        &self.scripts
    }

    /// Build output root, removed by `clean`.
    pub fn dist(&self) -> &Path {
        &self.dist
    }

    /// Template output root. Templates keep their project marker directory,
    /// so pages land inside `build_dest`.
    pub fn html(&self) -> &Path {
        &self.dist
    }

    /// Per-project build folder.
    pub fn build_dest(&self) -> &Path {
        &self.build_dest
    }

    pub fn assets(&self) -> &Path {
        &self.assets
    }

    pub fn css(&self) -> &Path {
        &self.css
    }

    pub fn js(&self) -> &Path {
        &self.js
    }

    /// Target of the deployment rename.
    pub fn deploy(&self) -> &Path {
        &self.deploy
    }

    /// Source directory for a category.
    pub fn source(&self, category: Category) -> &Path {
        match category {
            Category::Templates => &self.templates,
            Category::Styles => &self.styles,
            Category::Images => &self.images,
            Category::Scripts => &self.scripts,
        }
    }

    /// Output directory for a category.
    pub fn output(&self, category: Category) -> &Path {
        match category {
            Category::Templates => self.html(),
            Category::Styles => &self.css,
            Category::Images => &self.assets,
            Category::Scripts => &self.js,
        }
    }
}
