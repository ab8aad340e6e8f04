//! Configuration schema types for `site.toml`
//!
//! Defines the structure and validation rules for a site project.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Project metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name; also the folder under `dist` that receives the build
    #[serde(default = "default_project_name")]
    pub name: String,
    /// Source root, parent of every category directory
    #[serde(default = "default_src")]
    pub src: PathBuf,
    /// Build output root (removed by `clean`)
    #[serde(default = "default_dist")]
    pub dist: PathBuf,
}

fn default_project_name() -> String {
    "official-site".to_string()
}

fn default_src() -> PathBuf {
    PathBuf::from("src")
}

fn default_dist() -> PathBuf {
    PathBuf::from("dist")
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self { name: default_project_name(), src: default_src(), dist: default_dist() }
    }
}

/// Source category directories, relative to `project.src`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_templates_dir")]
    pub templates: PathBuf,
    #[serde(default = "default_styles_dir")]
    pub styles: PathBuf,
    #[serde(default = "default_images_dir")]
    pub images: PathBuf,
    #[serde(default = "default_scripts_dir")]
    pub scripts: PathBuf,
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("pug")
}

fn default_styles_dir() -> PathBuf {
    PathBuf::from("sass")
}

fn default_images_dir() -> PathBuf {
    PathBuf::from("assets")
}

fn default_scripts_dir() -> PathBuf {
    PathBuf::from("scripts")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            templates: default_templates_dir(),
            styles: default_styles_dir(),
            images: default_images_dir(),
            scripts: default_scripts_dir(),
        }
    }
}

/// Remote deployment locations used to build absolute URLs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Folder the site is published under on staging and production
    #[serde(default = "default_folder_name")]
    pub folder_name: String,
    /// Root URL of the production site
    #[serde(default = "default_production_root")]
    pub production: String,
    /// Root URL of the staging site (defaults to `/<folder_name>/`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging: Option<String>,
}

fn default_folder_name() -> String {
    "pesaro".to_string()
}

fn default_production_root() -> String {
    "https://sorarize.github.io/pesaro/".to_string()
}

impl RemoteConfig {
    /// Staging root, falling back to the deployment folder.
    pub fn staging_root(&self) -> String {
        self.staging.clone().unwrap_or_else(|| format!("/{}/", self.folder_name))
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self { folder_name: default_folder_name(), production: default_production_root(), staging: None }
    }
}

/// Deployment rename settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Folder (relative to the project root) the build is renamed to
    #[serde(default = "default_deploy_folder")]
    pub folder: PathBuf,
    /// Remove an existing deploy folder before renaming
    #[serde(default)]
    pub overwrite: bool,
}

fn default_deploy_folder() -> PathBuf {
    PathBuf::from("docs")
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self { folder: default_deploy_folder(), overwrite: false }
    }
}

/// Template stage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatesConfig {
    /// File extension of template sources
    #[serde(default = "default_template_extension")]
    pub extension: String,
}

fn default_template_extension() -> String {
    "html".to_string()
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self { extension: default_template_extension() }
    }
}

/// Stylesheet stage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StylesConfig {
    /// Sass compiler executable used for `.sass` / `.scss` sources
    #[serde(default = "default_sass_command")]
    pub command: String,
    /// Extra load paths handed to the sass compiler
    #[serde(default)]
    pub load_paths: Vec<PathBuf>,
    /// Stylesheet source extensions
    #[serde(default = "default_style_extensions")]
    pub extensions: Vec<String>,
}

fn default_sass_command() -> String {
    "sass".to_string()
}

fn default_style_extensions() -> Vec<String> {
    vec!["sass".to_string(), "scss".to_string(), "css".to_string()]
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            command: default_sass_command(),
            load_paths: vec![],
            extensions: default_style_extensions(),
        }
    }
}

/// Script stage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptsConfig {
    /// Entry points, relative to the scripts directory
    #[serde(default = "default_script_entries")]
    pub entries: Vec<PathBuf>,
    /// Bundler command line; `{entry}` and `{outfile}` are substituted.
    /// Entries are copied verbatim when unset.
    #[serde(default)]
    pub bundler: Vec<String>,
    /// Arguments appended to the bundler command when minifying
    #[serde(default = "default_minify_args")]
    pub minify_args: Vec<String>,
}

fn default_script_entries() -> Vec<PathBuf> {
    vec![PathBuf::from("index.js")]
}

fn default_minify_args() -> Vec<String> {
    vec!["--minify".to_string()]
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self { entries: default_script_entries(), bundler: vec![], minify_args: default_minify_args() }
    }
}

/// Image/asset stage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    /// Extensions copied into the build
    #[serde(default = "default_image_extensions")]
    pub extensions: Vec<String>,
    /// JPEG quality used when minifying (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_image_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "gif", "svg", "cur", "mp4"].iter().map(|s| s.to_string()).collect()
}

fn default_jpeg_quality() -> u8 {
    80
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self { extensions: default_image_extensions(), jpeg_quality: default_jpeg_quality() }
    }
}

/// Development server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Default document for directory requests
    #[serde(default = "default_index")]
    pub index: String,
    /// Extension appended to extensionless routes
    #[serde(default = "default_route_extension")]
    pub extension: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_index() -> String {
    "index.html".to_string()
}

fn default_route_extension() -> String {
    "html".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            index: default_index(),
            extension: default_route_extension(),
        }
    }
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
}

fn default_debounce_ms() -> u32 {
    100
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: default_debounce_ms() }
    }
}

/// Complete site.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub deploy: DeployConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub styles: StylesConfig,
    #[serde(default)]
    pub scripts: ScriptsConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "server.port")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "site.toml: '{}' {}", self.field, self.message)
    }
}

impl SiteConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: &str| {
            errors.push(ConfigValidationError {
                field: field.to_string(),
                message: message.to_string(),
            });
        };

        if self.project.name.is_empty() {
            push("project.name", "must be a non-empty string");
        } else if self.project.name.contains(['/', '\\'])
            || self.project.name == "."
            || self.project.name == ".."
        {
            push("project.name", "must be a single path segment");
        }

        let dist = lexical(&self.project.dist);
        if self.project.dist.as_os_str().is_empty() {
            push("project.dist", "must be a non-empty path");
        } else if !self.project.dist.is_absolute() && is_ancestor_of_root(&dist) {
            push("project.dist", "must not be the project root or one of its parents");
        } else if !self.project.dist.is_absolute()
            && !self.project.src.is_absolute()
            && lexical(&self.project.src).starts_with(&dist)
        {
            push("project.dist", "must not contain project.src");
        }

        if self.remote.folder_name.contains('/') {
            push("remote.folder_name", "must not contain '/'");
        }

        if self.templates.extension.is_empty() || self.templates.extension.starts_with('.') {
            push("templates.extension", "must be an extension without a leading dot");
        }

        if self.styles.extensions.is_empty() {
            push("styles.extensions", "must contain at least one extension");
        }

        if self.scripts.entries.is_empty() {
            push("scripts.entries", "must contain at least one entry point");
        }

        if self.images.jpeg_quality == 0 || self.images.jpeg_quality > 100 {
            push("images.jpeg_quality", "must be between 1 and 100");
        }

        if self.server.index.is_empty() {
            push("server.index", "must be a non-empty file name");
        }

        if self.deploy.folder.as_os_str().is_empty() {
            push("deploy.folder", "must be a non-empty path");
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

/// Normalize `.` and `..` without touching the filesystem.
fn lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(out.components().next_back(), Some(Component::Normal(_))) || !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// A relative path made only of `..` (or nothing) names the root or a parent.
fn is_ancestor_of_root(relative: &Path) -> bool {
    relative.components().all(|c| c == Component::ParentDir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_parse() {
        let config: SiteConfig = toml::from_str("").unwrap();
        assert_eq!(config.project.name, "official-site");
        assert_eq!(config.project.src, PathBuf::from("src"));
        assert_eq!(config.project.dist, PathBuf::from("dist"));
        assert_eq!(config.paths.templates, PathBuf::from("pug"));
        assert_eq!(config.remote.folder_name, "pesaro");
        assert_eq!(config.deploy.folder, PathBuf::from("docs"));
        assert_eq!(config.server.port, 3000);
        assert!(config.is_valid());
    }

    #[test]
    fn test_full_config_parse() {
        let toml = r#"
[project]
name = "landing"
src = "source"
dist = "public"

[paths]
templates = "views"
styles = "css"
images = "img"
scripts = "js"

[remote]
folder_name = "landing"
production = "https://example.com/landing/"
staging = "https://staging.example.com/landing/"

[deploy]
folder = "site"
overwrite = true

[templates]
extension = "tera"

[styles]
command = "dart-sass"
load_paths = ["node_modules/reset-css"]

[scripts]
entries = ["main.js", "admin.js"]
bundler = ["esbuild", "{entry}", "--bundle", "--outfile={outfile}"]

[images]
jpeg_quality = 65

[server]
port = 8080
index = "home.html"

[watch]
debounce_ms = 250
"#;
        let config: SiteConfig = toml::from_str(toml).unwrap();

        assert_eq!(config.project.name, "landing");
        assert_eq!(config.paths.styles, PathBuf::from("css"));
        assert_eq!(config.remote.staging_root(), "https://staging.example.com/landing/");
        assert!(config.deploy.overwrite);
        assert_eq!(config.templates.extension, "tera");
        assert_eq!(config.styles.command, "dart-sass");
        assert_eq!(config.styles.load_paths.len(), 1);
        assert_eq!(config.scripts.entries.len(), 2);
        assert_eq!(config.scripts.bundler[0], "esbuild");
        assert_eq!(config.scripts.minify_args, vec!["--minify".to_string()]);
        assert_eq!(config.images.jpeg_quality, 65);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.extension, "html");
        assert_eq!(config.watch.debounce_ms, 250);
        assert!(config.is_valid());
    }

    #[test]
    fn test_staging_root_defaults_to_folder() {
        let config = SiteConfig::default();
        assert_eq!(config.remote.staging_root(), "/pesaro/");
    }

    #[test]
    fn test_validation_empty_name() {
        let config: SiteConfig = toml::from_str("[project]\nname = \"\"").unwrap();
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.field == "project.name"));
    }

    #[test]
    fn test_validation_nested_name() {
        let config: SiteConfig = toml::from_str("[project]\nname = \"a/b\"").unwrap();
        assert!(config.validate().iter().any(|e| e.field == "project.name"));
    }

    #[test]
    fn test_validation_dot_name() {
        for name in [".", ".."] {
            let config: SiteConfig =
                toml::from_str(&format!("[project]\nname = \"{}\"", name)).unwrap();
            assert!(config.validate().iter().any(|e| e.field == "project.name"), "{}", name);
        }
    }

    #[test]
    fn test_validation_dist_is_root() {
        for dist in ["", ".", "./", "..", "../..", "out/../.."] {
            let config: SiteConfig =
                toml::from_str(&format!("[project]\ndist = \"{}\"", dist)).unwrap();
            assert!(config.validate().iter().any(|e| e.field == "project.dist"), "{:?}", dist);
        }
    }

    #[test]
    fn test_validation_dist_contains_src() {
        let config: SiteConfig =
            toml::from_str("[project]\nsrc = \"site/src\"\ndist = \"site\"").unwrap();
        assert!(config.validate().iter().any(|e| e.field == "project.dist"));

        let config: SiteConfig = toml::from_str("[project]\ndist = \"./src\"").unwrap();
        assert!(config.validate().iter().any(|e| e.field == "project.dist"));
    }

    #[test]
    fn test_validation_dist_elsewhere_ok() {
        for dist in ["build", "out/site", "../public", "/tmp/site-out"] {
            let config: SiteConfig =
                toml::from_str(&format!("[project]\ndist = \"{}\"", dist)).unwrap();
            assert!(config.is_valid(), "{:?}", dist);
        }
    }

    #[test]
    fn test_lexical() {
        assert_eq!(lexical(Path::new("./a/b/../c")), PathBuf::from("a/c"));
        assert_eq!(lexical(Path::new("a/../..")), PathBuf::from(".."));
        assert_eq!(lexical(Path::new(".")), PathBuf::new());
    }

    #[test]
    fn test_validation_jpeg_quality() {
        let config: SiteConfig = toml::from_str("[images]\njpeg_quality = 0").unwrap();
        assert!(config.validate().iter().any(|e| e.field == "images.jpeg_quality"));
    }

    #[test]
    fn test_validation_dotted_extension() {
        let config: SiteConfig = toml::from_str("[templates]\nextension = \".pug\"").unwrap();
        assert!(config.validate().iter().any(|e| e.field == "templates.extension"));
    }

    #[test]
    fn test_validation_error_display() {
        let error = ConfigValidationError {
            field: "server.index".to_string(),
            message: "must be a non-empty file name".to_string(),
        };
        assert_eq!(error.to_string(), "site.toml: 'server.index' must be a non-empty file name");
    }
}
