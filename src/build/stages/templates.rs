//! Page rendering with tera.
//!
//! All templates (pages and partials) are loaded into one engine so pages can
//! `include`, `extends` and `import` each other by their path relative to the
//! template directory. Only pages produce output.

use super::{fnv1a_hash, relative, sources, write_output, StageOutput, StageResult};
use crate::build::discovery::is_partial;
use crate::build::error::{ErrorOrigin, StageError};
use crate::build::BuildContext;
use crate::env::{page_path, UrlHelpers};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Tera, Value};

const ORIGIN: ErrorOrigin = ErrorOrigin::Templates;

/// Content hashes of the templates seen by the last successful render.
#[derive(Debug, Clone, Default)]
pub struct TemplateCache {
    hashes: HashMap<PathBuf, u64>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Forget everything so the next run renders every page.
    pub fn clear(&mut self) {
        self.hashes.clear();
    }

    fn is_current(&self, path: &Path, hash: u64) -> bool {
        self.hashes.get(path) == Some(&hash)
    }
}

struct Source {
    path: PathBuf,
    name: String,
    contents: String,
    hash: u64,
    partial: bool,
}

/// Template name: relative path with `/` separators.
fn template_name(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn url_function(
    urls: UrlHelpers,
    build: fn(&UrlHelpers, &str) -> String,
) -> impl tera::Function {
    move |args: &HashMap<String, Value>| -> tera::Result<Value> {
        match args.get("path").and_then(Value::as_str) {
            Some(path) => Ok(Value::String(build(&urls, path))),
            None => Err(tera::Error::msg("expected a string `path` argument")),
        }
    }
}

/// Flatten a tera error and its causes into one line.
fn describe(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn engine(sources: &[Source], urls: &UrlHelpers) -> Result<Tera, StageError> {
    let mut tera = Tera::default();
    tera.autoescape_on(vec![]);
    tera.register_function("image_url", url_function(urls.clone(), UrlHelpers::image_url));
    tera.register_function("css_url", url_function(urls.clone(), UrlHelpers::css_url));
    tera.register_function("js_url", url_function(urls.clone(), UrlHelpers::js_url));

    tera.add_raw_templates(sources.iter().map(|s| (s.name.as_str(), s.contents.as_str())))
        .map_err(|e| StageError::new(ORIGIN, describe(&e)))?;
    Ok(tera)
}

/// Render pages whose source, output or partials changed since the last run.
pub fn run(ctx: &BuildContext, cache: &mut TemplateCache) -> StageResult {
    let template_dir = ctx.paths().templates();
    let extension = ctx.config().templates.extension.clone();

    let mut loaded = Vec::new();
    for path in sources(ORIGIN, template_dir, std::slice::from_ref(&extension))? {
        let rel = relative(ORIGIN, template_dir, &path)?;
        let contents = fs::read_to_string(&path)
            .map_err(|e| StageError::io(ORIGIN, "Failed to read", &path, e))?;
        loaded.push(Source {
            name: template_name(&rel),
            hash: fnv1a_hash(contents.as_bytes()),
            partial: is_partial(&rel),
            contents,
            path,
        });
    }

    let partial_changed = loaded.iter().any(|s| s.partial && !cache.is_current(&s.path, s.hash))
        || cache.hashes.keys().any(|p| !loaded.iter().any(|s| &s.path == p));

    let html_dir = ctx.paths().html();
    let stale: Vec<&Source> = loaded
        .iter()
        .filter(|s| !s.partial)
        .filter(|s| {
            let output = html_dir.join(Path::new(&s.name).with_extension("html"));
            partial_changed || !cache.is_current(&s.path, s.hash) || !output.exists()
        })
        .collect();

    let fresh: HashMap<PathBuf, u64> = loaded.iter().map(|s| (s.path.clone(), s.hash)).collect();
    if stale.is_empty() {
        cache.hashes = fresh;
        return Ok(StageOutput::unchanged());
    }

    let tera = engine(&loaded, ctx.urls())?;
    let mut outputs = Vec::new();
    let mut rendered: HashSet<&Path> = HashSet::new();

    for source in stale {
        let page = page_path(template_dir, &source.path).unwrap_or_default();
        let helpers = ctx.urls().for_page(page);

        let mut context = tera::Context::new();
        context.insert("is_prod", &helpers.urls.is_prod());
        context.insert("root_path", helpers.urls.root_path());
        context.insert("page_path", &helpers.page_path);
        context.insert("env", &helpers.urls.environment().to_string());

        let html = match tera.render(&source.name, &context) {
            Ok(html) => html,
            Err(e) => {
                // Keep what rendered so far; the failed page stays stale.
                for path in rendered {
                    if let Some(hash) = fresh.get(path) {
                        cache.hashes.insert(path.to_path_buf(), *hash);
                    }
                }
                return Err(StageError::new(ORIGIN, describe(&e)).in_file(&source.path));
            }
        };

        let dest = html_dir.join(Path::new(&source.name).with_extension("html"));
        write_output(ORIGIN, &dest, html.as_bytes())?;
        rendered.insert(&source.path);
        outputs.push(dest);
    }

    cache.hashes = fresh;
    tracing::debug!(pages = outputs.len(), "rendered templates");
    Ok(StageOutput::written(outputs))
}
