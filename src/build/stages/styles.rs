//! Stylesheet compilation.
//!
//! Each non-partial source goes through ENV preprocessing, the external sass
//! compiler (for `.sass` / `.scss` only), `resolve()` asset rewriting and
//! lightningcss before landing in the stylesheet output directory.

use super::{relative, sources, write_output, StageOutput, StageResult};
use crate::build::discovery::is_partial;
use crate::build::error::{ErrorOrigin, StageError};
use crate::build::BuildContext;
use crate::config::loader::resolve_path;
use crate::preprocess::{preprocess, PreprocessContext};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::fs;
use std::path::{Path, PathBuf};

const ORIGIN: ErrorOrigin = ErrorOrigin::Styles;

/// Directories searched for `resolve()` arguments, relative to the assets
/// output directory.
const ASSET_LOAD_PATHS: &[&str] = &["images", ""];

static RESOLVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"resolve\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap());

fn browser_targets() -> Targets {
    Targets::from(Browsers {
        chrome: Some(80 << 16),
        firefox: Some(78 << 16),
        safari: Some(13 << 16),
        ios_saf: Some(13 << 16),
        edge: Some(80 << 16),
        ..Browsers::default()
    })
}

/// Compile every non-partial stylesheet.
pub fn run(ctx: &BuildContext) -> StageResult {
    let styles = &ctx.config().styles;
    let source_dir = ctx.paths().styles();
    let pre = PreprocessContext::for_environment(ctx.environment());

    let mut outputs = Vec::new();
    for file in sources(ORIGIN, source_dir, &styles.extensions)? {
        let rel = relative(ORIGIN, source_dir, &file)?;
        if is_partial(&rel) {
            continue;
        }

        let css = compile_file(ctx, &file, &pre).map_err(|message| {
            StageError::new(ORIGIN, message).in_file(&file)
        })?;

        let dest = ctx.paths().css().join(rel.with_extension("css"));
        write_output(ORIGIN, &dest, css.as_bytes())?;
        tracing::debug!(output = %dest.display(), "compiled stylesheet");
        outputs.push(dest);
    }

    if outputs.is_empty() {
        return Ok(StageOutput::unchanged());
    }
    Ok(StageOutput::written(outputs))
}

fn compile_file(ctx: &BuildContext, file: &Path, pre: &PreprocessContext) -> Result<String, String> {
    let source = fs::read_to_string(file).map_err(|e| e.to_string())?;
    let source = preprocess(&source, pre).map_err(|e| e.to_string())?;

    let ext = file.extension().and_then(|e| e.to_str()).unwrap_or_default().to_ascii_lowercase();
    let css = match ext.as_str() {
        "sass" | "scss" => run_sass(ctx, file, &source, ext == "sass")?,
        _ => source,
    };

    let css = resolve_assets(&css, ctx.paths().assets())?;
    transform(&css, &file.to_string_lossy(), ctx.minify())
}

/// Feed a source to the external sass compiler over stdin.
fn run_sass(ctx: &BuildContext, file: &Path, source: &str, indented: bool) -> Result<String, String> {
    let styles = &ctx.config().styles;
    let mut args: Vec<String> = vec!["--stdin".to_string(), "--no-source-map".to_string()];
    if indented {
        args.push("--indented".to_string());
    }

    let mut load_paths: Vec<PathBuf> = Vec::new();
    if let Some(parent) = file.parent() {
        load_paths.push(parent.to_path_buf());
    }
    load_paths.push(ctx.paths().styles().to_path_buf());
    load_paths.extend(styles.load_paths.iter().map(|p| resolve_path(ctx.project_root(), p)));
    args.extend(load_paths.iter().map(|p| format!("--load-path={}", p.display())));

    let output = duct::cmd(styles.command.as_str(), &args)
        .dir(ctx.project_root())
        .stdin_bytes(source.as_bytes().to_vec())
        .stdout_capture()
        .stderr_capture()
        .unchecked()
        .run()
        .map_err(|e| format!("failed to run '{}': {}", styles.command, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(stderr.trim().to_string());
    }

    String::from_utf8(output.stdout).map_err(|e| e.to_string())
}

/// Rewrite `resolve('x')` to a `url()` relative to the stylesheet directory.
///
/// The asset must already exist in the build (the assets task runs first).
pub fn resolve_assets(css: &str, assets_dir: &Path) -> Result<String, String> {
    let mut missing: Option<String> = None;

    let rewritten = RESOLVE.replace_all(css, |caps: &Captures| {
        let asset = &caps[1];
        let found = ASSET_LOAD_PATHS.iter().find(|dir| assets_dir.join(dir).join(asset).is_file());
        match found {
            Some(dir) if dir.is_empty() => format!("url('../{}')", asset),
            Some(dir) => format!("url('../{}/{}')", dir, asset),
            None => {
                missing.get_or_insert_with(|| asset.to_string());
                caps[0].to_string()
            }
        }
    });

    match missing {
        Some(asset) => Err(format!("Asset not found or unreadable: {}", asset)),
        None => Ok(rewritten.into_owned()),
    }
}

/// Parse, lower and print CSS with lightningcss.
pub fn transform(css: &str, filename: &str, minify: bool) -> Result<String, String> {
    let targets = browser_targets();
    let mut sheet = StyleSheet::parse(
        css,
        ParserOptions { filename: filename.to_string(), ..ParserOptions::default() },
    )
    .map_err(|e| e.to_string())?;

    if minify {
        sheet
            .minify(MinifyOptions { targets, ..MinifyOptions::default() })
            .map_err(|e| e.to_string())?;
    }

    let printed = sheet
        .to_css(PrinterOptions { minify, targets, ..PrinterOptions::default() })
        .map_err(|e| e.to_string())?;
    Ok(printed.code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use crate::env::BuildFlags;
    use tempfile::TempDir;

    fn context(root: &Path, flags: BuildFlags) -> BuildContext {
        BuildContext::new(default_config(), root.to_path_buf(), flags)
    }

    #[test]
    fn test_plain_css_compiled() {
        let temp = TempDir::new().unwrap();
        let ctx = context(temp.path(), BuildFlags::default());
        let styles = ctx.paths().styles().to_path_buf();
        fs::create_dir_all(styles.join("pages")).unwrap();
        fs::write(styles.join("pages/about.css"), "body { color: red; }").unwrap();
        fs::write(styles.join("_vars.css"), "p { color: blue; }").unwrap();

        let output = run(&ctx).unwrap();
        assert_eq!(output.outputs.len(), 1);

        let css = fs::read_to_string(ctx.paths().css().join("pages/about.css")).unwrap();
        assert!(css.contains("color: red"));
        assert!(!ctx.paths().css().join("_vars.css").exists());
    }

    #[test]
    fn test_minified_output() {
        let temp = TempDir::new().unwrap();
        let ctx = context(temp.path(), BuildFlags { minify: true, ..Default::default() });
        let styles = ctx.paths().styles().to_path_buf();
        fs::create_dir_all(&styles).unwrap();
        fs::write(styles.join("index.css"), "body {\n  color: #ff0000;\n}\n").unwrap();

        run(&ctx).unwrap();

        let css = fs::read_to_string(ctx.paths().css().join("index.css")).unwrap();
        assert_eq!(css, "body{color:red}");
    }

    #[test]
    fn test_env_directives_applied() {
        let temp = TempDir::new().unwrap();
        let ctx = context(temp.path(), BuildFlags { prod: true, ..Default::default() });
        let styles = ctx.paths().styles().to_path_buf();
        fs::create_dir_all(&styles).unwrap();
        fs::write(
            styles.join("index.css"),
            "/* @if ENV='production' */\n.prod { color: red; }\n/* @endif */\n/* @if ENV='dev' */\n.dev { color: blue; }\n/* @endif */\n",
        )
        .unwrap();

        run(&ctx).unwrap();

        let css = fs::read_to_string(ctx.paths().css().join("index.css")).unwrap();
        assert!(css.contains(".prod"));
        assert!(!css.contains(".dev"));
    }

    #[test]
    fn test_resolve_assets() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("images/bg")).unwrap();
        fs::write(temp.path().join("images/bg/hero.jpg"), "").unwrap();
        fs::write(temp.path().join("cursor.cur"), "").unwrap();

        let css = resolve_assets(
            "a { background: resolve('bg/hero.jpg'); cursor: resolve(\"cursor.cur\"), auto; }",
            temp.path(),
        )
        .unwrap();

        assert!(css.contains("url('../images/bg/hero.jpg')"));
        assert!(css.contains("url('../cursor.cur')"));
    }

    #[test]
    fn test_resolve_missing_asset() {
        let temp = TempDir::new().unwrap();
        let err = resolve_assets("a { background: resolve('nope.png'); }", temp.path()).unwrap_err();
        assert!(err.contains("nope.png"));
    }

    #[test]
    fn test_invalid_css_stops_stage() {
        let temp = TempDir::new().unwrap();
        let ctx = context(temp.path(), BuildFlags::default());
        let styles = ctx.paths().styles().to_path_buf();
        fs::create_dir_all(&styles).unwrap();
        fs::write(styles.join("a.css"), "a { color: red; }").unwrap();
        fs::write(styles.join("b.css"), "a { background: resolve('missing.png'); }").unwrap();
        fs::write(styles.join("c.css"), "c { color: red; }").unwrap();

        let err = run(&ctx).unwrap_err();
        assert_eq!(err.origin, ErrorOrigin::Styles);
        assert!(err.message.contains("missing.png"));
        assert!(ctx.paths().css().join("a.css").exists());
        assert!(!ctx.paths().css().join("b.css").exists());
        assert!(!ctx.paths().css().join("c.css").exists());
    }

    #[test]
    fn test_missing_sass_compiler() {
        let temp = TempDir::new().unwrap();
        let mut config = default_config();
        config.styles.command = "sitepipe-test-no-such-sass".to_string();
        let ctx = BuildContext::new(config, temp.path().to_path_buf(), BuildFlags::default());
        let styles = ctx.paths().styles().to_path_buf();
        fs::create_dir_all(&styles).unwrap();
        fs::write(styles.join("index.sass"), "body\n  color: red\n").unwrap();

        let err = run(&ctx).unwrap_err();
        assert!(err.message.contains("sitepipe-test-no-such-sass"));
        assert!(err.file.unwrap().ends_with("index.sass"));
    }
}
