//! Pipeline integration tests
//!
//! Runs the built-in tasks against small site projects in temporary
//! directories:
//!
//! - Full `build` (clean, compile, rename)
//! - Concurrent compile into disjoint output folders
//! - Rename failure handling
//! - Environment resolution and URL helpers
//! - Watch table construction

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use sitepipe::build::{
    BuildContext, BuildError, Notifier, StageError, TaskGraph, TaskRunner, TaskStatus,
};
use sitepipe::config::{default_config, SiteConfig};
use sitepipe::env::{page_path, BuildFlags, Environment, UrlHelpers};
use sitepipe::paths::Category;
use sitepipe::watch::{ReloadKind, WatchTable};

// ============================================================================
// Test Utilities
// ============================================================================

#[derive(Default)]
struct RecordingNotifier {
    errors: Mutex<Vec<(String, String)>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, task: &str, error: &StageError) {
        self.errors.lock().unwrap().push((task.to_string(), error.to_string()));
    }
}

fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

/// Lay out a minimal site: one page, one stylesheet, one script, one image.
fn create_site(root: &Path) {
    write(
        &root.join("src/pug/official-site/index.html"),
        "<html><head><link href=\"{{ css_url(path='index.css') }}\"></head><body>{{ page_path }}</body></html>",
    );
    write(&root.join("src/pug/official-site/_partials/nav.html"), "<nav></nav>");
    write(&root.join("src/sass/index.css"), "body { color: red; }");
    write(&root.join("src/sass/_vars.css"), "");
    write(&root.join("src/scripts/index.js"), "console.log('hi');");
    write(&root.join("src/assets/images/logo.svg"), "<svg></svg>");
}

fn context(root: &Path, config: SiteConfig, flags: BuildFlags) -> BuildContext {
    BuildContext::new(config, root.to_path_buf(), flags)
}

fn runner(ctx: BuildContext) -> (TaskRunner, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let runner = TaskRunner::new(ctx).with_notifier(notifier.clone());
    (runner, notifier)
}

// ============================================================================
// Build
// ============================================================================

#[test]
fn test_build_renames_into_deploy_folder() {
    let temp = TempDir::new().unwrap();
    create_site(temp.path());
    let (runner, notifier) = runner(context(temp.path(), default_config(), BuildFlags::default()));

    let result = runner.run(&["build"]).unwrap();
    assert!(result.is_success(), "{}", result.summary());
    assert!(notifier.errors.lock().unwrap().is_empty());

    let docs = temp.path().join("docs");
    assert!(docs.join("index.html").is_file());
    assert!(docs.join("assets/stylesheets/index.css").is_file());
    assert!(docs.join("assets/scripts/index.js").is_file());
    assert!(docs.join("assets/images/logo.svg").is_file());
    assert!(!docs.join("assets/stylesheets/_vars.css").exists());
    assert!(!temp.path().join("dist/official-site").exists());

    let page = fs::read_to_string(docs.join("index.html")).unwrap();
    assert!(page.contains("href=\"/assets/stylesheets/index.css\""));
}

#[test]
fn test_build_twice_needs_overwrite() {
    let temp = TempDir::new().unwrap();
    create_site(temp.path());

    let (first, _) = runner(context(temp.path(), default_config(), BuildFlags::default()));
    first.run(&["build"]).unwrap();

    let (second, notifier) = runner(context(temp.path(), default_config(), BuildFlags::default()));
    let err = second.run(&["build"]).unwrap_err();
    assert!(matches!(err, BuildError::Fatal { ref task, .. } if task == "rename"));
    assert_eq!(notifier.errors.lock().unwrap().len(), 1);

    let mut config = default_config();
    config.deploy.overwrite = true;
    let (third, _) = runner(context(temp.path(), config, BuildFlags::default()));
    assert!(third.run(&["build"]).unwrap().is_success());
    assert!(temp.path().join("docs/index.html").is_file());
}

#[test]
fn test_rename_without_build_fails() {
    let temp = TempDir::new().unwrap();
    let (runner, notifier) = runner(context(temp.path(), default_config(), BuildFlags::default()));

    let err = runner.run(&["rename-project-folder"]).unwrap_err();
    match err {
        BuildError::Fatal { task, error } => {
            assert_eq!(task, "rename");
            assert!(error.message.contains("does not exist"));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(!temp.path().join("docs").exists());
    assert_eq!(notifier.errors.lock().unwrap()[0].0, "rename");
}

// ============================================================================
// Compile
// ============================================================================

#[test]
fn test_compile_writes_disjoint_outputs() {
    let temp = TempDir::new().unwrap();
    create_site(temp.path());
    let ctx = context(temp.path(), default_config(), BuildFlags::default());
    let css = ctx.paths().css().to_path_buf();
    let js = ctx.paths().js().to_path_buf();
    let build_dest = ctx.paths().build_dest().to_path_buf();
    let (runner, _) = runner(ctx);
    let runner = runner.with_jobs(3);

    let result = runner.run(&["compile"]).unwrap();
    assert!(result.is_success(), "{}", result.summary());

    for (task, dir) in [("styles", &css), ("scripts", &js), ("templates", &build_dest)] {
        let outputs = &result.get(task).unwrap().outputs;
        assert!(!outputs.is_empty(), "{} wrote nothing", task);
        assert!(outputs.iter().all(|p| p.starts_with(dir)), "{} wrote outside {}", task, dir.display());
    }
    assert!(result.get("styles").unwrap().outputs.iter().all(|p| !p.starts_with(&js)));
}

#[test]
fn test_failed_style_does_not_stop_siblings() {
    let temp = TempDir::new().unwrap();
    create_site(temp.path());
    write(&temp.path().join("src/sass/broken.css"), "body { background: resolve('missing.png'); }");
    let (runner, notifier) = runner(context(temp.path(), default_config(), BuildFlags::default()));

    let result = runner.run(&["compile"]).unwrap();
    assert!(!result.is_success());
    assert!(matches!(result.get("styles").unwrap().status, TaskStatus::Failed(_)));
    assert!(result.get("templates").unwrap().is_success());
    assert!(result.get("scripts").unwrap().is_success());

    let errors = notifier.errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, "styles");
    assert!(errors[0].1.contains("missing.png"));
}

#[test]
fn test_second_template_run_skips() {
    let temp = TempDir::new().unwrap();
    create_site(temp.path());
    let (runner, _) = runner(context(temp.path(), default_config(), BuildFlags::default()));

    assert!(runner.run(&["pug"]).unwrap().get("templates").unwrap().is_success());
    let again = runner.run(&["pug"]).unwrap();
    assert_eq!(again.get("templates").unwrap().status, TaskStatus::Skipped);
}

#[test]
fn test_unknown_task() {
    let temp = TempDir::new().unwrap();
    let (runner, _) = runner(context(temp.path(), default_config(), BuildFlags::default()));
    assert!(matches!(runner.run(&["deploy-to-mars"]), Err(BuildError::Task(_))));
}

// ============================================================================
// Plans
// ============================================================================

#[test]
fn test_build_plan_order() {
    let graph = TaskGraph::builtin();
    let plan = graph.plan(&["build"]).unwrap();
    let order = plan.build_order().unwrap();
    let pos = |name: &str| order.iter().position(|t| t.name == name).unwrap();

    assert!(pos("clean") < pos("assets"));
    assert!(pos("assets") < pos("styles"));
    assert!(pos("assets") < pos("templates"));
    assert!(pos("assets") < pos("scripts"));
    assert!(pos("styles") < pos("rename"));
    assert!(pos("templates") < pos("rename"));
    assert!(pos("scripts") < pos("rename"));
    assert!(!plan.contains("server"));
}

// ============================================================================
// Environment
// ============================================================================

#[test]
fn test_dev_urls() {
    let urls = UrlHelpers::new(&BuildFlags::default(), &default_config().remote);
    assert_eq!(urls.environment(), Environment::Dev);
    assert!(!urls.is_prod());
    assert_eq!(urls.image_url("a.png"), "/assets/images/a.png");
    assert_eq!(urls.css_url("index.css"), "/assets/stylesheets/index.css");
    assert_eq!(urls.js_url("index.js"), "/assets/scripts/index.js");
}

#[test]
fn test_staging_urls() {
    let mut config = default_config();
    config.remote.staging = Some("https://staging.example.com/".to_string());
    let flags = BuildFlags { staging: true, ..Default::default() };
    let urls = UrlHelpers::new(&flags, &config.remote);

    assert_eq!(urls.environment(), Environment::Staging);
    assert!(!urls.is_prod());
    assert_eq!(urls.root_path(), "https://staging.example.com/");
    assert_eq!(urls.image_url("a.png"), "/pesaro/assets/images/a.png");
}

#[test]
fn test_prod_wins_over_staging() {
    let config = default_config();
    for flags in [
        BuildFlags { prod: true, ..Default::default() },
        BuildFlags { prod: true, staging: true, minify: true },
    ] {
        let urls = UrlHelpers::new(&flags, &config.remote);
        assert_eq!(urls.environment(), Environment::Production);
        assert!(urls.is_prod());
        assert_eq!(urls.root_path(), "https://sorarize.github.io/pesaro/");
    }
}

#[test]
fn test_page_path_derivation() {
    let root = Path::new("/site/src/pug");
    assert_eq!(page_path(root, &root.join("official-site/about/team.html")).as_deref(), Some("about/team"));
    assert_eq!(page_path(root, &root.join("official-site/index.html")).as_deref(), Some("index"));
}

// ============================================================================
// Watch
// ============================================================================

#[test]
fn test_watch_table_routes_changes() {
    let temp = TempDir::new().unwrap();
    create_site(temp.path());
    let ctx = context(temp.path(), default_config(), BuildFlags::default());
    let table = WatchTable::from_context(&ctx);

    let styles = table.entries().iter().find(|e| e.category == Category::Styles).unwrap();
    assert_eq!(styles.tasks, vec!["styles".to_string()]);
    assert_eq!(styles.reload, ReloadKind::Styles);

    let changed = ctx.paths().styles().canonicalize().unwrap().join("index.css");
    let matched: Vec<_> =
        table.matching(&changed).into_iter().map(|i| table.entries()[i].category).collect();
    assert_eq!(matched, vec![Category::Styles]);
}
