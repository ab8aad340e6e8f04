//! Watch mode for incremental rebuilds on file changes
//!
//! Each source directory maps to the task family that rebuilds it and to the
//! kind of browser reload that follows. A debounced watcher feeds a
//! dispatcher, which signals one worker per family. Families rebuild
//! independently; changes that arrive while a family is rebuilding are
//! folded into a single follow-up run.

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, DebouncedEventKind, Debouncer};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::build::discovery::has_extension;
use crate::build::{BuildContext, RunResult, TaskRunner};
use crate::paths::Category;

/// Error during watch mode
#[derive(Debug)]
pub enum WatchError {
    /// Failed to initialize file watcher
    WatcherInit(notify::Error),
    /// Failed to add watch path
    WatchPath(notify::Error),
    /// Failed to start a worker thread
    Spawn(std::io::Error),
}

impl std::fmt::Display for WatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchError::WatcherInit(e) => write!(f, "Failed to initialize file watcher: {}", e),
            WatchError::WatchPath(e) => write!(f, "Failed to watch path: {}", e),
            WatchError::Spawn(e) => write!(f, "Failed to start watch worker: {}", e),
        }
    }
}

impl std::error::Error for WatchError {}

/// What connected browsers should do after a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReloadKind {
    /// Reload the whole page
    Full,
    /// Refresh stylesheets in place
    Styles,
}

/// Receives reload requests after a rebuild.
pub trait ReloadSink: Send + Sync {
    fn reload(&self, kind: ReloadKind);
}

/// Sink that ignores reload requests.
#[derive(Debug, Default)]
pub struct NoReload;

impl ReloadSink for NoReload {
    fn reload(&self, _kind: ReloadKind) {}
}

/// A recursive file pattern: every file under `root` with one of
/// `extensions` (any file when empty).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchPattern {
    root: PathBuf,
    extensions: Vec<String>,
}

impl WatchPattern {
    pub fn new(root: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self { root: root.into(), extensions }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn matches(&self, path: &Path) -> bool {
        path.starts_with(&self.root) && has_extension(path, &self.extensions)
    }
}

impl std::fmt::Display for WatchPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.extensions.as_slice() {
            [] => write!(f, "{}/**/*", self.root.display()),
            [ext] => write!(f, "{}/**/*.{}", self.root.display(), ext),
            exts => write!(f, "{}/**/*.{{{}}}", self.root.display(), exts.join(",")),
        }
    }
}

/// One row of the watch table.
#[derive(Debug, Clone)]
pub struct WatchEntry {
    pub category: Category,
    pub pattern: WatchPattern,
    /// Tasks rebuilt when a matching file changes
    pub tasks: Vec<String>,
    pub reload: ReloadKind,
}

/// Ordered mapping from source patterns to rebuild actions.
#[derive(Debug, Clone, Default)]
pub struct WatchTable {
    entries: Vec<WatchEntry>,
}

impl WatchTable {
    /// The table for a site: templates, styles, images and scripts.
    pub fn from_context(ctx: &BuildContext) -> Self {
        let config = ctx.config();
        let entries = Category::ALL
            .iter()
            .map(|&category| {
                let (task, extensions, reload) = match category {
                    Category::Templates => {
                        ("templates", vec![config.templates.extension.clone()], ReloadKind::Full)
                    }
                    Category::Styles => ("styles", config.styles.extensions.clone(), ReloadKind::Styles),
                    Category::Images => ("assets", vec![], ReloadKind::Full),
                    Category::Scripts => ("scripts", vec![], ReloadKind::Full),
                };
                let root = ctx.paths().source(category);
                let root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
                WatchEntry {
                    category,
                    pattern: WatchPattern::new(root, extensions),
                    tasks: vec![task.to_string()],
                    reload,
                }
            })
            .collect();
        Self { entries }
    }

    pub fn new(entries: Vec<WatchEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[WatchEntry] {
        &self.entries
    }

    /// Indices of the entries whose pattern matches `path`.
    pub fn matching(&self, path: &Path) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.pattern.matches(path))
            .map(|(i, _)| i)
            .collect()
    }
}

/// Tracks failing tasks across rebuilds for recovery detection
#[derive(Debug, Default)]
pub struct ErrorTracker {
    /// Tasks that failed in their previous run
    failing: HashSet<String>,
}

impl ErrorTracker {
    /// Create a new error tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the tracker with a run result, returns tasks that recovered
    pub fn update(&mut self, result: &RunResult) -> Vec<String> {
        let mut fixed = Vec::new();
        for task in &result.tasks {
            if task.status.is_failure() {
                self.failing.insert(task.task.clone());
            } else if self.failing.remove(&task.task) {
                fixed.push(task.task.clone());
            }
        }
        fixed
    }

    /// Check if there are any tracked errors
    pub fn has_errors(&self) -> bool {
        !self.failing.is_empty()
    }

    /// Get the number of failing tasks
    pub fn error_count(&self) -> usize {
        self.failing.len()
    }
}

/// Format duration for display
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

/// Paths of settled changes in a debounced batch.
///
/// Events still marked as continuing are dropped; the debouncer reports
/// the same path again once it settles.
pub fn changed_paths(events: Vec<DebouncedEvent>) -> Vec<PathBuf> {
    events
        .into_iter()
        .filter(|e| matches!(e.kind, DebouncedEventKind::Any))
        .map(|e| e.path)
        .collect()
}

/// Routes changed paths to the workers of matching entries.
#[derive(Debug)]
pub struct Dispatcher {
    table: WatchTable,
    workers: Vec<Sender<()>>,
}

impl Dispatcher {
    pub fn new(table: WatchTable, workers: Vec<Sender<()>>) -> Self {
        Self { table, workers }
    }

    /// Signal every entry matching one of `paths`, each at most once.
    ///
    /// Returns the triggered entry indices in table order.
    pub fn dispatch(&self, paths: &[PathBuf]) -> Vec<usize> {
        let mut triggered: Vec<usize> = paths.iter().flat_map(|p| self.table.matching(p)).collect();
        triggered.sort_unstable();
        triggered.dedup();

        for &idx in &triggered {
            if let Some(worker) = self.workers.get(idx) {
                // A closed channel means the worker already stopped.
                let _ = worker.send(());
            }
        }
        triggered
    }
}

/// Rebuild loop of one watch entry.
///
/// Blocks on `signals`; queued signals are drained before each run so a
/// burst of changes causes one rebuild.
pub fn run_worker(
    runner: &TaskRunner,
    entry: &WatchEntry,
    signals: Receiver<()>,
    sink: &dyn ReloadSink,
    tracker: &Mutex<ErrorTracker>,
) {
    while signals.recv().is_ok() {
        while signals.try_recv().is_ok() {}

        match runner.run(&entry.tasks) {
            Ok(result) => {
                let fixed = match tracker.lock() {
                    Ok(mut tracker) => tracker.update(&result),
                    Err(poisoned) => poisoned.into_inner().update(&result),
                };
                for task in fixed {
                    tracing::info!("Fixed: {}", task);
                }
            }
            Err(e) => tracing::error!(category = %entry.category, "rebuild failed: {}", e),
        }

        sink.reload(entry.reload);
    }
}

/// Keeps the watcher and its threads alive; dropping it stops watching.
pub struct WatchHandle {
    _debouncer: Debouncer<notify::RecommendedWatcher>,
    dispatcher: Option<JoinHandle<()>>,
}

impl WatchHandle {
    /// Stop watching and wait for the dispatcher to exit.
    pub fn stop(mut self) {
        let dispatcher = self.dispatcher.take();
        drop(self);
        if let Some(handle) = dispatcher {
            let _ = handle.join();
        }
    }
}

/// Watches the source tree and drives rebuilds.
pub struct WatchOrchestrator {
    runner: TaskRunner,
    table: WatchTable,
    sink: Arc<dyn ReloadSink>,
}

impl WatchOrchestrator {
    pub fn new(runner: TaskRunner, sink: Arc<dyn ReloadSink>) -> Self {
        let table = WatchTable::from_context(runner.context());
        Self { runner, table, sink }
    }

    pub fn table(&self) -> &WatchTable {
        &self.table
    }

    /// Start the watcher, the dispatcher and one worker per entry.
    pub fn start(self) -> Result<WatchHandle, WatchError> {
        let tracker = Arc::new(Mutex::new(ErrorTracker::new()));
        let mut senders = Vec::with_capacity(self.table.entries().len());

        for entry in self.table.entries() {
            let (tx, rx) = channel();
            senders.push(tx);

            let runner = self.runner.clone();
            let entry = entry.clone();
            let sink = Arc::clone(&self.sink);
            let tracker = Arc::clone(&tracker);
            std::thread::Builder::new()
                .name(format!("watch-{}", entry.category))
                .spawn(move || run_worker(&runner, &entry, rx, sink.as_ref(), &tracker))
                .map_err(WatchError::Spawn)?;
        }

        let (tx, rx) = channel();
        let debounce = Duration::from_millis(self.runner.context().config().watch.debounce_ms as u64);
        let mut debouncer = new_debouncer(debounce, tx).map_err(WatchError::WatcherInit)?;

        for entry in self.table.entries() {
            let root = entry.pattern.root();
            if !root.is_dir() {
                tracing::warn!(path = %root.display(), "watch root does not exist, skipping");
                continue;
            }
            debouncer.watcher().watch(root, RecursiveMode::Recursive).map_err(WatchError::WatchPath)?;
            tracing::info!("Watching {}", entry.pattern);
        }

        let dispatcher = Dispatcher::new(self.table, senders);
        let handle = std::thread::Builder::new()
            .name("watch-dispatch".to_string())
            .spawn(move || {
                for events in rx {
                    match events {
                        Ok(events) => {
                            let paths = changed_paths(events);
                            for path in &paths {
                                if let Some(name) = path.file_name() {
                                    tracing::debug!("Changed: {}", name.to_string_lossy());
                                }
                            }
                            dispatcher.dispatch(&paths);
                        }
                        // Watch errors are not fatal; keep watching.
                        Err(error) => tracing::warn!("watch error: {:?}", error),
                    }
                }
            })
            .map_err(WatchError::Spawn)?;

        Ok(WatchHandle { _debouncer: debouncer, dispatcher: Some(handle) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{NullNotifier, TaskResult};
    use crate::config::default_config;
    use crate::env::BuildFlags;
    use tempfile::TempDir;

    fn context(root: &Path) -> BuildContext {
        BuildContext::new(default_config(), root.to_path_buf(), BuildFlags::default())
    }

    #[derive(Default)]
    struct Recording(Mutex<Vec<ReloadKind>>);

    impl ReloadSink for Recording {
        fn reload(&self, kind: ReloadKind) {
            self.0.lock().unwrap().push(kind);
        }
    }

    #[test]
    fn test_table_order_and_actions() {
        let ctx = context(Path::new("/site"));
        let table = WatchTable::from_context(&ctx);
        let rows: Vec<(&str, ReloadKind)> = table
            .entries()
            .iter()
            .map(|e| (e.tasks[0].as_str(), e.reload))
            .collect();

        assert_eq!(
            rows,
            vec![
                ("templates", ReloadKind::Full),
                ("styles", ReloadKind::Styles),
                ("assets", ReloadKind::Full),
                ("scripts", ReloadKind::Full),
            ]
        );
    }

    #[test]
    fn test_pattern_display() {
        let ctx = context(Path::new("/site"));
        let table = WatchTable::from_context(&ctx);
        assert_eq!(table.entries()[0].pattern.to_string(), "/site/src/pug/**/*.html");
        assert_eq!(table.entries()[1].pattern.to_string(), "/site/src/sass/**/*.{sass,scss,css}");
        assert_eq!(table.entries()[2].pattern.to_string(), "/site/src/assets/**/*");
    }

    #[test]
    fn test_matching() {
        let ctx = context(Path::new("/site"));
        let table = WatchTable::from_context(&ctx);

        assert_eq!(table.matching(Path::new("/site/src/sass/pages/_top.sass")), vec![1]);
        assert_eq!(table.matching(Path::new("/site/src/pug/official-site/index.html")), vec![0]);
        assert_eq!(table.matching(Path::new("/site/src/assets/images/a.webp")), vec![2]);
        assert!(table.matching(Path::new("/site/src/pug/notes.txt")).is_empty());
        assert!(table.matching(Path::new("/site/dist/official-site/index.html")).is_empty());
    }

    #[test]
    fn test_dispatch_signals_each_entry_once() {
        let ctx = context(Path::new("/site"));
        let table = WatchTable::from_context(&ctx);
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..4).map(|_| channel::<()>()).unzip();
        let dispatcher = Dispatcher::new(table, senders);

        let triggered = dispatcher.dispatch(&[
            PathBuf::from("/site/src/sass/a.scss"),
            PathBuf::from("/site/src/sass/b.sass"),
            PathBuf::from("/site/src/scripts/index.js"),
        ]);

        assert_eq!(triggered, vec![1, 3]);
        assert_eq!(receivers[1].try_iter().count(), 1);
        assert_eq!(receivers[3].try_iter().count(), 1);
        assert_eq!(receivers[0].try_iter().count(), 0);
    }

    #[test]
    fn test_worker_coalesces_and_reloads() {
        let temp = TempDir::new().unwrap();
        let runner = TaskRunner::new(context(temp.path())).with_notifier(Arc::new(NullNotifier));
        let table = WatchTable::from_context(runner.context());
        let entry = table.entries()[1].clone();
        let sink = Recording::default();
        let tracker = Mutex::new(ErrorTracker::new());

        let (tx, rx) = channel();
        tx.send(()).unwrap();
        tx.send(()).unwrap();
        tx.send(()).unwrap();
        drop(tx);

        run_worker(&runner, &entry, rx, &sink, &tracker);

        assert_eq!(sink.0.lock().unwrap().as_slice(), [ReloadKind::Styles]);
    }

    #[test]
    fn test_error_tracker_detects_fixed_tasks() {
        let mut tracker = ErrorTracker::new();

        let mut failing = RunResult::new();
        failing.add_result(TaskResult::failed("styles".into(), "bad".into(), Duration::ZERO));
        assert!(tracker.update(&failing).is_empty());
        assert!(tracker.has_errors());

        // an unrelated family does not clear the failure
        let mut other = RunResult::new();
        other.add_result(TaskResult::success("scripts".into(), vec![], Duration::ZERO));
        assert!(tracker.update(&other).is_empty());
        assert_eq!(tracker.error_count(), 1);

        let mut fixed = RunResult::new();
        fixed.add_result(TaskResult::success("styles".into(), vec![], Duration::ZERO));
        assert_eq!(tracker.update(&fixed), vec!["styles".to_string()]);
        assert!(!tracker.has_errors());
    }

    #[test]
    fn test_changed_paths_skips_continuous_events() {
        let events = vec![
            DebouncedEvent { path: PathBuf::from("/site/src/sass/a.css"), kind: DebouncedEventKind::Any },
            DebouncedEvent {
                path: PathBuf::from("/site/src/sass/big.css"),
                kind: DebouncedEventKind::AnyContinuous,
            },
            DebouncedEvent { path: PathBuf::from("/site/src/scripts/b.js"), kind: DebouncedEventKind::Any },
        ];

        assert_eq!(
            changed_paths(events),
            vec![PathBuf::from("/site/src/sass/a.css"), PathBuf::from("/site/src/scripts/b.js")]
        );
    }

    #[test]
    fn test_file_change_triggers_reload() {
        let temp = TempDir::new().unwrap();
        let mut config = default_config();
        config.watch.debounce_ms = 50;
        let ctx = BuildContext::new(config, temp.path().to_path_buf(), BuildFlags::default());
        let styles = ctx.paths().styles().to_path_buf();
        std::fs::create_dir_all(&styles).unwrap();

        let sink = Arc::new(Recording::default());
        let runner = TaskRunner::new(ctx).with_notifier(Arc::new(NullNotifier));
        let handle = WatchOrchestrator::new(runner, sink.clone()).start().unwrap();

        // let the watcher settle before touching the tree
        std::thread::sleep(Duration::from_millis(200));
        std::fs::write(styles.join("index.css"), "a { color: red; }").unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while !sink.0.lock().unwrap().contains(&ReloadKind::Styles) {
            assert!(std::time::Instant::now() < deadline, "no reload after writing index.css");
            std::thread::sleep(Duration::from_millis(50));
        }
        handle.stop();

        assert!(!sink.0.lock().unwrap().contains(&ReloadKind::Full));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
        assert_eq!(format_duration(Duration::from_millis(999)), "999ms");
        assert_eq!(format_duration(Duration::from_millis(1000)), "1.00s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
