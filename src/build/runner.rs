//! Task execution.
//!
//! A [`TaskRunner`] turns task names into a [`TaskPlan`] and runs it level
//! by level. Tasks within a level do not depend on each other and run on
//! scoped worker threads.
//!
//! # Example
//!
//! ```ignore
//! use sitepipe::build::{BuildContext, TaskRunner};
//!
//! let runner = TaskRunner::new(context).with_jobs(4);
//! let result = runner.run(&["clean", "compile"])?;
//! println!("{}", result.summary());
//! ```

use crate::build::error::{BuildError, ConsoleNotifier, FailurePolicy, Notifier, StageError};
use crate::build::result::{RunResult, TaskResult};
use crate::build::stages::{self, templates::TemplateCache, StageOutput, StageResult};
use crate::build::task::{PlannedTask, TaskAction, TaskGraph, TaskPlan};
use crate::build::BuildContext;
use crate::watch::format_duration;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Default number of parallel jobs (uses available parallelism).
fn default_jobs() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Executes task plans against one build context.
///
/// Cloning is cheap; clones share the context, graph, notifier and the
/// template cache, so the watcher and the server can hold their own handle.
#[derive(Clone)]
pub struct TaskRunner {
    context: Arc<BuildContext>,
    graph: Arc<TaskGraph>,
    notifier: Arc<dyn Notifier>,
    templates: Arc<Mutex<TemplateCache>>,
    jobs: usize,
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner")
            .field("project_root", &self.context.project_root())
            .field("tasks", &self.graph.tasks().len())
            .field("jobs", &self.jobs)
            .finish()
    }
}

impl TaskRunner {
    /// Create a runner with the built-in task graph.
    pub fn new(context: BuildContext) -> Self {
        Self {
            context: Arc::new(context),
            graph: Arc::new(TaskGraph::builtin()),
            notifier: Arc::new(ConsoleNotifier),
            templates: Arc::new(Mutex::new(TemplateCache::new())),
            jobs: default_jobs(),
        }
    }

    pub fn with_graph(mut self, graph: TaskGraph) -> Self {
        self.graph = Arc::new(graph);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Set the number of parallel jobs.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Plan and run the named tasks.
    pub fn run<S: AsRef<str>>(&self, names: &[S]) -> Result<RunResult, BuildError> {
        let plan = self.graph.plan(names)?;
        self.run_plan(&plan)
    }

    /// Run a plan.
    ///
    /// Failing tasks are reported through the notifier. A failure under
    /// [`FailurePolicy::Abort`] stops the run after the current level and
    /// returns [`BuildError::Fatal`]; other failures are recorded and the run
    /// continues.
    pub fn run_plan(&self, plan: &TaskPlan) -> Result<RunResult, BuildError> {
        let start = Instant::now();
        let levels = plan.levels()?;
        let mut result = RunResult::new();

        for level in levels {
            let mut fatal: Option<BuildError> = None;

            for (task, outcome) in level.iter().zip(self.execute_level(&level)) {
                let (task_result, error) = outcome;
                result.add_result(task_result);

                if let Some(error) = error {
                    if task.policy == FailurePolicy::Abort && fatal.is_none() {
                        fatal = Some(BuildError::Fatal { task: task.name.clone(), error });
                    }
                }
            }

            if let Some(error) = fatal {
                return Err(error);
            }
        }

        Ok(result.with_duration(start.elapsed()))
    }

    /// Execute one level, returning outcomes in level order.
    fn execute_level(&self, tasks: &[&PlannedTask]) -> Vec<(TaskResult, Option<StageError>)> {
        if self.jobs == 1 || tasks.len() == 1 {
            return tasks.iter().map(|t| self.execute_task(t)).collect();
        }

        let results = Mutex::new(Vec::with_capacity(tasks.len()));
        let next_idx = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..self.jobs.min(tasks.len()) {
                let results = &results;
                let next_idx = &next_idx;

                s.spawn(move || loop {
                    let idx = next_idx.fetch_add(1, Ordering::SeqCst);
                    if idx >= tasks.len() {
                        break;
                    }

                    let outcome = self.execute_task(tasks[idx]);
                    if let Ok(mut results) = results.lock() {
                        results.push((idx, outcome));
                    }
                });
            }
        });

        // Sort results by original index to maintain deterministic order
        let mut results = results.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
        results.sort_by_key(|(idx, _)| *idx);
        results.into_iter().map(|(_, outcome)| outcome).collect()
    }

    fn execute_task(&self, task: &PlannedTask) -> (TaskResult, Option<StageError>) {
        let start = Instant::now();
        tracing::info!("Starting '{}'...", task.name);

        let outcome = match task.action {
            Some(action) => self.perform(action),
            None => Ok(StageOutput::written(vec![])),
        };
        let duration = start.elapsed();

        match outcome {
            Ok(output) => {
                if self.context.is_verbose() {
                    for path in &output.outputs {
                        tracing::info!("Wrote {}", path.display());
                    }
                }
                tracing::info!("Finished '{}' after {}", task.name, format_duration(duration));
                let result = if output.changed {
                    TaskResult::success(task.name.clone(), output.outputs, duration)
                } else {
                    TaskResult::skipped(task.name.clone(), duration)
                };
                (result, None)
            }
            Err(error) => {
                self.notifier.notify(&task.name, &error);
                tracing::info!("Errored '{}' after {}", task.name, format_duration(duration));
                (TaskResult::failed(task.name.clone(), error.to_string(), duration), Some(error))
            }
        }
    }

    /// Perform a single action.
    pub fn perform(&self, action: TaskAction) -> StageResult {
        let ctx = self.context.as_ref();
        match action {
            TaskAction::Clean => stages::clean::run(ctx),
            TaskAction::Assets => stages::assets::run(ctx),
            TaskAction::Styles => stages::styles::run(ctx),
            TaskAction::Templates => {
                let mut cache = self
                    .templates
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                stages::templates::run(ctx, &mut cache)
            }
            TaskAction::Scripts => stages::scripts::run(ctx),
            TaskAction::Deploy => stages::deploy::run(ctx),
            TaskAction::Revision => stages::rev::run(ctx),
            TaskAction::Serve => crate::server::serve(self.clone())
                .map(|_| StageOutput::unchanged())
                .map_err(|e| StageError::new(action.origin(), e.to_string())),
        }
    }
}
