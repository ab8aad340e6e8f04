//! Stage errors and their escalation.
//!
//! A stage never panics or aborts the process on its own: it returns a
//! [`StageError`] describing where the failure came from. The runner hands
//! the error to a [`Notifier`] and then applies the task's
//! [`FailurePolicy`].

use std::path::PathBuf;
use thiserror::Error;

use crate::build::task::TaskError;

/// Which part of the pipeline produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorOrigin {
    Clean,
    Assets,
    Styles,
    Templates,
    Scripts,
    Server,
    Deploy,
    Revision,
}

impl std::fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorOrigin::Clean => write!(f, "clean"),
            ErrorOrigin::Assets => write!(f, "assets"),
            ErrorOrigin::Styles => write!(f, "styles"),
            ErrorOrigin::Templates => write!(f, "templates"),
            ErrorOrigin::Scripts => write!(f, "scripts"),
            ErrorOrigin::Server => write!(f, "server"),
            ErrorOrigin::Deploy => write!(f, "deploy"),
            ErrorOrigin::Revision => write!(f, "rev"),
        }
    }
}

/// A flattened, human-readable stage failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageError {
    pub origin: ErrorOrigin,
    pub message: String,
    /// Source file being processed when the error happened, if any
    pub file: Option<PathBuf>,
}

impl StageError {
    pub fn new(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self { origin, message: message.into(), file: None }
    }

    /// Attach the file that failed.
    pub fn in_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Wrap an IO error with a short description of the operation.
    pub fn io(origin: ErrorOrigin, action: &str, path: &std::path::Path, err: std::io::Error) -> Self {
        Self::new(origin, format!("{} {}: {}", action, path.display(), err))
    }
}

impl std::fmt::Display for StageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.file {
            Some(file) => write!(f, "[{}] {}: {}", self.origin, file.display(), self.message),
            None => write!(f, "[{}] {}", self.origin, self.message),
        }
    }
}

impl std::error::Error for StageError {}

/// What the runner does after a task fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Report and keep running siblings and downstream tasks
    #[default]
    Continue,
    /// Report and stop the whole run
    Abort,
}

/// Error returned by a task run.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Planning failed (unknown task, cycle)
    #[error(transparent)]
    Task(#[from] TaskError),
    /// A task with the abort policy failed
    #[error("task '{task}' failed: {error}")]
    Fatal { task: String, error: StageError },
    /// IO error outside of a stage
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Receives stage errors so the developer sees them.
pub trait Notifier: Send + Sync {
    fn notify(&self, task: &str, error: &StageError);
}

/// Notifier writing stage errors to the log.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, task: &str, error: &StageError) {
        tracing::error!(task, "{}", error);
    }
}

/// Notifier that drops everything (used by tests and quiet runs).
#[derive(Debug, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _task: &str, _error: &StageError) {}
}
