//! Run result types.
//!
//! Contains types for representing the outcome of a task run.

use std::path::PathBuf;
use std::time::Duration;

/// Status of a single task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Task succeeded
    Success,
    /// Task did nothing (up to date, or nothing to process)
    Skipped,
    /// Task failed with error
    Failed(String),
}

impl TaskStatus {
    /// Check if the status indicates success.
    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Skipped)
    }

    /// Check if the status indicates failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, TaskStatus::Failed(_))
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Success => write!(f, "success"),
            TaskStatus::Skipped => write!(f, "skipped"),
            TaskStatus::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

/// Result of running a single task.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub task: String,
    pub status: TaskStatus,
    /// Output files written
    pub outputs: Vec<PathBuf>,
    pub duration: Duration,
}

impl TaskResult {
    /// Create a successful result.
    pub fn success(task: String, outputs: Vec<PathBuf>, duration: Duration) -> Self {
        Self { task, status: TaskStatus::Success, outputs, duration }
    }

    /// Create a skipped result.
    pub fn skipped(task: String, duration: Duration) -> Self {
        Self { task, status: TaskStatus::Skipped, outputs: vec![], duration }
    }

    /// Create a failed result.
    pub fn failed(task: String, error: String, duration: Duration) -> Self {
        Self { task, status: TaskStatus::Failed(error), outputs: vec![], duration }
    }

    pub fn with_outputs(mut self, outputs: Vec<PathBuf>) -> Self {
        self.outputs = outputs;
        self
    }

    /// Check if this result is successful.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Result of a complete task run.
#[derive(Debug, Default)]
pub struct RunResult {
    /// Results in completion order
    pub tasks: Vec<TaskResult>,
    pub total_duration: Duration,
}

impl RunResult {
    /// Create a new empty run result.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_result(&mut self, result: TaskResult) {
        self.tasks.push(result);
    }

    /// Set the total duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_duration = duration;
        self
    }

    /// Result for one task, if it ran.
    pub fn get(&self, task: &str) -> Option<&TaskResult> {
        self.tasks.iter().find(|r| r.task == task)
    }

    pub fn success_count(&self) -> usize {
        self.tasks.iter().filter(|r| matches!(r.status, TaskStatus::Success)).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.tasks.iter().filter(|r| matches!(r.status, TaskStatus::Skipped)).count()
    }

    pub fn failed_count(&self) -> usize {
        self.tasks.iter().filter(|r| r.status.is_failure()).count()
    }

    /// Check if the overall run succeeded (no failures).
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Get all outputs produced.
    pub fn all_outputs(&self) -> Vec<&PathBuf> {
        self.tasks.iter().flat_map(|r| r.outputs.iter()).collect()
    }

    /// Get failed task results.
    pub fn failures(&self) -> Vec<&TaskResult> {
        self.tasks.iter().filter(|r| r.status.is_failure()).collect()
    }

    /// Format a summary of the run.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        let success = self.success_count();
        let skipped = self.skipped_count();
        let failed = self.failed_count();
        let total = self.tasks.len();

        if failed > 0 {
            lines.push(format!(
                "Run failed: {} succeeded, {} skipped, {} failed ({} total)",
                success, skipped, failed, total
            ));
            for task in self.failures() {
                lines.push(format!("  - {}: {}", task.task, task.status));
            }
        } else {
            lines.push(format!(
                "Run succeeded: {} tasks, {} files written in {}",
                total,
                self.all_outputs().len(),
                crate::watch::format_duration(self.total_duration)
            ));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_display() {
        assert_eq!(TaskStatus::Success.to_string(), "success");
        assert_eq!(TaskStatus::Skipped.to_string(), "skipped");
        assert_eq!(TaskStatus::Failed("error".to_string()).to_string(), "failed: error");
    }

    #[test]
    fn test_task_status_is_success() {
        assert!(TaskStatus::Success.is_success());
        assert!(TaskStatus::Skipped.is_success());
        assert!(!TaskStatus::Failed("error".to_string()).is_success());
    }

    #[test]
    fn test_run_result_counts() {
        let mut result = RunResult::new();
        result.add_result(TaskResult::success("clean".to_string(), vec![], Duration::ZERO));
        result.add_result(TaskResult::skipped("compile".to_string(), Duration::ZERO));
        result.add_result(TaskResult::failed(
            "styles".to_string(),
            "[styles] bad".to_string(),
            Duration::ZERO,
        ));

        assert_eq!(result.success_count(), 1);
        assert_eq!(result.skipped_count(), 1);
        assert_eq!(result.failed_count(), 1);
        assert!(!result.is_success());
        assert!(result.get("styles").is_some());
        assert!(result.get("scripts").is_none());
    }

    #[test]
    fn test_run_result_all_outputs() {
        let mut result = RunResult::new();
        result.add_result(TaskResult::success(
            "styles".to_string(),
            vec![PathBuf::from("index.css")],
            Duration::ZERO,
        ));
        result.add_result(TaskResult::success(
            "templates".to_string(),
            vec![PathBuf::from("index.html"), PathBuf::from("about.html")],
            Duration::ZERO,
        ));

        assert_eq!(result.all_outputs().len(), 3);
    }

    #[test]
    fn test_run_result_summary() {
        let mut result = RunResult::new();
        result.add_result(TaskResult::success(
            "styles".to_string(),
            vec![PathBuf::from("index.css")],
            Duration::from_millis(100),
        ));

        let summary = result.with_duration(Duration::from_millis(100)).summary();
        assert!(summary.contains("Run succeeded"));
        assert!(summary.contains("1 files written"));
    }

    #[test]
    fn test_run_result_failure_summary() {
        let mut result = RunResult::new();
        result.add_result(TaskResult::failed(
            "templates".to_string(),
            "[templates] index.html: unexpected token".to_string(),
            Duration::ZERO,
        ));

        let summary = result.summary();
        assert!(summary.contains("Run failed"));
        assert!(summary.contains("templates: failed: [templates] index.html"));
    }
}
