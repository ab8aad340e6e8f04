//! Task listing (`--list`)

use std::process::ExitCode;

use super::EXIT_SUCCESS;
use crate::build::{TaskDef, TaskGraph};

/// One line of the task table.
pub(crate) fn describe(graph: &TaskGraph, task: &TaskDef) -> String {
    let mut name = task.name.clone();
    let aliases = graph.aliases_of(&task.name);
    if !aliases.is_empty() {
        name = format!("{} ({})", name, aliases.join(", "));
    }

    let mut line = format!("  {:<32} {}", name, task.description);
    if !task.requires.is_empty() {
        line.push_str(&format!(" [{}]", task.requires.join(" -> ")));
    }
    line
}

/// Print every built-in task.
pub fn run_list() -> ExitCode {
    let graph = TaskGraph::builtin();
    println!("Tasks:");
    for task in graph.tasks() {
        println!("{}", describe(&graph, task));
    }
    ExitCode::from(EXIT_SUCCESS)
}
