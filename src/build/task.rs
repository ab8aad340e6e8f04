//! Task definitions and the task graph.
//!
//! Every task declares its prerequisites instead of relying on list
//! position. `requires` pulls another task into the plan and orders after
//! it; `after` only orders, and only when the other task is part of the
//! same plan. Running `styles` on its own therefore does not run `clean`,
//! while `default` (which requires `clean`) runs it first.

use crate::build::error::{ErrorOrigin, FailurePolicy};
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

/// The work a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskAction {
    /// Remove the dist directory
    Clean,
    /// Copy (and optionally optimise) images and media
    Assets,
    /// Compile stylesheets
    Styles,
    /// Render page templates
    Templates,
    /// Bundle scripts
    Scripts,
    /// Run the dev server and the watcher
    Serve,
    /// Rename the build folder to the deploy folder
    Deploy,
    /// Fingerprint built assets
    Revision,
}

impl TaskAction {
    /// Error origin reported for failures of this action.
    pub fn origin(&self) -> ErrorOrigin {
        match self {
            TaskAction::Clean => ErrorOrigin::Clean,
            TaskAction::Assets => ErrorOrigin::Assets,
            TaskAction::Styles => ErrorOrigin::Styles,
            TaskAction::Templates => ErrorOrigin::Templates,
            TaskAction::Scripts => ErrorOrigin::Scripts,
            TaskAction::Serve => ErrorOrigin::Server,
            TaskAction::Deploy => ErrorOrigin::Deploy,
            TaskAction::Revision => ErrorOrigin::Revision,
        }
    }
}

/// A named, invocable unit of work.
#[derive(Debug, Clone)]
pub struct TaskDef {
    pub name: String,
    pub description: String,
    /// `None` for composite tasks that only group others
    pub action: Option<TaskAction>,
    /// Tasks pulled into the plan and completed before this one
    pub requires: Vec<String>,
    /// Tasks completed before this one when they are in the same plan
    pub after: Vec<String>,
    pub policy: FailurePolicy,
}

impl TaskDef {
    /// Create a task that performs an action.
    pub fn action(name: &str, action: TaskAction, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            action: Some(action),
            requires: vec![],
            after: vec![],
            policy: FailurePolicy::Continue,
        }
    }

    /// Create a composite task grouping `requires`.
    pub fn composite(name: &str, requires: &[&str], description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            action: None,
            requires: requires.iter().map(|s| s.to_string()).collect(),
            after: vec![],
            policy: FailurePolicy::Continue,
        }
    }

    pub fn with_after(mut self, after: &[&str]) -> Self {
        self.after.extend(after.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_requires(mut self, requires: &[&str]) -> Self {
        self.requires.extend(requires.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn is_composite(&self) -> bool {
        self.action.is_none()
    }
}

/// Error while planning tasks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("Task '{0}' is not in your task graph")]
    UnknownTask(String),
    #[error("Circular dependency detected involving task '{0}'")]
    CyclicDependency(String),
}

/// The set of declared tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    tasks: Vec<TaskDef>,
    aliases: HashMap<String, String>,
}

impl TaskGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// The tasks of a site build.
    pub fn builtin() -> Self {
        let mut graph = Self::new();

        graph.register(TaskDef::action("clean", TaskAction::Clean, "Remove the dist directory"));
        graph.register(
            TaskDef::action("assets", TaskAction::Assets, "Copy images and media into the build")
                .with_after(&["clean"]),
        );
        graph.register(
            TaskDef::action("styles", TaskAction::Styles, "Compile stylesheets")
                .with_after(&["clean", "assets"]),
        );
        graph.register(
            TaskDef::action("templates", TaskAction::Templates, "Render page templates")
                .with_after(&["clean", "assets"]),
        );
        graph.register(
            TaskDef::action("scripts", TaskAction::Scripts, "Bundle scripts")
                .with_after(&["clean", "assets"]),
        );
        graph.register(TaskDef::composite(
            "compile",
            &["assets", "styles", "templates", "scripts"],
            "Assets first, then styles, templates and scripts in parallel",
        ));
        graph.register(
            TaskDef::action("server", TaskAction::Serve, "Serve the build with live reload")
                .with_after(&["clean", "compile"])
                .with_policy(FailurePolicy::Abort),
        );
        graph.register(
            TaskDef::action("rename", TaskAction::Deploy, "Rename the build to the deploy folder")
                .with_after(&["clean", "compile"])
                .with_policy(FailurePolicy::Abort),
        );
        graph.register(
            TaskDef::action("rev", TaskAction::Revision, "Fingerprint built assets")
                .with_after(&["compile"]),
        );
        graph.register(TaskDef::composite(
            "default",
            &["clean", "compile", "server"],
            "Clean, compile, then serve",
        ));
        graph.register(TaskDef::composite(
            "build",
            &["clean", "compile", "rename"],
            "Clean, compile, then rename for deployment",
        ));

        graph.alias("sass", "styles");
        graph.alias("pug", "templates");
        graph.alias("js", "scripts");
        graph.alias("rename-project-folder", "rename");

        graph
    }

    /// Add a task, replacing any task with the same name.
    pub fn register(&mut self, task: TaskDef) {
        self.tasks.retain(|t| t.name != task.name);
        self.tasks.push(task);
    }

    /// Add an alternative name for a task.
    pub fn alias(&mut self, alias: &str, target: &str) {
        self.aliases.insert(alias.to_string(), target.to_string());
    }

    /// All declared tasks in declaration order.
    pub fn tasks(&self) -> &[TaskDef] {
        &self.tasks
    }

    /// Aliases pointing at `name`.
    pub fn aliases_of(&self, name: &str) -> Vec<&str> {
        let mut aliases: Vec<&str> =
            self.aliases.iter().filter(|(_, t)| *t == name).map(|(a, _)| a.as_str()).collect();
        aliases.sort_unstable();
        aliases
    }

    /// Look up a task by name or alias.
    pub fn get(&self, name: &str) -> Option<&TaskDef> {
        let name = self.aliases.get(name).map(String::as_str).unwrap_or(name);
        self.tasks.iter().find(|t| t.name == name)
    }

    fn lookup(&self, name: &str) -> Result<&TaskDef, TaskError> {
        self.get(name).ok_or_else(|| TaskError::UnknownTask(name.to_string()))
    }

    /// Build the plan for running `names`.
    pub fn plan<S: AsRef<str>>(&self, names: &[S]) -> Result<TaskPlan, TaskError> {
        let mut included: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&TaskDef> = VecDeque::new();

        for name in names {
            queue.push_back(self.lookup(name.as_ref())?);
        }

        while let Some(task) = queue.pop_front() {
            if !included.insert(task.name.as_str()) {
                continue;
            }
            for required in &task.requires {
                queue.push_back(self.lookup(required)?);
            }
        }

        let mut tasks = Vec::new();
        for task in self.tasks.iter().filter(|t| included.contains(t.name.as_str())) {
            let mut dependencies: Vec<String> = Vec::new();
            for required in &task.requires {
                let dep = self.lookup(required)?.name.clone();
                if !dependencies.contains(&dep) {
                    dependencies.push(dep);
                }
            }
            for after in &task.after {
                let dep = self.lookup(after)?.name.clone();
                if included.contains(dep.as_str()) && !dependencies.contains(&dep) {
                    dependencies.push(dep);
                }
            }

            tasks.push(PlannedTask {
                name: task.name.clone(),
                action: task.action,
                policy: task.policy,
                dependencies,
            });
        }

        Ok(TaskPlan { tasks })
    }
}

/// A task as scheduled in one plan.
#[derive(Debug, Clone)]
pub struct PlannedTask {
    pub name: String,
    pub action: Option<TaskAction>,
    pub policy: FailurePolicy,
    /// Tasks in this plan that must complete first
    pub dependencies: Vec<String>,
}

/// The tasks of one invocation with their effective prerequisites.
#[derive(Debug, Clone, Default)]
pub struct TaskPlan {
    tasks: Vec<PlannedTask>,
}

impl TaskPlan {
    pub fn tasks(&self) -> &[PlannedTask] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.iter().any(|t| t.name == name)
    }

    /// Get tasks in build order (respecting dependencies).
    ///
    /// Returns an error if there are circular dependencies.
    pub fn build_order(&self) -> Result<Vec<&PlannedTask>, TaskError> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut visiting = HashSet::new();

        for task in &self.tasks {
            self.visit_task(task, &mut visited, &mut visiting, &mut result)?;
        }

        Ok(result)
    }

    fn visit_task<'a>(
        &'a self,
        task: &'a PlannedTask,
        visited: &mut HashSet<String>,
        visiting: &mut HashSet<String>,
        result: &mut Vec<&'a PlannedTask>,
    ) -> Result<(), TaskError> {
        if visited.contains(&task.name) {
            return Ok(());
        }

        if visiting.contains(&task.name) {
            return Err(TaskError::CyclicDependency(task.name.clone()));
        }

        visiting.insert(task.name.clone());

        for dep_name in &task.dependencies {
            if let Some(dep) = self.tasks.iter().find(|t| &t.name == dep_name) {
                self.visit_task(dep, visited, visiting, result)?;
            }
        }

        visiting.remove(&task.name);
        visited.insert(task.name.clone());
        result.push(task);

        Ok(())
    }

    /// Group tasks into waves.
    ///
    /// Every task's dependencies are in an earlier wave, so the members of a
    /// wave can run concurrently. Order inside a wave follows the plan.
    pub fn levels(&self) -> Result<Vec<Vec<&PlannedTask>>, TaskError> {
        self.build_order()?;

        let mut levels_map: HashMap<&str, usize> = HashMap::new();
        let mut remaining: Vec<&PlannedTask> = self.tasks.iter().collect();
        let mut result: Vec<Vec<&PlannedTask>> = Vec::new();

        while !remaining.is_empty() {
            let current_level = result.len();
            let (ready, blocked): (Vec<&PlannedTask>, Vec<&PlannedTask>) =
                remaining.into_iter().partition(|t| {
                    t.dependencies.iter().all(|d| {
                        levels_map.contains_key(d.as_str()) || !self.contains(d)
                    })
                });

            if ready.is_empty() {
                let name = blocked.first().map(|t| t.name.clone()).unwrap_or_default();
                return Err(TaskError::CyclicDependency(name));
            }

            for task in &ready {
                levels_map.insert(task.name.as_str(), current_level);
            }
            result.push(ready);
            remaining = blocked;
        }

        Ok(result)
    }
}
