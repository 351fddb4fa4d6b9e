use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};

/// Body of a named task. It gets the registry back so it can invoke other
/// tasks by name when it runs.
pub type TaskBody = Box<dyn Fn(&TaskRegistry) -> Result<()> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("unknown task '{0}'")]
    UnknownTask(String),

    #[error("task '{0}' is already registered")]
    DuplicateTask(String),

    #[error("prerequisite cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub name: String,
    pub description: String,
    pub prerequisites: Vec<String>,
}

struct Task {
    info: TaskInfo,
    body: TaskBody,
}

/// Named, described units of work with prerequisites.
///
/// Prerequisites are resolved by name at invocation time, run depth first in
/// declaration order, and each task runs at most once per `invoke` call.
/// Tasks stay on the active chain while their body runs, so a body that
/// invokes a task leading back to itself is reported as a cycle.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, Task>,
    order: Vec<String>,
    active: Mutex<Vec<String>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        prerequisites: Vec<String>,
        body: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&TaskRegistry) -> Result<()> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.tasks.contains_key(&name) {
            return Err(RegistryError::DuplicateTask(name));
        }
        debug!(target: "lifeline_task", task = %name, prerequisites = ?prerequisites, "registered task");
        let info = TaskInfo {
            name: name.clone(),
            description: description.into(),
            prerequisites,
        };
        self.tasks.insert(
            name.clone(),
            Task {
                info,
                body: Box::new(body),
            },
        );
        self.order.push(name);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Registered tasks in registration order.
    pub fn tasks(&self) -> Vec<TaskInfo> {
        self.order
            .iter()
            .filter_map(|name| self.tasks.get(name))
            .map(|task| task.info.clone())
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Runs `name` after its prerequisites. Errors from task bodies are
    /// returned as they were produced.
    pub fn invoke(&self, name: &str) -> Result<()> {
        let mut done = HashSet::new();
        self.invoke_with(name, &mut done)
    }

    fn invoke_with(&self, name: &str, done: &mut HashSet<String>) -> Result<()> {
        if done.contains(name) {
            return Ok(());
        }
        let task = self
            .tasks
            .get(name)
            .ok_or_else(|| RegistryError::UnknownTask(name.to_string()))?;

        self.enter(name)?;
        let result = self.run_task(name, task, done);
        self.leave(name);
        result?;
        done.insert(name.to_string());
        Ok(())
    }

    fn run_task(&self, name: &str, task: &Task, done: &mut HashSet<String>) -> Result<()> {
        for prerequisite in &task.info.prerequisites {
            self.invoke_with(prerequisite, done)?;
        }
        info!(target: "lifeline_task", task = %name, "invoking task");
        (task.body)(self)
    }

    fn enter(&self, name: &str) -> Result<(), RegistryError> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(start) = active.iter().position(|n| n == name) {
            let mut cycle = active[start..].to_vec();
            cycle.push(name.to_string());
            return Err(RegistryError::Cycle(cycle));
        }
        active.push(name.to_string());
        Ok(())
    }

    fn leave(&self, name: &str) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pos) = active.iter().rposition(|n| n == name) {
            active.remove(pos);
        }
    }
}
