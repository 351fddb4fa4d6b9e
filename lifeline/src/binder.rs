use crate::guard::LifelineGuard;
use crate::registry::{RegistryError, TaskRegistry};
use crate::snapshot::ProcessLister;
use crate::terminate::Terminator;
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

/// Names registered for one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundTasks {
    pub run: String,
    pub lifeline: String,
    pub terminate: String,
}

impl BoundTasks {
    pub fn for_namespace(namespace: &str) -> Self {
        Self {
            run: format!("{namespace}:run"),
            lifeline: format!("{namespace}:lifeline"),
            terminate: format!("{namespace}:terminate"),
        }
    }

    pub fn names(&self) -> [&str; 3] {
        [&self.run, &self.lifeline, &self.terminate]
    }
}

/// Wires the run/lifeline/terminate triple into a registry.
pub struct TaskBinder {
    lister: Arc<dyn ProcessLister>,
    terminator: Arc<dyn Terminator>,
    pid: u32,
}

impl TaskBinder {
    pub fn new(lister: Arc<dyn ProcessLister>, terminator: Arc<dyn Terminator>) -> Self {
        Self {
            lister,
            terminator,
            pid: std::process::id(),
        }
    }

    /// Overrides the pid the lifeline task looks for in the process table.
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = pid;
        self
    }

    /// Registers `<namespace>:run` (the caller's work), `<namespace>:lifeline`
    /// (runs `:run` only when unique) and `<namespace>:terminate` (kills
    /// running `:lifeline` instances).
    pub fn bind<F>(
        &self,
        registry: &mut TaskRegistry,
        namespace: &str,
        description: &str,
        prerequisites: Vec<String>,
        run: F,
    ) -> Result<BoundTasks, RegistryError>
    where
        F: Fn(&TaskRegistry) -> Result<()> + Send + Sync + 'static,
    {
        let bound = BoundTasks::for_namespace(namespace);
        if let Some(taken) = bound.names().into_iter().find(|n| registry.contains(n)) {
            return Err(RegistryError::DuplicateTask(taken.to_string()));
        }

        registry.register(bound.run.clone(), description, prerequisites, run)?;

        let guard = LifelineGuard::new(Arc::clone(&self.lister), self.pid);
        let run_name = bound.run.clone();
        registry.register(
            bound.lifeline.clone(),
            format!("Run {} unless another instance is already running", bound.run),
            Vec::new(),
            move |reg: &TaskRegistry| {
                guard
                    .guard(Some(|| reg.invoke(&run_name)))
                    .map(|_| ())
            },
        )?;

        let terminator = Arc::clone(&self.terminator);
        let scope = bound.lifeline.clone();
        registry.register(
            bound.terminate.clone(),
            format!("Kill running {} processes", bound.lifeline),
            Vec::new(),
            move |_: &TaskRegistry| {
                let report = terminator.terminate(&scope)?;
                println!("{report}");
                Ok(())
            },
        )?;

        info!(target: "lifeline_task", namespace = %namespace, "bound lifeline tasks");
        Ok(bound)
    }
}
