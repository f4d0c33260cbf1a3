use crate::environment::MigrationEnvironment;
use crate::files::{LocalMigrationFiles, MigrationFiles};
use crate::interaction::{NonInteractivePrompt, UserPrompt};
use crate::task::{TaskExecution, TaskName, TaskResult, TaskStatus};
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, info_span};
use uuid::Uuid;

/// A named unit of migration work
pub trait ServerMigrationTask: Send + Sync {
    fn name(&self) -> &TaskName;

    /// Run the task once. An `Err` is recorded as a FAIL result by the caller.
    fn run(&self, context: &mut TaskContext) -> Result<TaskResult>;
}

/// Process-wide collaborators shared by every task context
pub struct MigrationServices {
    environment: MigrationEnvironment,
    files: Arc<dyn MigrationFiles>,
    prompt: Arc<dyn UserPrompt>,
    interactive: bool,
}

impl MigrationServices {
    /// Non-interactive services copying files on the local filesystem
    pub fn new(environment: MigrationEnvironment) -> Self {
        Self {
            environment,
            files: Arc::new(LocalMigrationFiles::new()),
            prompt: Arc::new(NonInteractivePrompt),
            interactive: false,
        }
    }

    pub fn with_files(mut self, files: Arc<dyn MigrationFiles>) -> Self {
        self.files = files;
        self
    }

    /// Use `prompt` and mark the migration as interactive
    pub fn with_prompt(mut self, prompt: Arc<dyn UserPrompt>) -> Self {
        self.prompt = prompt;
        self.interactive = true;
        self
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn environment(&self) -> &MigrationEnvironment {
        &self.environment
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }
}

/// Execution handle for one task run; records the subtasks it executes.
pub struct TaskContext {
    services: Arc<MigrationServices>,
    task_name: Option<TaskName>,
    subtasks: Vec<TaskExecution>,
}

impl TaskContext {
    /// Context for the process entry point, above the root task
    pub fn root(services: Arc<MigrationServices>) -> Self {
        Self {
            services,
            task_name: None,
            subtasks: Vec::new(),
        }
    }

    /// Name of the task this context runs, `None` at the root
    pub fn task_name(&self) -> Option<&TaskName> {
        self.task_name.as_ref()
    }

    pub fn services(&self) -> &Arc<MigrationServices> {
        &self.services
    }

    pub fn environment(&self) -> &MigrationEnvironment {
        &self.services.environment
    }

    pub fn files(&self) -> &dyn MigrationFiles {
        self.services.files.as_ref()
    }

    pub fn prompt(&self) -> &dyn UserPrompt {
        self.services.prompt.as_ref()
    }

    pub fn is_interactive(&self) -> bool {
        self.services.interactive
    }

    /// Run `task` as a child of this context and record its execution.
    ///
    /// An error returned by the task becomes a FAIL result carrying the
    /// error chain; it never propagates to the caller.
    pub fn execute(&mut self, task: &dyn ServerMigrationTask) -> &TaskExecution {
        let name = task.name().clone();
        let span = info_span!("task", name = %name);
        let _entered = span.enter();

        let started_at = Utc::now();
        let mut child = TaskContext {
            services: Arc::clone(&self.services),
            task_name: Some(name.clone()),
            subtasks: Vec::new(),
        };

        debug!("Starting task {}", name);
        let result = match task.run(&mut child) {
            Ok(result) => result,
            Err(error) => {
                error!("Task {} failed: {:#}", name, error);
                TaskResult::from_error(&error)
            }
        };

        match result.status() {
            TaskStatus::Success => info!("Task {} succeeded", name),
            TaskStatus::Skipped => info!("Task {} skipped", name),
            TaskStatus::Fail => info!("Task {} failed", name),
        }

        let index = self.subtasks.len();
        self.subtasks.push(TaskExecution {
            id: Uuid::new_v4(),
            name,
            result,
            subtasks: child.subtasks,
            started_at,
            ended_at: Utc::now(),
        });
        &self.subtasks[index]
    }

    /// Subtasks executed so far, in execution order
    pub fn subtasks(&self) -> &[TaskExecution] {
        &self.subtasks
    }

    pub fn last_subtask(&self) -> Option<&TaskExecution> {
        self.subtasks.last()
    }

    /// Result of the most recent subtask with the given name
    pub fn subtask_result(&self, name: &TaskName) -> Option<&TaskResult> {
        self.subtasks
            .iter()
            .rev()
            .find(|s| &s.name == name)
            .map(|s| &s.result)
    }

    pub fn has_successful_subtasks(&self) -> bool {
        self.subtasks.iter().any(|s| s.result.is_success())
    }

    pub fn has_failed_subtasks(&self) -> bool {
        self.subtasks.iter().any(|s| s.result.is_fail())
    }

    pub fn into_subtasks(self) -> Vec<TaskExecution> {
        self.subtasks
    }
}

/// Run `task` as the root of a migration and return its execution tree
pub fn execute_root(services: Arc<MigrationServices>, task: &dyn ServerMigrationTask) -> TaskExecution {
    let mut context = TaskContext::root(services);
    context.execute(task).clone()
}
