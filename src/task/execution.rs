use crate::task::{TaskName, TaskResult, TaskStatus};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for task executions
pub type ExecutionId = Uuid;

/// Recorded outcome of one task invocation, with its subtasks in execution order
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TaskExecution {
    pub id: ExecutionId,
    pub name: TaskName,
    pub result: TaskResult,
    pub subtasks: Vec<TaskExecution>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

/// Status counts over an execution tree
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionStatistics {
    pub total_tasks: u32,
    pub successful_tasks: u32,
    pub failed_tasks: u32,
    pub skipped_tasks: u32,
}

impl TaskExecution {
    pub fn status(&self) -> TaskStatus {
        self.result.status()
    }

    pub fn duration(&self) -> Duration {
        self.ended_at.signed_duration_since(self.started_at)
    }

    /// Depth-first, pre-order walk with the path of names from the root
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&[&'a TaskName], &'a TaskExecution)) {
        let mut path = Vec::new();
        self.walk_inner(&mut path, visit);
    }

    fn walk_inner<'a>(
        &'a self,
        path: &mut Vec<&'a TaskName>,
        visit: &mut impl FnMut(&[&'a TaskName], &'a TaskExecution),
    ) {
        path.push(&self.name);
        visit(path.as_slice(), self);
        for subtask in &self.subtasks {
            subtask.walk_inner(path, visit);
        }
        path.pop();
    }

    /// First direct subtask with the given name
    pub fn subtask(&self, name: &TaskName) -> Option<&TaskExecution> {
        self.subtasks.iter().find(|s| &s.name == name)
    }

    /// First direct subtask whose plain name matches, ignoring attributes
    pub fn subtask_named(&self, name: &str) -> Option<&TaskExecution> {
        self.subtasks.iter().find(|s| s.name.name() == name)
    }

    pub fn statistics(&self) -> ExecutionStatistics {
        let mut stats = ExecutionStatistics::default();
        self.walk(&mut |_, execution| {
            stats.total_tasks += 1;
            match execution.status() {
                TaskStatus::Success => stats.successful_tasks += 1,
                TaskStatus::Fail => stats.failed_tasks += 1,
                TaskStatus::Skipped => stats.skipped_tasks += 1,
            }
        });
        stats
    }
}

impl ExecutionStatistics {
    /// Share of non-skipped tasks that succeeded
    pub fn success_rate(&self) -> f64 {
        let attempted = self.successful_tasks + self.failed_tasks;
        if attempted == 0 {
            0.0
        } else {
            self.successful_tasks as f64 / attempted as f64
        }
    }
}
