//! Migration reports built from a finished execution tree.
//!
//! A report carries the status counts of the whole tree, the root-cause
//! failures (failed tasks none of whose subtasks failed) and the environment
//! properties the migration consulted. It renders as an indented text
//! summary or as JSON.

use crate::environment::MigrationEnvironment;
use crate::task::{ExecutionStatistics, SKIP_REASON_ATTRIBUTE, TaskExecution, TaskName, TaskStatus};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tracing::info;

/// A failed task whose own subtasks did not fail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    /// Task names from the root down to the failed task
    pub path: Vec<String>,
    pub error: Option<String>,
}

impl TaskFailure {
    pub fn path_display(&self) -> String {
        self.path.join(" / ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    pub task: TaskName,
    pub status: TaskStatus,
    pub statistics: ExecutionStatistics,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub failures: Vec<TaskFailure>,
    pub properties_read: Vec<String>,
    pub execution: TaskExecution,
}

impl MigrationReport {
    pub fn from_execution(root: &TaskExecution, environment: &MigrationEnvironment) -> Self {
        let mut failures = Vec::new();
        root.walk(&mut |path, execution| {
            let root_cause = execution.result.is_fail()
                && !execution.subtasks.iter().any(|s| s.result.is_fail());
            if root_cause {
                failures.push(TaskFailure {
                    path: path.iter().map(|name| name.to_string()).collect(),
                    error: execution.result.error().map(str::to_string),
                });
            }
        });

        Self {
            task: root.name.clone(),
            status: root.status(),
            statistics: root.statistics(),
            started_at: root.started_at,
            ended_at: root.ended_at,
            duration_ms: root.duration().num_milliseconds(),
            failures,
            properties_read: environment.property_names_read().into_iter().collect(),
            execution: root.clone(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == TaskStatus::Fail
    }

    /// Plain text summary with the execution tree indented by depth
    pub fn summary(&self) -> String {
        let stats = &self.statistics;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Migration {}: {} ({} tasks: {} succeeded, {} failed, {} skipped) in {} ms",
            self.task,
            self.status,
            stats.total_tasks,
            stats.successful_tasks,
            stats.failed_tasks,
            stats.skipped_tasks,
            self.duration_ms
        );

        self.execution.walk(&mut |path, execution| {
            let indent = "  ".repeat(path.len());
            let _ = write!(out, "{}[{}] {}", indent, execution.status(), execution.name);
            match execution.status() {
                TaskStatus::Fail if execution.subtasks.is_empty() => {
                    if let Some(error) = execution.result.error() {
                        let _ = write!(out, ": {}", error);
                    }
                }
                TaskStatus::Skipped => {
                    if let Some(reason) = execution.result.attribute(SKIP_REASON_ATTRIBUTE) {
                        let _ = write!(out, " ({})", reason);
                    }
                }
                _ => {}
            }
            out.push('\n');
        });

        if !self.failures.is_empty() {
            out.push_str("\nFailures:\n");
            for failure in &self.failures {
                let _ = writeln!(
                    out,
                    "  {}: {}",
                    failure.path_display(),
                    failure.error.as_deref().unwrap_or("no error recorded")
                );
            }
        }

        if !self.properties_read.is_empty() {
            let _ = writeln!(out, "\nProperties read: {}", self.properties_read.join(", "));
        }
        out
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize migration report")
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_file(path.as_ref(), &self.to_json()?)
    }

    pub fn write_summary<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_file(path.as_ref(), &self.summary())
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create report directory {:?}", parent))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write report {:?}", path))?;
    info!("Wrote report to {:?}", path);
    Ok(())
}
