use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Attribute holding the error chain of a failed task
pub const ERROR_ATTRIBUTE: &str = "error";

/// Attribute holding the description of the skip policy that matched
pub const SKIP_REASON_ATTRIBUTE: &str = "skip-reason";

/// Attribute holding the error of an after-run hook
pub const AFTER_RUN_ERROR_ATTRIBUTE: &str = "after-run-error";

/// Terminal status of a task execution
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Success,
    Fail,
    Skipped,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Fail => "FAIL",
            TaskStatus::Skipped => "SKIPPED",
        })
    }
}

/// Immutable task outcome
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TaskResult {
    status: TaskStatus,
    attributes: BTreeMap<String, String>,
}

impl TaskResult {
    pub fn builder() -> TaskResultBuilder {
        TaskResultBuilder::default()
    }

    pub fn success() -> Self {
        Self::builder().success()
    }

    pub fn skipped() -> Self {
        Self::builder().skipped()
    }

    /// Failed result carrying `message` as its error attribute
    pub fn fail(message: impl Into<String>) -> Self {
        Self::builder().attribute(ERROR_ATTRIBUTE, message).fail()
    }

    /// Failed result carrying the full error chain
    pub fn from_error(error: &anyhow::Error) -> Self {
        Self::fail(format!("{:#}", error))
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Success
    }

    pub fn is_fail(&self) -> bool {
        self.status == TaskStatus::Fail
    }

    pub fn is_skipped(&self) -> bool {
        self.status == TaskStatus::Skipped
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn error(&self) -> Option<&str> {
        self.attribute(ERROR_ATTRIBUTE)
    }

    /// Copy of this result with one more attribute, status unchanged
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Accumulates attributes; only the terminal status methods produce a result.
#[derive(Clone, Debug, Default)]
pub struct TaskResultBuilder {
    attributes: BTreeMap<String, String>,
}

impl TaskResultBuilder {
    /// Add an attribute, replacing any previous value for the key
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn success(self) -> TaskResult {
        self.status(TaskStatus::Success)
    }

    pub fn fail(self) -> TaskResult {
        self.status(TaskStatus::Fail)
    }

    pub fn skipped(self) -> TaskResult {
        self.status(TaskStatus::Skipped)
    }

    pub fn status(self, status: TaskStatus) -> TaskResult {
        TaskResult {
            status,
            attributes: self.attributes,
        }
    }
}
