//! State and behaviour shared by leaf and composite task builders.
//!
//! Builders are mutable templates with value semantics: `clone()` copies the
//! hook, skip-policy and subtask lists, while the hooks and policies inside
//! them are shared immutable values. `build(params)` never mutates the
//! builder, so one builder can be built for any number of parameter objects.

use crate::task::result::AFTER_RUN_ERROR_ATTRIBUTE;
use crate::task::skip::{AnyOf, any_of};
use crate::task::{
    AfterRun, BeforeRun, ServerMigrationTask, SkipPolicy, TaskContext, TaskName, TaskResult,
    SKIP_REASON_ATTRIBUTE,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// Builder wiring mistakes, reported before any task runs
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("Task builder has no name")]
    MissingName,

    #[error("Leaf task '{0}' has no runnable")]
    MissingRunnable(String),

    #[error("Subtask {index} of '{parent}' is misconfigured: {source}")]
    InSubtask {
        parent: String,
        index: usize,
        #[source]
        source: Box<BuildError>,
    },

    #[error("Task '{task}' is misconfigured: {reason}")]
    Invalid { task: String, reason: String },
}

/// Anything that produces a runnable task from a parameter object
pub trait TaskBuilder<P>: Send + Sync {
    fn build_task(&self, params: P) -> Result<Arc<dyn ServerMigrationTask>, BuildError>;

    /// Check the wiring without building
    fn validate(&self) -> Result<(), BuildError>;
}

pub(crate) type NameResolver<P> = Arc<dyn Fn(&P) -> TaskName + Send + Sync>;

/// Name, skip policies and hooks common to every task builder
pub struct TaskSettings<P> {
    name: Option<NameResolver<P>>,
    label: Option<String>,
    skip: AnyOf<P>,
    before: Vec<Arc<dyn BeforeRun<P>>>,
    after: Vec<Arc<dyn AfterRun<P>>>,
}

impl<P> Clone for TaskSettings<P> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            label: self.label.clone(),
            skip: self.skip.clone(),
            before: self.before.clone(),
            after: self.after.clone(),
        }
    }
}

impl<P> Default for TaskSettings<P> {
    fn default() -> Self {
        Self {
            name: None,
            label: None,
            skip: any_of(Vec::new()),
            before: Vec::new(),
            after: Vec::new(),
        }
    }
}

impl<P> TaskSettings<P> {
    /// Human readable label for error messages
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or("<computed name>")
    }

    pub fn has_name(&self) -> bool {
        self.name.is_some()
    }

    pub fn resolve_name(&self, params: &P) -> Result<TaskName, BuildError> {
        self.name
            .as_ref()
            .map(|resolve| resolve(params))
            .ok_or(BuildError::MissingName)
    }

    /// Skip check, before hooks, `body`, after hooks, then `finish`.
    ///
    /// A before hook or body error is returned and becomes the task's FAIL
    /// result. `finish` sees every subtask recorded so far, including those
    /// executed by after hooks. After hook errors are attached to the final
    /// result without changing its status.
    pub fn run_with_hooks<F, G>(
        &self,
        params: &P,
        name: &TaskName,
        context: &mut TaskContext,
        body: F,
        finish: G,
    ) -> Result<TaskResult>
    where
        F: FnOnce(&P, &TaskName, &mut TaskContext) -> Result<TaskResult>,
        G: FnOnce(&TaskContext, TaskResult) -> TaskResult,
    {
        if let Some(policy) = self.skip.matching(params, name, context) {
            debug!("Skip policy matched for {}", name);
            let mut result = TaskResult::builder();
            if let Some(reason) = policy.describe(name) {
                result = result.attribute(SKIP_REASON_ATTRIBUTE, reason);
            }
            return Ok(result.skipped());
        }

        for hook in &self.before {
            hook.before_run(params, name, context)
                .context("before-run hook failed")?;
        }

        let result = body(params, name, context)?;

        let mut after_errors = Vec::new();
        for hook in &self.after {
            if let Err(error) = hook.after_run(params, name, context) {
                warn!("After-run hook of {} failed: {:#}", name, error);
                after_errors.push(format!("{:#}", error));
            }
        }

        let mut result = finish(context, result);
        if !after_errors.is_empty() {
            result = result.with_attribute(AFTER_RUN_ERROR_ATTRIBUTE, after_errors.join("; "));
        }
        Ok(result)
    }
}

/// Configuration shared by [`LeafTaskBuilder`](crate::task::LeafTaskBuilder)
/// and [`CompositeTaskBuilder`](crate::task::CompositeTaskBuilder).
pub trait CommonTaskBuilder<P: 'static>: Sized {
    fn settings_mut(&mut self) -> &mut TaskSettings<P>;

    /// Fixed task name; replaces any earlier name
    fn name(mut self, name: impl Into<TaskName>) -> Self {
        let name = name.into();
        let settings = self.settings_mut();
        settings.label = Some(name.to_string());
        settings.name = Some(Arc::new(move |_: &P| name.clone()));
        self
    }

    /// Name computed from the parameters; replaces any earlier name
    fn name_with<F>(mut self, resolve: F) -> Self
    where
        F: Fn(&P) -> TaskName + Send + Sync + 'static,
    {
        let settings = self.settings_mut();
        settings.label = None;
        settings.name = Some(Arc::new(resolve));
        self
    }

    /// Add a skip policy, OR-combined with those already added
    fn skip_policy(mut self, policy: impl SkipPolicy<P> + 'static) -> Self {
        self.settings_mut().skip.push(Arc::new(policy));
        self
    }

    /// Add a closure skip policy, OR-combined with those already added
    fn skip_if<F>(self, predicate: F) -> Self
    where
        F: Fn(&P, &TaskName, &TaskContext) -> bool + Send + Sync + 'static,
    {
        self.skip_policy(predicate)
    }

    fn before_run<F>(self, hook: F) -> Self
    where
        F: Fn(&P, &TaskName, &mut TaskContext) -> Result<()> + Send + Sync + 'static,
    {
        self.before_run_hook(hook)
    }

    fn before_run_hook(mut self, hook: impl BeforeRun<P> + 'static) -> Self {
        self.settings_mut().before.push(Arc::new(hook));
        self
    }

    fn after_run<F>(self, hook: F) -> Self
    where
        F: Fn(&P, &TaskName, &mut TaskContext) -> Result<()> + Send + Sync + 'static,
    {
        self.after_run_hook(hook)
    }

    fn after_run_hook(mut self, hook: impl AfterRun<P> + 'static) -> Self {
        self.settings_mut().after.push(Arc::new(hook));
        self
    }
}
