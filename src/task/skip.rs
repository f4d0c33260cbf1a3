//! Skip policies decide, before any hook runs, whether a task is bypassed.
//!
//! Several policies attached to one builder are OR-combined.

use crate::env::properties::SKIP_SUFFIX;
use crate::task::{TaskContext, TaskName};
use std::sync::Arc;
use tracing::warn;

pub trait SkipPolicy<P>: Send + Sync {
    fn is_skipped(&self, params: &P, name: &TaskName, context: &TaskContext) -> bool;

    /// Why the task was skipped, when the policy can tell
    fn describe(&self, _name: &TaskName) -> Option<String> {
        None
    }
}

impl<P, F> SkipPolicy<P> for F
where
    F: Fn(&P, &TaskName, &TaskContext) -> bool + Send + Sync,
{
    fn is_skipped(&self, params: &P, name: &TaskName, context: &TaskContext) -> bool {
        self(params, name, context)
    }
}

/// Skip property for a task name or property prefix, e.g. `subsystems.skip`
pub fn skip_property_name(prefix: &str) -> String {
    format!("{}{}", prefix, SKIP_SUFFIX)
}

/// Skips when `<task-name>.skip` is true
pub fn default_task_skip_property() -> DefaultTaskSkipProperty {
    DefaultTaskSkipProperty
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTaskSkipProperty;

impl<P> SkipPolicy<P> for DefaultTaskSkipProperty {
    fn is_skipped(&self, _params: &P, name: &TaskName, context: &TaskContext) -> bool {
        context
            .environment()
            .property_as_boolean(&skip_property_name(name.name()), false)
    }

    fn describe(&self, name: &TaskName) -> Option<String> {
        Some(format!(
            "property {} is true",
            skip_property_name(name.name())
        ))
    }
}

/// Skips when `<prefix>.skip` is true
pub fn skip_by_property_prefix(prefix: impl Into<String>) -> SkipIfAnyPropertySet {
    SkipIfAnyPropertySet {
        properties: vec![skip_property_name(&prefix.into())],
    }
}

/// Skips when any of the named boolean properties is true
pub fn skip_if_any_property_set<I, S>(properties: I) -> SkipIfAnyPropertySet
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    SkipIfAnyPropertySet {
        properties: properties.into_iter().map(Into::into).collect(),
    }
}

#[derive(Debug, Clone)]
pub struct SkipIfAnyPropertySet {
    properties: Vec<String>,
}

impl<P> SkipPolicy<P> for SkipIfAnyPropertySet {
    fn is_skipped(&self, _params: &P, _name: &TaskName, context: &TaskContext) -> bool {
        self.properties
            .iter()
            .any(|property| context.environment().property_as_boolean(property, false))
    }

    fn describe(&self, _name: &TaskName) -> Option<String> {
        Some(format!("property set: {}", self.properties.join(" | ")))
    }
}

/// In interactive mode, skips unless the user confirms `question`.
/// Non-interactive runs never skip.
pub fn skip_unless_confirmed(question: impl Into<String>) -> SkipUnlessConfirmed {
    SkipUnlessConfirmed {
        question: question.into(),
    }
}

#[derive(Debug, Clone)]
pub struct SkipUnlessConfirmed {
    question: String,
}

impl<P> SkipPolicy<P> for SkipUnlessConfirmed {
    fn is_skipped(&self, _params: &P, name: &TaskName, context: &TaskContext) -> bool {
        if !context.is_interactive() {
            return false;
        }
        match context.prompt().confirm(&self.question, true) {
            Ok(confirmed) => !confirmed,
            Err(error) => {
                warn!("Confirmation for {} failed, skipping: {:#}", name, error);
                true
            }
        }
    }

    fn describe(&self, _name: &TaskName) -> Option<String> {
        Some(format!("declined by user: {}", self.question))
    }
}

/// Skips when any policy does; the first matching policy describes the skip
pub fn any_of<P>(policies: Vec<Arc<dyn SkipPolicy<P>>>) -> AnyOf<P> {
    AnyOf { policies }
}

pub struct AnyOf<P> {
    policies: Vec<Arc<dyn SkipPolicy<P>>>,
}

impl<P> Clone for AnyOf<P> {
    fn clone(&self) -> Self {
        Self {
            policies: self.policies.clone(),
        }
    }
}

impl<P> AnyOf<P> {
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn push(&mut self, policy: Arc<dyn SkipPolicy<P>>) {
        self.policies.push(policy);
    }

    /// First matching policy, if any
    pub fn matching(
        &self,
        params: &P,
        name: &TaskName,
        context: &TaskContext,
    ) -> Option<&Arc<dyn SkipPolicy<P>>> {
        self.policies
            .iter()
            .find(|policy| policy.is_skipped(params, name, context))
    }
}

impl<P> SkipPolicy<P> for AnyOf<P> {
    fn is_skipped(&self, params: &P, name: &TaskName, context: &TaskContext) -> bool {
        self.matching(params, name, context).is_some()
    }
}

/// Skips only when every policy does; an empty set never skips
pub fn all_of<P>(policies: Vec<Arc<dyn SkipPolicy<P>>>) -> AllOf<P> {
    AllOf { policies }
}

pub struct AllOf<P> {
    policies: Vec<Arc<dyn SkipPolicy<P>>>,
}

impl<P> SkipPolicy<P> for AllOf<P> {
    fn is_skipped(&self, params: &P, name: &TaskName, context: &TaskContext) -> bool {
        !self.policies.is_empty()
            && self
                .policies
                .iter()
                .all(|policy| policy.is_skipped(params, name, context))
    }
}

/// Inverts a policy
pub fn not<P>(policy: Arc<dyn SkipPolicy<P>>) -> Not<P> {
    Not { policy }
}

pub struct Not<P> {
    policy: Arc<dyn SkipPolicy<P>>,
}

impl<P> SkipPolicy<P> for Not<P> {
    fn is_skipped(&self, params: &P, name: &TaskName, context: &TaskContext) -> bool {
        !self.policy.is_skipped(params, name, context)
    }
}
