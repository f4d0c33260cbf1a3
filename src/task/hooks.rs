use crate::task::{TaskContext, TaskName, TaskResult};
use anyhow::Result;

/// Core logic of a leaf task
pub trait Runnable<P>: Send + Sync {
    fn run(&self, params: &P, name: &TaskName, context: &mut TaskContext) -> Result<TaskResult>;
}

impl<P, F> Runnable<P> for F
where
    F: Fn(&P, &TaskName, &mut TaskContext) -> Result<TaskResult> + Send + Sync,
{
    fn run(&self, params: &P, name: &TaskName, context: &mut TaskContext) -> Result<TaskResult> {
        self(params, name, context)
    }
}

/// Invoked after the skip check and before the task's own work
pub trait BeforeRun<P>: Send + Sync {
    fn before_run(&self, params: &P, name: &TaskName, context: &mut TaskContext) -> Result<()>;
}

impl<P, F> BeforeRun<P> for F
where
    F: Fn(&P, &TaskName, &mut TaskContext) -> Result<()> + Send + Sync,
{
    fn before_run(&self, params: &P, name: &TaskName, context: &mut TaskContext) -> Result<()> {
        self(params, name, context)
    }
}

/// Invoked after the task's own work completed without error
pub trait AfterRun<P>: Send + Sync {
    fn after_run(&self, params: &P, name: &TaskName, context: &mut TaskContext) -> Result<()>;
}

impl<P, F> AfterRun<P> for F
where
    F: Fn(&P, &TaskName, &mut TaskContext) -> Result<()> + Send + Sync,
{
    fn after_run(&self, params: &P, name: &TaskName, context: &mut TaskContext) -> Result<()> {
        self(params, name, context)
    }
}
