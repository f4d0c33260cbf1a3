use crate::task::builder::{BuildError, CommonTaskBuilder, TaskBuilder, TaskSettings};
use crate::task::{
    ERROR_ATTRIBUTE, Mapper, ServerMigrationTask, TaskContext, TaskExecution, TaskName,
    TaskParameters, TaskResult, TaskStatus,
};
use anyhow::{Result, anyhow};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Attribute of a failed composite listing its failed direct subtasks
pub const FAILED_SUBTASKS_ATTRIBUTE: &str = "failed-subtasks";

/// One subtask slot of a composite: produces zero or more tasks per run
pub trait SubtaskFactory<P>: Send + Sync {
    fn subtasks(&self, params: &P) -> Result<Vec<Arc<dyn ServerMigrationTask>>>;

    fn validate(&self) -> Result<(), BuildError> {
        Ok(())
    }
}

struct FixedTask(Arc<dyn ServerMigrationTask>);

impl<P> SubtaskFactory<P> for FixedTask {
    fn subtasks(&self, _params: &P) -> Result<Vec<Arc<dyn ServerMigrationTask>>> {
        Ok(vec![Arc::clone(&self.0)])
    }
}

struct SameParameters<B>(B);

impl<P, B> SubtaskFactory<P> for SameParameters<B>
where
    P: TaskParameters,
    B: TaskBuilder<P>,
{
    fn subtasks(&self, params: &P) -> Result<Vec<Arc<dyn ServerMigrationTask>>> {
        Ok(vec![self.0.build_task(params.clone())?])
    }

    fn validate(&self) -> Result<(), BuildError> {
        self.0.validate()
    }
}

struct Mapped<P, Q, M, B> {
    mapper: M,
    builder: B,
    _marker: PhantomData<fn(&P) -> Q>,
}

impl<P, Q, M, B> SubtaskFactory<P> for Mapped<P, Q, M, B>
where
    P: TaskParameters,
    Q: TaskParameters,
    M: Mapper<P, Q>,
    B: TaskBuilder<Q>,
{
    fn subtasks(&self, params: &P) -> Result<Vec<Arc<dyn ServerMigrationTask>>> {
        let mapped = self.mapper.map(params)?;
        debug!("Parameter mapping produced {} subtasks", mapped.len());
        mapped
            .into_iter()
            .map(|child| self.builder.build_task(child).map_err(Into::into))
            .collect()
    }

    fn validate(&self) -> Result<(), BuildError> {
        self.builder.validate()
    }
}

/// Stands in for a subtask slot whose tasks could not be produced
struct SlotFailure {
    name: TaskName,
    error: String,
}

impl ServerMigrationTask for SlotFailure {
    fn name(&self) -> &TaskName {
        &self.name
    }

    fn run(&self, _context: &mut TaskContext) -> Result<TaskResult> {
        Err(anyhow!("{}", self.error))
    }
}

/// Builder for tasks aggregated from an ordered list of subtask slots
pub struct CompositeTaskBuilder<P> {
    settings: TaskSettings<P>,
    subtasks: Vec<Arc<dyn SubtaskFactory<P>>>,
}

impl<P> Clone for CompositeTaskBuilder<P> {
    fn clone(&self) -> Self {
        Self {
            settings: self.settings.clone(),
            subtasks: self.subtasks.clone(),
        }
    }
}

impl<P: TaskParameters> Default for CompositeTaskBuilder<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: TaskParameters> CommonTaskBuilder<P> for CompositeTaskBuilder<P> {
    fn settings_mut(&mut self) -> &mut TaskSettings<P> {
        &mut self.settings
    }
}

impl<P: TaskParameters> CompositeTaskBuilder<P> {
    pub fn new() -> Self {
        Self {
            settings: TaskSettings::default(),
            subtasks: Vec::new(),
        }
    }

    /// Builder with a fixed name
    pub fn named(name: impl Into<TaskName>) -> Self {
        Self::new().name(name)
    }

    /// Subtask built from the same parameters as this composite
    pub fn subtask(self, builder: impl TaskBuilder<P> + 'static) -> Self {
        self.subtasks_from(SameParameters(builder))
    }

    /// Subtask built once per parameter object produced by `mapper`
    pub fn subtask_mapped<Q: TaskParameters>(
        self,
        mapper: impl Mapper<P, Q> + 'static,
        builder: impl TaskBuilder<Q> + 'static,
    ) -> Self {
        self.subtasks_from(Mapped {
            mapper,
            builder,
            _marker: PhantomData,
        })
    }

    /// Already built task, run as is under every build of this composite
    pub fn subtask_task(self, task: Arc<dyn ServerMigrationTask>) -> Self {
        self.subtasks_from(FixedTask(task))
    }

    pub fn subtasks_from(mut self, factory: impl SubtaskFactory<P> + 'static) -> Self {
        self.subtasks.push(Arc::new(factory));
        self
    }

    /// Number of registered subtask slots
    pub fn subtask_count(&self) -> usize {
        self.subtasks.len()
    }

    /// Check the name and every subtask slot, recursively
    pub fn validate(&self) -> Result<(), BuildError> {
        if !self.settings.has_name() {
            return Err(BuildError::MissingName);
        }
        for (index, factory) in self.subtasks.iter().enumerate() {
            factory.validate().map_err(|source| BuildError::InSubtask {
                parent: self.settings.label().to_string(),
                index,
                source: Box::new(source),
            })?;
        }
        Ok(())
    }

    pub fn build(&self, params: P) -> Result<CompositeTask<P>, BuildError> {
        self.validate()?;
        let name = self.settings.resolve_name(&params)?;
        Ok(CompositeTask {
            name,
            params,
            settings: self.settings.clone(),
            subtasks: self.subtasks.clone(),
        })
    }
}

impl<P: TaskParameters> TaskBuilder<P> for CompositeTaskBuilder<P> {
    fn build_task(&self, params: P) -> Result<Arc<dyn ServerMigrationTask>, BuildError> {
        Ok(Arc::new(self.build(params)?))
    }

    fn validate(&self) -> Result<(), BuildError> {
        CompositeTaskBuilder::validate(self)
    }
}

/// Task whose result is aggregated from its subtasks
pub struct CompositeTask<P> {
    name: TaskName,
    params: P,
    settings: TaskSettings<P>,
    subtasks: Vec<Arc<dyn SubtaskFactory<P>>>,
}

impl<P: TaskParameters> CompositeTask<P> {
    pub fn params(&self) -> &P {
        &self.params
    }

    fn run_subtasks(&self, params: &P, name: &TaskName, context: &mut TaskContext) {
        for (index, factory) in self.subtasks.iter().enumerate() {
            match factory.subtasks(params) {
                Ok(tasks) => {
                    for task in tasks {
                        context.execute(task.as_ref());
                    }
                }
                Err(error) => {
                    let failure = SlotFailure {
                        name: TaskName::builder(format!("{}.subtasks", name.name()))
                            .attribute("slot", index.to_string())
                            .build(),
                        error: format!("{:#}", error),
                    };
                    context.execute(&failure);
                }
            }
        }
    }
}

impl<P: TaskParameters> ServerMigrationTask for CompositeTask<P> {
    fn name(&self) -> &TaskName {
        &self.name
    }

    fn run(&self, context: &mut TaskContext) -> Result<TaskResult> {
        self.settings
            .run_with_hooks(
                &self.params,
                &self.name,
                context,
                |params, name, context| {
                    self.run_subtasks(params, name, context);
                    Ok(TaskResult::skipped())
                },
                // after hooks may record subtasks of their own
                |context, _| aggregate(context.subtasks()),
            )
    }
}

/// Status of a composite from its direct subtasks: none executed is SKIPPED,
/// any FAIL is FAIL, otherwise any SUCCESS is SUCCESS, otherwise SKIPPED.
pub fn aggregate_status(subtasks: &[TaskExecution]) -> TaskStatus {
    if subtasks.iter().any(|s| s.result.is_fail()) {
        TaskStatus::Fail
    } else if subtasks.iter().any(|s| s.result.is_success()) {
        TaskStatus::Success
    } else {
        TaskStatus::Skipped
    }
}

/// Composite result; a failure names the failed subtasks and carries the
/// error of the first one.
pub fn aggregate(subtasks: &[TaskExecution]) -> TaskResult {
    let status = aggregate_status(subtasks);
    if status != TaskStatus::Fail {
        return TaskResult::builder().status(status);
    }

    let failed: Vec<&TaskExecution> = subtasks.iter().filter(|s| s.result.is_fail()).collect();
    let names = failed
        .iter()
        .map(|s| s.name.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let error = failed
        .first()
        .map(|first| match first.result.error() {
            Some(error) => format!("{}: {}", first.name, error),
            None => format!("{} failed", first.name),
        })
        .unwrap_or_default();

    TaskResult::builder()
        .attribute(FAILED_SUBTASKS_ATTRIBUTE, names)
        .attribute(ERROR_ATTRIBUTE, error)
        .fail()
}
