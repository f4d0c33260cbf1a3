use crate::task::builder::{BuildError, CommonTaskBuilder, TaskBuilder, TaskSettings};
use crate::task::{Runnable, ServerMigrationTask, TaskContext, TaskName, TaskParameters, TaskResult};
use anyhow::Result;
use std::sync::Arc;

type RunnableFactory<P> = Arc<dyn Fn(&P) -> Arc<dyn Runnable<P>> + Send + Sync>;

enum RunnableSource<P> {
    Fixed(Arc<dyn Runnable<P>>),
    FromParameters(RunnableFactory<P>),
}

impl<P> Clone for RunnableSource<P> {
    fn clone(&self) -> Self {
        match self {
            RunnableSource::Fixed(runnable) => RunnableSource::Fixed(Arc::clone(runnable)),
            RunnableSource::FromParameters(factory) => {
                RunnableSource::FromParameters(Arc::clone(factory))
            }
        }
    }
}

/// Builder for tasks without substructure
pub struct LeafTaskBuilder<P> {
    settings: TaskSettings<P>,
    runnable: Option<RunnableSource<P>>,
}

impl<P> Clone for LeafTaskBuilder<P> {
    fn clone(&self) -> Self {
        Self {
            settings: self.settings.clone(),
            runnable: self.runnable.clone(),
        }
    }
}

impl<P: TaskParameters> Default for LeafTaskBuilder<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: TaskParameters> CommonTaskBuilder<P> for LeafTaskBuilder<P> {
    fn settings_mut(&mut self) -> &mut TaskSettings<P> {
        &mut self.settings
    }
}

impl<P: TaskParameters> LeafTaskBuilder<P> {
    pub fn new() -> Self {
        Self {
            settings: TaskSettings::default(),
            runnable: None,
        }
    }

    /// Builder with a fixed name
    pub fn named(name: impl Into<TaskName>) -> Self {
        Self::new().name(name)
    }

    /// Fixed runnable closure; replaces any earlier runnable
    pub fn run<F>(self, run: F) -> Self
    where
        F: Fn(&P, &TaskName, &mut TaskContext) -> Result<TaskResult> + Send + Sync + 'static,
    {
        self.runnable(run)
    }

    /// Fixed runnable; replaces any earlier runnable
    pub fn runnable(mut self, runnable: impl Runnable<P> + 'static) -> Self {
        self.runnable = Some(RunnableSource::Fixed(Arc::new(runnable)));
        self
    }

    /// Runnable chosen per parameter object at build time; replaces any earlier runnable
    pub fn run_with<F>(mut self, factory: F) -> Self
    where
        F: Fn(&P) -> Arc<dyn Runnable<P>> + Send + Sync + 'static,
    {
        self.runnable = Some(RunnableSource::FromParameters(Arc::new(factory)));
        self
    }

    pub fn validate(&self) -> Result<(), BuildError> {
        if !self.settings.has_name() {
            return Err(BuildError::MissingName);
        }
        if self.runnable.is_none() {
            return Err(BuildError::MissingRunnable(self.settings.label().to_string()));
        }
        Ok(())
    }

    pub fn build(&self, params: P) -> Result<LeafTask<P>, BuildError> {
        self.validate()?;
        let name = self.settings.resolve_name(&params)?;
        let runnable = match &self.runnable {
            Some(RunnableSource::Fixed(runnable)) => Arc::clone(runnable),
            Some(RunnableSource::FromParameters(factory)) => factory(&params),
            None => return Err(BuildError::MissingRunnable(name.to_string())),
        };
        Ok(LeafTask {
            name,
            params,
            settings: self.settings.clone(),
            runnable,
        })
    }
}

impl<P: TaskParameters> TaskBuilder<P> for LeafTaskBuilder<P> {
    fn build_task(&self, params: P) -> Result<Arc<dyn ServerMigrationTask>, BuildError> {
        Ok(Arc::new(self.build(params)?))
    }

    fn validate(&self) -> Result<(), BuildError> {
        LeafTaskBuilder::validate(self)
    }
}

/// Task whose result comes directly from its runnable
pub struct LeafTask<P> {
    name: TaskName,
    params: P,
    settings: TaskSettings<P>,
    runnable: Arc<dyn Runnable<P>>,
}

impl<P: TaskParameters> LeafTask<P> {
    pub fn params(&self) -> &P {
        &self.params
    }
}

impl<P: TaskParameters> ServerMigrationTask for LeafTask<P> {
    fn name(&self) -> &TaskName {
        &self.name
    }

    fn run(&self, context: &mut TaskContext) -> Result<TaskResult> {
        self.settings
            .run_with_hooks(
                &self.params,
                &self.name,
                context,
                |params, name, context| self.runnable.run(params, name, context),
                |_, result| result,
            )
    }
}
