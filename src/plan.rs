//! Declarative migration plans.
//!
//! A plan is a TOML document describing a tree of steps. Steps with
//! `operations` become leaf tasks that execute management operations; steps
//! with nested `tasks` become composites. A step with `for_each` is fanned
//! out once per matching resource of the server configuration. Inside
//! another `for_each`, only resources below the enclosing resource match.
//!
//! ```toml
//! name = "server-migration"
//!
//! [[resources]]
//! address = "/extension=org.legacy"
//!
//! [[tasks]]
//! name = "remove-extensions"
//! for_each = { type = "extension" }
//! confirm = "Remove legacy extensions?"
//!
//! [[tasks.operations]]
//! operation = "remove"
//! address = "{resource}"
//! ```
//!
//! Operation addresses and string parameters substitute `${property}` from
//! the migration environment, and `{resource}` / `{resource.name}` from the
//! resource a fanned-out step runs for.

use crate::management::{ManagementModel, ManagementOperationError, Operation, ResourceAddress};
use crate::resource::{
    HasServerConfiguration, ManageableConfiguration, ManageableResource, ResourceSelector,
};
use crate::task::{
    BuildError, CommonTaskBuilder, CompositeTaskBuilder, LeafTaskBuilder, TaskContext, TaskName,
    TaskResult, default_task_skip_property, skip_if_any_property_set, skip_unless_confirmed,
};
use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};

/// Attribute of a plan step result counting the operations it executed
pub const OPERATIONS_ATTRIBUTE: &str = "operations";

static PROPERTY_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z0-9_.\-]+)\}").expect("property placeholder pattern is valid")
});

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("Failed to read plan {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse plan: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Plan step at {0} has no name")]
    MissingName(String),

    #[error("Plan step '{0}' has both operations and nested tasks")]
    ConflictingStep(String),

    #[error("Plan step '{step}' has an invalid address: {source}")]
    InvalidAddress {
        step: String,
        #[source]
        source: ManagementOperationError,
    },

    #[error("Plan step '{step}' uses {{resource}} outside a for_each step")]
    ResourceOutOfScope { step: String },

    #[error(transparent)]
    Build(#[from] BuildError),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationPlan {
    pub name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Resources seeding the in-memory management model
    #[serde(default)]
    pub resources: Vec<ResourceSeed>,
    #[serde(default)]
    pub tasks: Vec<PlanStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSeed {
    pub address: ResourceAddress,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanStep {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub operations: Vec<OperationTemplate>,
    #[serde(default)]
    pub tasks: Vec<PlanStep>,
    pub for_each: Option<ResourceFilter>,
    /// Boolean properties, any of which skips the step when true
    #[serde(default)]
    pub skip_properties: Vec<String>,
    /// Question asked in interactive runs; declining skips the step
    pub confirm: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFilter {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: Option<String>,
}

impl ResourceFilter {
    pub fn selector(&self) -> ResourceSelector {
        match &self.name {
            Some(name) => ResourceSelector::named(&self.resource_type, name),
            None => ResourceSelector::all(&self.resource_type),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationTemplate {
    pub operation: String,
    pub address: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// Parameters every compiled plan task runs with
#[derive(Clone)]
pub struct PlanParameters {
    pub configuration: Arc<dyn ManageableConfiguration>,
    pub resource: Option<ManageableResource>,
}

impl PlanParameters {
    pub fn new(configuration: Arc<dyn ManageableConfiguration>) -> Self {
        Self {
            configuration,
            resource: None,
        }
    }

    pub fn resource(&self) -> Option<&ManageableResource> {
        self.resource.as_ref()
    }

    fn for_resource(&self, resource: ManageableResource) -> Self {
        Self {
            configuration: Arc::clone(&self.configuration),
            resource: Some(resource),
        }
    }
}

impl fmt::Debug for PlanParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanParameters")
            .field("resource", &self.resource.as_ref().map(|r| &r.address))
            .finish_non_exhaustive()
    }
}

impl HasServerConfiguration for PlanParameters {
    fn server_configuration(&self) -> &Arc<dyn ManageableConfiguration> {
        &self.configuration
    }
}

impl MigrationPlan {
    pub fn from_toml_str(content: &str) -> Result<Self, PlanError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, PlanError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| PlanError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// In-memory management model holding the plan's seed resources
    pub fn model(&self) -> ManagementModel {
        self.resources
            .iter()
            .fold(ManagementModel::new(), |model, seed| {
                model.with_resource(seed.address.clone(), seed.attributes.clone())
            })
    }

    /// Root task builder; fails on any wiring mistake before a task runs
    pub fn compile(&self) -> Result<CompositeTaskBuilder<PlanParameters>, PlanError> {
        if self.name.trim().is_empty() {
            return Err(PlanError::MissingName("plan root".to_string()));
        }
        let mut root = CompositeTaskBuilder::named(task_name(&self.name, &self.attributes))
            .skip_policy(default_task_skip_property());
        for (index, step) in self.tasks.iter().enumerate() {
            root = add_step(root, step, &format!("{}[{}]", self.name, index), false)?;
        }
        root.validate()?;
        info!(
            "Compiled plan {} with {} top-level steps",
            self.name,
            root.subtask_count()
        );
        Ok(root)
    }

    /// Number of steps, nested ones included
    pub fn step_count(&self) -> usize {
        fn count(steps: &[PlanStep]) -> usize {
            steps.iter().map(|step| 1 + count(&step.tasks)).sum()
        }
        count(&self.tasks)
    }
}

fn task_name(name: &str, attributes: &BTreeMap<String, String>) -> TaskName {
    attributes
        .iter()
        .fold(TaskName::builder(name), |builder, (key, value)| {
            builder.attribute(key.clone(), value.clone())
        })
        .build()
}

/// Adds `step` as the next subtask slot of `parent`
fn add_step(
    parent: CompositeTaskBuilder<PlanParameters>,
    step: &PlanStep,
    location: &str,
    in_resource_scope: bool,
) -> Result<CompositeTaskBuilder<PlanParameters>, PlanError> {
    if step.name.trim().is_empty() {
        return Err(PlanError::MissingName(location.to_string()));
    }
    let in_resource_scope = in_resource_scope || step.for_each.is_some();

    let Some(filter) = &step.for_each else {
        let name = task_name(&step.name, &step.attributes);
        return Ok(if step.operations.is_empty() {
            parent.subtask(composite_step(step, location, in_resource_scope)?.name(name))
        } else {
            parent.subtask(leaf_step(step, in_resource_scope)?.name(name))
        });
    };

    let selector = filter.selector();
    let mapper = move |params: &PlanParameters| -> Result<Vec<PlanParameters>> {
        let configuration = params.configuration.as_ref();
        let selected = match params.resource() {
            Some(enclosing) => selector.select_within(configuration, &enclosing.address)?,
            None => selector.select(configuration)?,
        };
        Ok(selected
            .into_iter()
            .map(|resource| params.for_resource(resource))
            .collect())
    };
    let base = task_name(&step.name, &step.attributes);
    let naming = move |params: &PlanParameters| match params.resource() {
        Some(resource) => base.with_attribute("resource", resource.name.clone()),
        None => base.clone(),
    };

    Ok(if step.operations.is_empty() {
        parent.subtask_mapped(
            mapper,
            composite_step(step, location, in_resource_scope)?.name_with(naming),
        )
    } else {
        parent.subtask_mapped(mapper, leaf_step(step, in_resource_scope)?.name_with(naming))
    })
}

fn step_policies<B>(builder: B, step: &PlanStep) -> B
where
    B: CommonTaskBuilder<PlanParameters>,
{
    let mut builder = builder.skip_policy(default_task_skip_property());
    if !step.skip_properties.is_empty() {
        builder = builder.skip_policy(skip_if_any_property_set(step.skip_properties.clone()));
    }
    if let Some(question) = &step.confirm {
        builder = builder.skip_policy(skip_unless_confirmed(question.clone()));
    }
    builder
}

fn composite_step(
    step: &PlanStep,
    location: &str,
    in_resource_scope: bool,
) -> Result<CompositeTaskBuilder<PlanParameters>, PlanError> {
    let mut builder = step_policies(CompositeTaskBuilder::new(), step);
    for (index, child) in step.tasks.iter().enumerate() {
        let child_location = format!("{}/{}[{}]", location, step.name, index);
        builder = add_step(builder, child, &child_location, in_resource_scope)?;
    }
    Ok(builder)
}

fn leaf_step(
    step: &PlanStep,
    in_resource_scope: bool,
) -> Result<LeafTaskBuilder<PlanParameters>, PlanError> {
    if !step.tasks.is_empty() {
        return Err(PlanError::ConflictingStep(step.name.clone()));
    }
    for template in &step.operations {
        template.check(&step.name, in_resource_scope)?;
    }

    let templates = step.operations.clone();
    let run = move |params: &PlanParameters,
                    name: &TaskName,
                    context: &mut TaskContext|
          -> Result<TaskResult> {
        for template in &templates {
            let operation = template.render(params, context)?;
            debug!("{} executing {} on {}", name, operation.name, operation.address);
            params
                .configuration
                .client()
                .execute(&operation)
                .with_context(|| format!("{} on {}", operation.name, operation.address))?;
        }
        Ok(TaskResult::builder()
            .attribute(OPERATIONS_ATTRIBUTE, templates.len().to_string())
            .success())
    };
    Ok(step_policies(LeafTaskBuilder::new(), step).run(run))
}

impl OperationTemplate {
    fn uses_resource(&self) -> bool {
        self.address.contains("{resource")
            || self
                .parameters
                .values()
                .any(|value| value.as_str().is_some_and(|s| s.contains("{resource")))
    }

    /// Compile-time checks: literal addresses must parse and resource
    /// placeholders need an enclosing `for_each`.
    fn check(&self, step: &str, in_resource_scope: bool) -> Result<(), PlanError> {
        if self.uses_resource() && !in_resource_scope {
            return Err(PlanError::ResourceOutOfScope {
                step: step.to_string(),
            });
        }
        if !self.address.contains('{') {
            self.address
                .parse::<ResourceAddress>()
                .map_err(|source| PlanError::InvalidAddress {
                    step: step.to_string(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Concrete operation for one run of a step
    pub fn render(&self, params: &PlanParameters, context: &TaskContext) -> Result<Operation> {
        let address = substitute(&self.address, params, context)?;
        let mut operation = Operation::new(
            self.operation.clone(),
            address
                .parse::<ResourceAddress>()
                .with_context(|| format!("invalid address '{}'", address))?,
        );
        for (key, value) in &self.parameters {
            let value = match value {
                Value::String(raw) => Value::String(substitute(raw, params, context)?),
                other => other.clone(),
            };
            operation = operation.with_parameter(key.clone(), value);
        }
        Ok(operation)
    }
}

/// Replaces `${property}` with environment values and `{resource}` /
/// `{resource.name}` with the address and name of the current resource
pub fn substitute(raw: &str, params: &PlanParameters, context: &TaskContext) -> Result<String> {
    let mut rendered = String::with_capacity(raw.len());
    let mut last = 0;
    for captures in PROPERTY_PLACEHOLDER.captures_iter(raw) {
        let (Some(whole), Some(property)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        rendered.push_str(&raw[last..whole.start()]);
        rendered.push_str(
            &context
                .environment()
                .require_property_as_string(property.as_str())?,
        );
        last = whole.end();
    }
    rendered.push_str(&raw[last..]);

    if !rendered.contains("{resource") {
        return Ok(rendered);
    }
    let resource = params
        .resource()
        .ok_or_else(|| anyhow!("'{}' refers to a resource but none is selected", raw))?;
    Ok(rendered
        .replace("{resource.name}", &resource.name)
        .replace("{resource}", &resource.address.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::MigrationEnvironment;
    use crate::task::{MigrationServices, execute_root};

    const PLAN: &str = r#"
name = "server-migration"

[[resources]]
address = "/extension=org.legacy"

[[resources]]
address = "/extension=org.other"

[[resources]]
address = "/subsystem=logging"
attributes = { level = "DEBUG" }

[[tasks]]
name = "remove-extensions"
for_each = { type = "extension" }

[[tasks.operations]]
operation = "remove"
address = "{resource}"

[[tasks]]
name = "subsystems"

[[tasks.tasks]]
name = "update-logging"
attributes = { subsystem = "logging" }

[[tasks.tasks.operations]]
operation = "write-attribute"
address = "/subsystem=logging"
parameters = { name = "level", value = "${logging.level}" }
"#;

    fn run(plan: &MigrationPlan, env: MigrationEnvironment) -> (crate::task::TaskExecution, Arc<ManagementModel>) {
        let model = Arc::new(plan.model());
        let root = plan
            .compile()
            .unwrap()
            .build(PlanParameters::new(model.clone()))
            .unwrap();
        let services = Arc::new(MigrationServices::new(env));
        (execute_root(services, &root), model)
    }

    #[test]
    fn parses_nested_steps() {
        let plan = MigrationPlan::from_toml_str(PLAN).unwrap();
        assert_eq!(plan.resources.len(), 3);
        assert_eq!(plan.step_count(), 3);
        assert_eq!(
            plan.tasks[0].for_each,
            Some(ResourceFilter {
                resource_type: "extension".to_string(),
                name: None
            })
        );
    }

    #[test]
    fn runs_fanned_out_and_nested_steps() {
        let plan = MigrationPlan::from_toml_str(PLAN).unwrap();
        let env = MigrationEnvironment::default().with_property("logging.level", "INFO");
        let (execution, model) = run(&plan, env);

        assert!(execution.result.is_success(), "{:?}", execution.result);
        let removals = execution.subtask_named("remove-extensions");
        assert!(removals.is_some());
        let names: Vec<String> = execution
            .subtasks
            .iter()
            .map(|s| s.name.to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "remove-extensions resource=org.legacy",
                "remove-extensions resource=org.other",
                "subsystems",
            ]
        );

        let logging = ResourceAddress::root().append("subsystem", "logging");
        assert_eq!(model.attributes(&logging).unwrap()["level"], "INFO");
        assert!(!model.contains(&ResourceAddress::root().append("extension", "org.legacy")));
    }

    #[test]
    fn nested_fan_out_selects_below_the_enclosing_resource() {
        let plan = MigrationPlan::from_toml_str(
            r#"
name = "handlers"

[[resources]]
address = "/subsystem=logging"

[[resources]]
address = "/subsystem=logging/handler=console"

[[resources]]
address = "/subsystem=mail"

[[resources]]
address = "/subsystem=mail/handler=smtp"

[[tasks]]
name = "per-subsystem"
for_each = { type = "subsystem" }

[[tasks.tasks]]
name = "per-handler"
for_each = { type = "handler" }

[[tasks.tasks.operations]]
operation = "write-attribute"
address = "{resource}"
parameters = { name = "enabled", value = "false" }
"#,
        )
        .unwrap();
        let (execution, model) = run(&plan, MigrationEnvironment::default());

        assert!(execution.result.is_success(), "{:?}", execution.result);
        let children: Vec<(String, Vec<String>)> = execution
            .subtasks
            .iter()
            .map(|s| {
                let handlers = s.subtasks.iter().map(|h| h.name.to_string()).collect();
                (s.name.to_string(), handlers)
            })
            .collect();
        assert_eq!(
            children,
            vec![
                (
                    "per-subsystem resource=logging".to_string(),
                    vec!["per-handler resource=console".to_string()]
                ),
                (
                    "per-subsystem resource=mail".to_string(),
                    vec!["per-handler resource=smtp".to_string()]
                ),
            ]
        );
        assert_eq!(model.executed().len(), 2);
    }

    #[test]
    fn missing_property_fails_the_step() {
        let plan = MigrationPlan::from_toml_str(PLAN).unwrap();
        let (execution, _) = run(&plan, MigrationEnvironment::default());

        assert!(execution.result.is_fail());
        let update = &execution.subtask_named("subsystems").unwrap().subtasks[0];
        assert!(update.result.is_fail());
        assert!(update.result.error().unwrap().contains("logging.level"));
    }

    #[test]
    fn skip_property_applies_to_every_step() {
        let plan = MigrationPlan::from_toml_str(PLAN).unwrap();
        let env = MigrationEnvironment::default()
            .with_property("subsystems.skip", "true")
            .with_property("remove-extensions.skip", "true");
        let (execution, model) = run(&plan, env);

        assert!(execution.result.is_skipped());
        assert!(model.executed().is_empty());
    }

    #[test]
    fn compile_rejects_bad_steps() {
        let unnamed = MigrationPlan::from_toml_str(
            "name = \"p\"\n[[tasks]]\n[[tasks.operations]]\noperation = \"add\"\naddress = \"/a=b\"\n",
        )
        .unwrap();
        assert!(matches!(unnamed.compile(), Err(PlanError::MissingName(_))));

        let out_of_scope = MigrationPlan::from_toml_str(
            "name = \"p\"\n[[tasks]]\nname = \"t\"\n[[tasks.operations]]\noperation = \"remove\"\naddress = \"{resource}\"\n",
        )
        .unwrap();
        assert!(matches!(
            out_of_scope.compile(),
            Err(PlanError::ResourceOutOfScope { .. })
        ));

        let bad_address = MigrationPlan::from_toml_str(
            "name = \"p\"\n[[tasks]]\nname = \"t\"\n[[tasks.operations]]\noperation = \"add\"\naddress = \"/broken\"\n",
        )
        .unwrap();
        assert!(matches!(
            bad_address.compile(),
            Err(PlanError::InvalidAddress { .. })
        ));

        assert!(matches!(
            MigrationPlan::from_toml_str("name = 3"),
            Err(PlanError::Parse(_))
        ));
    }

    #[test]
    fn conflicting_step_is_rejected() {
        let mut plan = MigrationPlan {
            name: "p".to_string(),
            ..Default::default()
        };
        plan.tasks.push(PlanStep {
            name: "both".to_string(),
            operations: vec![OperationTemplate {
                operation: "add".to_string(),
                address: "/a=b".to_string(),
                parameters: Map::new(),
            }],
            tasks: vec![PlanStep {
                name: "child".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        });
        assert!(matches!(plan.compile(), Err(PlanError::ConflictingStep(_))));
    }
}
