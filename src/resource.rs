//! Manageable resources and the selectors that fan subtasks out over them.

use crate::management::{ManagementClient, ResourceAddress};
use crate::task::{Mapper, TaskName, TaskParameters};
use anyhow::Result;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// One addressable resource of a server configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManageableResource {
    pub resource_type: String,
    pub name: String,
    pub address: ResourceAddress,
    pub attributes: Map<String, Value>,
}

/// A server configuration whose resources can be queried and managed
pub trait ManageableConfiguration: Send + Sync {
    /// All resources of `resource_type`, in a stable order
    fn resources(&self, resource_type: &str) -> Result<Vec<ManageableResource>>;

    fn client(&self) -> &dyn ManagementClient;
}

/// Parameters that carry the server configuration being migrated
pub trait HasServerConfiguration {
    fn server_configuration(&self) -> &Arc<dyn ManageableConfiguration>;
}

/// Parameters that carry one selected resource
pub trait HasResource {
    fn resource(&self) -> &ManageableResource;
}

/// Root parameters of a server migration
#[derive(Clone)]
pub struct ServerParameters {
    pub server_name: String,
    pub configuration: Arc<dyn ManageableConfiguration>,
}

impl ServerParameters {
    pub fn new(server_name: impl Into<String>, configuration: Arc<dyn ManageableConfiguration>) -> Self {
        Self {
            server_name: server_name.into(),
            configuration,
        }
    }
}

impl fmt::Debug for ServerParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerParameters")
            .field("server_name", &self.server_name)
            .finish_non_exhaustive()
    }
}

impl HasServerConfiguration for ServerParameters {
    fn server_configuration(&self) -> &Arc<dyn ManageableConfiguration> {
        &self.configuration
    }
}

/// A selected resource paired with the parameters it was selected from
#[derive(Clone)]
pub struct ResourceParameters<S> {
    pub source: S,
    pub resource: ManageableResource,
}

impl<S: HasServerConfiguration> HasServerConfiguration for ResourceParameters<S> {
    fn server_configuration(&self) -> &Arc<dyn ManageableConfiguration> {
        self.source.server_configuration()
    }
}

impl<S> HasResource for ResourceParameters<S> {
    fn resource(&self) -> &ManageableResource {
        &self.resource
    }
}

/// Selects resources of one type, optionally restricted to some names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSelector {
    resource_type: String,
    names: Option<BTreeSet<String>>,
}

impl ResourceSelector {
    /// Every resource of `resource_type`
    pub fn all(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            names: None,
        }
    }

    /// The single named resource of `resource_type`, if present
    pub fn named(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self::names(resource_type, [name.into()])
    }

    pub fn names<I, S>(resource_type: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            resource_type: resource_type.into(),
            names: Some(names.into_iter().map(Into::into).collect()),
        }
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Matching resources; no match is an empty selection
    pub fn select(&self, configuration: &dyn ManageableConfiguration) -> Result<Vec<ManageableResource>> {
        let selected: Vec<_> = configuration
            .resources(&self.resource_type)?
            .into_iter()
            .filter(|resource| match &self.names {
                Some(names) => names.contains(&resource.name),
                None => true,
            })
            .collect();
        debug!(
            "Selected {} resources of type {}",
            selected.len(),
            self.resource_type
        );
        Ok(selected)
    }

    /// Matching resources strictly below `scope`
    pub fn select_within(
        &self,
        configuration: &dyn ManageableConfiguration,
        scope: &ResourceAddress,
    ) -> Result<Vec<ManageableResource>> {
        Ok(self
            .select(configuration)?
            .into_iter()
            .filter(|resource| resource.address.is_descendant_of(scope))
            .collect())
    }

    /// Fan-out mapper pairing each selected resource with the parent parameters
    pub fn mapper<P>(self) -> impl Mapper<P, ResourceParameters<P>>
    where
        P: HasServerConfiguration + TaskParameters,
    {
        move |params: &P| -> Result<Vec<ResourceParameters<P>>> {
            Ok(self
                .select(params.server_configuration().as_ref())?
                .into_iter()
                .map(|resource| ResourceParameters {
                    source: params.clone(),
                    resource,
                })
                .collect())
        }
    }
}

/// Name resolver for per-resource tasks: `<name> resource=<resource name>`
pub fn resource_task_name<Q>(name: &str) -> impl Fn(&Q) -> TaskName + Send + Sync + 'static + use<Q>
where
    Q: HasResource + 'static,
{
    let name = name.to_string();
    move |params: &Q| {
        TaskName::builder(name.clone())
            .attribute("resource", params.resource().name.clone())
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::management::ManagementModel;

    fn configuration() -> Arc<dyn ManageableConfiguration> {
        let model = ["logging", "mail", "ee"]
            .iter()
            .fold(ManagementModel::new(), |model, name| {
                model.with_resource(ResourceAddress::root().append("subsystem", *name), Map::new())
            })
            .with_resource(ResourceAddress::root().append("extension", "org.legacy"), Map::new());
        Arc::new(model)
    }

    #[test]
    fn selects_by_type_and_name() {
        let config = configuration();

        let all = ResourceSelector::all("subsystem").select(config.as_ref()).unwrap();
        let names: Vec<_> = all.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["ee", "logging", "mail"]);

        let one = ResourceSelector::named("subsystem", "mail")
            .select(config.as_ref())
            .unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].address.to_string(), "/subsystem=mail");

        assert!(ResourceSelector::named("subsystem", "jgroups")
            .select(config.as_ref())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn mapper_pairs_resources_with_source() {
        let params = ServerParameters::new("standalone", configuration());
        let mapper = ResourceSelector::all("subsystem").mapper::<ServerParameters>();

        let mapped = mapper.map(&params).unwrap();
        assert_eq!(mapped.len(), 3);
        assert!(mapped.iter().all(|p| p.source.server_name == "standalone"));

        let naming = resource_task_name::<ResourceParameters<ServerParameters>>("subsystem.update");
        assert_eq!(naming(&mapped[1]).to_string(), "subsystem.update resource=logging");
    }
}
