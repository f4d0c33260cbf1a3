//! Management operations and an in-memory management model.
//!
//! Tasks only need [`ManagementClient::execute`]; the engine itself never
//! looks at operation payloads. [`ManagementModel`] keeps a resource tree in
//! memory and serves plans, dry runs and tests.

use crate::resource::{ManageableConfiguration, ManageableResource};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManagementOperationError {
    #[error("Operation '{operation}' on {address} failed: {message}")]
    Failed {
        operation: String,
        address: ResourceAddress,
        message: String,
    },

    #[error("Resource {0} not found")]
    NotFound(ResourceAddress),

    #[error("Resource {0} already exists")]
    Duplicate(ResourceAddress),

    #[error("Unsupported operation '{0}'")]
    Unsupported(String),

    #[error("Invalid resource address '{0}'")]
    InvalidAddress(String),
}

/// Path of a resource in the management model, e.g. `/subsystem=logging/handler=console`
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceAddress {
    segments: Vec<(String, String)>,
}

impl ResourceAddress {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Child address
    pub fn append(&self, resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push((resource_type.into(), name.into()));
        Self { segments }
    }

    pub fn segments(&self) -> &[(String, String)] {
        &self.segments
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Type and name of the last segment
    pub fn last(&self) -> Option<(&str, &str)> {
        self.segments
            .last()
            .map(|(t, n)| (t.as_str(), n.as_str()))
    }

    /// Strictly below `ancestor`; every address is below the root
    pub fn is_descendant_of(&self, ancestor: &ResourceAddress) -> bool {
        self.segments.len() > ancestor.segments.len()
            && self.segments.starts_with(&ancestor.segments)
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for (resource_type, name) in &self.segments {
            write!(f, "/{}={}", resource_type, name)?;
        }
        Ok(())
    }
}

impl FromStr for ResourceAddress {
    type Err = ManagementOperationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "/" {
            return Ok(Self::root());
        }
        let mut segments = Vec::new();
        for segment in trimmed.trim_start_matches('/').split('/') {
            match segment.split_once('=') {
                Some((t, n)) if !t.is_empty() && !n.is_empty() => {
                    segments.push((t.to_string(), n.to_string()))
                }
                _ => return Err(ManagementOperationError::InvalidAddress(raw.to_string())),
            }
        }
        Ok(Self { segments })
    }
}

impl Serialize for ResourceAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResourceAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A management operation against one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    pub address: ResourceAddress,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl Operation {
    pub fn new(name: impl Into<String>, address: ResourceAddress) -> Self {
        Self {
            name: name.into(),
            address,
            parameters: Map::new(),
        }
    }

    pub fn add(address: ResourceAddress) -> Self {
        Self::new(operations::ADD, address)
    }

    pub fn remove(address: ResourceAddress) -> Self {
        Self::new(operations::REMOVE, address)
    }

    pub fn read_resource(address: ResourceAddress) -> Self {
        Self::new(operations::READ_RESOURCE, address)
    }

    pub fn write_attribute(
        address: ResourceAddress,
        attribute: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        let attribute: String = attribute.into();
        Self::new(operations::WRITE_ATTRIBUTE, address)
            .with_parameter("name", attribute)
            .with_parameter("value", value)
    }

    pub fn undefine_attribute(address: ResourceAddress, attribute: impl Into<String>) -> Self {
        let attribute: String = attribute.into();
        Self::new(operations::UNDEFINE_ATTRIBUTE, address).with_parameter("name", attribute)
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    fn string_parameter(&self, key: &str) -> Result<&str, ManagementOperationError> {
        self.parameters
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| self.failure(format!("missing string parameter '{}'", key)))
    }

    fn failure(&self, message: impl Into<String>) -> ManagementOperationError {
        ManagementOperationError::Failed {
            operation: self.name.clone(),
            address: self.address.clone(),
            message: message.into(),
        }
    }
}

/// Operation names understood by [`ManagementModel`]
pub mod operations {
    pub const ADD: &str = "add";
    pub const REMOVE: &str = "remove";
    pub const READ_RESOURCE: &str = "read-resource";
    pub const WRITE_ATTRIBUTE: &str = "write-attribute";
    pub const UNDEFINE_ATTRIBUTE: &str = "undefine-attribute";
    pub const READ_CHILDREN_NAMES: &str = "read-children-names";
}

/// Executes management operations against a server configuration
pub trait ManagementClient: Send + Sync {
    fn execute(&self, operation: &Operation) -> Result<Value, ManagementOperationError>;
}

/// In-memory resource tree
#[derive(Debug, Default)]
pub struct ManagementModel {
    resources: Mutex<BTreeMap<ResourceAddress, Map<String, Value>>>,
    executed: Mutex<Vec<Operation>>,
}

impl ManagementModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a resource, creating missing ancestors
    pub fn with_resource(self, address: ResourceAddress, attributes: Map<String, Value>) -> Self {
        {
            let mut resources = lock(&self.resources);
            let mut ancestor = address.parent();
            while let Some(parent) = ancestor {
                if parent.is_root() {
                    break;
                }
                ancestor = parent.parent();
                resources.entry(parent).or_default();
            }
            resources.insert(address, attributes);
        }
        self
    }

    /// Operations executed so far, in order
    pub fn executed(&self) -> Vec<Operation> {
        lock(&self.executed).clone()
    }

    pub fn contains(&self, address: &ResourceAddress) -> bool {
        lock(&self.resources).contains_key(address)
    }

    pub fn attributes(&self, address: &ResourceAddress) -> Option<Map<String, Value>> {
        lock(&self.resources).get(address).cloned()
    }

    fn apply(&self, operation: &Operation) -> Result<Value, ManagementOperationError> {
        let mut resources = lock(&self.resources);
        let address = &operation.address;
        let exists = address.is_root() || resources.contains_key(address);

        match operation.name.as_str() {
            operations::ADD => {
                if exists {
                    return Err(ManagementOperationError::Duplicate(address.clone()));
                }
                if let Some(parent) = address.parent() {
                    if !parent.is_root() && !resources.contains_key(&parent) {
                        return Err(ManagementOperationError::NotFound(parent));
                    }
                }
                resources.insert(address.clone(), operation.parameters.clone());
                Ok(Value::Null)
            }
            operations::REMOVE => {
                if address.is_root() || resources.remove(address).is_none() {
                    return Err(ManagementOperationError::NotFound(address.clone()));
                }
                resources.retain(|candidate, _| !candidate.is_descendant_of(address));
                Ok(Value::Null)
            }
            operations::READ_RESOURCE => {
                if address.is_root() {
                    return Ok(Value::Object(Map::new()));
                }
                resources
                    .get(address)
                    .map(|attributes| Value::Object(attributes.clone()))
                    .ok_or_else(|| ManagementOperationError::NotFound(address.clone()))
            }
            operations::WRITE_ATTRIBUTE => {
                let attribute = operation.string_parameter("name")?.to_string();
                let value = operation
                    .parameters
                    .get("value")
                    .cloned()
                    .ok_or_else(|| operation.failure("missing parameter 'value'"))?;
                resources
                    .get_mut(address)
                    .ok_or_else(|| ManagementOperationError::NotFound(address.clone()))?
                    .insert(attribute, value);
                Ok(Value::Null)
            }
            operations::UNDEFINE_ATTRIBUTE => {
                let attribute = operation.string_parameter("name")?;
                resources
                    .get_mut(address)
                    .ok_or_else(|| ManagementOperationError::NotFound(address.clone()))?
                    .remove(attribute);
                Ok(Value::Null)
            }
            operations::READ_CHILDREN_NAMES => {
                if !exists {
                    return Err(ManagementOperationError::NotFound(address.clone()));
                }
                let child_type = operation.string_parameter("child-type")?;
                let names = resources
                    .keys()
                    .filter(|candidate| candidate.parent().as_ref() == Some(address))
                    .filter_map(|candidate| candidate.last())
                    .filter(|(t, _)| *t == child_type)
                    .map(|(_, n)| Value::String(n.to_string()))
                    .collect();
                Ok(Value::Array(names))
            }
            other => Err(ManagementOperationError::Unsupported(other.to_string())),
        }
    }
}

impl ManagementClient for ManagementModel {
    fn execute(&self, operation: &Operation) -> Result<Value, ManagementOperationError> {
        debug!("Executing {} on {}", operation.name, operation.address);
        let result = self.apply(operation);
        if result.is_ok() {
            lock(&self.executed).push(operation.clone());
        }
        result
    }
}

impl ManageableConfiguration for ManagementModel {
    fn resources(&self, resource_type: &str) -> anyhow::Result<Vec<ManageableResource>> {
        Ok(lock(&self.resources)
            .iter()
            .filter_map(|(address, attributes)| {
                let (t, name) = address.last()?;
                (t == resource_type).then(|| ManageableResource {
                    resource_type: t.to_string(),
                    name: name.to_string(),
                    address: address.clone(),
                    attributes: attributes.clone(),
                })
            })
            .collect())
    }

    fn client(&self) -> &dyn ManagementClient {
        self
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn address(raw: &str) -> ResourceAddress {
        raw.parse().unwrap()
    }

    #[test]
    fn addresses_parse_and_render() {
        let parsed = address("/subsystem=logging/handler=console");
        assert_eq!(parsed.to_string(), "/subsystem=logging/handler=console");
        assert_eq!(parsed.last(), Some(("handler", "console")));
        assert_eq!(parsed.parent().unwrap().to_string(), "/subsystem=logging");
        assert!(address("/").is_root());
        assert!("/subsystem".parse::<ResourceAddress>().is_err());
    }

    #[test]
    fn model_applies_operations() {
        let model = ManagementModel::new().with_resource(
            address("/subsystem=logging/handler=console"),
            json!({"level": "INFO"}).as_object().unwrap().clone(),
        );
        assert!(model.contains(&address("/subsystem=logging")));

        model
            .execute(&Operation::write_attribute(
                address("/subsystem=logging/handler=console"),
                "level",
                "DEBUG",
            ))
            .unwrap();
        let read = model
            .execute(&Operation::read_resource(address(
                "/subsystem=logging/handler=console",
            )))
            .unwrap();
        assert_eq!(read["level"], "DEBUG");

        let children = model
            .execute(
                &Operation::new(operations::READ_CHILDREN_NAMES, address("/subsystem=logging"))
                    .with_parameter("child-type", "handler"),
            )
            .unwrap();
        assert_eq!(children, json!(["console"]));

        model
            .execute(&Operation::remove(address("/subsystem=logging")))
            .unwrap();
        assert!(!model.contains(&address("/subsystem=logging/handler=console")));
        assert_eq!(model.executed().len(), 4);
    }

    #[test]
    fn model_reports_failures() {
        let model = ManagementModel::new();

        assert_eq!(
            model.execute(&Operation::remove(address("/extension=org.legacy"))),
            Err(ManagementOperationError::NotFound(address(
                "/extension=org.legacy"
            )))
        );
        assert!(matches!(
            model.execute(&Operation::add(address("/subsystem=a/child=b"))),
            Err(ManagementOperationError::NotFound(_))
        ));
        model.execute(&Operation::add(address("/subsystem=a"))).unwrap();
        assert!(matches!(
            model.execute(&Operation::add(address("/subsystem=a"))),
            Err(ManagementOperationError::Duplicate(_))
        ));
        assert!(matches!(
            model.execute(&Operation::new("reload", ResourceAddress::root())),
            Err(ManagementOperationError::Unsupported(_))
        ));
        assert!(model.executed().len() == 1);
    }
}
