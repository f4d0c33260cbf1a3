//! Property-backed migration environment.
//!
//! The environment is created once at the process entry point and handed to
//! every [`TaskContext`](crate::task::TaskContext) through the shared
//! services. Every lookup, hit or miss, is recorded so the report can list
//! which properties the migration consulted.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvironmentError {
    #[error("Required property '{0}' is not set")]
    MissingProperty(String),

    #[error("Property '{name}' has invalid value '{value}': expected {expected}")]
    InvalidValue {
        name: String,
        value: String,
        expected: &'static str,
    },
}

/// Migration properties with read tracking
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MigrationEnvironment {
    properties: BTreeMap<String, String>,
    #[serde(skip)]
    read: Mutex<BTreeSet<String>>,
}

impl Clone for MigrationEnvironment {
    fn clone(&self) -> Self {
        Self {
            properties: self.properties.clone(),
            read: Mutex::new(self.property_names_read()),
        }
    }
}

impl MigrationEnvironment {
    pub fn new(properties: BTreeMap<String, String>) -> Self {
        Self {
            properties,
            read: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Apply overrides on top of the current properties
    pub fn with_overrides<I, K, V>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.properties
            .extend(overrides.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Every property as configured, without recording reads
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn property_as_string(&self, name: &str) -> Option<String> {
        self.mark_read(name);
        self.properties.get(name).cloned()
    }

    pub fn property_as_string_or(&self, name: &str, default: &str) -> String {
        self.property_as_string(name)
            .unwrap_or_else(|| default.to_string())
    }

    /// Boolean lookup; unparsable values fall back to `default`
    pub fn property_as_boolean(&self, name: &str, default: bool) -> bool {
        match self.property_as_string(name) {
            None => default,
            Some(value) => parse_boolean(&value).unwrap_or_else(|| {
                warn!(
                    "Property '{}' has non-boolean value '{}', using default {}",
                    name, value, default
                );
                default
            }),
        }
    }

    /// Comma-separated list lookup; blank entries are dropped
    pub fn property_as_list(&self, name: &str) -> Vec<String> {
        self.property_as_string(name)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn require_property_as_string(&self, name: &str) -> Result<String, EnvironmentError> {
        self.property_as_string(name)
            .ok_or_else(|| EnvironmentError::MissingProperty(name.to_string()))
    }

    pub fn require_property_as_boolean(&self, name: &str) -> Result<bool, EnvironmentError> {
        let value = self.require_property_as_string(name)?;
        parse_boolean(&value).ok_or(EnvironmentError::InvalidValue {
            name: name.to_string(),
            value,
            expected: "a boolean",
        })
    }

    /// Names looked up so far, sorted
    pub fn property_names_read(&self) -> BTreeSet<String> {
        match self.read.lock() {
            Ok(read) => read.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn mark_read(&self, name: &str) {
        let mut read = match self.read.lock() {
            Ok(read) => read,
            Err(poisoned) => poisoned.into_inner(),
        };
        read.insert(name.to_string());
    }
}

/// `true`/`yes`/`on` or `false`/`no`/`off`, case-insensitive
pub fn parse_boolean(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" => Some(true),
        "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a `name=value` override as given on the command line
pub fn parse_property_override(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{}'", raw)),
    }
}
