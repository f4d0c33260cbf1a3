use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured task identifier: a name plus ordered key/value attributes.
///
/// Equality ignores attribute order, rendering does not. Setting an attribute
/// key twice keeps the original position and replaces the value (last write
/// wins).
#[derive(Serialize, Deserialize, Clone, Debug, Eq)]
pub struct TaskName {
    name: String,
    attributes: Vec<(String, String)>,
}

impl TaskName {
    /// Create a task name without attributes
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    /// Start building a task name
    pub fn builder(name: impl Into<String>) -> TaskNameBuilder {
        TaskNameBuilder {
            inner: Self::new(name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attributes in insertion order
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Copy of this name with one more attribute
    pub fn with_attribute(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut name = self.clone();
        name.set_attribute(key.into(), value.into());
        name
    }

    fn set_attribute(&mut self, key: String, value: String) {
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    fn sorted_attributes(&self) -> Vec<&(String, String)> {
        let mut sorted: Vec<_> = self.attributes.iter().collect();
        sorted.sort();
        sorted
    }
}

impl PartialEq for TaskName {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.attributes.len() == other.attributes.len()
            && self.sorted_attributes() == other.sorted_attributes()
    }
}

impl std::hash::Hash for TaskName {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.sorted_attributes().hash(state);
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.attributes.is_empty() {
            f.write_str(" ")?;
            for (index, (key, value)) in self.attributes.iter().enumerate() {
                if index > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{}={}", key, value)?;
            }
        }
        Ok(())
    }
}

impl From<&str> for TaskName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TaskName {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Accumulates attributes before producing an immutable [`TaskName`]
#[derive(Clone, Debug)]
pub struct TaskNameBuilder {
    inner: TaskName,
}

impl TaskNameBuilder {
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner.set_attribute(key.into(), value.into());
        self
    }

    pub fn build(self) -> TaskName {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn renders_attributes_in_insertion_order() {
        let name = TaskName::builder("subsystem.update")
            .attribute("subsystem", "logging")
            .attribute("profile", "full")
            .build();

        assert_eq!(
            name.to_string(),
            "subsystem.update subsystem=logging,profile=full"
        );
        assert_eq!(TaskName::new("plain").to_string(), "plain");
    }

    #[test]
    fn equality_ignores_attribute_order() {
        let a = TaskName::builder("x").attribute("a", "1").attribute("b", "2").build();
        let b = TaskName::builder("x").attribute("b", "2").attribute("a", "1").build();

        assert_eq!(a, b);
        assert_ne!(a.to_string(), b.to_string());

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn repeated_key_replaces_value_in_place() {
        let name = TaskName::builder("x")
            .attribute("a", "1")
            .attribute("b", "2")
            .attribute("a", "3")
            .build();

        assert_eq!(name.to_string(), "x a=3,b=2");
        assert_eq!(name.attribute("a"), Some("3"));
        assert_ne!(name, TaskName::new("x"));
    }
}
