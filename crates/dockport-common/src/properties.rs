//! Layered property lookup.
//!
//! Properties come in two layers:
//! - a system layer, set by the operator for the whole run (`-D key=value`)
//! - a project layer, supplied by the configuration being processed
//!
//! Lookups consult the system layer first, so an operator can override any
//! project value without editing the configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{DockportError, DockportResult};

/// A two-layer property store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Properties {
    /// System level properties; these win over project properties.
    #[serde(default)]
    system: BTreeMap<String, String>,
    /// Project level properties.
    #[serde(default)]
    project: BTreeMap<String, String>,
}

impl Properties {
    /// Create an empty property store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose project layer holds the given entries.
    pub fn from_project<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            system: BTreeMap::new(),
            project: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Add a system level property.
    #[must_use]
    pub fn with_system(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_system(key, value);
        self
    }

    /// Add a project level property.
    #[must_use]
    pub fn with_project(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Set a project level property, returning the previous project value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.project.insert(key.into(), value.into())
    }

    /// Set a system level property, returning the previous system value.
    pub fn set_system(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Option<String> {
        self.system.insert(key.into(), value.into())
    }

    /// Remove a system level property.
    pub fn remove_system(&mut self, key: &str) -> Option<String> {
        self.system.remove(key)
    }

    /// Look up a property, preferring the system layer.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.system
            .get(key)
            .or_else(|| self.project.get(key))
            .map(String::as_str)
    }

    /// Whether either layer defines `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.system.contains_key(key) || self.project.contains_key(key)
    }

    /// The project layer.
    #[must_use]
    pub const fn project(&self) -> &BTreeMap<String, String> {
        &self.project
    }

    /// The system layer.
    #[must_use]
    pub const fn system(&self) -> &BTreeMap<String, String> {
        &self.system
    }

    /// Parse a `key=value` assignment as given on the command line.
    ///
    /// The value may be empty and may itself contain `=`; the key may not be
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns [`DockportError::Config`] if there is no `=` or the key is empty.
    pub fn parse_assignment(s: &str) -> DockportResult<(String, String)> {
        let (key, value) = s.split_once('=').ok_or_else(|| DockportError::Config {
            message: format!("Expected 'key=value', got '{s}'"),
        })?;

        let key = key.trim();
        if key.is_empty() {
            return Err(DockportError::Config {
                message: format!("Empty property name in '{s}'"),
            });
        }

        Ok((key.to_string(), value.to_string()))
    }
}
