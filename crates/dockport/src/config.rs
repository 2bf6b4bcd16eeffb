//! Configuration file (`dockport.yaml`).
//!
//! ```yaml
//! ports:
//!   - jolokia.port:8080
//!   - 127.0.0.1:9090:9090
//!   - +other.ip:${other.port}:5678
//! properties:
//!   docker.host.address: 192.168.99.100
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use dockport_common::{DockportError, DockportResult, Properties};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Contents of a configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    /// Port mapping specifications.
    #[serde(default)]
    pub ports: Vec<String>,

    /// Project properties used to pre-resolve variables.
    #[serde(default, deserialize_with = "scalar_map")]
    pub properties: BTreeMap<String, String>,
}

impl PortConfig {
    /// Load a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML.
    pub fn from_file(path: &Path) -> DockportResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| DockportError::Config {
            message: format!("{}: {e}", path.display()),
        })
    }

    /// Parse configuration from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not a valid configuration.
    pub fn from_yaml(content: &str) -> DockportResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Project properties as a [`Properties`] store.
    #[must_use]
    pub fn to_properties(&self) -> Properties {
        Properties::from_project(self.properties.clone())
    }
}

/// Accept numbers and booleans as property values so `port: 8080` works
/// without quoting.
fn scalar_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_yaml::Value>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                other => {
                    return Err(D::Error::custom(format!(
                        "property '{key}' must be a scalar, got {other:?}"
                    )));
                }
            };
            Ok((key, value))
        })
        .collect()
}
