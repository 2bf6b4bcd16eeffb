//! Binding data exchanged with the container engine.
//!
//! [`BindingReport`] carries the bindings the engine assigned after start.
//! [`PortBindingsRequest`] is what a container creation request needs.
//! [`PortBindingRecord`] is the informational export of known bindings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::spec::Protocol;

/// A binding the engine assigned to one container port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    /// Host port, if the engine reported one.
    pub host_port: Option<u32>,
    /// Host address, if the engine reported one.
    pub host_ip: Option<String>,
}

impl PortBinding {
    /// Create a binding with both a host port and a host address.
    pub fn new(host_port: u32, host_ip: impl Into<String>) -> Self {
        Self {
            host_port: Some(host_port),
            host_ip: Some(host_ip.into()),
        }
    }
}

/// Post-start bindings keyed by canonical `<port>/<protocol>` spec.
///
/// An entry without a binding means the engine knows the port but has not
/// bound it to the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingReport {
    bindings: BTreeMap<String, Option<PortBinding>>,
}

impl BindingReport {
    /// Create an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the binding for `key`.
    pub fn insert(&mut self, key: impl Into<String>, binding: PortBinding) {
        self.bindings.insert(key.into(), Some(binding));
    }

    /// Record that `key` is known but has no host binding.
    pub fn insert_unbound(&mut self, key: impl Into<String>) {
        self.bindings.insert(key.into(), None);
    }

    /// Builder form of [`BindingReport::insert`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, binding: PortBinding) -> Self {
        self.insert(key, binding);
        self
    }

    /// Builder form of [`BindingReport::insert_unbound`].
    #[must_use]
    pub fn with_unbound(mut self, key: impl Into<String>) -> Self {
        self.insert_unbound(key);
        self
    }

    /// The entry for `key`: `None` if unknown, `Some(None)` if unbound.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Option<&PortBinding>> {
        self.bindings.get(key).map(Option::as_ref)
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&PortBinding>)> {
        self.bindings
            .iter()
            .map(|(key, binding)| (key.as_str(), binding.as_ref()))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether the report has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Build a report from the `NetworkSettings.Ports` object of a container
    /// inspect response.
    ///
    /// ```json
    /// {"8080/tcp": [{"HostIp": "0.0.0.0", "HostPort": "49900"}], "443/tcp": null}
    /// ```
    ///
    /// Only the first binding of each port is used. Non-numeric host ports
    /// and empty host addresses count as absent. Input that is not an object
    /// yields an empty report.
    #[must_use]
    pub fn from_inspect_ports(ports: &Value) -> Self {
        let Some(ports) = ports.as_object() else {
            tracing::trace!("Inspect ports is not an object, ignoring");
            return Self::new();
        };

        ports
            .iter()
            .map(|(key, bindings)| {
                let binding = bindings
                    .as_array()
                    .and_then(|list| list.first())
                    .map(|first| PortBinding {
                        host_port: first
                            .get("HostPort")
                            .and_then(Value::as_str)
                            .and_then(|p| p.parse().ok()),
                        host_ip: first
                            .get("HostIp")
                            .and_then(Value::as_str)
                            .filter(|ip| !ip.is_empty())
                            .map(str::to_string),
                    });
                (key.clone(), binding)
            })
            .collect()
    }
}

impl FromIterator<(String, Option<PortBinding>)> for BindingReport {
    fn from_iter<I: IntoIterator<Item = (String, Option<PortBinding>)>>(iter: I) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
        }
    }
}

/// Serializes as an empty JSON object, as the engine expects for exposed
/// port sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyObject {}

/// Host side of a port binding in a container creation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostBinding {
    /// Address to bind to; all interfaces if absent.
    #[serde(rename = "HostIp", default, skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,
    /// Host port; empty lets the engine choose.
    #[serde(rename = "HostPort", default)]
    pub host_port: String,
}

/// Port related parts of a container creation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBindingsRequest {
    /// Every container port, keyed by canonical spec.
    #[serde(rename = "ExposedPorts")]
    pub exposed_ports: BTreeMap<String, EmptyObject>,
    /// Host bindings for published ports.
    #[serde(rename = "PortBindings")]
    pub port_bindings: BTreeMap<String, Vec<HostBinding>>,
}

/// A known container to host binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBindingRecord {
    /// Bind address, if restricted.
    #[serde(rename = "hostIP", default, skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,
    /// Host port.
    #[serde(rename = "hostPort")]
    pub host_port: u32,
    /// Container port.
    #[serde(rename = "containerPort")]
    pub container_port: u16,
    /// Protocol.
    pub protocol: Protocol,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn inspect_ports_first_binding_wins() {
        let report = BindingReport::from_inspect_ports(&json!({
            "8080/tcp": [
                {"HostIp": "0.0.0.0", "HostPort": "49900"},
                {"HostIp": "::", "HostPort": "49900"}
            ],
            "443/tcp": null,
            "53/udp": [],
            "9000/tcp": [{"HostIp": "", "HostPort": "not-a-port"}]
        }));

        assert_eq!(report.len(), 4);
        assert_eq!(
            report.get("8080/tcp"),
            Some(Some(&PortBinding::new(49900, "0.0.0.0")))
        );
        assert_eq!(report.get("443/tcp"), Some(None));
        assert_eq!(report.get("53/udp"), Some(None));
        assert_eq!(report.get("9000/tcp"), Some(Some(&PortBinding::default())));
        assert_eq!(report.get("1/tcp"), None);
    }

    #[test]
    fn inspect_ports_non_object() {
        assert!(BindingReport::from_inspect_ports(&Value::Null).is_empty());
        assert!(BindingReport::from_inspect_ports(&json!([1, 2])).is_empty());
    }

    #[test]
    fn builder_and_iteration() {
        let report = BindingReport::new()
            .with("8080/tcp", PortBinding::new(49900, "0.0.0.0"))
            .with_unbound("443/tcp");
        let keys: Vec<&str> = report.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["443/tcp", "8080/tcp"]);
    }

    #[test]
    fn request_serializes_in_engine_form() {
        let mut request = PortBindingsRequest::default();
        request
            .exposed_ports
            .insert("8080/tcp".to_string(), EmptyObject {});
        request.port_bindings.insert(
            "8080/tcp".to_string(),
            vec![HostBinding {
                host_ip: Some("127.0.0.1".to_string()),
                host_port: String::new(),
            }],
        );

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "ExposedPorts": {"8080/tcp": {}},
                "PortBindings": {"8080/tcp": [{"HostIp": "127.0.0.1", "HostPort": ""}]}
            })
        );
    }

    #[test]
    fn record_to_json_omits_missing_host_ip() {
        let record = PortBindingRecord {
            host_ip: None,
            host_port: 49000,
            container_port: 8080,
            protocol: Protocol::Udp,
        };
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"hostPort": 49000, "containerPort": 8080, "protocol": "udp"})
        );
    }
}
