//! Port mapping for containers.
//!
//! A [`PortMapping`] is built once from the user's port specifications and a
//! property snapshot. Once the engine reports the bindings it assigned,
//! [`PortMapping::update_properties`] resolves the variables that were still
//! pending. After that the mapping is only read.
//!
//! The mapping has a single writer: `update_properties` takes `&mut self`,
//! and callers sharing a mapping across threads must serialize access
//! themselves.

use std::collections::BTreeMap;
use std::net::IpAddr;

use dockport_common::{DockportResult, Properties};
use serde_json::Value;

use crate::binding::{
    BindingReport, EmptyObject, HostBinding, PortBindingRecord, PortBindingsRequest,
};
use crate::resolve::{AddressResolver, SystemResolver};
use crate::spec::{HostIp, HostPort, PortSpec, Variable};

/// Parsed port mappings of one container, together with the variables they
/// define.
#[derive(Debug, Clone, Default)]
pub struct PortMapping {
    /// Specs in parse order, one per canonical key.
    specs: Vec<PortSpec>,
    /// Canonical key -> host port requested at creation time.
    container_port_to_host_port: BTreeMap<String, Option<u32>>,
    /// Variable name -> resolved host port.
    host_port_variables: BTreeMap<String, u32>,
    /// Variable name -> resolved host address.
    host_ip_variables: BTreeMap<String, String>,
    /// Canonical key -> concrete bind address. Never holds a wildcard.
    bind_to_host: BTreeMap<String, String>,
    needs_properties_update: bool,
}

impl PortMapping {
    /// Parse `specs`, resolving host names through the system resolver.
    ///
    /// # Errors
    ///
    /// Returns [`dockport_common::DockportError::InvalidPortSpec`] for the
    /// first spec that cannot be parsed. No mapping is produced in that case.
    pub fn new<I, S>(specs: I, properties: &Properties) -> DockportResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_resolver(specs, properties, &SystemResolver)
    }

    /// Parse `specs`, resolving host names through `resolver`.
    ///
    /// # Errors
    ///
    /// Returns [`dockport_common::DockportError::InvalidPortSpec`] for the
    /// first spec that cannot be parsed. No mapping is produced in that case.
    pub fn with_resolver<I, S>(
        specs: I,
        properties: &Properties,
        resolver: &dyn AddressResolver,
    ) -> DockportResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut mapping = Self::default();
        for raw in specs {
            let spec = PortSpec::parse(raw.as_ref(), properties, resolver)?;
            mapping.insert(spec);
        }

        tracing::debug!(
            ports = mapping.specs.len(),
            pending = mapping.pending_variables().count(),
            "Port mapping created"
        );

        Ok(mapping)
    }

    fn insert(&mut self, spec: PortSpec) {
        let key = spec.key().to_string();

        self.container_port_to_host_port
            .insert(key.clone(), spec.host_port.known());
        self.bind_to_host.remove(&key);

        if let HostPort::Variable(Variable::Resolved { name, value }) = &spec.host_port {
            self.host_port_variables.insert(name.clone(), *value);
            self.needs_properties_update = true;
        }

        match &spec.host_ip {
            HostIp::Static(ip) if !ip.is_unspecified() => {
                self.bind_to_host.insert(key.clone(), ip.to_string());
            }
            HostIp::Eager(Variable::Resolved { name, value }) => {
                self.host_ip_variables.insert(name.clone(), value.clone());
                self.needs_properties_update = true;
            }
            _ => {}
        }

        match self.position(&key) {
            Some(idx) => {
                tracing::debug!(key = %key, spec = spec.raw(), "Replacing earlier port mapping");
                self.specs[idx] = spec;
            }
            None => self.specs.push(spec),
        }
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.specs.iter().position(|s| s.key() == key)
    }

    /// Resolve pending variables from the bindings the engine assigned.
    ///
    /// Variables that are already known, fixed ports, static addresses and
    /// report entries for unknown ports are left alone. Wildcard addresses
    /// resolve address variables but are never recorded as bind addresses.
    pub fn update_properties(&mut self, report: &BindingReport) {
        for (key, binding) in report.iter() {
            let Some(idx) = self.position(key) else {
                tracing::trace!(key, "Ignoring binding for unknown port");
                continue;
            };
            let Some(binding) = binding else {
                tracing::trace!(key, "Port has no host binding yet");
                continue;
            };
            let spec = &mut self.specs[idx];

            if let (HostPort::Variable(var), Some(port)) = (&mut spec.host_port, binding.host_port)
            {
                if var.resolve(port) {
                    tracing::debug!(key, variable = var.name(), port, "Resolved host port");
                    self.host_port_variables.insert(var.name().to_string(), port);
                    self.needs_properties_update = true;
                }
            }

            if let (Some(var), Some(ip)) = (spec.host_ip.variable_mut(), &binding.host_ip) {
                if var.resolve(ip.clone()) {
                    tracing::debug!(key, variable = var.name(), ip = %ip, "Resolved host address");
                    self.host_ip_variables.insert(var.name().to_string(), ip.clone());
                    if is_wildcard(ip) {
                        tracing::debug!(key, "Wildcard address is not recorded as bind address");
                    } else {
                        self.bind_to_host.insert(key.to_string(), ip.clone());
                    }
                    self.needs_properties_update = true;
                }
            }
        }
    }

    /// Parsed specs in the order they were given.
    #[must_use]
    pub fn specs(&self) -> &[PortSpec] {
        &self.specs
    }

    /// Canonical keys of all container ports, in parse order.
    #[must_use]
    pub fn container_ports(&self) -> Vec<&str> {
        self.specs.iter().map(PortSpec::key).collect()
    }

    /// Canonical key to the host port requested at creation time.
    ///
    /// Every container port has an entry. The value is `None` for exposed
    /// ports and for host port variables that were not known at creation.
    #[must_use]
    pub const fn container_port_to_host_port_map(&self) -> &BTreeMap<String, Option<u32>> {
        &self.container_port_to_host_port
    }

    /// Canonical key to host port, for ports with a host port at creation
    /// time only.
    #[must_use]
    pub fn ports_map(&self) -> BTreeMap<&str, u32> {
        self.container_port_to_host_port
            .iter()
            .filter_map(|(key, port)| port.map(|p| (key.as_str(), p)))
            .collect()
    }

    /// Variable name to resolved host port.
    #[must_use]
    pub const fn host_port_variable_map(&self) -> &BTreeMap<String, u32> {
        &self.host_port_variables
    }

    /// Variable name to resolved host address.
    #[must_use]
    pub const fn host_ip_variable_map(&self) -> &BTreeMap<String, String> {
        &self.host_ip_variables
    }

    /// Canonical key to the address the port is bound to.
    #[must_use]
    pub const fn bind_to_host_map(&self) -> &BTreeMap<String, String> {
        &self.bind_to_host
    }

    /// Whether any variable was resolved and should be propagated.
    #[must_use]
    pub const fn needs_properties_update(&self) -> bool {
        self.needs_properties_update
    }

    /// Names of variables still waiting for a value.
    pub fn pending_variables(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().flat_map(|spec| {
            let port = match &spec.host_port {
                HostPort::Variable(var) if var.is_pending() => Some(var.name()),
                _ => None,
            };
            let ip = spec
                .host_ip
                .variable()
                .filter(|var| var.is_pending())
                .map(Variable::name);
            port.into_iter().chain(ip)
        })
    }

    /// All resolved variables as strings, suitable for [`crate::substitute`].
    ///
    /// A host port and a host address variable with the same name should not
    /// occur; if they do, the address wins.
    #[must_use]
    pub fn variables(&self) -> BTreeMap<String, String> {
        let mut vars: BTreeMap<String, String> = self
            .host_port_variables
            .iter()
            .map(|(name, port)| (name.clone(), port.to_string()))
            .collect();
        vars.extend(
            self.host_ip_variables
                .iter()
                .map(|(name, ip)| (name.clone(), ip.clone())),
        );
        vars
    }

    /// Write all resolved variables into the project layer of `properties`.
    ///
    /// Does nothing unless [`PortMapping::needs_properties_update`] is set.
    /// Returns the number of properties written.
    pub fn apply_to(&self, properties: &mut Properties) -> usize {
        if !self.needs_properties_update {
            return 0;
        }

        let vars = self.variables();
        for (name, value) in &vars {
            tracing::debug!(property = %name, value = %value, "Updating property");
            properties.set(name.clone(), value.clone());
        }
        vars.len()
    }

    /// Port bindings for a container creation request.
    ///
    /// All container ports are exposed. Ports with a host port part are
    /// published; an empty host port asks the engine to pick one.
    #[must_use]
    pub fn create_request(&self) -> PortBindingsRequest {
        let mut request = PortBindingsRequest::default();

        for spec in &self.specs {
            let key = spec.key();
            request.exposed_ports.insert(key.to_string(), EmptyObject {});

            if matches!(spec.host_port, HostPort::None) {
                continue;
            }

            let host_port = self
                .container_port_to_host_port
                .get(key)
                .copied()
                .flatten()
                .map(|p| p.to_string())
                .unwrap_or_default();

            request.port_bindings.insert(
                key.to_string(),
                vec![HostBinding {
                    host_ip: self.bind_to_host.get(key).cloned(),
                    host_port,
                }],
            );
        }

        request
    }

    /// Known bindings in parse order, skipping ports without a known host
    /// port.
    #[must_use]
    pub fn port_bindings(&self) -> Vec<PortBindingRecord> {
        self.specs
            .iter()
            .filter_map(|spec| {
                let host_port = spec.host_port.known()?;
                Some(PortBindingRecord {
                    host_ip: self.bind_to_host.get(spec.key()).cloned(),
                    host_port,
                    container_port: spec.container_port(),
                    protocol: spec.protocol(),
                })
            })
            .collect()
    }

    /// [`PortMapping::port_bindings`] as a JSON array of
    /// `{hostIP?, hostPort, containerPort, protocol}` objects.
    ///
    /// # Errors
    ///
    /// Returns [`dockport_common::DockportError::Serialization`] if the records cannot be
    /// converted to JSON.
    pub fn to_json(&self) -> DockportResult<Value> {
        Ok(serde_json::to_value(self.port_bindings())?)
    }
}

fn is_wildcard(ip: &str) -> bool {
    ip.parse::<IpAddr>().is_ok_and(|addr| addr.is_unspecified())
}
