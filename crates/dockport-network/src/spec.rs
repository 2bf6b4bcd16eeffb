//! Port mapping specification grammar.
//!
//! A specification has the form
//! `[[host-ip:]host-port:]container-port[/protocol]`:
//! - `container-port` is a number between 1 and 65535
//! - `protocol` is `tcp` (default) or `udp`
//! - `host-port` is a number or the name of a variable, optionally written
//!   as `${name}`
//! - `host-ip` is a literal address or host name, `+name` for a variable
//!   filled from the engine's binding report, or `${name}` for a variable
//!   filled from the engine host address property

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use dockport_common::{DockportError, DockportResult, Properties};
use serde::{Deserialize, Serialize};

use crate::resolve::AddressResolver;

/// Property holding the address under which the container engine's host is
/// reachable.
pub const ENGINE_HOST_ADDRESS_PROPERTY: &str = "docker.host.address";

/// Protocol for port mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP protocol.
    #[default]
    Tcp,
    /// UDP protocol.
    Udp,
}

impl Protocol {
    /// Get the protocol string as used in port specs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }

    /// Parse a protocol token. Matching is case-sensitive.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "tcp" => Some(Self::Tcp),
            "udp" => Some(Self::Udp),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named value that is either still unknown or already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Variable<T> {
    /// Waiting for a value.
    Pending(String),
    /// Value known.
    Resolved {
        /// Variable name.
        name: String,
        /// Resolved value.
        value: T,
    },
}

impl<T> Variable<T> {
    /// The variable name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Pending(name) | Self::Resolved { name, .. } => name,
        }
    }

    /// The resolved value, if any.
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Pending(_) => None,
            Self::Resolved { value, .. } => Some(value),
        }
    }

    /// Whether the variable is still waiting for a value.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Resolve a pending variable. Returns `false` if it was already resolved,
    /// in which case the existing value is kept.
    pub(crate) fn resolve(&mut self, value: T) -> bool {
        match self {
            Self::Pending(name) => {
                let name = std::mem::take(name);
                *self = Self::Resolved { name, value };
                true
            }
            Self::Resolved { .. } => false,
        }
    }
}

/// Host side port of a mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostPort {
    /// Container port is only exposed.
    None,
    /// Literal port number.
    Fixed(u32),
    /// Port assigned by a variable.
    Variable(Variable<u32>),
}

impl HostPort {
    /// The host port, if it is fixed or resolved.
    #[must_use]
    pub const fn known(&self) -> Option<u32> {
        match self {
            Self::None => None,
            Self::Fixed(port) => Some(*port),
            Self::Variable(var) => match var.value() {
                Some(port) => Some(*port),
                None => None,
            },
        }
    }
}

/// Host side address of a mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostIp {
    /// No address given; the engine binds all interfaces.
    None,
    /// Literal address or resolved host name.
    Static(IpAddr),
    /// `+name`: filled from the engine's binding report.
    Deferred(Variable<String>),
    /// `${name}`: filled from the engine host address property when known,
    /// otherwise from the binding report.
    Eager(Variable<String>),
}

impl HostIp {
    /// The variable behind this address, if any.
    #[must_use]
    pub const fn variable(&self) -> Option<&Variable<String>> {
        match self {
            Self::Deferred(var) | Self::Eager(var) => Some(var),
            Self::None | Self::Static(_) => None,
        }
    }

    pub(crate) fn variable_mut(&mut self) -> Option<&mut Variable<String>> {
        match self {
            Self::Deferred(var) | Self::Eager(var) => Some(var),
            Self::None | Self::Static(_) => None,
        }
    }
}

/// A single parsed port mapping specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    raw: String,
    key: String,
    container_port: u16,
    protocol: Protocol,
    /// Host side port.
    pub host_port: HostPort,
    /// Host side address.
    pub host_ip: HostIp,
}

impl PortSpec {
    /// Parse a raw specification.
    ///
    /// Host port variables are resolved right away if `properties` already
    /// holds a numeric value for them. `${name}` host addresses are resolved
    /// right away if [`ENGINE_HOST_ADDRESS_PROPERTY`] is set.
    ///
    /// # Errors
    ///
    /// Returns [`DockportError::InvalidPortSpec`] if the specification does
    /// not follow the grammar or a literal host cannot be resolved.
    pub fn parse(
        raw: &str,
        properties: &Properties,
        resolver: &dyn AddressResolver,
    ) -> DockportResult<Self> {
        let input = raw.trim();
        let invalid = |reason: String| DockportError::invalid_spec(raw, reason);

        let (mapping, protocol) = match input.rsplit_once('/') {
            Some((mapping, token)) => {
                let protocol = Protocol::parse(token).ok_or_else(|| {
                    invalid(format!("unknown protocol '{token}', expected 'tcp' or 'udp'"))
                })?;
                (mapping, protocol)
            }
            None => (input, Protocol::Tcp),
        };

        let fields: Vec<&str> = mapping.split(':').collect();
        if fields.iter().any(|f| f.is_empty()) {
            return Err(invalid("empty field".to_string()));
        }

        let (host_ip, host_port, container) = match fields.as_slice() {
            [container] => (None, None, *container),
            [host_port, container] => (None, Some(*host_port), *container),
            [host_ip, host_port, container] => (Some(*host_ip), Some(*host_port), *container),
            _ => {
                return Err(invalid(format!(
                    "expected at most 3 ':'-separated fields, got {}",
                    fields.len()
                )));
            }
        };

        let container_port = parse_container_port(container).ok_or_else(|| {
            invalid(format!(
                "container port '{container}' is not a number between 1 and 65535"
            ))
        })?;

        let host_port = match host_port {
            Some(field) => classify_host_port(field, properties).map_err(&invalid)?,
            None => HostPort::None,
        };

        let host_ip = match host_ip {
            Some(field) => classify_host_ip(field, properties, resolver).map_err(&invalid)?,
            None => HostIp::None,
        };

        let spec = Self {
            raw: raw.to_string(),
            key: format!("{container_port}/{protocol}"),
            container_port,
            protocol,
            host_port,
            host_ip,
        };

        tracing::debug!(
            spec = %spec.raw,
            key = %spec.key,
            host_port = ?spec.host_port,
            host_ip = ?spec.host_ip,
            "Parsed port mapping"
        );

        Ok(spec)
    }

    /// The specification as given.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Canonical `<container-port>/<protocol>` key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Container port.
    #[must_use]
    pub const fn container_port(&self) -> u16 {
        self.container_port
    }

    /// Protocol.
    #[must_use]
    pub const fn protocol(&self) -> Protocol {
        self.protocol
    }
}

fn is_number(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_container_port(s: &str) -> Option<u16> {
    if !is_number(s) {
        return None;
    }
    s.parse::<u16>().ok().filter(|port| *port != 0)
}

/// Strip a `${...}` wrapper, if present.
fn placeholder_name(s: &str) -> Option<&str> {
    s.strip_prefix("${").and_then(|rest| rest.strip_suffix('}'))
}

fn classify_host_port(field: &str, properties: &Properties) -> Result<HostPort, String> {
    if is_number(field) {
        return field
            .parse()
            .map(HostPort::Fixed)
            .map_err(|_| format!("host port '{field}' is out of range"));
    }

    let name = placeholder_name(field).unwrap_or(field);
    if name.is_empty() {
        return Err(format!("empty host port variable in '{field}'"));
    }

    let preset = match properties.get(name).filter(|value| is_number(value)) {
        Some(value) => Some(value.parse::<u32>().map_err(|_| {
            format!("property '{name}' has out of range host port '{value}'")
        })?),
        None => None,
    };

    Ok(HostPort::Variable(match preset {
        Some(value) => Variable::Resolved {
            name: name.to_string(),
            value,
        },
        None => Variable::Pending(name.to_string()),
    }))
}

fn classify_host_ip(
    field: &str,
    properties: &Properties,
    resolver: &dyn AddressResolver,
) -> Result<HostIp, String> {
    if let Some(name) = field.strip_prefix('+') {
        if name.is_empty() {
            return Err("empty host address variable after '+'".to_string());
        }
        return Ok(HostIp::Deferred(Variable::Pending(name.to_string())));
    }

    if let Some(name) = placeholder_name(field) {
        if name.is_empty() {
            return Err("empty host address variable in '${}'".to_string());
        }
        let var = match properties
            .get(ENGINE_HOST_ADDRESS_PROPERTY)
            .filter(|addr| !addr.is_empty())
        {
            Some(addr) => Variable::Resolved {
                name: name.to_string(),
                value: addr.to_string(),
            },
            None => Variable::Pending(name.to_string()),
        };
        return Ok(HostIp::Eager(var));
    }

    resolve_host(field, resolver).map(HostIp::Static)
}

fn resolve_host(host: &str, resolver: &dyn AddressResolver) -> Result<IpAddr, String> {
    if let Ok(addr) = host.parse::<Ipv4Addr>() {
        return Ok(IpAddr::V4(addr));
    }
    if host.eq_ignore_ascii_case("localhost") {
        return Ok(IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
    resolver
        .resolve(host)
        .map_err(|e| format!("cannot resolve host '{host}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::StaticResolver;

    fn parse(raw: &str) -> DockportResult<PortSpec> {
        PortSpec::parse(raw, &Properties::new(), &StaticResolver::new())
    }

    fn parse_with(raw: &str, properties: &Properties) -> PortSpec {
        PortSpec::parse(raw, properties, &StaticResolver::new()).unwrap()
    }

    #[test]
    fn single_field_is_pure_expose() {
        let spec = parse("8080").unwrap();
        assert_eq!(spec.key(), "8080/tcp");
        assert_eq!(spec.container_port(), 8080);
        assert_eq!(spec.protocol(), Protocol::Tcp);
        assert_eq!(spec.host_port, HostPort::None);
        assert_eq!(spec.host_ip, HostIp::None);
    }

    #[test]
    fn fixed_host_port() {
        let spec = parse("18181:8181").unwrap();
        assert_eq!(spec.key(), "8181/tcp");
        assert_eq!(spec.host_port, HostPort::Fixed(18181));
        assert_eq!(spec.host_port.known(), Some(18181));
    }

    #[test]
    fn udp_protocol() {
        let spec = parse("49000:8080/udp").unwrap();
        assert_eq!(spec.key(), "8080/udp");
        assert_eq!(spec.protocol(), Protocol::Udp);
    }

    #[test]
    fn protocol_is_case_sensitive() {
        for raw in ["49000:8080/abc", "49000:8080/TCP", "8080/Udp", "8080/"] {
            let err = parse(raw).unwrap_err();
            assert!(
                matches!(err, DockportError::InvalidPortSpec { ref spec, .. } if spec == raw),
                "{raw} -> {err}"
            );
        }
    }

    #[test]
    fn container_port_must_be_in_range() {
        for raw in ["bla", "jolokia.port:bla", "0", "65536", "80:-1", "1:2:3:4", "::80", "80:"]
        {
            assert!(parse(raw).is_err(), "{raw} should be rejected");
        }
        assert_eq!(parse("65535").unwrap().container_port(), 65535);
        assert_eq!(parse("1").unwrap().container_port(), 1);
    }

    #[test]
    fn host_port_variable_pending() {
        let spec = parse("jolokia.port:8080").unwrap();
        assert_eq!(
            spec.host_port,
            HostPort::Variable(Variable::Pending("jolokia.port".to_string()))
        );
        assert_eq!(spec.host_port.known(), None);
    }

    #[test]
    fn host_port_placeholder_is_unwrapped() {
        let spec = parse("${other.port}:5678").unwrap();
        match spec.host_port {
            HostPort::Variable(var) => {
                assert_eq!(var.name(), "other.port");
                assert!(var.is_pending());
            }
            other => panic!("unexpected host port {other:?}"),
        }
    }

    #[test]
    fn host_port_variable_resolved_from_properties() {
        let props = Properties::new().with_project("jolokia.port", "50000");
        let spec = parse_with("jolokia.port:8080", &props);
        assert_eq!(spec.host_port.known(), Some(50000));
    }

    #[test]
    fn host_port_placeholder_resolved_from_properties() {
        let props = Properties::new().with_project("jolokia.port", "50000");
        let spec = parse_with("${jolokia.port}:8080", &props);
        assert_eq!(
            spec.host_port,
            HostPort::Variable(Variable::Resolved {
                name: "jolokia.port".to_string(),
                value: 50000,
            })
        );
    }

    #[test]
    fn overflowing_property_value_is_rejected() {
        let props = Properties::new().with_project("jolokia.port", "99999999999");
        let err = PortSpec::parse("jolokia.port:8080", &props, &StaticResolver::new()).unwrap_err();
        match err {
            DockportError::InvalidPortSpec { spec, reason } => {
                assert_eq!(spec, "jolokia.port:8080");
                assert!(reason.contains("jolokia.port"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn host_port_is_not_range_checked() {
        assert_eq!(parse("99999:8080").unwrap().host_port, HostPort::Fixed(99999));
        assert_eq!(parse("0:8080").unwrap().host_port, HostPort::Fixed(0));
    }

    #[test]
    fn non_numeric_property_leaves_variable_pending() {
        let props = Properties::new().with_project("web.port", "eighty");
        let spec = parse_with("web.port:80", &props);
        assert_eq!(spec.host_port.known(), None);
    }

    #[test]
    fn literal_host_ip() {
        let spec = parse("127.0.0.1:9090:9090").unwrap();
        assert_eq!(spec.host_ip, HostIp::Static(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        assert_eq!(spec.host_port, HostPort::Fixed(9090));
    }

    #[test]
    fn localhost_is_loopback() {
        let spec = parse("localhost:80:80").unwrap();
        assert_eq!(spec.host_ip, HostIp::Static(IpAddr::V4(Ipv4Addr::LOCALHOST)));
    }

    #[test]
    fn host_name_uses_resolver() {
        let resolver =
            StaticResolver::new().with_host("db.local", IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)));
        let spec = PortSpec::parse("db.local:5432:5432", &Properties::new(), &resolver).unwrap();
        assert_eq!(
            spec.host_ip,
            HostIp::Static(IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)))
        );
    }

    #[test]
    fn unresolvable_host_is_rejected() {
        let err = parse("does-not-exist.pvt:80:80").unwrap_err();
        match err {
            DockportError::InvalidPortSpec { spec, reason } => {
                assert_eq!(spec, "does-not-exist.pvt:80:80");
                assert!(reason.contains("does-not-exist.pvt"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn deferred_host_ip() {
        let props = Properties::new().with_project("other.ip", "127.0.0.1");
        let spec = parse_with("+other.ip:${other.port}:5678", &props);
        assert_eq!(
            spec.host_ip,
            HostIp::Deferred(Variable::Pending("other.ip".to_string()))
        );
    }

    #[test]
    fn eager_host_ip_uses_engine_address() {
        let props = Properties::new().with_project(ENGINE_HOST_ADDRESS_PROPERTY, "1.2.3.4");
        let spec = parse_with("${other.ip}:5677:5677", &props);
        assert_eq!(
            spec.host_ip,
            HostIp::Eager(Variable::Resolved {
                name: "other.ip".to_string(),
                value: "1.2.3.4".to_string(),
            })
        );

        let spec = parse("${other.ip}:5677:5677").unwrap();
        assert_eq!(
            spec.host_ip,
            HostIp::Eager(Variable::Pending("other.ip".to_string()))
        );
    }

    #[test]
    fn empty_variable_names_are_rejected() {
        assert!(parse("+:80:80").is_err());
        assert!(parse("${}:80:80").is_err());
        assert!(parse("${}:80").is_err());
    }

    #[test]
    fn variable_resolve_keeps_first_value() {
        let mut var = Variable::Pending("p".to_string());
        assert!(var.resolve(1u32));
        assert!(!var.resolve(2));
        assert_eq!(var.value(), Some(&1));
        assert_eq!(var.name(), "p");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn valid_container_ports_parse(port in 1u32..=65535) {
                let spec = parse(&port.to_string()).unwrap();
                prop_assert_eq!(u32::from(spec.container_port()), port);
                prop_assert_eq!(spec.key(), format!("{port}/tcp"));
            }

            #[test]
            fn out_of_range_container_ports_fail(port in 65536u32..10_000_000) {
                let raw = format!("127.0.0.1:80:{port}");
                prop_assert!(parse(&raw).is_err());
            }

            #[test]
            fn fixed_host_port_round_trips(host in 1u32..=65535, container in 1u16..=65535) {
                let spec = parse(&format!("{host}:{container}/udp")).unwrap();
                prop_assert_eq!(&spec.host_port, &HostPort::Fixed(host));
                prop_assert_eq!(spec.protocol(), Protocol::Udp);
            }
        }
    }
}
