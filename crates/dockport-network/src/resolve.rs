//! Host name to address resolution.
//!
//! Literal host fields in a port specification are turned into addresses
//! through an [`AddressResolver`], so tests can supply deterministic answers
//! instead of depending on the system resolver.

use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, ToSocketAddrs};

/// Resolves a host name to a single address.
pub trait AddressResolver {
    /// Resolve `host` to an address.
    ///
    /// # Errors
    ///
    /// Returns an error if the name cannot be resolved.
    fn resolve(&self, host: &str) -> io::Result<IpAddr>;
}

impl<F> AddressResolver for F
where
    F: Fn(&str) -> io::Result<IpAddr>,
{
    fn resolve(&self, host: &str) -> io::Result<IpAddr> {
        self(host)
    }
}

/// Resolver backed by the system name service.
///
/// IPv4 results are preferred, matching what the engine accepts as a bind
/// address for published ports.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl AddressResolver for SystemResolver {
    fn resolve(&self, host: &str) -> io::Result<IpAddr> {
        let addrs: Vec<IpAddr> = (host, 0).to_socket_addrs()?.map(|a| a.ip()).collect();

        tracing::trace!(host, ?addrs, "Resolved host name");

        addrs
            .iter()
            .copied()
            .find(IpAddr::is_ipv4)
            .or_else(|| addrs.first().copied())
            .ok_or_else(|| not_found(host))
    }
}

/// Resolver answering from a fixed table.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    hosts: HashMap<String, IpAddr>,
}

impl StaticResolver {
    /// Create a resolver that knows no names.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an address for `host`.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>, addr: IpAddr) -> Self {
        self.hosts.insert(host.into(), addr);
        self
    }
}

impl AddressResolver for StaticResolver {
    fn resolve(&self, host: &str) -> io::Result<IpAddr> {
        self.hosts.get(host).copied().ok_or_else(|| not_found(host))
    }
}

fn not_found(host: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no address found for '{host}'"),
    )
}
