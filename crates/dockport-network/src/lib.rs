//! # dockport-network
//!
//! Port mapping primitives for containers.
//!
//! A [`PortMapping`] is built from user supplied specifications such as
//! `"jolokia.port:8080"`, `"127.0.0.1:9090:9090"` or
//! `"+other.ip:${other.port}:5678"`. It provides the data needed to create a
//! container with the right port bindings, and is later updated with the
//! bindings the container engine actually assigned so that named variables
//! can be substituted elsewhere in the configuration.

#![warn(missing_docs)]

pub mod binding;
pub mod portmap;
pub mod resolve;
pub mod spec;
pub mod template;

pub use binding::{
    BindingReport, EmptyObject, HostBinding, PortBinding, PortBindingRecord, PortBindingsRequest,
};
pub use portmap::PortMapping;
pub use resolve::{AddressResolver, StaticResolver, SystemResolver};
pub use spec::{ENGINE_HOST_ADDRESS_PROPERTY, HostIp, HostPort, PortSpec, Protocol, Variable};
pub use template::substitute;
