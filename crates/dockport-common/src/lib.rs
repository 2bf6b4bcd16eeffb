//! # dockport-common
//!
//! Shared utilities and types for the Dockport tools.
//!
//! This crate provides functionality used across all Dockport crates:
//! - Common error types
//! - Layered property lookup used for variable pre-resolution

#![warn(missing_docs)]

pub mod error;
pub mod properties;

pub use error::{DockportError, DockportResult};
pub use properties::Properties;
