//! Common error types for Dockport.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`DockportError`].
pub type DockportResult<T> = Result<T, DockportError>;

/// Common errors across Dockport.
#[derive(Error, Diagnostic, Debug)]
pub enum DockportError {
    /// A port mapping specification could not be parsed or resolved.
    #[error("Invalid port mapping '{spec}': {reason}")]
    #[diagnostic(
        code(dockport::port::invalid_spec),
        help("Use '[[host-ip:]host-port:]container-port[/tcp|udp]'")
    )]
    InvalidPortSpec {
        /// The raw specification as given by the user.
        spec: String,
        /// The rule that was violated.
        reason: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(dockport::io))]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    #[diagnostic(code(dockport::serialization))]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(dockport::config))]
    Config {
        /// The error message.
        message: String,
    },
}

impl DockportError {
    /// Build an [`DockportError::InvalidPortSpec`] for the given raw spec.
    pub fn invalid_spec(spec: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPortSpec {
            spec: spec.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for DockportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for DockportError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
