// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Core error type for Vigil operations
#[derive(Error, Debug, Diagnostic)]
pub enum VigilError {
    /// Interval string could not be parsed into a positive duration
    #[error("Invalid interval '{interval}': {reason}")]
    #[diagnostic(
        code(vigil::invalid_interval),
        help("Use a duration such as '30s', '5m' or '1h30m10s'. Units: ns, us, ms, s, m, h")
    )]
    InvalidInterval {
        #[allow(unused)]
        interval: String,
        #[allow(unused)]
        reason: String,
    },

    /// Unknown HTTP method
    #[error("Invalid HTTP method: {method}")]
    #[diagnostic(
        code(vigil::invalid_method),
        help("Supported methods: GET, POST, PUT, DELETE, PATCH, HEAD, OPTIONS")
    )]
    InvalidMethod {
        #[allow(unused)]
        method: String,
    },

    /// Unknown lifecycle status
    #[error("Invalid probe status: {status}")]
    #[diagnostic(code(vigil::invalid_status), help("Use 'start' or 'stop'"))]
    InvalidStatus {
        #[allow(unused)]
        status: String,
    },

    /// Probe definition not found
    #[error("Probe definition not found: {id}")]
    #[diagnostic(
        code(vigil::definition_not_found),
        help("List existing probes with `vigil probe list`")
    )]
    DefinitionNotFound {
        #[allow(unused)]
        id: u64,
    },

    /// Serialization error
    #[error("Serialization error: {message}")]
    #[diagnostic(
        code(vigil::serialization_error),
        help("Ensure the payload is a JSON-encoded probe definition")
    )]
    SerializationError {
        #[allow(unused)]
        message: String,
        #[source]
        #[allow(unused)]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal error
    #[error("Internal error: {message}")]
    #[diagnostic(
        code(vigil::internal_error),
        help("This is likely a bug. Please report it with the full error details")
    )]
    InternalError {
        #[allow(unused)]
        message: String,
    },
}

/// Result type alias for Vigil operations
pub type Result<T> = std::result::Result<T, VigilError>;

impl VigilError {
    /// Create an InvalidInterval error
    pub fn invalid_interval(interval: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInterval {
            interval: interval.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidMethod error
    pub fn invalid_method(method: impl Into<String>) -> Self {
        Self::InvalidMethod {
            method: method.into(),
        }
    }

    /// Create an InvalidStatus error
    pub fn invalid_status(status: impl Into<String>) -> Self {
        Self::InvalidStatus {
            status: status.into(),
        }
    }

    /// Create a DefinitionNotFound error
    pub fn definition_not_found(id: u64) -> Self {
        Self::DefinitionNotFound { id }
    }

    /// Create a SerializationError
    pub fn serialization_error(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::SerializationError {
            message: message.into(),
            source,
        }
    }

    /// Create an InternalError
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}
