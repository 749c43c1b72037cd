//! Error types for the VTL lab client.
//!
//! One enum per layer:
//!
//! - [`ClientError`] - transport and backend protocol errors
//! - [`BindingError`] - malformed binding documents
//! - [`ConfigError`] - environment and case-file configuration errors
//! - [`LabError`] - top-level session errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

use crate::session::state::DisabledReason;

// =============================================================================
// Client Errors
// =============================================================================

/// Errors raised while talking to a lab backend.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request could not be sent or the connection dropped.
    #[error("HTTP request failed: {0}")]
    Transport(String),

    /// The request did not complete within the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// The backend answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The body could not be decoded as JSON.
    #[error("Invalid JSON response: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A URL could not be built from the base URL and a path.
    #[error("Invalid URL '{0}'")]
    InvalidUrl(String),

    /// The backend answered, but not with anything usable.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

// =============================================================================
// Binding Errors
// =============================================================================

/// Errors in binding documents supplied by the user.
#[derive(Debug, Error)]
pub enum BindingError {
    /// Bindings must be a JSON object keyed by binding name.
    #[error("Bindings must be a JSON object, got {0}")]
    NotAnObject(String),

    /// JSON error.
    #[error("Bindings JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable holds a value of the wrong shape.
    #[error("Invalid value for {name}: '{value}'")]
    InvalidValue { name: String, value: String },

    /// Unknown execution context name.
    #[error("Unknown execution context: {0}")]
    UnknownContext(String),

    /// IO error.
    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("Config JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Lab Errors (top-level)
// =============================================================================

/// Top-level errors returned by [`crate::session::Session`] and the CLI helpers.
///
/// Backend failures during a run are not errors at this level: they land in
/// the session outcome. `LabError` covers what prevents a run from starting.
#[derive(Debug, Error)]
pub enum LabError {
    /// Client error.
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// Binding error.
    #[error("Binding error: {0}")]
    Binding(#[from] BindingError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The run action is disabled in the current state.
    #[error("Execution disabled: {0}")]
    ExecutionDisabled(DisabledReason),

    /// The session event channel closed.
    #[error("Session closed")]
    Closed,
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Result type for binding operations.
pub type BindingResult<T> = Result<T, BindingError>;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for session operations.
pub type LabResult<T> = Result<T, LabError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let client_err = ClientError::Status { status: 502, body: "bad gateway".into() };
        let lab_err: LabError = client_err.into();
        assert!(lab_err.to_string().contains("502"));

        let config_err = ConfigError::UnknownContext("mainframe".into());
        let lab_err: LabError = config_err.into();
        assert!(lab_err.to_string().contains("mainframe"));
    }

    #[test]
    fn test_disabled_reason_format() {
        let err = LabError::ExecutionDisabled(DisabledReason::SyntaxErrors(2));
        let msg = err.to_string();
        assert!(msg.contains("Execution disabled"));
        assert!(msg.contains("2 syntax error"));
    }
}
