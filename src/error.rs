//! Error types for the MCP Registry Operator
//!
//! Provides structured error types for registry lifecycle, source resolution,
//! endpoint fetching, server attachment, and the admin API.

use std::time::Duration;
use thiserror::Error;

/// Unified error type for the operator
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Kubernetes Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Resource not found: {kind}/{name}")]
    ResourceNotFound { kind: String, name: String },

    #[error("Resource already exists: {kind}/{name}")]
    ResourceExists { kind: String, name: String },

    // =========================================================================
    // Registry Lifecycle Errors
    // =========================================================================
    #[error("Sync already in progress for registry {registry}")]
    SyncInProgress { registry: String },

    #[error("Registry {registry} still owns {count} server(s); detach or remove them first")]
    RegistryHasDependents { registry: String, count: usize },

    #[error("Server {server} is already attached to registry {registry}")]
    AlreadyAttached { server: String, registry: String },

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid filter pattern '{pattern}': {reason}")]
    InvalidFilterPattern { pattern: String, reason: String },

    #[error("Duration parse error: {0}")]
    DurationParse(String),

    // =========================================================================
    // Source Resolution Errors
    // =========================================================================
    #[error("No endpoint could be resolved for registry {registry}: {reason}")]
    NoEndpoint { registry: String, reason: String },

    // =========================================================================
    // Fetch Errors
    // =========================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Fetch from {endpoint} failed: {reason}")]
    FetchFailed { endpoint: String, reason: String },

    #[error("Endpoint {endpoint} returned HTTP {status}")]
    UpstreamStatus { endpoint: String, status: u16 },

    #[error("Invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("{operation} timed out after {duration:?}")]
    Timeout { operation: String, duration: Duration },

    // =========================================================================
    // Response Errors
    // =========================================================================
    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error taxonomy shared by the state machine and the admin API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Duplicate name, sync already in progress, delete-with-dependents
    Conflict,
    /// Registry, server or endpoint absent
    NotFound,
    /// Malformed input rejected before any state changes
    InvalidArgument,
    /// No endpoint derivable for a registry
    ResolutionFailure,
    /// Network error, non-2xx, timeout
    FetchFailure,
    /// Unparseable or unrecognized payload
    InvalidResponse,
    /// Anything else
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Conflict => write!(f, "conflict"),
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::InvalidArgument => write!(f, "invalid_argument"),
            ErrorKind::ResolutionFailure => write!(f, "resolution_failure"),
            ErrorKind::FetchFailure => write!(f, "fetch_failure"),
            ErrorKind::InvalidResponse => write!(f, "invalid_response"),
            ErrorKind::Internal => write!(f, "internal"),
        }
    }
}

impl Error {
    /// Classify this error into the operator's error taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ResourceExists { .. }
            | Error::SyncInProgress { .. }
            | Error::RegistryHasDependents { .. }
            | Error::AlreadyAttached { .. } => ErrorKind::Conflict,

            Error::ResourceNotFound { .. } => ErrorKind::NotFound,

            Error::InvalidArgument(_)
            | Error::InvalidFilterPattern { .. }
            | Error::DurationParse(_) => ErrorKind::InvalidArgument,

            Error::NoEndpoint { .. } => ErrorKind::ResolutionFailure,

            Error::Http(_)
            | Error::FetchFailed { .. }
            | Error::UpstreamStatus { .. }
            | Error::InvalidEndpoint { .. }
            | Error::Timeout { .. } => ErrorKind::FetchFailure,

            Error::InvalidResponse { .. } | Error::JsonParse(_) => ErrorKind::InvalidResponse,

            Error::Kube(kube::Error::Api(resp)) if resp.code == 404 => ErrorKind::NotFound,
            Error::Kube(kube::Error::Api(resp)) if resp.code == 409 => ErrorKind::Conflict,
            Error::Kube(_) => ErrorKind::FetchFailure,

            Error::Internal(_) | Error::Configuration(_) | Error::Io(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status code the admin API reports for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Timeout { .. } => 504,
            _ => match self.kind() {
                ErrorKind::Conflict => 409,
                ErrorKind::NotFound => 404,
                ErrorKind::InvalidArgument => 400,
                ErrorKind::ResolutionFailure
                | ErrorKind::FetchFailure
                | ErrorKind::InvalidResponse => 502,
                ErrorKind::Internal => 500,
            },
        }
    }

    /// Check if retrying the same operation later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::FetchFailure | ErrorKind::InvalidResponse | ErrorKind::ResolutionFailure
        ) || matches!(self, Error::SyncInProgress { .. })
    }

    /// Build a timeout error for the named operation
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Error::Timeout {
            operation: operation.into(),
            duration,
        }
    }
}

/// Result type alias for the operator
pub type Result<T> = std::result::Result<T, Error>;
