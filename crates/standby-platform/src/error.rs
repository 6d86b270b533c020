//! Error types for the platform client boundary.

use thiserror::Error;

/// Result type alias for platform calls.
pub type Result<T> = std::result::Result<T, PlatformError>;

/// Errors returned by the virtualization platform.
#[derive(Debug, Clone, Error)]
pub enum PlatformError {
    /// The identifier resolved to nothing on the platform.
    ///
    /// This is a definitive answer, not a transient failure: the
    /// object does not exist. Callers on read paths react by clearing
    /// their state.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Object kind ("virtual machine", "datastore", ...)
        kind: &'static str,
        /// The identifier that failed to resolve
        id: String,
    },

    /// A long-running platform task completed with an error payload.
    #[error("task {task} failed: {message}")]
    TaskFailed {
        /// Task identifier
        task: String,
        /// Error payload reported by the platform
        message: String,
    },

    /// The platform rejected the request outright.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Transient remote fault (connection drop, server busy, ...).
    ///
    /// Retryable by the caller's own policy; the client never retries
    /// internally.
    #[error("platform fault: {0}")]
    Fault(String),
}

impl PlatformError {
    /// Construct a not-found error for a virtual machine identifier.
    pub fn vm_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "virtual machine",
            id: id.into(),
        }
    }

    /// Whether this error is a definitive not-found answer.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
