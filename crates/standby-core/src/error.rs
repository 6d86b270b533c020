//! Error types for lifecycle orchestration.

use std::time::Duration;

use standby_platform::PlatformError;
use thiserror::Error;

/// Result type alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, LifecycleError>;

/// Errors surfaced by lifecycle operations.
///
/// Components return these verbatim; only the lifecycle controller
/// decides recoverability (clear-and-continue on read paths versus
/// failing the operation).
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The identifier resolved to nothing on the platform.
    #[error("virtual machine not found: {id}")]
    NotFound {
        /// The identifier that failed to resolve
        id: String,
    },

    /// A bounded wait exceeded its timeout. Never downgraded to
    /// success.
    #[error("timed out after {elapsed:?} waiting for {stage}")]
    Timeout {
        /// The stage that timed out
        stage: &'static str,
        /// Time spent waiting
        elapsed: Duration,
    },

    /// A remote call was rejected or a platform task failed.
    #[error("platform error during {stage}: {source}")]
    Platform {
        /// The stage issuing the call
        stage: &'static str,
        /// The underlying platform error
        #[source]
        source: PlatformError,
    },

    /// Guest customization reported failure inside the guest.
    #[error("guest customization failed: {message}")]
    CustomizationFailed {
        /// Failure payload from the customization event
        message: String,
    },

    /// Cleanup after a partial failure also failed. Both causes are
    /// preserved.
    #[error("operation failed ({original}); rollback also failed ({cleanup})")]
    Rollback {
        /// The failure that triggered the rollback
        original: Box<LifecycleError>,
        /// The failure of the rollback itself
        cleanup: Box<LifecycleError>,
    },

    /// The VM has no resource pool, which customization requires.
    #[error("cannot find resource pool for virtual machine {vm}")]
    MissingResourcePool {
        /// Name or identifier of the VM
        vm: String,
    },

    /// Declarative input failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl LifecycleError {
    /// Whether this error means the VM definitively does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Attach a stage name to a platform error.
pub(crate) fn err_stage(stage: &'static str) -> impl FnOnce(PlatformError) -> LifecycleError {
    move |source| LifecycleError::Platform { stage, source }
}

/// Map a lookup failure: definitive not-found becomes `NotFound`,
/// anything else stays a platform error for the caller to retry.
pub(crate) fn locate_err(
    id: impl Into<String>,
    stage: &'static str,
) -> impl FnOnce(PlatformError) -> LifecycleError {
    let id = id.into();
    move |source| {
        if source.is_not_found() {
            LifecycleError::NotFound { id }
        } else {
            LifecycleError::Platform { stage, source }
        }
    }
}
