//! Datastore-relative file path parsing.
//!
//! VM configuration files are reported by the platform in the
//! `[datastore-name] dir/file.vmx` form. The orchestration layer
//! needs both halves: the datastore name to resolve the backing
//! datastore, and the relative path to store as the VMX path.

use std::fmt;

use crate::error::{PlatformError, Result};

/// A file path qualified by the datastore that holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatastorePath {
    /// Name of the datastore (the part in brackets).
    pub datastore: String,
    /// Path relative to the datastore root.
    pub path: String,
}

impl DatastorePath {
    /// Parse a `[datastore] relative/path` string.
    ///
    /// # Errors
    /// Returns `InvalidRequest` when the input does not carry a
    /// bracketed datastore component.
    pub fn parse(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix('[')
            .ok_or_else(|| bad_path(s))?;
        let (datastore, path) = rest.split_once(']').ok_or_else(|| bad_path(s))?;
        if datastore.is_empty() {
            return Err(bad_path(s));
        }
        Ok(Self {
            datastore: datastore.to_string(),
            path: path.trim_start().to_string(),
        })
    }
}

impl fmt::Display for DatastorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.datastore, self.path)
    }
}

fn bad_path(s: &str) -> PlatformError {
    PlatformError::InvalidRequest(format!("could not parse datastore path {s:?}"))
}
