//! Error taxonomy for the import and merge engine
//!
//! Remote failures are split into transient network errors (retried) and
//! API errors (never retried). Persistence errors are caught per project by
//! callers; validation errors are raised before any work starts.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, SyncError>;

/// Coarse classification used to decide whether an error may be retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TransientNetwork,
    RemoteApi,
    Persistence,
    Validation,
    Credential,
    Config,
}

/// Errors raised by the sync and merge engine
#[derive(Debug, Error)]
pub enum SyncError {
    /// Timeout or connection failure talking to the hosting API
    #[error("Network error: {0}")]
    TransientNetwork(String),

    /// Non-network failure reported by the hosting API (auth, rate limit, not found, bad payload)
    #[error("GitHub API error: {0}")]
    RemoteApi(String),

    /// Reading, writing or (de)serializing a project file failed
    #[error("Failed to {action} {path:?}: {message}")]
    Persistence {
        action: &'static str,
        path: PathBuf,
        message: String,
    },

    /// Unknown filter field, sort key or enumeration value
    #[error("Invalid input: {0}")]
    Validation(String),

    /// No usable API token could be resolved
    #[error("Credential error: {0}")]
    Credential(String),

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::TransientNetwork(_) => ErrorKind::TransientNetwork,
            SyncError::RemoteApi(_) => ErrorKind::RemoteApi,
            SyncError::Persistence { .. } => ErrorKind::Persistence,
            SyncError::Validation(_) => ErrorKind::Validation,
            SyncError::Credential(_) => ErrorKind::Credential,
            SyncError::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether a retry policy is allowed to try the operation again
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::TransientNetwork
    }

    pub(crate) fn persistence(
        action: &'static str,
        path: impl Into<PathBuf>,
        err: impl std::fmt::Display,
    ) -> Self {
        SyncError::Persistence {
            action,
            path: path.into(),
            message: err.to_string(),
        }
    }
}

impl From<octocrab::Error> for SyncError {
    fn from(err: octocrab::Error) -> Self {
        match err {
            // Transport level failures: refused connections, resets, timeouts
            octocrab::Error::Hyper { .. } | octocrab::Error::Service { .. } => {
                SyncError::TransientNetwork(err.to_string())
            }
            other => SyncError::RemoteApi(other.to_string()),
        }
    }
}
