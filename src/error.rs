//! Error types for credential store operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;

/// Errors that can occur while reading or mutating the credential store.
#[derive(Debug, Error)]
pub enum VaultError {
    /// A required file does not exist.
    #[error("configuration missing: {}", .0.display())]
    ConfigMissing(PathBuf),

    /// The credential document exists but does not have the expected shape.
    #[error("corrupt credential store {}: {reason}", path.display())]
    CorruptStore { path: PathBuf, reason: String },

    #[error("invalid username '{username}': {reason}")]
    InvalidUsername { username: String, reason: String },

    #[error("invalid secret: {0}")]
    InvalidSecret(String),

    #[error("invalid validity: {0}")]
    InvalidValidity(String),

    #[error("credential already exists: {0}")]
    DuplicateCredential(String),

    #[error("credential not found: {0}")]
    CredentialNotFound(String),

    /// Writing or replacing the credential document failed.
    #[error("persist {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading or rewriting the expiry ledger failed.
    #[error("ledger {}: {source}", path.display())]
    Ledger {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The daemon restart failed or timed out.
    #[error("service reload failed: {0}")]
    ServiceReload(String),

    #[error("acquire lock {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings {}: {reason}", path.display())]
    Settings { path: PathBuf, reason: String },
}

impl VaultError {
    pub(crate) fn invalid_username(username: &str, reason: impl Into<String>) -> Self {
        VaultError::InvalidUsername {
            username: username.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupt(path: &std::path::Path, reason: impl Into<String>) -> Self {
        VaultError::CorruptStore {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}
