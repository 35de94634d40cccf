//! Core error taxonomy.
//!
//! One enum, one variant per error name in the external interface (spec
//! section 6's error taxonomy table). Every module defines its own narrower
//! error type and converts into `CoreError` at its public boundary, the way
//! `crypto::CryptoError` aggregates `HashError`/`KeyError`/... in the
//! teacher's crypto module.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("invalid token")]
    InvalidToken,

    #[error("invalid role: {0}")]
    InvalidRole(String),

    #[error("permission denied: missing {permission}")]
    PermissionDenied { permission: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("disabled: {0}")]
    Disabled(String),

    #[error("already exists: {0}")]
    Exists(String),

    #[error("partial installation: {0}")]
    PartialInstallation(String),

    #[error("corrupt state: {0}")]
    CorruptState(String),

    #[error("busy: could not acquire lock on {resource} within timeout")]
    Busy { resource: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("crypto error: {0}")]
    Crypto(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn permission_denied(permission: impl Into<String>) -> Self {
        CoreError::PermissionDenied {
            permission: permission.into(),
        }
    }

    pub fn busy(resource: impl Into<String>) -> Self {
        CoreError::Busy {
            resource: resource.into(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::CorruptState(format!("malformed JSON document: {err}"))
    }
}
