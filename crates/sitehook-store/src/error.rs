//! Error types for sitehook-store

use thiserror::Error;

/// Errors that can occur while talking to a resource or content store
#[derive(Error, Debug)]
pub enum StoreError {
    /// The named object does not exist in the store
    #[error("object not found: {key}")]
    NotFound { key: String },

    /// The store could not be reached at all
    #[error("store unreachable: {reason}")]
    Unreachable { reason: String },

    /// A key was empty, absolute, or escaped the store root
    #[error("invalid object key: {key}")]
    InvalidKey { key: String },

    /// A store location string could not be interpreted
    #[error("invalid store location: {location}")]
    InvalidLocation { location: String },

    /// The store answered with an unexpected HTTP status
    #[error("store returned HTTP {status} for {key}")]
    HttpStatus { status: u16, key: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Unreachable {
            reason: err.to_string(),
        }
    }
}
