//! Error types for sitehook-toolchain

use std::path::PathBuf;

use sitehook_store::StoreError;
use thiserror::Error;

/// Errors that can occur while provisioning the toolchain
#[derive(Error, Debug)]
pub enum ProvisioningError {
    /// Artifact missing from the resource store, or the store is unreachable
    #[error("resource unavailable: {name}: {source}")]
    ResourceUnavailable {
        name: String,
        #[source]
        source: StoreError,
    },

    /// Archive could not be unpacked
    #[error("failed to extract {}: {reason}", path.display())]
    Extraction { path: PathBuf, reason: String },

    /// Filesystem refused to set the execute bit
    #[error("permission denied marking {} executable", path.display())]
    PermissionDenied { path: PathBuf },

    /// A tool directory cannot be placed on the search path
    #[error("invalid search path entry: {0}")]
    InvalidSearchPath(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
