//! Error types for sitehook-build

use std::path::PathBuf;

use sitehook_store::StoreError;
use sitehook_toolchain::ProvisioningError;
use thiserror::Error;

/// The process could not be run at all. A non-zero exit is not an error here.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot build command environment: {0}")]
    Environment(#[from] ProvisioningError),
}

/// A fetch or generate step failed
#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error("{command} exited with status {code}: {output_tail}")]
    NonZeroExit {
        command: String,
        code: i32,
        output_tail: String,
    },

    #[error("no checkout at {}; pull mode needs the checkout primed at warm-up", path.display())]
    MissingCheckout { path: PathBuf },

    #[error("workspace error at {}: {source}", path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Publishing the generated tree failed
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("cannot read output tree {}: {reason}", path.display())]
    Scan { path: PathBuf, reason: String },

    #[error("content store {operation} failed for {key}: {source}")]
    Store {
        operation: &'static str,
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("listing content store failed: {0}")]
    List(#[source] StoreError),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error("sync CLI exited with status {code}: {output_tail}")]
    SyncCli { code: i32, output_tail: String },

    #[error("unsupported publish configuration: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Warm-up failed; the environment must not serve requests
#[derive(Error, Debug)]
pub enum EnvironmentError {
    #[error("provisioning failed: {0}")]
    Provisioning(#[from] ProvisioningError),

    #[error("store setup failed: {0}")]
    Store(#[from] StoreError),

    #[error("workspace setup failed: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("priming checkout failed: {0}")]
    Prime(#[source] BuildError),

    #[error("publisher setup failed: {0}")]
    Publisher(#[source] PublishError),
}

/// Last `lines` lines of captured output, for diagnostics.
pub(crate) fn tail(output: &str, lines: usize) -> String {
    let all: Vec<&str> = output.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join(" | ")
}
