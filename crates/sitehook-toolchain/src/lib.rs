//! Sitehook-Toolchain: build tool provisioning
//!
//! Fetches a small, statically known set of tool artifacts (a VCS client
//! archive, a static-site generator binary, a sync CLI archive and an
//! optional syntax-highlighter package) from a resource store into a scratch
//! workspace, installs them, and describes the resulting search path.
//!
//! Provisioning runs once per warm environment, before the first request.

pub mod artifact;
pub mod bootstrap;
mod error;
pub mod toolchain;

pub use artifact::{standard_artifacts, ArtifactNames, InstallKind, ToolchainArtifact};
pub use bootstrap::{install_archive, mark_executable, ArchiveFormat, Bootstrapper};
pub use error::ProvisioningError;
pub use toolchain::Toolchain;

/// Result type for provisioning operations
pub type Result<T> = std::result::Result<T, ProvisioningError>;
