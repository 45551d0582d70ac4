//! Sitehook Build - the webhook-triggered build and publish pipeline
//!
//! Provides:
//! - A process runner that executes external tools with the provisioned toolchain
//! - A build orchestrator (fetch, then generate) over the scratch workspace
//! - A publisher that reconciles the content store with the generated site
//! - The warm environment and the build handler that ties them together

pub mod environment;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod publish;
pub mod runner;
pub mod workspace;

// Re-export key types
pub use environment::{SiteDestination, WarmEnvironment};
pub use error::{BuildError, EnvironmentError, PublishError, RunnerError};
pub use orchestrator::{BuildOrchestrator, BuildState, StageFailure};
pub use pipeline::{BuildPipeline, BuildSummary};
pub use publish::{
    plan_sync, scan_tree, LocalFile, PublishSummary, PublishTarget, Publisher, SyncPlan,
};
pub use runner::{CommandOutput, CommandSpec, ProcessRunner};
pub use workspace::WorkspacePaths;
