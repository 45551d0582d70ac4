//! Error taxonomy for a single invocation.

use thiserror::Error;

use super::outcome::{Stage, VerificationResult};

/// Every way an invocation can fail. Rendered into the 400 diagnostic body.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SitehookError {
    #[error("verify stage failed: {0}")]
    VerificationFailure(VerificationResult),

    #[error("provisioning failed: {0}")]
    ProvisioningFailure(String),

    #[error("{stage} stage failed: {detail}")]
    PipelineStageFailure { stage: Stage, detail: String },

    #[error("unexpected failure: {0}")]
    UnexpectedFailure(String),
}

impl SitehookError {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            SitehookError::VerificationFailure(_) => Some(Stage::Verify),
            SitehookError::PipelineStageFailure { stage, .. } => Some(*stage),
            SitehookError::ProvisioningFailure(_) | SitehookError::UnexpectedFailure(_) => None,
        }
    }
}
