//! Verification results and pipeline outcomes.

use serde::{Deserialize, Serialize};

use super::error::SitehookError;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Verify,
    Fetch,
    Build,
    Publish,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Verify => "verify",
            Stage::Fetch => "fetch",
            Stage::Build => "build",
            Stage::Publish => "publish",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of authenticating an inbound request.
///
/// Only `Verified` lets a pipeline proceed; every other variant is a
/// rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationResult {
    Verified,
    /// HMAC did not match, or the signature header was not in `sha1=<hex>` form
    SignatureMismatch,
    /// The external verification service answered and said no
    UpstreamRejected(String),
    /// The external verification service could not be consulted
    UpstreamUnreachable,
    /// The request could not be decoded far enough to verify
    MalformedRequest(String),
}

impl VerificationResult {
    pub fn is_verified(&self) -> bool {
        matches!(self, VerificationResult::Verified)
    }
}

impl std::fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationResult::Verified => f.write_str("verified"),
            VerificationResult::SignatureMismatch => f.write_str("signature mismatch"),
            VerificationResult::UpstreamRejected(reason) => {
                write!(f, "rejected by verification service: {reason}")
            }
            VerificationResult::UpstreamUnreachable => {
                f.write_str("verification service unreachable")
            }
            VerificationResult::MalformedRequest(reason) => write!(f, "malformed request: {reason}"),
        }
    }
}

/// Result of one invocation, turned into exactly one response envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// JSON payload returned to the caller
    Success(serde_json::Value),
    Failure(SitehookError),
}

impl PipelineOutcome {
    /// Failure attributed to a pipeline stage.
    pub fn stage_failure(stage: Stage, detail: impl Into<String>) -> Self {
        PipelineOutcome::Failure(SitehookError::PipelineStageFailure {
            stage,
            detail: detail.into(),
        })
    }

    /// Failure because the request did not verify.
    pub fn rejected(result: VerificationResult) -> Self {
        PipelineOutcome::Failure(SitehookError::VerificationFailure(result))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Success(_))
    }

    /// Stage the failure is attributed to, if any.
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            PipelineOutcome::Success(_) => None,
            PipelineOutcome::Failure(err) => err.stage(),
        }
    }
}
