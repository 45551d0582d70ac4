//! The build handler: verify, build, publish, respond.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use sitehook_core::obs::{self, InvocationSpan};
use sitehook_core::{
    guard_invocation, BuildConfig, InboundEvent, PipelineOutcome, RequestVerifier,
    ResponseEnvelope, ResponseFormatter, SignatureVerifier, SitehookError, VerificationResult,
};
use tracing::Instrument;

use crate::environment::WarmEnvironment;
use crate::publish::PublishSummary;

/// Success body of a build invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub result: &'static str,
    pub published: PublishSummary,
    pub duration_ms: u64,
}

/// Handles signed webhook deliveries against one warm environment.
pub struct BuildPipeline {
    verifier: Box<dyn RequestVerifier>,
    environment: Arc<WarmEnvironment>,
    formatter: ResponseFormatter,
}

impl BuildPipeline {
    pub fn new(verifier: Box<dyn RequestVerifier>, environment: Arc<WarmEnvironment>) -> Self {
        let formatter = ResponseFormatter::json().with_redactor(environment.redactor().clone());
        Self {
            verifier,
            environment,
            formatter,
        }
    }

    /// Pipeline verifying `X-Hub-Signature` with the configured secret.
    pub fn from_config(config: &BuildConfig, environment: Arc<WarmEnvironment>) -> Self {
        let verifier = SignatureVerifier::new(config.webhook_secret.clone());
        Self::new(Box::new(verifier), environment)
    }

    /// Handle one event, producing exactly one envelope.
    pub async fn handle(&self, event: &InboundEvent) -> ResponseEnvelope {
        let invocation = InvocationSpan::new("build");
        async {
            let started = Instant::now();
            obs::emit_invocation_received(event);

            let outcome = guard_invocation(self.run(event)).await;
            let envelope = self.formatter.format(&outcome);

            obs::emit_invocation_finished(envelope.status_code, obs::elapsed_ms(started));
            envelope
        }
        .instrument(invocation.span().clone())
        .await
    }

    /// Handle a raw gateway event. An unparseable envelope is rejected as
    /// malformed.
    pub async fn handle_raw(&self, raw: &str) -> ResponseEnvelope {
        match InboundEvent::from_json(raw) {
            Ok(event) => self.handle(&event).await,
            Err(e) => self.formatter.format(&PipelineOutcome::rejected(
                VerificationResult::MalformedRequest(e.to_string()),
            )),
        }
    }

    /// Nothing past verification runs unless the event verifies.
    pub async fn run(&self, event: &InboundEvent) -> PipelineOutcome {
        let started = Instant::now();

        let verification = self.verifier.verify(event).await;
        obs::emit_verification_completed(&verification);
        if !verification.is_verified() {
            return PipelineOutcome::rejected(verification);
        }

        match self.environment.run_build().await {
            Ok(published) => {
                let summary = BuildSummary {
                    result: "Success",
                    published,
                    duration_ms: obs::elapsed_ms(started),
                };
                match serde_json::to_value(summary) {
                    Ok(body) => PipelineOutcome::Success(body),
                    Err(e) => PipelineOutcome::Failure(SitehookError::UnexpectedFailure(
                        e.to_string(),
                    )),
                }
            }
            Err(err) => PipelineOutcome::Failure(err),
        }
    }
}
