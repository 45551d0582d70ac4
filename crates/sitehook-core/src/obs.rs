//! Structured lifecycle events for one invocation.
//!
//! Every invocation gets an [`InvocationSpan`] tagged with a fresh id; the
//! `emit_*` helpers log the milestones inside it. Events are `info!` except
//! failures, which are `warn!`.

use chrono::{DateTime, Utc};
use tracing::{info, warn, Span};
use uuid::Uuid;

use crate::domain::{InboundEvent, Stage, VerificationResult};
use crate::verify::SIGNATURE_HEADER;

/// Span covering a single invocation, tagged with its handler and id.
///
/// Async callers attach it with `tracing::Instrument`; holding an entered
/// span across `.await` would make the future `!Send`.
#[derive(Debug, Clone)]
pub struct InvocationSpan {
    id: Uuid,
    started_at: DateTime<Utc>,
    span: Span,
}

impl InvocationSpan {
    pub fn new(handler: &str) -> Self {
        let id = Uuid::new_v4();
        let started_at = Utc::now();
        let span = tracing::info_span!(
            "sitehook.invocation",
            handler = %handler,
            invocation_id = %id,
            started_at = %started_at.to_rfc3339(),
        );
        Self {
            id,
            started_at,
            span,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

/// Event received. The signature header is never logged.
pub fn emit_invocation_received(event: &InboundEvent) {
    let headers = event.headers_without(&[SIGNATURE_HEADER]);
    info!(
        event = "invocation.received",
        method = event.method().unwrap_or("-"),
        headers = ?headers,
        body_len = event.body_len(),
    );
}

pub fn emit_verification_completed(result: &VerificationResult) {
    if result.is_verified() {
        info!(event = "verification.completed", verified = true);
    } else {
        warn!(event = "verification.completed", verified = false, result = %result);
    }
}

pub fn emit_stage_started(stage: Stage) {
    info!(event = "stage.started", stage = %stage);
}

pub fn emit_stage_finished(stage: Stage, duration_ms: u64, success: bool) {
    if success {
        info!(event = "stage.finished", stage = %stage, duration_ms, success);
    } else {
        warn!(event = "stage.finished", stage = %stage, duration_ms, success);
    }
}

pub fn emit_publish_completed(uploaded: usize, deleted: usize, unchanged: usize) {
    info!(event = "publish.completed", uploaded, deleted, unchanged);
}

/// Invocation finished; `status_code` is what the caller will see.
pub fn emit_invocation_finished(status_code: u16, duration_ms: u64) {
    info!(event = "invocation.finished", status_code, duration_ms);
}

/// Milliseconds since `started`, saturating.
pub fn elapsed_ms(started: std::time::Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Unexpected fault caught at the boundary.
pub fn emit_unexpected_failure(detail: &dyn std::fmt::Display) {
    tracing::error!(event = "invocation.unexpected_failure", detail = %detail);
}
