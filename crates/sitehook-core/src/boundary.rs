//! The invocation boundary: the one place unexpected faults are caught.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::domain::{PipelineOutcome, SitehookError};
use crate::obs;

/// Run one invocation, turning a panic anywhere inside it into
/// `Failure(UnexpectedFailure)` so the caller always gets an envelope.
pub async fn guard_invocation<F>(invocation: F) -> PipelineOutcome
where
    F: Future<Output = PipelineOutcome>,
{
    match AssertUnwindSafe(invocation).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => {
            let detail = panic_message(payload.as_ref());
            obs::emit_unexpected_failure(&detail);
            PipelineOutcome::Failure(SitehookError::UnexpectedFailure(detail))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
