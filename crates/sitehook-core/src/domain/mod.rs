//! Domain model: inbound events, verification results, pipeline outcomes.

pub mod error;
pub mod event;
pub mod outcome;

pub use error::SitehookError;
pub use event::{EventError, InboundEvent};
pub use outcome::{PipelineOutcome, Stage, VerificationResult};
