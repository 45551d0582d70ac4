//! Request verification.
//!
//! Two variants share one contract: given an inbound event, produce a
//! [`VerificationResult`]. Both fail closed; anything that cannot be decoded
//! or checked is a rejection, never `Verified`.

pub mod captcha;
pub mod signature;

use async_trait::async_trait;

use crate::domain::{InboundEvent, VerificationResult};

pub use captcha::{
    extract_token, CaptchaVerifier, HttpSiteVerifyClient, SiteVerifyClient, SiteVerifyResponse,
    VerifyTransportError, TOKEN_FIELD,
};
pub use signature::{compute_signature, SignatureVerifier, SIGNATURE_HEADER};

/// Authenticates an inbound event before any pipeline stage runs.
#[async_trait]
pub trait RequestVerifier: Send + Sync {
    async fn verify(&self, event: &InboundEvent) -> VerificationResult;
}
