//! Signed-webhook verification (`X-Hub-Signature: sha1=<hex hmac>`).

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;
use tracing::warn;

use super::RequestVerifier;
use crate::domain::{InboundEvent, VerificationResult};
use crate::secrets::SecretString;

type HmacSha1 = Hmac<Sha1>;

/// Header carrying the webhook signature
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature";

/// `"sha1=" + hex(HMAC-SHA1(secret, body))`.
///
/// Returns `None` only if the MAC cannot be keyed, which callers treat as a
/// mismatch.
pub fn compute_signature(secret: &[u8], body: &[u8]) -> Option<String> {
    let mut mac = HmacSha1::new_from_slice(secret).ok()?;
    mac.update(body);
    Some(format!("sha1={}", hex::encode(mac.finalize().into_bytes())))
}

fn constant_time_str_eq(a: &str, b: &str) -> bool {
    bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

/// Verifies webhook deliveries against a pre-shared secret.
///
/// The HMAC is computed over the body bytes exactly as received. Only after
/// the signature matches is the body checked to be JSON; a body that does not
/// decode is still rejected.
pub struct SignatureVerifier {
    secret: SecretString,
}

impl SignatureVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }
}

#[async_trait]
impl RequestVerifier for SignatureVerifier {
    async fn verify(&self, event: &InboundEvent) -> VerificationResult {
        let Some(header) = event.header(SIGNATURE_HEADER) else {
            warn!(event = "verification.missing_header", header = SIGNATURE_HEADER);
            return VerificationResult::MalformedRequest(format!("missing {SIGNATURE_HEADER} header"));
        };

        let body = match event.body_bytes() {
            Ok(body) => body,
            Err(e) => return VerificationResult::MalformedRequest(e.to_string()),
        };

        if self.secret.is_empty() {
            return VerificationResult::SignatureMismatch;
        }
        let Some(expected) = compute_signature(self.secret.expose().as_bytes(), &body) else {
            return VerificationResult::SignatureMismatch;
        };
        if !constant_time_str_eq(&expected, header) {
            return VerificationResult::SignatureMismatch;
        }

        if serde_json::from_slice::<serde_json::Value>(&body).is_err() {
            return VerificationResult::MalformedRequest("body is not valid JSON".to_string());
        }

        VerificationResult::Verified
    }
}
