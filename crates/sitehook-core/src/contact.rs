//! The contact-form handler.
//!
//! Verifies a CAPTCHA token and, only when it checks out, returns the site
//! owner's contact details. The CAPTCHA secret is decrypted once at warm-up.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::Instrument;

use crate::boundary::guard_invocation;
use crate::config::ContactConfig;
use crate::domain::{InboundEvent, PipelineOutcome, SitehookError, VerificationResult};
use crate::obs::{self, InvocationSpan};
use crate::response::{CorsPolicy, Redactor, ResponseEnvelope, ResponseFormatter};
use crate::secrets::{decode_ciphertext, DecryptError, KeyDecryptor};
use crate::verify::{extract_token, CaptchaVerifier, RequestVerifier, SiteVerifyClient};

/// Returned to a verified visitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactInfo {
    pub email_address: String,
    pub phone_number: String,
}

/// Contact handler bound to one warm environment.
pub struct ContactHandler {
    verifier: CaptchaVerifier,
    formatter: ResponseFormatter,
    info: ContactInfo,
}

impl ContactHandler {
    pub fn new(verifier: CaptchaVerifier, formatter: ResponseFormatter, info: ContactInfo) -> Self {
        Self {
            verifier,
            formatter,
            info,
        }
    }

    /// Decrypt the CAPTCHA secret and assemble the handler.
    ///
    /// Fails, and the environment must not serve, if decryption fails.
    pub async fn warm_up(
        config: &ContactConfig,
        decryptor: &dyn KeyDecryptor,
        client: Arc<dyn SiteVerifyClient>,
    ) -> Result<Self, DecryptError> {
        let ciphertext = decode_ciphertext(&config.captcha_secret_ciphertext)?;
        let secret = decryptor.decrypt(&ciphertext).await?;

        let redactor = Redactor::new().with(secret.expose());
        let formatter = ResponseFormatter::json()
            .with_cors(CorsPolicy::new(config.allowed_origin.clone()))
            .with_redactor(redactor);
        let verifier = CaptchaVerifier::new(client, secret, config.captcha_hostname.clone());
        let info = ContactInfo {
            email_address: config.contact_email.clone(),
            phone_number: config.contact_phone.clone(),
        };
        tracing::info!(event = "contact.warmed_up", hostname = %config.captcha_hostname);
        Ok(Self::new(verifier, formatter, info))
    }

    /// Handle one event, producing exactly one envelope.
    pub async fn handle(&self, event: &InboundEvent) -> ResponseEnvelope {
        let invocation = InvocationSpan::new("contact");
        async {
            let started = Instant::now();
            obs::emit_invocation_received(event);

            let envelope = if event.method() == Some("OPTIONS") {
                self.formatter.preflight()
            } else {
                let outcome = guard_invocation(self.run(event)).await;
                // The submitted token is redacted along with the secret.
                let token: Vec<String> = extract_token(event).into_iter().collect();
                self.formatter.format_redacting(&outcome, &token)
            };

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

    /// Verify, then disclose contact info. No disclosure on any rejection.
    pub async fn run(&self, event: &InboundEvent) -> PipelineOutcome {
        let result = self.verifier.verify(event).await;
        obs::emit_verification_completed(&result);
        if !result.is_verified() {
            return PipelineOutcome::rejected(result);
        }
        match serde_json::to_value(&self.info) {
            Ok(payload) => PipelineOutcome::Success(payload),
            Err(e) => PipelineOutcome::Failure(SitehookError::UnexpectedFailure(e.to_string())),
        }
    }
}
