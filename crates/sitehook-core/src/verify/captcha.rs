//! Delegated-token verification against a CAPTCHA site-verify endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::RequestVerifier;
use crate::domain::{InboundEvent, VerificationResult};
use crate::secrets::SecretString;

/// Body field holding the client-side token
pub const TOKEN_FIELD: &str = "g-captcha-response";

/// Pull the token out of a JSON body. Any shape problem is a rejection.
pub fn extract_token(event: &InboundEvent) -> Result<String, VerificationResult> {
    let body = event
        .body_bytes()
        .map_err(|e| VerificationResult::MalformedRequest(e.to_string()))?;
    let parsed: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|_| VerificationResult::MalformedRequest("body is not valid JSON".to_string()))?;

    match parsed.get(TOKEN_FIELD).and_then(serde_json::Value::as_str) {
        Some(token) if !token.trim().is_empty() => Ok(token.to_string()),
        Some(_) => Err(VerificationResult::MalformedRequest(format!(
            "{TOKEN_FIELD} is empty"
        ))),
        None => Err(VerificationResult::MalformedRequest(format!(
            "missing {TOKEN_FIELD}"
        ))),
    }
}

/// Reply from the site-verify endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SiteVerifyResponse {
    pub success: bool,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default, rename = "error-codes")]
    pub error_codes: Vec<String>,
}

/// Failures talking to the site-verify endpoint
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifyTransportError {
    #[error("verification endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("verification endpoint returned HTTP {0}")]
    HttpStatus(u16),

    #[error("malformed verification response: {0}")]
    MalformedResponse(String),
}

/// Transport to the site-verify endpoint.
#[async_trait]
pub trait SiteVerifyClient: Send + Sync {
    async fn site_verify(
        &self,
        secret: &SecretString,
        token: &str,
    ) -> Result<SiteVerifyResponse, VerifyTransportError>;
}

/// Site-verify over HTTP: form POST of `secret` and `response`.
pub struct HttpSiteVerifyClient {
    endpoint: String,
    http_client: reqwest::Client,
}

impl HttpSiteVerifyClient {
    pub fn new(endpoint: &str) -> Result<Self, VerifyTransportError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("sitehook/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| VerifyTransportError::Unreachable(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            http_client,
        })
    }
}

#[async_trait]
impl SiteVerifyClient for HttpSiteVerifyClient {
    async fn site_verify(
        &self,
        secret: &SecretString,
        token: &str,
    ) -> Result<SiteVerifyResponse, VerifyTransportError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .form(&[("secret", secret.expose()), ("response", token)])
            .send()
            .await
            .map_err(|e| VerifyTransportError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VerifyTransportError::HttpStatus(status.as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| VerifyTransportError::MalformedResponse(e.to_string()))
    }
}

/// Verifies contact submissions by delegating the token to site-verify.
///
/// A reply is accepted only when `success` is true and `hostname` equals the
/// configured site, so a token minted for another site is refused.
pub struct CaptchaVerifier {
    client: Arc<dyn SiteVerifyClient>,
    secret: SecretString,
    expected_hostname: String,
}

impl CaptchaVerifier {
    pub fn new(
        client: Arc<dyn SiteVerifyClient>,
        secret: SecretString,
        expected_hostname: impl Into<String>,
    ) -> Self {
        Self {
            client,
            secret,
            expected_hostname: expected_hostname.into(),
        }
    }

    /// Check a token already extracted from the body.
    pub async fn verify_token(&self, token: &str) -> VerificationResult {
        let reply = match self.client.site_verify(&self.secret, token).await {
            Ok(reply) => reply,
            Err(VerifyTransportError::MalformedResponse(reason)) => {
                warn!(event = "captcha.malformed_reply", reason = %reason);
                return VerificationResult::UpstreamRejected(format!(
                    "unreadable reply: {reason}"
                ));
            }
            Err(e) => {
                warn!(event = "captcha.unreachable", error = %e);
                return VerificationResult::UpstreamUnreachable;
            }
        };
        debug!(event = "captcha.reply", success = reply.success, hostname = ?reply.hostname);

        if !reply.success {
            let reason = if reply.error_codes.is_empty() {
                "token not accepted".to_string()
            } else {
                reply.error_codes.join(",")
            };
            return VerificationResult::UpstreamRejected(reason);
        }

        match reply.hostname.as_deref() {
            Some(host) if host == self.expected_hostname => VerificationResult::Verified,
            Some(host) => VerificationResult::UpstreamRejected(format!(
                "hostname {host} does not match {}",
                self.expected_hostname
            )),
            None => VerificationResult::UpstreamRejected("reply has no hostname".to_string()),
        }
    }
}

#[async_trait]
impl RequestVerifier for CaptchaVerifier {
    async fn verify(&self, event: &InboundEvent) -> VerificationResult {
        match extract_token(event) {
            Ok(token) => self.verify_token(&token).await,
            Err(rejection) => rejection,
        }
    }
}
