//! Secret handling and the key-decryption service client.
//!
//! The CAPTCHA secret is configured only as ciphertext. It is decrypted once
//! per warm environment and held in memory as a [`SecretString`], which never
//! prints its contents.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// A secret value whose `Debug` and `Display` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The plaintext. Callers must not log it.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl std::fmt::Display for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Errors from the key-decryption service
#[derive(Debug, Error)]
pub enum DecryptError {
    #[error("ciphertext is not valid base64: {0}")]
    InvalidCiphertext(String),

    #[error("key-decryption service unreachable: {0}")]
    Unreachable(String),

    #[error("key-decryption service returned HTTP {0}")]
    HttpStatus(u16),

    #[error("malformed key-decryption response: {0}")]
    MalformedResponse(String),
}

/// Decode the base64 ciphertext blob held in configuration.
pub fn decode_ciphertext(encoded: &str) -> Result<Vec<u8>, DecryptError> {
    let blob = BASE64
        .decode(encoded.trim().as_bytes())
        .map_err(|e| DecryptError::InvalidCiphertext(e.to_string()))?;
    if blob.is_empty() {
        return Err(DecryptError::InvalidCiphertext("empty ciphertext".to_string()));
    }
    Ok(blob)
}

/// One-shot decryption of a ciphertext blob.
#[async_trait]
pub trait KeyDecryptor: Send + Sync {
    async fn decrypt(&self, ciphertext: &[u8]) -> Result<SecretString, DecryptError>;
}

#[derive(Serialize)]
struct DecryptRequest {
    #[serde(rename = "CiphertextBlob")]
    ciphertext_blob: String,
}

#[derive(Deserialize)]
struct DecryptResponse {
    #[serde(rename = "Plaintext")]
    plaintext: String,
}

/// Key-decryption service reached over HTTP.
///
/// Request: `POST <endpoint>` with `{"CiphertextBlob": <base64>}`.
/// Response: `{"Plaintext": <base64>}`.
pub struct HttpKeyDecryptor {
    endpoint: String,
    http_client: reqwest::Client,
}

impl HttpKeyDecryptor {
    pub fn new(endpoint: &str) -> Result<Self, DecryptError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("sitehook/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DecryptError::Unreachable(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            http_client,
        })
    }
}

#[async_trait]
impl KeyDecryptor for HttpKeyDecryptor {
    async fn decrypt(&self, ciphertext: &[u8]) -> Result<SecretString, DecryptError> {
        let request = DecryptRequest {
            ciphertext_blob: BASE64.encode(ciphertext),
        };
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| DecryptError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DecryptError::HttpStatus(status.as_u16()));
        }

        let body: DecryptResponse = response
            .json()
            .await
            .map_err(|e| DecryptError::MalformedResponse(e.to_string()))?;
        let plaintext = BASE64
            .decode(body.plaintext.as_bytes())
            .map_err(|e| DecryptError::MalformedResponse(e.to_string()))?;
        let plaintext = String::from_utf8(plaintext)
            .map_err(|_| DecryptError::MalformedResponse("plaintext is not UTF-8".to_string()))?;

        info!(event = "secret.decrypted", bytes = plaintext.len());
        Ok(SecretString::new(plaintext))
    }
}
