//! Inbound HTTP-shaped events.

use std::borrow::Cow;
use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use thiserror::Error;

/// Errors decoding an inbound event or its body
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("malformed event envelope: {0}")]
    Envelope(String),

    #[error("body is flagged base64 but does not decode: {0}")]
    Base64Body(String),
}

/// Transport shape of an event as delivered by the triggering gateway.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    headers: Option<BTreeMap<String, String>>,
    #[serde(default)]
    http_method: Option<String>,
    #[serde(default)]
    is_base64_encoded: bool,
}

/// An inbound request: raw body plus headers. Immutable once built.
///
/// The body is kept exactly as delivered; signature verification must see
/// the same bytes the sender signed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundEvent {
    body: String,
    base64_body: bool,
    headers: BTreeMap<String, String>,
    method: Option<String>,
}

impl InboundEvent {
    /// Event with a plain-text body and no headers.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Add a header. Names are matched case-insensitively.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.method = Some(method.to_ascii_uppercase());
        self
    }

    /// Mark the stored body as base64 text to be decoded before use.
    pub fn with_base64_body(mut self) -> Self {
        self.base64_body = true;
        self
    }

    /// Parse a gateway event (`{"body", "headers", "httpMethod", "isBase64Encoded"}`).
    pub fn from_json(raw: &str) -> Result<Self, EventError> {
        let event: RawEvent =
            serde_json::from_str(raw).map_err(|e| EventError::Envelope(e.to_string()))?;
        let headers = event
            .headers
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        Ok(Self {
            body: event.body.unwrap_or_default(),
            base64_body: event.is_base64_encoded,
            headers,
            method: event.http_method.map(|m| m.to_ascii_uppercase()),
        })
    }

    /// The exact body bytes, base64-decoded if the transport flagged it.
    pub fn body_bytes(&self) -> Result<Cow<'_, [u8]>, EventError> {
        if self.base64_body {
            BASE64
                .decode(self.body.as_bytes())
                .map(Cow::Owned)
                .map_err(|e| EventError::Base64Body(e.to_string()))
        } else {
            Ok(Cow::Borrowed(self.body.as_bytes()))
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// Header map with the named headers removed, for logging.
    pub fn headers_without(&self, hidden: &[&str]) -> BTreeMap<&str, &str> {
        self.headers
            .iter()
            .filter(|(k, _)| !hidden.iter().any(|h| h.eq_ignore_ascii_case(k)))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    /// Length of the body as delivered.
    pub fn body_len(&self) -> usize {
        self.body.len()
    }
}
