//! Response formatting: the single place a [`PipelineOutcome`] becomes a
//! [`ResponseEnvelope`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::PipelineOutcome;

const CONTENT_TYPE: &str = "Content-Type";
const JSON: &str = "application/json";
const ALLOW_METHODS: &str = "POST,OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type,X-Amz-Date,Authorization,X-Api-Key,X-Amz-Security-Token";
const REDACTED: &str = "[REDACTED]";

/// `{statusCode, body, headers}` returned to the triggering transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub status_code: u16,
    pub body: String,
    pub headers: BTreeMap<String, String>,
}

impl ResponseEnvelope {
    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

/// Fixed CORS policy: one origin, `POST,OPTIONS`, a fixed header list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsPolicy {
    allow_origin: String,
}

impl CorsPolicy {
    pub fn new(allow_origin: impl Into<String>) -> Self {
        Self {
            allow_origin: allow_origin.into(),
        }
    }

    fn apply(&self, headers: &mut BTreeMap<String, String>) {
        headers.insert(
            "Access-Control-Allow-Origin".to_string(),
            self.allow_origin.clone(),
        );
        headers.insert(
            "Access-Control-Allow-Methods".to_string(),
            ALLOW_METHODS.to_string(),
        );
        headers.insert(
            "Access-Control-Allow-Headers".to_string(),
            ALLOW_HEADERS.to_string(),
        );
    }
}

/// Replaces known secret values in diagnostic text with `[REDACTED]`.
#[derive(Clone, Default)]
pub struct Redactor {
    secrets: Vec<String>,
}

impl std::fmt::Debug for Redactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Redactor")
            .field("secrets", &self.secrets.len())
            .finish()
    }
}

impl Redactor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a value to hide. Empty values are ignored.
    pub fn add(&mut self, secret: impl Into<String>) {
        let secret = secret.into();
        if !secret.is_empty() && !self.secrets.contains(&secret) {
            self.secrets.push(secret);
        }
    }

    pub fn with(mut self, secret: impl Into<String>) -> Self {
        self.add(secret);
        self
    }

    pub fn redact(&self, text: &str) -> String {
        redact_all(text, self.secrets.iter().map(String::as_str))
    }
}

fn redact_all<'a>(text: &str, secrets: impl Iterator<Item = &'a str>) -> String {
    // Longest first, so a secret that contains another is hidden whole.
    let mut secrets: Vec<&str> = secrets.filter(|s| !s.is_empty()).collect();
    secrets.sort_by_key(|s| std::cmp::Reverse(s.len()));
    secrets
        .into_iter()
        .fold(text.to_string(), |acc, secret| acc.replace(secret, REDACTED))
}

/// Maps outcomes to envelopes. Success is 200, everything else 400.
#[derive(Debug, Clone, Default)]
pub struct ResponseFormatter {
    cors: Option<CorsPolicy>,
    redactor: Redactor,
}

impl ResponseFormatter {
    /// Formatter that only sets `Content-Type: application/json`.
    pub fn json() -> Self {
        Self::default()
    }

    pub fn with_cors(mut self, cors: CorsPolicy) -> Self {
        self.cors = Some(cors);
        self
    }

    pub fn with_redactor(mut self, redactor: Redactor) -> Self {
        self.redactor = redactor;
        self
    }

    pub fn format(&self, outcome: &PipelineOutcome) -> ResponseEnvelope {
        self.format_redacting(outcome, &[])
    }

    /// As [`format`](Self::format), also hiding per-request values such as a
    /// submitted token.
    pub fn format_redacting(&self, outcome: &PipelineOutcome, extra: &[String]) -> ResponseEnvelope {
        match outcome {
            PipelineOutcome::Success(payload) => self.envelope(200, payload.to_string()),
            PipelineOutcome::Failure(err) => {
                let diagnostic = redact_all(
                    &err.to_string(),
                    self.redactor
                        .secrets
                        .iter()
                        .chain(extra.iter())
                        .map(String::as_str),
                );
                let body = serde_json::json!({ "error": diagnostic }).to_string();
                self.envelope(400, body)
            }
        }
    }

    /// Answer to a CORS preflight: 200 with an empty JSON object.
    pub fn preflight(&self) -> ResponseEnvelope {
        self.envelope(200, "{}".to_string())
    }

    fn envelope(&self, status_code: u16, body: String) -> ResponseEnvelope {
        let mut headers = BTreeMap::new();
        headers.insert(CONTENT_TYPE.to_string(), JSON.to_string());
        if let Some(cors) = &self.cors {
            cors.apply(&mut headers);
        }
        ResponseEnvelope {
            status_code,
            body,
            headers,
        }
    }
}
