//! Sitehook Core Library
//!
//! Domain types shared by both handlers, the two request verifiers, the
//! response formatter, the contact-form handler, configuration, and tracing
//! setup. The build pipeline itself lives in `sitehook-build`.

pub mod boundary;
pub mod config;
pub mod contact;
pub mod domain;
pub mod obs;
pub mod response;
pub mod secrets;
pub mod telemetry;
pub mod verify;

pub use boundary::guard_invocation;
pub use config::{BuildConfig, ConfigError, ContactConfig, FetchMode, PublishStrategy};
pub use contact::{ContactHandler, ContactInfo};
pub use domain::{
    EventError, InboundEvent, PipelineOutcome, SitehookError, Stage, VerificationResult,
};
pub use response::{CorsPolicy, Redactor, ResponseEnvelope, ResponseFormatter};
pub use secrets::{decode_ciphertext, DecryptError, HttpKeyDecryptor, KeyDecryptor, SecretString};
pub use telemetry::init_tracing;
pub use verify::{
    compute_signature, extract_token, CaptchaVerifier, HttpSiteVerifyClient, RequestVerifier,
    SignatureVerifier, SiteVerifyClient, SiteVerifyResponse, VerifyTransportError,
    SIGNATURE_HEADER, TOKEN_FIELD,
};

/// Sitehook version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
