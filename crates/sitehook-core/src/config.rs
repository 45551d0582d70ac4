//! Environment-driven configuration for both handlers.
//!
//! Each record has `from_env()` and a `from_lookup()` taking any
//! `Fn(&str) -> Option<String>`, so tests never touch the process environment.

use std::path::PathBuf;
use std::str::FromStr;

use sitehook_store::StoreLocation;
use sitehook_toolchain::ArtifactNames;
use thiserror::Error;

use crate::secrets::SecretString;

/// Configuration errors, reported before any request is served
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },

    #[error("incompatible configuration: {0}")]
    Incompatible(String),
}

/// How the source checkout is refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// Remove the checkout and clone fresh on every run
    #[default]
    Clone,
    /// Clone once at warm-up, then pull on every run
    Pull,
}

impl FromStr for FetchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clone" => Ok(FetchMode::Clone),
            "pull" => Ok(FetchMode::Pull),
            other => Err(other.to_string()),
        }
    }
}

/// How the output tree reaches the content store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublishStrategy {
    /// Upload changed and new objects, then delete stale ones
    #[default]
    DiffSync,
    /// Delete every existing object, then upload everything
    DeleteAndReupload,
}

impl FromStr for PublishStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "diff-sync" | "diffsync" => Ok(PublishStrategy::DiffSync),
            "delete-and-reupload" | "deleteandreupload" => Ok(PublishStrategy::DeleteAndReupload),
            other => Err(other.to_string()),
        }
    }
}

pub const DEFAULT_SCRATCH_DIR: &str = "/tmp/sitehook";
pub const DEFAULT_CACHE_CONTROL: &str = "max-age=10";
pub const DEFAULT_CAPTCHA_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

/// Artifact variables accept this value to disable an optional artifact.
const DISABLED: &str = "none";

/// Build handler configuration.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub webhook_secret: SecretString,
    pub repo_url: String,
    pub resource_store: StoreLocation,
    pub site_store: StoreLocation,
    pub scratch_dir: PathBuf,
    pub fetch_mode: FetchMode,
    pub publish_strategy: PublishStrategy,
    pub cache_control: String,
    pub artifacts: ArtifactNames,
}

impl BuildConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(&lookup);
        let defaults = ArtifactNames::default();

        let webhook_secret = env.required("SITEHOOK_WEBHOOK_SECRET")?;
        let repo_url = env.required("SITEHOOK_REPO_URL")?;
        let resource_store = env.location("SITEHOOK_RESOURCE_STORE")?;
        let site_store = env.location("SITEHOOK_SITE_STORE")?;

        let artifacts = ArtifactNames {
            vcs_archive: env.or("SITEHOOK_GIT_ARCHIVE", &defaults.vcs_archive),
            generator_binary: env.or("SITEHOOK_GENERATOR_BINARY", &defaults.generator_binary),
            sync_cli_archive: env.optional_artifact("SITEHOOK_SYNC_CLI_ARCHIVE", &defaults.sync_cli_archive),
            highlighter_archive: env
                .optional_artifact("SITEHOOK_HIGHLIGHTER_ARCHIVE", &defaults.highlighter_archive),
        };

        let config = Self {
            webhook_secret: SecretString::new(webhook_secret),
            repo_url,
            resource_store,
            site_store,
            scratch_dir: PathBuf::from(env.or("SITEHOOK_SCRATCH_DIR", DEFAULT_SCRATCH_DIR)),
            fetch_mode: env.parsed("SITEHOOK_FETCH_MODE")?.unwrap_or_default(),
            publish_strategy: env.parsed("SITEHOOK_PUBLISH_STRATEGY")?.unwrap_or_default(),
            cache_control: env.or("SITEHOOK_CACHE_CONTROL", DEFAULT_CACHE_CONTROL),
            artifacts,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.webhook_secret.is_empty() {
            return Err(ConfigError::Missing("SITEHOOK_WEBHOOK_SECRET"));
        }
        if let StoreLocation::Bucket(uri) = &self.resource_store {
            return Err(ConfigError::Incompatible(format!(
                "resource store {uri} must be a directory or an HTTP mirror"
            )));
        }
        match &self.site_store {
            StoreLocation::Http(url) => Err(ConfigError::Incompatible(format!(
                "site store {url} is read-only"
            ))),
            StoreLocation::Bucket(uri) => {
                if self.publish_strategy == PublishStrategy::DeleteAndReupload {
                    return Err(ConfigError::Incompatible(format!(
                        "delete-and-reupload needs a store backend, but {uri} is published by the sync CLI"
                    )));
                }
                if self.artifacts.sync_cli_archive.is_none() {
                    return Err(ConfigError::Incompatible(format!(
                        "publishing to {uri} needs the sync CLI artifact"
                    )));
                }
                Ok(())
            }
            StoreLocation::Directory(_) => Ok(()),
        }
    }
}

/// Contact handler configuration.
#[derive(Debug, Clone)]
pub struct ContactConfig {
    /// Base64 ciphertext; the plaintext only ever exists in memory
    pub captcha_secret_ciphertext: String,
    pub decrypt_endpoint: String,
    pub captcha_verify_url: String,
    pub captcha_hostname: String,
    pub allowed_origin: String,
    pub contact_email: String,
    pub contact_phone: String,
}

impl ContactConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(&lookup);
        Ok(Self {
            captcha_secret_ciphertext: env.required("SITEHOOK_CAPTCHA_SECRET")?,
            decrypt_endpoint: env.required("SITEHOOK_DECRYPT_ENDPOINT")?,
            captcha_verify_url: env.or("SITEHOOK_CAPTCHA_VERIFY_URL", DEFAULT_CAPTCHA_VERIFY_URL),
            captcha_hostname: env.required("SITEHOOK_CAPTCHA_HOSTNAME")?,
            allowed_origin: env.required("SITEHOOK_ALLOWED_ORIGIN")?,
            contact_email: env.required("SITEHOOK_CONTACT_EMAIL")?,
            contact_phone: env.required("SITEHOOK_CONTACT_PHONE")?,
        })
    }
}

struct Lookup<'a, F>(&'a F);

impl<F> Lookup<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, var: &str) -> Option<String> {
        (self.0)(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, var: &'static str) -> Result<String, ConfigError> {
        self.get(var).ok_or(ConfigError::Missing(var))
    }

    fn or(&self, var: &str, default: &str) -> String {
        self.get(var).unwrap_or_else(|| default.to_string())
    }

    fn location(&self, var: &'static str) -> Result<StoreLocation, ConfigError> {
        let value = self.required(var)?;
        StoreLocation::parse(&value).map_err(|_| ConfigError::Invalid { var, value })
    }

    fn parsed<T: FromStr>(&self, var: &'static str) -> Result<Option<T>, ConfigError> {
        self.get(var)
            .map(|value| {
                value
                    .parse()
                    .map_err(|_| ConfigError::Invalid { var, value })
            })
            .transpose()
    }

    fn optional_artifact(&self, var: &str, default: &Option<String>) -> Option<String> {
        match self.get(var) {
            Some(v) if v.eq_ignore_ascii_case(DISABLED) => None,
            Some(v) => Some(v),
            None => default.clone(),
        }
    }
}
