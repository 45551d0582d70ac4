//! Storage trait definitions for Sitehook
//!
//! - `ResourceStore`: fetch-by-name of toolchain artifacts
//! - `ContentStore`: publish destination addressed by relative object keys
//!
//! Both traits are async and backend-agnostic. In-memory fakes live in the
//! `fakes` module.

use std::path::{Component, Path};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::StoreError;

/// Result type for storage operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Content digest (SHA-256 hex string) used to detect unchanged objects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Relative, `/`-separated object key.
///
/// Never empty, never absolute, and never contains `.` or `..` segments, so
/// every key maps to a location strictly inside the store root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Build a key from a path relative to a publish root.
    pub fn from_relative_path(path: &Path) -> StoreResult<Self> {
        let mut segments = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(segment) => {
                    let segment = segment.to_str().ok_or_else(|| StoreError::InvalidKey {
                        key: path.to_string_lossy().into_owned(),
                    })?;
                    segments.push(segment.to_string());
                }
                _ => {
                    return Err(StoreError::InvalidKey {
                        key: path.to_string_lossy().into_owned(),
                    })
                }
            }
        }
        ObjectKey::try_from(segments.join("/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments of the key, for joining onto a local root.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl TryFrom<String> for ObjectKey {
    type Error = StoreError;

    fn try_from(key: String) -> std::result::Result<Self, Self::Error> {
        let valid = !key.is_empty()
            && !key.starts_with('/')
            && !key.contains('\\')
            && key
                .split('/')
                .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
        if !valid {
            return Err(StoreError::InvalidKey { key });
        }
        Ok(ObjectKey(key))
    }
}

impl TryFrom<&str> for ObjectKey {
    type Error = StoreError;

    fn try_from(key: &str) -> std::result::Result<Self, Self::Error> {
        ObjectKey::try_from(key.to_string())
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An object currently held by a content store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    pub key: ObjectKey,
    pub digest: ContentDigest,
    pub size: u64,
}

/// Per-object metadata attached on upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutOptions {
    /// `Cache-Control` value served with the object
    pub cache_control: Option<String>,
}

/// Read-only store of named toolchain artifacts.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch the full contents of a named artifact.
    ///
    /// Returns `StoreError::NotFound` if the artifact is absent and
    /// `StoreError::Unreachable` if the store cannot be contacted.
    async fn fetch(&self, name: &str) -> StoreResult<Vec<u8>>;
}

/// Publish destination for a generated site.
///
/// Guarantees:
/// - `put` overwrites any existing object at the same key.
/// - `delete` of an absent key is a no-op.
/// - `list` returns every object currently stored, ordered by key.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// List every object in the store.
    async fn list(&self) -> StoreResult<Vec<ObjectEntry>>;

    /// Read an object back.
    async fn get(&self, key: &ObjectKey) -> StoreResult<Vec<u8>>;

    /// Upload an object, replacing any existing one.
    async fn put(&self, key: &ObjectKey, data: &[u8], options: &PutOptions) -> StoreResult<()>;

    /// Delete an object. No-op if absent.
    async fn delete(&self, key: &ObjectKey) -> StoreResult<()>;
}
