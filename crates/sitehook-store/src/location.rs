use std::path::PathBuf;

use crate::error::StoreError;
use crate::storage_traits::StoreResult;

/// Where a store lives, parsed from a configuration string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// Local directory (`file:///path` or a bare path)
    Directory(PathBuf),
    /// HTTP(S) mirror, read-only
    Http(String),
    /// Bucket URI handled by the external sync CLI (`s3://bucket[/prefix]`)
    Bucket(String),
}

impl StoreLocation {
    pub fn parse(location: &str) -> StoreResult<Self> {
        let location = location.trim();
        if location.is_empty() {
            return Err(StoreError::InvalidLocation {
                location: location.to_string(),
            });
        }
        if let Some(path) = location.strip_prefix("file://") {
            if path.is_empty() {
                return Err(StoreError::InvalidLocation {
                    location: location.to_string(),
                });
            }
            return Ok(StoreLocation::Directory(PathBuf::from(path)));
        }
        if location.starts_with("http://") || location.starts_with("https://") {
            return Ok(StoreLocation::Http(location.to_string()));
        }
        if let Some(bucket) = location.strip_prefix("s3://") {
            if bucket.is_empty() || bucket.starts_with('/') {
                return Err(StoreError::InvalidLocation {
                    location: location.to_string(),
                });
            }
            return Ok(StoreLocation::Bucket(location.to_string()));
        }
        if location.contains("://") {
            return Err(StoreError::InvalidLocation {
                location: location.to_string(),
            });
        }
        Ok(StoreLocation::Directory(PathBuf::from(location)))
    }
}

impl std::fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreLocation::Directory(path) => write!(f, "file://{}", path.display()),
            StoreLocation::Http(url) | StoreLocation::Bucket(url) => f.write_str(url),
        }
    }
}
