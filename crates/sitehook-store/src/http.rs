//! HTTP artifact mirror
//!
//! Fetches toolchain artifacts with a plain `GET <base_url>/<name>`.

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use crate::error::StoreError;
use crate::storage_traits::{ObjectKey, ResourceStore, StoreResult};

/// Resource store served over HTTP(S)
pub struct HttpResourceStore {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpResourceStore {
    /// Create a store for the given base URL (trailing `/` is optional).
    pub fn new(base_url: &str) -> StoreResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("sitehook-store/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpResourceStore {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    fn url_for(&self, key: &ObjectKey) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

#[async_trait]
impl ResourceStore for HttpResourceStore {
    async fn fetch(&self, name: &str) -> StoreResult<Vec<u8>> {
        let key = ObjectKey::try_from(name)?;
        let url = self.url_for(&key);
        debug!(url = %url, "Fetching resource");

        let response = self.http_client.get(&url).send().await?;
        match response.status() {
            status if status.is_success() => Ok(response.bytes().await?.to_vec()),
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => Err(StoreError::NotFound {
                key: name.to_string(),
            }),
            status => Err(StoreError::HttpStatus {
                status: status.as_u16(),
                key: name.to_string(),
            }),
        }
    }
}
