//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryResourceStore` and `MemoryContentStore` that satisfy the
//! trait contracts without touching disk or network.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemoryResourceStore
// ---------------------------------------------------------------------------

/// In-memory artifact store backed by a `HashMap<name, bytes>`.
#[derive(Debug, Default)]
pub struct MemoryResourceStore {
    resources: Mutex<HashMap<String, Vec<u8>>>,
    unreachable: bool,
}

impl MemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every fetch fails with `StoreError::Unreachable`.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn with_resource(self, name: &str, data: impl Into<Vec<u8>>) -> Self {
        self.insert(name, data);
        self
    }

    pub fn insert(&self, name: &str, data: impl Into<Vec<u8>>) {
        self.resources
            .lock()
            .unwrap()
            .insert(name.to_string(), data.into());
    }
}

#[async_trait]
impl ResourceStore for MemoryResourceStore {
    async fn fetch(&self, name: &str) -> StoreResult<Vec<u8>> {
        if self.unreachable {
            return Err(StoreError::Unreachable {
                reason: "memory store configured unreachable".to_string(),
            });
        }
        self.resources
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                key: name.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// MemoryContentStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    options: PutOptions,
}

/// In-memory content store backed by a `BTreeMap<key, object>`.
///
/// Records every mutating call so tests can assert on wire traffic, and can
/// be told to fail uploads of one key to exercise partial-failure paths.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    objects: Mutex<BTreeMap<ObjectKey, StoredObject>>,
    fail_put_on: Mutex<Option<ObjectKey>>,
    puts: Mutex<Vec<ObjectKey>>,
    deletes: Mutex<Vec<ObjectKey>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without recording it as an upload.
    pub fn seed(&self, key: &str, data: impl Into<Vec<u8>>) {
        let key = ObjectKey::try_from(key).expect("valid seed key");
        self.objects.lock().unwrap().insert(
            key,
            StoredObject {
                data: data.into(),
                options: PutOptions::default(),
            },
        );
    }

    /// Make every subsequent `put` of `key` fail with `Unreachable`.
    pub fn fail_put_on(&self, key: &str) {
        *self.fail_put_on.lock().unwrap() = Some(ObjectKey::try_from(key).expect("valid key"));
    }

    /// Snapshot of the stored objects as `key -> bytes`.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.data.clone()))
            .collect()
    }

    /// Options recorded with the last upload of `key`.
    pub fn options_for(&self, key: &str) -> Option<PutOptions> {
        let key = ObjectKey::try_from(key).ok()?;
        self.objects
            .lock()
            .unwrap()
            .get(&key)
            .map(|o| o.options.clone())
    }

    pub fn put_calls(&self) -> Vec<ObjectKey> {
        self.puts.lock().unwrap().clone()
    }

    pub fn delete_calls(&self) -> Vec<ObjectKey> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn list(&self) -> StoreResult<Vec<ObjectEntry>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .map(|(key, object)| ObjectEntry {
                key: key.clone(),
                digest: ContentDigest::from_bytes(&object.data),
                size: object.data.len() as u64,
            })
            .collect())
    }

    async fn get(&self, key: &ObjectKey) -> StoreResult<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    async fn put(&self, key: &ObjectKey, data: &[u8], options: &PutOptions) -> StoreResult<()> {
        if self.fail_put_on.lock().unwrap().as_ref() == Some(key) {
            return Err(StoreError::Unreachable {
                reason: format!("injected upload failure for {key}"),
            });
        }
        self.puts.lock().unwrap().push(key.clone());
        self.objects.lock().unwrap().insert(
            key.clone(),
            StoredObject {
                data: data.to_vec(),
                options: options.clone(),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &ObjectKey) -> StoreResult<()> {
        self.deletes.lock().unwrap().push(key.clone());
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}
