use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::error::StoreError;
use crate::storage_traits::{
    ContentDigest, ContentStore, ObjectEntry, ObjectKey, PutOptions, ResourceStore, StoreResult,
};

/// Directory-backed object store.
///
/// Layout: `<root>/<key>` with `/` in the key mapped to directory separators.
/// Serves both as a resource store (artifact mirror on local disk) and as a
/// publish destination. Object metadata such as cache-control is not persisted.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &ObjectKey) -> PathBuf {
        key.segments()
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    /// Remove now-empty directories between `dir` and the store root.
    fn prune_empty_dirs(&self, mut dir: &Path) {
        while dir != self.root && dir.starts_with(&self.root) {
            if fs::remove_dir(dir).is_err() {
                break;
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
    }
}

fn read_object(path: &Path, key: &str) -> StoreResult<Vec<u8>> {
    fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound {
                key: key.to_string(),
            }
        } else {
            StoreError::Io(e)
        }
    })
}

#[async_trait]
impl ResourceStore for FsObjectStore {
    async fn fetch(&self, name: &str) -> StoreResult<Vec<u8>> {
        let key = ObjectKey::try_from(name)?;
        read_object(&self.object_path(&key), name)
    }
}

#[async_trait]
impl ContentStore for FsObjectStore {
    async fn list(&self) -> StoreResult<Vec<ObjectEntry>> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.map_err(|e| StoreError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .map_err(|_| StoreError::InvalidKey {
                    key: entry.path().to_string_lossy().into_owned(),
                })?;
            let key = ObjectKey::from_relative_path(relative)?;
            let data = fs::read(entry.path())?;
            entries.push(ObjectEntry {
                key,
                digest: ContentDigest::from_bytes(&data),
                size: data.len() as u64,
            });
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    async fn get(&self, key: &ObjectKey) -> StoreResult<Vec<u8>> {
        read_object(&self.object_path(key), key.as_str())
    }

    async fn put(&self, key: &ObjectKey, data: &[u8], _options: &PutOptions) -> StoreResult<()> {
        let path = self.object_path(key);
        let parent = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent)?;

        // Atomic write: temp file in the same directory, then rename over the key.
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(data)?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }

    async fn delete(&self, key: &ObjectKey) -> StoreResult<()> {
        let path = self.object_path(key);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StoreError::Io(e)),
        }
        if let Some(parent) = path.parent() {
            self.prune_empty_dirs(parent);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store() -> (tempfile::TempDir, FsObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path().join("bucket")).unwrap();
        (dir, store)
    }

    fn key(s: &str) -> ObjectKey {
        ObjectKey::try_from(s).unwrap()
    }

    #[tokio::test]
    async fn put_then_get_nested_object() {
        let (_dir, store) = make_store();
        store
            .put(&key("css/site.css"), b"body{}", &PutOptions::default())
            .await
            .unwrap();
        assert_eq!(store.get(&key("css/site.css")).await.unwrap(), b"body{}");
        assert!(store.root().join("css").join("site.css").is_file());
    }

    #[tokio::test]
    async fn put_overwrites_existing_object() {
        let (_dir, store) = make_store();
        let k = key("index.html");
        store.put(&k, b"v1", &PutOptions::default()).await.unwrap();
        store.put(&k, b"v2", &PutOptions::default()).await.unwrap();
        assert_eq!(store.get(&k).await.unwrap(), b"v2");
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_reports_keys_and_digests_sorted() {
        let (_dir, store) = make_store();
        store.put(&key("b.txt"), b"b", &PutOptions::default()).await.unwrap();
        store.put(&key("a/x.txt"), b"x", &PutOptions::default()).await.unwrap();

        let entries = store.list().await.unwrap();
        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["a/x.txt", "b.txt"]);
        assert_eq!(entries[1].digest, ContentDigest::from_bytes(b"b"));
        assert_eq!(entries[1].size, 1);
    }

    #[tokio::test]
    async fn delete_prunes_empty_directories_and_ignores_missing() {
        let (_dir, store) = make_store();
        store
            .put(&key("deep/er/page.html"), b"p", &PutOptions::default())
            .await
            .unwrap();
        store.delete(&key("deep/er/page.html")).await.unwrap();
        store.delete(&key("deep/er/page.html")).await.unwrap();

        assert!(store.list().await.unwrap().is_empty());
        assert!(!store.root().join("deep").exists());
        assert!(store.root().exists());
    }

    #[tokio::test]
    async fn fetch_missing_resource_is_not_found() {
        let (_dir, store) = make_store();
        match ResourceStore::fetch(&store, "hugo").await {
            Err(StoreError::NotFound { key }) => assert_eq!(key, "hugo"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_rejects_escaping_names() {
        let (_dir, store) = make_store();
        assert!(matches!(
            ResourceStore::fetch(&store, "../outside").await,
            Err(StoreError::InvalidKey { .. })
        ));
    }
}
