//! Publishing the generated tree to the content store.
//!
//! The store must end up holding exactly the files under the output root,
//! byte for byte. A failure part way through leaves the store partly
//! updated; the next successful publish converges it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use sitehook_core::PublishStrategy;
use sitehook_store::{ContentDigest, ContentStore, ObjectEntry, ObjectKey, PutOptions};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{tail, PublishError};
use crate::runner::{CommandSpec, ProcessRunner};

const SYNC_CLI: &str = "aws";
const DIAGNOSTIC_LINES: usize = 5;

/// Counts reported in the success body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PublishSummary {
    pub uploaded: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

/// A file found under the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub path: PathBuf,
    pub digest: ContentDigest,
    pub size: u64,
}

/// Every regular file under `dir`, keyed by its `/`-joined relative path.
pub fn scan_tree(dir: &Path) -> Result<BTreeMap<ObjectKey, LocalFile>, PublishError> {
    let scan_err = |reason: String| PublishError::Scan {
        path: dir.to_path_buf(),
        reason,
    };

    let mut files = BTreeMap::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| scan_err(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| scan_err(e.to_string()))?;
        let key = ObjectKey::from_relative_path(relative).map_err(|e| scan_err(e.to_string()))?;
        let data = std::fs::read(entry.path())?;
        files.insert(
            key,
            LocalFile {
                path: entry.path().to_path_buf(),
                digest: ContentDigest::from_bytes(&data),
                size: data.len() as u64,
            },
        );
    }
    Ok(files)
}

/// What a differential sync will do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// New or changed keys
    pub uploads: Vec<ObjectKey>,
    /// Keys present remotely but not locally
    pub deletes: Vec<ObjectKey>,
    pub unchanged: Vec<ObjectKey>,
}

impl SyncPlan {
    /// Deletes that must happen before the uploads: stale keys that are a
    /// directory of an upload, or sit under an upload's name.
    pub fn blocking_deletes(&self) -> Vec<ObjectKey> {
        self.deletes
            .iter()
            .filter(|stale| {
                self.uploads
                    .iter()
                    .any(|upload| nests_under(upload, stale) || nests_under(stale, upload))
            })
            .cloned()
            .collect()
    }
}

/// True when `inner` lives inside `outer` taken as a directory.
fn nests_under(inner: &ObjectKey, outer: &ObjectKey) -> bool {
    inner
        .as_str()
        .strip_prefix(outer.as_str())
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Compare the local tree with the store listing by key and digest.
pub fn plan_sync(local: &BTreeMap<ObjectKey, LocalFile>, remote: &[ObjectEntry]) -> SyncPlan {
    let remote: BTreeMap<&ObjectKey, &ContentDigest> =
        remote.iter().map(|e| (&e.key, &e.digest)).collect();

    let mut plan = SyncPlan::default();
    for (key, file) in local {
        match remote.get(key) {
            Some(digest) if **digest == file.digest => plan.unchanged.push(key.clone()),
            _ => plan.uploads.push(key.clone()),
        }
    }
    plan.deletes = remote
        .keys()
        .filter(|key| !local.contains_key(**key))
        .map(|key| (*key).clone())
        .collect();
    plan
}

/// Where published files go.
#[derive(Clone)]
pub enum PublishTarget {
    /// A content store driven in-process
    Store(Arc<dyn ContentStore>),
    /// A bucket reconciled by the external sync CLI
    SyncCli {
        destination: String,
        runner: ProcessRunner,
    },
}

impl std::fmt::Debug for PublishTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishTarget::Store(_) => f.write_str("Store(..)"),
            PublishTarget::SyncCli { destination, .. } => {
                f.debug_struct("SyncCli").field("destination", destination).finish()
            }
        }
    }
}

/// Reconciles a target with a local directory.
#[derive(Debug, Clone)]
pub struct Publisher {
    target: PublishTarget,
    strategy: PublishStrategy,
    options: PutOptions,
}

impl Publisher {
    /// Fails for delete-and-reupload against the sync CLI, which only syncs.
    pub fn new(
        target: PublishTarget,
        strategy: PublishStrategy,
        cache_control: &str,
    ) -> Result<Self, PublishError> {
        if matches!(target, PublishTarget::SyncCli { .. })
            && strategy == PublishStrategy::DeleteAndReupload
        {
            return Err(PublishError::Unsupported(
                "delete-and-reupload needs a store backend".to_string(),
            ));
        }
        Ok(Self {
            target,
            strategy,
            options: PutOptions {
                cache_control: Some(cache_control.to_string()).filter(|c| !c.is_empty()),
            },
        })
    }

    pub async fn publish(&self, source_dir: &Path) -> Result<PublishSummary, PublishError> {
        let local = scan_tree(source_dir)?;
        let summary = match &self.target {
            PublishTarget::Store(store) => match self.strategy {
                PublishStrategy::DiffSync => self.diff_sync(store.as_ref(), &local).await?,
                PublishStrategy::DeleteAndReupload => {
                    self.delete_and_reupload(store.as_ref(), &local).await?
                }
            },
            PublishTarget::SyncCli {
                destination,
                runner,
            } => self.cli_sync(runner, source_dir, destination, &local).await?,
        };
        sitehook_core::obs::emit_publish_completed(
            summary.uploaded,
            summary.deleted,
            summary.unchanged,
        );
        Ok(summary)
    }

    /// Upload new and changed files, then delete stale objects, so the site
    /// never loses a page that still exists locally. Stale keys that collide
    /// with an upload's path (a file replaced by a directory or the reverse)
    /// are deleted first.
    async fn diff_sync(
        &self,
        store: &dyn ContentStore,
        local: &BTreeMap<ObjectKey, LocalFile>,
    ) -> Result<PublishSummary, PublishError> {
        let remote = store.list().await.map_err(PublishError::List)?;
        let plan = plan_sync(local, &remote);
        debug!(
            uploads = plan.uploads.len(),
            deletes = plan.deletes.len(),
            unchanged = plan.unchanged.len(),
            "Sync planned"
        );

        let blocking = plan.blocking_deletes();
        for key in &blocking {
            delete(store, key).await?;
        }
        for key in &plan.uploads {
            // Every planned upload comes from `local`.
            if let Some(file) = local.get(key) {
                self.upload(store, key, file).await?;
            }
        }
        for key in plan.deletes.iter().filter(|key| !blocking.contains(*key)) {
            delete(store, key).await?;
        }

        Ok(PublishSummary {
            uploaded: plan.uploads.len(),
            deleted: plan.deletes.len(),
            unchanged: plan.unchanged.len(),
        })
    }

    async fn delete_and_reupload(
        &self,
        store: &dyn ContentStore,
        local: &BTreeMap<ObjectKey, LocalFile>,
    ) -> Result<PublishSummary, PublishError> {
        let remote = store.list().await.map_err(PublishError::List)?;
        for entry in &remote {
            delete(store, &entry.key).await?;
        }
        for (key, file) in local {
            self.upload(store, key, file).await?;
        }
        Ok(PublishSummary {
            uploaded: local.len(),
            deleted: remote.len(),
            unchanged: 0,
        })
    }

    async fn cli_sync(
        &self,
        runner: &ProcessRunner,
        source_dir: &Path,
        destination: &str,
        local: &BTreeMap<ObjectKey, LocalFile>,
    ) -> Result<PublishSummary, PublishError> {
        let mut spec = CommandSpec::new(SYNC_CLI)
            .arg("s3")
            .arg("sync")
            .arg(source_dir)
            .arg(destination)
            .arg("--delete");
        if let Some(cache_control) = &self.options.cache_control {
            spec = spec.arg("--cache-control").arg(cache_control);
        }

        let output = runner.run(&spec).await?;
        if !output.success() {
            return Err(PublishError::SyncCli {
                code: output.exit_code,
                output_tail: tail(&output.output, DIAGNOSTIC_LINES),
            });
        }

        let count = |prefix: &str| {
            output
                .output
                .lines()
                .filter(|line| line.trim_start().starts_with(prefix))
                .count()
        };
        let uploaded = count("upload:");
        Ok(PublishSummary {
            uploaded,
            deleted: count("delete:"),
            unchanged: local.len().saturating_sub(uploaded),
        })
    }

    async fn upload(
        &self,
        store: &dyn ContentStore,
        key: &ObjectKey,
        file: &LocalFile,
    ) -> Result<(), PublishError> {
        let data = tokio::fs::read(&file.path).await?;
        store
            .put(key, &data, &self.options)
            .await
            .map_err(|source| PublishError::Store {
                operation: "put",
                key: key.to_string(),
                source,
            })?;
        info!(
            event = "object.uploaded",
            key = %key,
            digest = file.digest.short(),
            bytes = data.len()
        );
        Ok(())
    }
}

async fn delete(store: &dyn ContentStore, key: &ObjectKey) -> Result<(), PublishError> {
    store
        .delete(key)
        .await
        .map_err(|source| PublishError::Store {
            operation: "delete",
            key: key.to_string(),
            source,
        })?;
    info!(event = "object.deleted", key = %key);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitehook_store::fakes::MemoryContentStore;

    fn write(dir: &Path, rel: &str, data: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }

    fn key(k: &str) -> ObjectKey {
        ObjectKey::try_from(k).unwrap()
    }

    fn publisher(store: Arc<MemoryContentStore>, strategy: PublishStrategy) -> Publisher {
        Publisher::new(PublishTarget::Store(store), strategy, "max-age=10").unwrap()
    }

    #[test]
    fn scan_uses_slash_keys() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "index.html", "home");
        write(dir.path(), "posts/first/index.html", "post");

        let files = scan_tree(dir.path()).unwrap();
        let keys: Vec<&str> = files.keys().map(ObjectKey::as_str).collect();
        assert_eq!(keys, vec!["index.html", "posts/first/index.html"]);
        assert_eq!(files[&key("index.html")].size, 4);
    }

    #[test]
    fn plan_sorts_uploads_deletes_and_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "same.html", "same");
        write(dir.path(), "changed.html", "new");
        write(dir.path(), "added.html", "added");
        let local = scan_tree(dir.path()).unwrap();

        let remote = vec![
            ObjectEntry {
                key: key("same.html"),
                digest: ContentDigest::from_bytes(b"same"),
                size: 4,
            },
            ObjectEntry {
                key: key("changed.html"),
                digest: ContentDigest::from_bytes(b"old"),
                size: 3,
            },
            ObjectEntry {
                key: key("gone.html"),
                digest: ContentDigest::from_bytes(b"gone"),
                size: 4,
            },
        ];

        let plan = plan_sync(&local, &remote);
        assert_eq!(plan.uploads, vec![key("added.html"), key("changed.html")]);
        assert_eq!(plan.deletes, vec![key("gone.html")]);
        assert_eq!(plan.unchanged, vec![key("same.html")]);
    }

    #[tokio::test]
    async fn diff_sync_touches_only_what_changed() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "same.html", "same");
        write(dir.path(), "changed.html", "new");
        let store = Arc::new(MemoryContentStore::new());
        store.seed("same.html", "same");
        store.seed("changed.html", "old");
        store.seed("stale/old.html", "stale");

        let summary = publisher(store.clone(), PublishStrategy::DiffSync)
            .publish(dir.path())
            .await
            .unwrap();

        assert_eq!(
            summary,
            PublishSummary {
                uploaded: 1,
                deleted: 1,
                unchanged: 1
            }
        );
        assert_eq!(store.put_calls(), vec![key("changed.html")]);
        assert_eq!(store.delete_calls(), vec![key("stale/old.html")]);
        assert_eq!(
            store.options_for("changed.html").unwrap().cache_control.as_deref(),
            Some("max-age=10")
        );
    }

    #[test]
    fn blocking_deletes_are_path_collisions_only() {
        let plan = SyncPlan {
            uploads: vec![key("posts"), key("about/index.html")],
            deletes: vec![key("posts/index.html"), key("about"), key("postscript.html")],
            unchanged: vec![],
        };
        assert_eq!(
            plan.blocking_deletes(),
            vec![key("posts/index.html"), key("about")]
        );
    }

    async fn fs_keys(store: &sitehook_store::FsObjectStore) -> Vec<String> {
        store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.key.to_string())
            .collect()
    }

    #[tokio::test]
    async fn diff_sync_replaces_directory_with_file_on_disk_store() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "site/posts", "now a page");
        let store = Arc::new(
            sitehook_store::FsObjectStore::new(dir.path().join("bucket")).unwrap(),
        );
        store
            .put(&key("posts/index.html"), b"old", &PutOptions::default())
            .await
            .unwrap();

        let publisher =
            Publisher::new(PublishTarget::Store(store.clone()), PublishStrategy::DiffSync, "")
                .unwrap();
        let summary = publisher.publish(&dir.path().join("site")).await.unwrap();

        assert_eq!(summary.uploaded, 1);
        assert_eq!(summary.deleted, 1);
        assert_eq!(fs_keys(&store).await, vec!["posts"]);
        assert_eq!(store.get(&key("posts")).await.unwrap(), b"now a page");
    }

    #[tokio::test]
    async fn diff_sync_replaces_file_with_directory_on_disk_store() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "site/posts/index.html", "listing");
        let store = Arc::new(
            sitehook_store::FsObjectStore::new(dir.path().join("bucket")).unwrap(),
        );
        store
            .put(&key("posts"), b"old page", &PutOptions::default())
            .await
            .unwrap();

        let publisher =
            Publisher::new(PublishTarget::Store(store.clone()), PublishStrategy::DiffSync, "")
                .unwrap();
        publisher.publish(&dir.path().join("site")).await.unwrap();
        let again = publisher.publish(&dir.path().join("site")).await.unwrap();

        assert_eq!(fs_keys(&store).await, vec!["posts/index.html"]);
        assert_eq!(again.unchanged, 1);
        assert_eq!(again.uploaded + again.deleted, 0);
    }

    #[tokio::test]
    async fn delete_and_reupload_rewrites_everything() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.html", "a");
        write(dir.path(), "b.html", "b");
        let store = Arc::new(MemoryContentStore::new());
        store.seed("a.html", "a");
        store.seed("z.html", "z");

        let summary = publisher(store.clone(), PublishStrategy::DeleteAndReupload)
            .publish(dir.path())
            .await
            .unwrap();

        assert_eq!(summary.uploaded, 2);
        assert_eq!(summary.deleted, 2);
        assert_eq!(store.snapshot().len(), 2);
        assert_eq!(store.snapshot()["b.html"], b"b".to_vec());
    }

    #[tokio::test]
    async fn failed_upload_is_reported_with_key() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.html", "a");
        let store = Arc::new(MemoryContentStore::new());
        store.fail_put_on("a.html");

        let err = publisher(store, PublishStrategy::DiffSync)
            .publish(dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Store { operation: "put", ref key, .. } if key == "a.html"));
    }

    #[test]
    fn sync_cli_rejects_delete_and_reupload() {
        let runner = ProcessRunner::new(Arc::new(sitehook_toolchain::Toolchain::empty()));
        let result = Publisher::new(
            PublishTarget::SyncCli {
                destination: "s3://www.example.com".to_string(),
                runner,
            },
            PublishStrategy::DeleteAndReupload,
            "max-age=10",
        );
        assert!(matches!(result, Err(PublishError::Unsupported(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn sync_cli_invocation_and_counts() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let site = dir.path().join("public");
        write(&site, "index.html", "home");
        write(&site, "about.html", "about");
        let bin = dir.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let args_log = dir.path().join("args");
        std::fs::write(
            bin.join("aws"),
            format!(
                "#!/bin/sh\necho \"$@\" > {}\necho 'upload: public/index.html to s3://www.example.com/index.html'\necho 'delete: s3://www.example.com/old.html'\n",
                args_log.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(bin.join("aws"), std::fs::Permissions::from_mode(0o755)).unwrap();

        let runner =
            ProcessRunner::new(Arc::new(sitehook_toolchain::Toolchain::empty().with_bin_dir(&bin)));
        let publisher = Publisher::new(
            PublishTarget::SyncCli {
                destination: "s3://www.example.com".to_string(),
                runner,
            },
            PublishStrategy::DiffSync,
            "max-age=10",
        )
        .unwrap();

        let summary = publisher.publish(&site).await.unwrap();

        assert_eq!(
            summary,
            PublishSummary {
                uploaded: 1,
                deleted: 1,
                unchanged: 1
            }
        );
        let args = std::fs::read_to_string(args_log).unwrap();
        assert_eq!(
            args.trim(),
            format!(
                "s3 sync {} s3://www.example.com --delete --cache-control max-age=10",
                site.display()
            )
        );
    }
}
