//! Toolchain bootstrapper
//!
//! Fetch, unpack and mark executable each artifact, then describe the result
//! as a [`Toolchain`]. Every step is safe to repeat against an already
//! populated scratch directory: downloads and extracted files are overwritten.

use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::read::GzDecoder;
use sitehook_store::ResourceStore;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::artifact::{InstallKind, ToolchainArtifact};
use crate::error::ProvisioningError;
use crate::toolchain::Toolchain;
use crate::Result;

/// Archive formats the bootstrapper can unpack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Tar,
    TarGz,
    Zip,
}

impl ArchiveFormat {
    /// Detect the format from a file name.
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveFormat::TarGz)
        } else if name.ends_with(".tar") {
            Some(ArchiveFormat::Tar)
        } else if name.ends_with(".zip") {
            Some(ArchiveFormat::Zip)
        } else {
            None
        }
    }
}

/// Fetches artifacts from a resource store into the scratch workspace.
pub struct Bootstrapper {
    store: Arc<dyn ResourceStore>,
}

impl Bootstrapper {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }

    /// Download one artifact to its `download_path`, returning that path.
    pub async fn fetch_artifact(&self, artifact: &ToolchainArtifact) -> Result<PathBuf> {
        debug!(resource = %artifact.resource, "Fetching artifact");
        let data = self.store.fetch(&artifact.resource).await.map_err(|source| {
            ProvisioningError::ResourceUnavailable {
                name: artifact.resource.clone(),
                source,
            }
        })?;

        let path = artifact.download_path.clone();
        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&parent)?;

        // Write beside the target and rename, so a half-written download never
        // sits at the final path.
        let mut tmp = NamedTempFile::new_in(&parent)?;
        tmp.write_all(&data)?;
        tmp.persist(&path).map_err(|e| e.error)?;

        debug!(path = %path.display(), bytes = data.len(), "Artifact fetched");
        Ok(path)
    }

    /// Fetch and install every artifact, in order.
    ///
    /// Any failure aborts provisioning; a half-provisioned toolchain is never
    /// returned.
    pub async fn provision(&self, artifacts: &[ToolchainArtifact]) -> Result<Toolchain> {
        let mut toolchain = Toolchain::empty();

        for artifact in artifacts {
            info!(tool = %artifact.tool, resource = %artifact.resource, "Provisioning tool");
            let local_path = self.fetch_artifact(artifact).await?;

            match artifact.install {
                InstallKind::Executable => mark_executable(&local_path)?,
                InstallKind::Archive => {
                    let dest = artifact.install_dir.clone();
                    tokio::task::spawn_blocking(move || install_archive(&local_path, &dest))
                        .await
                        .map_err(|e| ProvisioningError::Extraction {
                            path: artifact.download_path.clone(),
                            reason: e.to_string(),
                        })??;
                }
            }

            toolchain.register(artifact);
        }

        info!(tools = artifacts.len(), "Toolchain provisioned");
        Ok(toolchain)
    }
}

/// Unpack `local_path` into `dest_dir`, creating `dest_dir` if absent.
///
/// Re-running against a populated `dest_dir` overwrites existing entries.
pub fn install_archive(local_path: &Path, dest_dir: &Path) -> Result<()> {
    let format = ArchiveFormat::detect(local_path).ok_or_else(|| ProvisioningError::Extraction {
        path: local_path.to_path_buf(),
        reason: "unrecognised archive extension".to_string(),
    })?;
    fs::create_dir_all(dest_dir)?;

    let extraction_err = |reason: String| ProvisioningError::Extraction {
        path: local_path.to_path_buf(),
        reason,
    };

    let file = BufReader::new(File::open(local_path)?);
    match format {
        ArchiveFormat::Tar => unpack_tar(tar::Archive::new(file), dest_dir)
            .map_err(|e| extraction_err(e.to_string()))?,
        ArchiveFormat::TarGz => unpack_tar(tar::Archive::new(GzDecoder::new(file)), dest_dir)
            .map_err(|e| extraction_err(e.to_string()))?,
        ArchiveFormat::Zip => {
            let mut archive =
                zip::ZipArchive::new(file).map_err(|e| extraction_err(e.to_string()))?;
            archive
                .extract(dest_dir)
                .map_err(|e| extraction_err(e.to_string()))?;
        }
    }

    debug!(archive = %local_path.display(), dest = %dest_dir.display(), "Archive installed");
    Ok(())
}

fn unpack_tar<R: std::io::Read>(mut archive: tar::Archive<R>, dest_dir: &Path) -> std::io::Result<()> {
    archive.set_overwrite(true);
    archive.set_preserve_permissions(true);
    archive.unpack(dest_dir)
}

/// Set the execute bits on `path`.
#[cfg(unix)]
pub fn mark_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let denied = |e: std::io::Error| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            ProvisioningError::PermissionDenied {
                path: path.to_path_buf(),
            }
        } else {
            ProvisioningError::Io(e)
        }
    };

    let mut permissions = fs::metadata(path).map_err(denied)?.permissions();
    permissions.set_mode(permissions.mode() | 0o755);
    fs::set_permissions(path, permissions).map_err(denied)
}

/// Set the execute bits on `path` (no-op where the platform has none).
#[cfg(not(unix))]
pub fn mark_executable(path: &Path) -> Result<()> {
    fs::metadata(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitehook_store::fakes::MemoryResourceStore;
    use std::io::Cursor;

    fn tar_bytes(entries: &[(&str, &str, u32)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, data, mode) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(*mode);
            builder.append_data(&mut header, path, data.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (path, data) in entries {
            let options = zip::write::SimpleFileOptions::default().unix_permissions(0o755);
            writer.start_file(*path, options).unwrap();
            writer.write_all(data.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn detects_archive_formats() {
        assert_eq!(ArchiveFormat::detect(Path::new("git-2.4.3.tar")), Some(ArchiveFormat::Tar));
        assert_eq!(ArchiveFormat::detect(Path::new("x.tar.gz")), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::detect(Path::new("x.TGZ")), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::detect(Path::new("awscli.zip")), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::detect(Path::new("hugo_0.20.2_linux_amd64")), None);
    }

    #[test]
    fn install_tar_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("git.tar");
        fs::write(&archive, tar_bytes(&[("usr/bin/git", "#!/bin/sh\n", 0o755)])).unwrap();
        let dest = dir.path().join("git");

        install_archive(&archive, &dest).unwrap();
        install_archive(&archive, &dest).unwrap();

        assert_eq!(fs::read(dest.join("usr/bin/git")).unwrap(), b"#!/bin/sh\n");
    }

    #[test]
    fn install_zip_into_fresh_dir() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("awscli.zip");
        fs::write(&archive, zip_bytes(&[("aws", "#!/bin/sh\n"), ("lib/a.py", "pass\n")])).unwrap();
        let dest = dir.path().join("nested").join("awscli");

        install_archive(&archive, &dest).unwrap();

        assert!(dest.join("aws").is_file());
        assert!(dest.join("lib/a.py").is_file());
    }

    #[test]
    fn install_rejects_corrupt_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("broken.zip");
        fs::write(&archive, b"definitely not a zip").unwrap();

        assert!(matches!(
            install_archive(&archive, &dir.path().join("out")),
            Err(ProvisioningError::Extraction { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn mark_executable_sets_mode_bits() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("hugo");
        fs::write(&binary, b"bin").unwrap();
        fs::set_permissions(&binary, fs::Permissions::from_mode(0o600)).unwrap();

        mark_executable(&binary).unwrap();

        let mode = fs::metadata(&binary).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[tokio::test]
    async fn fetch_missing_artifact_is_resource_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let bootstrapper = Bootstrapper::new(Arc::new(MemoryResourceStore::new()));
        let artifact = ToolchainArtifact::executable("hugo", "hugo_0.20.2", dir.path());

        match bootstrapper.fetch_artifact(&artifact).await {
            Err(ProvisioningError::ResourceUnavailable { name, .. }) => {
                assert_eq!(name, "hugo_0.20.2")
            }
            other => panic!("expected ResourceUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn provision_installs_every_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryResourceStore::new()
            .with_resource("git.tar", tar_bytes(&[("usr/bin/git", "git", 0o755)]))
            .with_resource("hugo_bin", b"hugo".to_vec())
            .with_resource("awscli.zip", zip_bytes(&[("aws", "aws")]));
        let artifacts = vec![
            ToolchainArtifact::archive("git", "git.tar", dir.path()).with_bin_dir("usr/bin"),
            ToolchainArtifact::executable("hugo", "hugo_bin", dir.path()),
            ToolchainArtifact::archive("awscli", "awscli.zip", dir.path()),
        ];

        let toolchain = Bootstrapper::new(Arc::new(store))
            .provision(&artifacts)
            .await
            .unwrap();

        assert!(dir.path().join("git/usr/bin/git").is_file());
        assert!(dir.path().join("bin/hugo").is_file());
        assert!(dir.path().join("awscli/aws").is_file());
        assert_eq!(toolchain.bin_dirs().len(), 3);
        assert!(toolchain.missing_tools().is_empty());
    }

    #[tokio::test]
    async fn provision_stops_at_first_unavailable_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let bootstrapper = Bootstrapper::new(Arc::new(MemoryResourceStore::unreachable()));
        let artifacts = vec![ToolchainArtifact::executable("hugo", "hugo", dir.path())];

        assert!(matches!(
            bootstrapper.provision(&artifacts).await,
            Err(ProvisioningError::ResourceUnavailable { .. })
        ));
        assert!(!dir.path().join("bin/hugo").exists());
    }
}
