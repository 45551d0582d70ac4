//! Toolchain artifact catalogue.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// How a fetched artifact becomes usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallKind {
    /// A single binary: fetched straight into place and marked executable
    Executable,
    /// A tar / tar.gz / zip archive unpacked into `install_dir`
    Archive,
}

/// One provisionable tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainArtifact {
    /// Logical tool name (`git`, `hugo`, `aws`, ...)
    pub tool: String,
    /// Resource store name of the artifact
    pub resource: String,
    /// Where the fetched bytes are written
    pub download_path: PathBuf,
    pub install: InstallKind,
    /// Directory holding the installed tool
    pub install_dir: PathBuf,
    /// Directories (relative to `install_dir`) added to the search path
    pub bin_dirs: Vec<PathBuf>,
    /// Environment variables pointing at paths relative to `install_dir`
    pub env: Vec<(String, PathBuf)>,
}

impl ToolchainArtifact {
    /// A standalone binary installed as `<scratch>/bin/<tool>`.
    pub fn executable(tool: &str, resource: &str, scratch: &Path) -> Self {
        let install_dir = scratch.join("bin");
        Self {
            tool: tool.to_string(),
            resource: resource.to_string(),
            download_path: install_dir.join(tool),
            install: InstallKind::Executable,
            install_dir,
            bin_dirs: vec![PathBuf::new()],
            env: Vec::new(),
        }
    }

    /// An archive downloaded to `<scratch>/downloads/<resource>` and unpacked
    /// into `<scratch>/<tool>`.
    pub fn archive(tool: &str, resource: &str, scratch: &Path) -> Self {
        Self {
            tool: tool.to_string(),
            resource: resource.to_string(),
            download_path: scratch.join("downloads").join(resource),
            install: InstallKind::Archive,
            install_dir: scratch.join(tool),
            bin_dirs: vec![PathBuf::new()],
            env: Vec::new(),
        }
    }

    /// Replace the default search-path entry with `dir` (relative to the install dir).
    pub fn with_bin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bin_dirs = vec![dir.into()];
        self
    }

    pub fn with_env(mut self, name: &str, relative: impl Into<PathBuf>) -> Self {
        self.env.push((name.to_string(), relative.into()));
        self
    }

    /// Absolute search-path entries contributed by this artifact.
    pub fn resolved_bin_dirs(&self) -> Vec<PathBuf> {
        self.bin_dirs
            .iter()
            .map(|dir| self.install_dir.join(dir))
            .collect()
    }
}

/// Resource names of the standard artifact set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactNames {
    pub vcs_archive: String,
    pub generator_binary: String,
    /// Only needed when publishing through the sync CLI
    pub sync_cli_archive: Option<String>,
    pub highlighter_archive: Option<String>,
}

impl Default for ArtifactNames {
    fn default() -> Self {
        Self {
            vcs_archive: "git-2.4.3.tar".to_string(),
            generator_binary: "hugo_0.20.2_linux_amd64".to_string(),
            sync_cli_archive: Some("awscli.zip".to_string()),
            highlighter_archive: Some("pygments.zip".to_string()),
        }
    }
}

/// The artifacts a site build needs, laid out under `scratch`.
///
/// The VCS archive ships a relocatable tree (`usr/bin`, `usr/libexec/git-core`,
/// `usr/share/git-core/templates`), so its helper and template directories are
/// exported alongside the search path.
pub fn standard_artifacts(scratch: &Path, names: &ArtifactNames) -> Vec<ToolchainArtifact> {
    let mut artifacts = vec![
        ToolchainArtifact::archive("git", &names.vcs_archive, scratch)
            .with_bin_dir("usr/bin")
            .with_env("GIT_EXEC_PATH", "usr/libexec/git-core")
            .with_env("GIT_TEMPLATE_DIR", "usr/share/git-core/templates"),
        ToolchainArtifact::executable("hugo", &names.generator_binary, scratch),
    ];
    if let Some(sync_cli) = &names.sync_cli_archive {
        artifacts.push(ToolchainArtifact::archive("awscli", sync_cli, scratch));
    }
    if let Some(highlighter) = &names.highlighter_archive {
        artifacts.push(ToolchainArtifact::archive("pygments", highlighter, scratch));
    }
    artifacts
}
