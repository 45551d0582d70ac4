//! Provisioned toolchain: search path and tool environment for child processes.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::artifact::ToolchainArtifact;
use crate::error::ProvisioningError;
use crate::Result;

/// The tools available to pipeline commands.
///
/// Tool directories are placed ahead of the inherited `PATH` so provisioned
/// versions take precedence over anything already on the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Toolchain {
    bin_dirs: Vec<PathBuf>,
    env: BTreeMap<String, OsString>,
    tools: BTreeMap<String, PathBuf>,
}

impl Toolchain {
    /// A toolchain that adds nothing: commands resolve against the host `PATH`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Record an installed artifact.
    pub fn register(&mut self, artifact: &ToolchainArtifact) {
        for dir in artifact.resolved_bin_dirs() {
            if !self.bin_dirs.contains(&dir) {
                self.bin_dirs.push(dir);
            }
        }
        for (name, relative) in &artifact.env {
            self.env.insert(
                name.clone(),
                artifact.install_dir.join(relative).into_os_string(),
            );
        }
        self.tools
            .insert(artifact.tool.clone(), artifact.install_dir.clone());
    }

    /// Add a search-path directory directly.
    pub fn with_bin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if !self.bin_dirs.contains(&dir) {
            self.bin_dirs.push(dir);
        }
        self
    }

    pub fn bin_dirs(&self) -> &[PathBuf] {
        &self.bin_dirs
    }

    pub fn tools(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.tools.iter().map(|(k, v)| (k.as_str(), v.as_path()))
    }

    /// `PATH` value for child processes: tool dirs, then `inherited`.
    pub fn search_path(&self, inherited: Option<OsString>) -> Result<OsString> {
        let inherited: Vec<PathBuf> = inherited
            .map(|p| std::env::split_paths(&p).collect())
            .unwrap_or_default();
        std::env::join_paths(self.bin_dirs.iter().chain(inherited.iter()))
            .map_err(|e| ProvisioningError::InvalidSearchPath(e.to_string()))
    }

    /// Full environment overlay for a child process (`PATH` plus tool variables).
    pub fn command_env(&self) -> Result<Vec<(OsString, OsString)>> {
        let mut vars = vec![(
            OsString::from("PATH"),
            self.search_path(std::env::var_os("PATH"))?,
        )];
        vars.extend(
            self.env
                .iter()
                .map(|(k, v)| (OsString::from(k), v.clone())),
        );
        Ok(vars)
    }

    /// Tools whose install directory has disappeared since provisioning.
    pub fn missing_tools(&self) -> Vec<String> {
        self.tools
            .iter()
            .filter(|(_, dir)| !dir.exists())
            .map(|(tool, _)| tool.clone())
            .collect()
    }
}
