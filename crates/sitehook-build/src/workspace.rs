//! Scratch workspace layout.

use std::io;
use std::path::{Path, PathBuf};

/// Fixed scratch directories for one warm environment.
///
/// Shared by every invocation the environment serves; callers serialize
/// access to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePaths {
    root: PathBuf,
    source: PathBuf,
    output: PathBuf,
    tools: PathBuf,
}

impl WorkspacePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            source: root.join("source"),
            output: root.join("public"),
            tools: root.join("tools"),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Source checkout root
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Build output root
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Where provisioned tools are installed
    pub fn tools(&self) -> &Path {
        &self.tools
    }

    /// Create the root, output and tools directories.
    pub fn prepare(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(&self.output)?;
        std::fs::create_dir_all(&self.tools)
    }

    /// Remove the checkout, if any, so a clone starts from nothing.
    pub fn reset_source(&self) -> io::Result<()> {
        remove_dir_if_exists(&self.source)
    }

    /// Empty the output root, leaving the directory itself.
    pub fn clean_output(&self) -> io::Result<()> {
        remove_dir_if_exists(&self.output)?;
        std::fs::create_dir_all(&self.output)
    }

    pub fn has_checkout(&self) -> bool {
        self.source.join(".git").exists()
    }
}

fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_under_root() {
        let paths = WorkspacePaths::new("/tmp/sitehook");
        assert_eq!(paths.source(), Path::new("/tmp/sitehook/source"));
        assert_eq!(paths.output(), Path::new("/tmp/sitehook/public"));
        assert_eq!(paths.tools(), Path::new("/tmp/sitehook/tools"));
    }

    #[test]
    fn clean_output_removes_stale_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = WorkspacePaths::new(dir.path());
        paths.prepare().unwrap();
        std::fs::create_dir_all(paths.output().join("old")).unwrap();
        std::fs::write(paths.output().join("old/index.html"), "stale").unwrap();

        paths.clean_output().unwrap();

        assert!(paths.output().is_dir());
        assert_eq!(std::fs::read_dir(paths.output()).unwrap().count(), 0);
    }

    #[test]
    fn reset_source_tolerates_absent_checkout() {
        let dir = tempfile::tempdir().unwrap();
        let paths = WorkspacePaths::new(dir.path());
        paths.reset_source().unwrap();

        std::fs::create_dir_all(paths.source().join(".git")).unwrap();
        assert!(paths.has_checkout());
        paths.reset_source().unwrap();
        assert!(!paths.has_checkout());
    }
}
