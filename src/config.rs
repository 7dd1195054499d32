// src/config.rs

//! Per-user directory layout
//!
//! Everything fox persists lives under a single base directory
//! (`~/.fox` by default):
//!
//! ```text
//! ~/.fox/
//!   installed.txt          one installed package name per line
//!   manifests/<name>.list  one placed file path per line
//!   catalog.json           synced catalog index (optional)
//!   cache/                 downloaded artifacts and staging directories
//!   packages/<name>/       default target root for placed files
//! ```

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the base directory under the user's home
pub const BASE_DIR_NAME: &str = ".fox";

const INSTALLED_FILE: &str = "installed.txt";
const MANIFEST_DIR: &str = "manifests";
const MANIFEST_EXT: &str = "list";
const CATALOG_FILE: &str = "catalog.json";
const CACHE_DIR: &str = "cache";
const PACKAGES_DIR: &str = "packages";

/// Resolved paths for one invocation
#[derive(Debug, Clone)]
pub struct Layout {
    home: PathBuf,
    root: PathBuf,
}

impl Layout {
    /// Layout rooted at `home`, placing packages under `home/packages`
    pub fn new(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let root = home.join(PACKAGES_DIR);
        Self { home, root }
    }

    /// Resolve the layout from optional overrides
    ///
    /// Falls back to `$HOME/.fox`, or `/tmp/.fox` when no home directory
    /// can be determined.
    pub fn resolve(home: Option<PathBuf>, root: Option<PathBuf>) -> Self {
        let home = home.unwrap_or_else(default_home);
        let mut layout = Self::new(home);
        if let Some(root) = root {
            layout.root = root;
        }
        layout
    }

    /// Override the target root
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Target root that package directories are placed under
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Placement directory of a single package
    pub fn package_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.home.join(CACHE_DIR)
    }

    pub fn installed_file(&self) -> PathBuf {
        self.home.join(INSTALLED_FILE)
    }

    pub fn manifest_dir(&self) -> PathBuf {
        self.home.join(MANIFEST_DIR)
    }

    pub fn manifest_file(&self, name: &str) -> PathBuf {
        self.manifest_dir()
            .join(format!("{}.{}", name, MANIFEST_EXT))
    }

    pub fn catalog_file(&self) -> PathBuf {
        self.home.join(CATALOG_FILE)
    }

    /// Create every directory fox writes into
    ///
    /// Idempotent; must run before the first write of a mutating command.
    pub fn ensure(&self) -> Result<()> {
        for dir in [
            self.home.clone(),
            self.cache_dir(),
            self.manifest_dir(),
            self.root.clone(),
        ] {
            fs::create_dir_all(&dir).map_err(|e| {
                Error::Persistence(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }
        debug!("Directory layout ready under {}", self.home.display());
        Ok(())
    }
}

fn default_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(BASE_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_layout_paths() {
        let layout = Layout::new("/home/user/.fox");
        assert_eq!(layout.installed_file(), PathBuf::from("/home/user/.fox/installed.txt"));
        assert_eq!(
            layout.manifest_file("vim"),
            PathBuf::from("/home/user/.fox/manifests/vim.list")
        );
        assert_eq!(layout.package_dir("vim"), PathBuf::from("/home/user/.fox/packages/vim"));
    }

    #[test]
    fn test_root_override() {
        let layout = Layout::resolve(Some("/srv/fox".into()), Some("/opt/foxglove".into()));
        assert_eq!(layout.home(), Path::new("/srv/fox"));
        assert_eq!(layout.package_dir("git"), PathBuf::from("/opt/foxglove/git"));
        assert_eq!(layout.cache_dir(), PathBuf::from("/srv/fox/cache"));
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let temp = tempdir().unwrap();
        let layout = Layout::new(temp.path().join("nested/.fox"));

        layout.ensure().unwrap();
        layout.ensure().unwrap();

        assert!(layout.cache_dir().is_dir());
        assert!(layout.manifest_dir().is_dir());
        assert!(layout.root().is_dir());
    }
}
