// src/catalog/mod.rs

//! Package catalog
//!
//! Read-only registry of every package fox knows about. The catalog is
//! built once per invocation, either from the built-in table or from a
//! synced JSON index, and is never mutated afterwards.

pub mod index;

use crate::config::Layout;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

pub use index::{CatalogIndex, IndexClient};

/// Metadata for a single catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub name: String,
    #[serde(default = "unknown")]
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// Direct dependencies, in declaration order
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default = "unknown")]
    pub maintainer: String,
    #[serde(default = "unknown")]
    pub license: String,
    /// Where the artifact lives, when it is not under the mirror's default path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// Expected SHA-256 of the artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

fn unknown() -> String {
    "unknown".to_string()
}

impl PackageMetadata {
    /// Create an entry with no dependencies and unknown maintainer/license
    pub fn new(name: impl Into<String>, version: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
            dependencies: Vec::new(),
            maintainer: unknown(),
            license: unknown(),
            download_url: None,
            sha256: None,
        }
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_maintainer(mut self, maintainer: impl Into<String>) -> Self {
        self.maintainer = maintainer.into();
        self
    }

    pub fn with_license(mut self, license: impl Into<String>) -> Self {
        self.license = license.into();
        self
    }

    /// File name of this package's artifact, e.g. `vim-8.2.fox`
    pub fn artifact_name(&self) -> String {
        format!("{}-{}.fox", self.name, self.version)
    }

    pub fn depends_on(&self, name: &str) -> bool {
        self.dependencies.iter().any(|dep| dep == name)
    }
}

/// Whether `name` can be used as a package name
///
/// Names become path components under the target root and the manifests
/// directory, and lines of `installed.txt`.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_whitespace() || c.is_control())
}

/// Read-only mapping of package name to metadata
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    packages: BTreeMap<String, PackageMetadata>,
}

impl Catalog {
    /// Build a catalog from entries; later duplicates replace earlier ones
    pub fn new(packages: impl IntoIterator<Item = PackageMetadata>) -> Self {
        let packages = packages
            .into_iter()
            .map(|pkg| (pkg.name.clone(), pkg))
            .collect();
        Self { packages }
    }

    /// The Foxglove reference package set
    pub fn builtin() -> Self {
        Self::new([
            PackageMetadata::new("firefox", "1.0.0", "Web browser")
                .with_dependencies(["gtk"])
                .with_maintainer("Mozilla")
                .with_license("MPL-2.0"),
            PackageMetadata::new("vim", "8.2", "Text editor")
                .with_maintainer("Bram Moolenaar")
                .with_license("Vim"),
            PackageMetadata::new("git", "2.34.1", "Version control system")
                .with_maintainer("Git Contributors")
                .with_license("GPL-2.0"),
            PackageMetadata::new("gtk", "3.24", "GUI toolkit")
                .with_maintainer("GNOME")
                .with_license("LGPL-2.1"),
            PackageMetadata::new("nano", "6.0", "Simple text editor")
                .with_maintainer("GNU")
                .with_license("GPL-3.0"),
            PackageMetadata::new("curl", "7.80.0", "Data transfer tool")
                .with_maintainer("Daniel Stenberg")
                .with_license("curl"),
        ])
    }

    /// Load the synced index if one exists, otherwise the built-in table
    pub fn load(layout: &Layout) -> Result<Self> {
        let path = layout.catalog_file();
        if path.exists() {
            let index = CatalogIndex::read(&path)?;
            debug!(
                "Loaded catalog index {} {} ({} packages)",
                index.name,
                index.version,
                index.packages.len()
            );
            Ok(Self::new(index.packages))
        } else {
            debug!("No catalog index at {}, using built-in catalog", path.display());
            Ok(Self::builtin())
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&PackageMetadata> {
        self.packages.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    /// Entries whose name or description contains `query` (case-sensitive)
    ///
    /// Results come back sorted by name.
    pub fn search(&self, query: &str) -> Vec<&PackageMetadata> {
        self.packages
            .values()
            .filter(|pkg| pkg.name.contains(query) || pkg.description.contains(query))
            .collect()
    }

    /// Like [`Catalog::search`], ignoring case
    pub fn search_ignore_case(&self, query: &str) -> Vec<&PackageMetadata> {
        let query = query.to_lowercase();
        self.packages
            .values()
            .filter(|pkg| {
                pkg.name.to_lowercase().contains(&query)
                    || pkg.description.to_lowercase().contains(&query)
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageMetadata> {
        self.packages.values()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
