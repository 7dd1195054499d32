// src/catalog/index.rs

//! JSON catalog index
//!
//! A mirror publishes its package list as `metadata.json`. `fox sync`
//! downloads it and stores a copy as `catalog.json` in the base
//! directory, which [`Catalog::load`](super::Catalog::load) then prefers
//! over the built-in table.

use super::{PackageMetadata, is_valid_name};
use crate::error::{Error, Result};
use crate::filesystem::write_atomic;
use crate::http::HttpClient;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Name of the index file published by a mirror
pub const INDEX_FILE: &str = "metadata.json";

/// Catalog index format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogIndex {
    pub name: String,
    pub version: String,
    pub packages: Vec<PackageMetadata>,
}

impl CatalogIndex {
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Index(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    /// Parse an index, rejecting package or dependency names that are
    /// not usable as paths
    pub fn parse(content: &str) -> Result<Self> {
        let index: Self = serde_json::from_str(content)
            .map_err(|e| Error::Index(format!("Failed to parse catalog index: {}", e)))?;

        for pkg in &index.packages {
            if !is_valid_name(&pkg.name) {
                return Err(Error::Index(format!("Invalid package name: {:?}", pkg.name)));
            }
            if let Some(dep) = pkg.dependencies.iter().find(|dep| !is_valid_name(dep)) {
                return Err(Error::Index(format!(
                    "Invalid dependency name {:?} in {}",
                    dep, pkg.name
                )));
            }
        }
        Ok(index)
    }

    /// Write the index atomically
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| Error::Index(format!("Failed to serialize catalog index: {}", e)))?;
        write_atomic(path, &json)
            .map_err(|e| Error::Persistence(format!("Failed to write {}: {}", path.display(), e)))
    }
}

/// URL of the index under a mirror base URL
pub fn index_url(base: &str) -> String {
    if base.ends_with('/') {
        format!("{}{}", base, INDEX_FILE)
    } else {
        format!("{}/{}", base, INDEX_FILE)
    }
}

/// Client for mirror catalog indexes
pub struct IndexClient {
    http: HttpClient,
}

impl IndexClient {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http: HttpClient::new()?,
        })
    }

    /// Fetch and parse `<base>/metadata.json`
    pub fn fetch(&self, base: &str) -> Result<CatalogIndex> {
        let url = index_url(base);
        info!("Fetching catalog index from {}", url);

        let body = self.http.get_text(&url)?;
        let index = CatalogIndex::parse(&body)?;

        info!("Fetched catalog index with {} packages", index.packages.len());
        Ok(index)
    }

    /// Download the index from `base` and store it at `dest`
    pub fn sync(&self, base: &str, dest: &Path) -> Result<CatalogIndex> {
        let index = self.fetch(base)?;
        index.write(dest)?;
        info!("Stored catalog index at {}", dest.display());
        Ok(index)
    }
}
