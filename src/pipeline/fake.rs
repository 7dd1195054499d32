// src/pipeline/fake.rs

//! In-process fetch/unpack doubles
//!
//! [`FakeFetcher`] writes a small placeholder artifact naming the package;
//! [`FakeUnpacker`] reads that placeholder back and deposits a canned tree
//! (`.FOXINFO`, `bin/<name>`, `lib/lib<name>.so`). Both can be told to
//! fail for specific packages so every pipeline stage can be exercised
//! without a network or real archives.

use super::descriptor::{DESCRIPTOR_FILE, Descriptor};
use super::fetch::Fetcher;
use super::unpack::Unpacker;
use crate::catalog::PackageMetadata;
use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

const PLACEHOLDER_MAGIC: &str = "FOX_PACKAGE";

/// Fetcher that writes placeholder artifacts into the cache
#[derive(Debug, Default, Clone)]
pub struct FakeFetcher {
    unreachable: BTreeSet<String>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make fetching `name` fail with a transport error
    pub fn unreachable(mut self, name: &str) -> Self {
        self.unreachable.insert(name.to_string());
        self
    }
}

impl Fetcher for FakeFetcher {
    fn fetch(&self, package: &PackageMetadata, cache_dir: &Path) -> Result<PathBuf> {
        if self.unreachable.contains(&package.name) {
            return Err(Error::Transport(format!("{} is unreachable", package.artifact_name())));
        }
        fs::create_dir_all(cache_dir)?;
        let path = cache_dir.join(package.artifact_name());
        fs::write(&path, placeholder(package))?;
        Ok(path)
    }
}

/// Placeholder artifact content understood by [`FakeUnpacker`]
pub fn placeholder(package: &PackageMetadata) -> String {
    format!(
        "{}\n{}",
        PLACEHOLDER_MAGIC,
        Descriptor::from(package).render()
    )
}

/// Unpacker that expands placeholder artifacts into a canned tree
#[derive(Debug, Default, Clone)]
pub struct FakeUnpacker {
    corrupt: BTreeSet<String>,
    without_descriptor: BTreeSet<String>,
}

impl FakeUnpacker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail part-way through unpacking `name`, after writing some files
    pub fn corrupt(mut self, name: &str) -> Self {
        self.corrupt.insert(name.to_string());
        self
    }

    /// Unpack `name` without its descriptor
    pub fn without_descriptor(mut self, name: &str) -> Self {
        self.without_descriptor.insert(name.to_string());
        self
    }
}

impl Unpacker for FakeUnpacker {
    fn unpack(&self, artifact: &Path, dest: &Path) -> Result<()> {
        let content = fs::read_to_string(artifact)
            .map_err(|e| Error::CorruptArtifact(format!("{}: {}", artifact.display(), e)))?;
        let body = content
            .strip_prefix(PLACEHOLDER_MAGIC)
            .ok_or_else(|| Error::CorruptArtifact(format!("{} is not a placeholder", artifact.display())))?;
        let descriptor = Descriptor::parse(body)?;
        let name = &descriptor.name;

        fs::create_dir_all(dest.join("bin"))?;
        fs::write(dest.join("bin").join(name), format!("#!/bin/sh\necho {}\n", name))?;

        if self.corrupt.contains(name) {
            return Err(Error::CorruptArtifact(format!("{} is truncated", artifact.display())));
        }

        fs::create_dir_all(dest.join("lib"))?;
        fs::write(dest.join("lib").join(format!("lib{}.so", name)), name.as_bytes())?;

        if !self.without_descriptor.contains(name) {
            fs::write(dest.join(DESCRIPTOR_FILE), descriptor.render())?;
        }
        Ok(())
    }
}
