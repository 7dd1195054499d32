// src/pipeline/mod.rs

//! Artifact pipeline
//!
//! Drives one package artifact through fetch, unpack, descriptor
//! extraction and placement:
//!
//! ```text
//! fetch(package)        -> cache/<name>-<version>.fox
//! stage(artifact)       -> cache/.staging-XXXX/ + parsed .FOXINFO
//! Staged::place(dest)   -> manifest of placed relative paths
//! ```
//!
//! Transport and archive decoding sit behind the [`Fetcher`] and
//! [`Unpacker`] traits. Staging directories are temporary and are removed
//! when the [`Staged`] value is dropped, including on every failure path.

pub mod descriptor;
pub mod fake;
pub mod fetch;
pub mod unpack;

use crate::catalog::PackageMetadata;
use crate::error::{Error, Result};
use crate::filesystem;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

pub use descriptor::{DESCRIPTOR_FILE, Descriptor};
pub use fetch::{Fetcher, MirrorFetcher, MirrorSource};
pub use unpack::{Compression, TarUnpacker, Unpacker};

const STAGING_PREFIX: &str = ".staging-";

/// An unpacked artifact awaiting placement
#[derive(Debug)]
pub struct Staged {
    dir: TempDir,
    descriptor: Descriptor,
}

impl Staged {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Copy the staged tree into `dest` and return the manifest
    ///
    /// Safe to repeat: placing the same tree again yields the same manifest.
    pub fn place(&self, dest: &Path) -> Result<Vec<String>> {
        filesystem::place(self.dir.path(), dest)
    }
}

/// Fetch/unpack/place orchestration over pluggable collaborators
pub struct ArtifactPipeline {
    fetcher: Box<dyn Fetcher>,
    unpacker: Box<dyn Unpacker>,
    cache_dir: PathBuf,
}

impl ArtifactPipeline {
    pub fn new(
        fetcher: Box<dyn Fetcher>,
        unpacker: Box<dyn Unpacker>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fetcher,
            unpacker,
            cache_dir: cache_dir.into(),
        }
    }

    /// Pipeline backed by a mirror and the tar unpacker
    pub fn from_mirror(mirror: &str, cache_dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::new(
            Box::new(MirrorFetcher::new(mirror)?),
            Box::new(TarUnpacker),
            cache_dir,
        ))
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Retrieve the artifact for `package` into the cache
    pub fn fetch(&self, package: &PackageMetadata) -> Result<PathBuf> {
        info!("Fetching {} {}", package.name, package.version);
        self.fetcher.fetch(package, &self.cache_dir)
    }

    /// Unpack `artifact` into a fresh staging directory and read its descriptor
    pub fn stage(&self, artifact: &Path) -> Result<Staged> {
        fs::create_dir_all(&self.cache_dir)?;
        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&self.cache_dir)?;
        debug!("Staging {} in {}", artifact.display(), dir.path().display());

        self.unpacker.unpack(artifact, dir.path())?;
        let descriptor = Descriptor::read(dir.path())?;

        Ok(Staged { dir, descriptor })
    }

    /// Fetch and stage `package`, checking the descriptor names it
    pub fn prepare(&self, package: &PackageMetadata) -> Result<Staged> {
        let artifact = self.fetch(package)?;
        let staged = self.stage(&artifact)?;

        if staged.descriptor.name != package.name {
            return Err(Error::CorruptArtifact(format!(
                "artifact {} describes package {}, expected {}",
                artifact.display(),
                staged.descriptor.name,
                package.name
            )));
        }
        Ok(staged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::fake::{FakeFetcher, FakeUnpacker};
    use tempfile::tempdir;

    fn pipeline(cache: &Path, fetcher: FakeFetcher, unpacker: FakeUnpacker) -> ArtifactPipeline {
        ArtifactPipeline::new(Box::new(fetcher), Box::new(unpacker), cache)
    }

    fn staging_dirs(cache: &Path) -> usize {
        fs::read_dir(cache)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_name().to_string_lossy().starts_with(STAGING_PREFIX))
                    .count()
            })
            .unwrap_or(0)
    }

    #[test]
    fn test_prepare_and_place() {
        let temp = tempdir().unwrap();
        let cache = temp.path().join("cache");
        let pipeline = pipeline(&cache, FakeFetcher::new(), FakeUnpacker::new());
        let pkg = PackageMetadata::new("git", "2.34.1", "Version control system");

        let staged = pipeline.prepare(&pkg).unwrap();
        assert_eq!(staged.descriptor().version, "2.34.1");

        let manifest = staged.place(&temp.path().join("root/git")).unwrap();
        assert_eq!(manifest, vec!["bin/git", "lib/libgit.so"]);

        drop(staged);
        assert_eq!(staging_dirs(&cache), 0);
    }

    #[test]
    fn test_fetch_failure_skips_unpack() {
        let temp = tempdir().unwrap();
        let cache = temp.path().join("cache");
        let pipeline = pipeline(&cache, FakeFetcher::new().unreachable("git"), FakeUnpacker::new());
        let pkg = PackageMetadata::new("git", "2.34.1", "Version control system");

        let result = pipeline.prepare(&pkg);
        assert!(matches!(result, Err(Error::Transport(_))));
        assert_eq!(staging_dirs(&cache), 0);
    }

    #[test]
    fn test_corrupt_artifact_discards_staging() {
        let temp = tempdir().unwrap();
        let cache = temp.path().join("cache");
        let pipeline = pipeline(&cache, FakeFetcher::new(), FakeUnpacker::new().corrupt("git"));
        let pkg = PackageMetadata::new("git", "2.34.1", "Version control system");

        let result = pipeline.prepare(&pkg);
        assert!(matches!(result, Err(Error::CorruptArtifact(_))));
        assert_eq!(staging_dirs(&cache), 0);
    }

    #[test]
    fn test_missing_descriptor() {
        let temp = tempdir().unwrap();
        let cache = temp.path().join("cache");
        let pipeline = pipeline(
            &cache,
            FakeFetcher::new(),
            FakeUnpacker::new().without_descriptor("git"),
        );
        let pkg = PackageMetadata::new("git", "2.34.1", "Version control system");

        let result = pipeline.prepare(&pkg);
        assert!(matches!(result, Err(Error::MissingDescriptor(_))));
        assert_eq!(staging_dirs(&cache), 0);
    }

    #[test]
    fn test_descriptor_name_must_match() {
        let temp = tempdir().unwrap();
        let cache = temp.path().join("cache");
        let pipeline = pipeline(&cache, FakeFetcher::new(), FakeUnpacker::new());

        // Artifact for "vim" stored under the name the "git" entry expects
        let vim = PackageMetadata::new("vim", "8.2", "Text editor");
        let artifact = FakeFetcher::new().fetch(&vim, &cache).unwrap();
        let staged = pipeline.stage(&artifact).unwrap();
        assert_eq!(staged.descriptor().name, "vim");

        let mut git = PackageMetadata::new("git", "2.34.1", "Version control system");
        git.download_url = Some(artifact.display().to_string());
        let mismatched = ArtifactPipeline::new(
            Box::new(MirrorFetcher::new(cache.to_str().unwrap()).unwrap()),
            Box::new(FakeUnpacker::new()),
            temp.path().join("cache2"),
        )
        .prepare(&git);
        assert!(matches!(mismatched, Err(Error::CorruptArtifact(_))));
    }
}
