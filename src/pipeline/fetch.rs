// src/pipeline/fetch.rs

//! Artifact retrieval
//!
//! A [`Fetcher`] turns a catalog entry into a local artifact file under the
//! cache directory. [`MirrorFetcher`] reads from either an HTTP mirror or a
//! local directory; both go through a temp file and rename so a failed
//! download never leaves a truncated artifact under its final name.

use crate::catalog::PackageMetadata;
use crate::error::{Error, Result};
use crate::http::HttpClient;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Retrieves package artifacts
pub trait Fetcher {
    /// Fetch the artifact for `package` into `cache_dir` and return its path
    fn fetch(&self, package: &PackageMetadata, cache_dir: &Path) -> Result<PathBuf>;
}

/// Where a mirror keeps its artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorSource {
    Http(String),
    Directory(PathBuf),
}

impl MirrorSource {
    /// `http(s)://` URLs are remote, `file://` URLs and bare paths are local
    pub fn parse(mirror: &str) -> Self {
        if mirror.starts_with("http://") || mirror.starts_with("https://") {
            MirrorSource::Http(mirror.trim_end_matches('/').to_string())
        } else {
            let path = mirror.strip_prefix("file://").unwrap_or(mirror);
            MirrorSource::Directory(PathBuf::from(path))
        }
    }
}

/// Fetches artifacts from an HTTP or directory mirror
pub struct MirrorFetcher {
    source: MirrorSource,
    client: Option<HttpClient>,
}

impl MirrorFetcher {
    pub fn new(mirror: &str) -> Result<Self> {
        let source = MirrorSource::parse(mirror);
        let client = match source {
            MirrorSource::Http(_) => Some(HttpClient::new()?),
            MirrorSource::Directory(_) => None,
        };
        Ok(Self { source, client })
    }

    pub fn source(&self) -> &MirrorSource {
        &self.source
    }

    /// Resolve where the artifact for `package` lives
    ///
    /// An explicit `download_url` wins over the mirror's default path.
    pub fn locate(&self, package: &PackageMetadata) -> MirrorSource {
        if let Some(url) = &package.download_url {
            return MirrorSource::parse(url);
        }
        match &self.source {
            MirrorSource::Http(base) => {
                MirrorSource::Http(format!("{}/{}", base, package.artifact_name()))
            }
            MirrorSource::Directory(dir) => MirrorSource::Directory(dir.join(package.artifact_name())),
        }
    }

    fn client(&self) -> Result<&HttpClient> {
        match &self.client {
            Some(client) => Ok(client),
            None => Err(Error::Transport(
                "HTTP download requested from a directory mirror".to_string(),
            )),
        }
    }

    fn download(&self, url: &str, dest_path: &Path) -> Result<()> {
        info!("Downloading {} to {}", url, dest_path.display());
        let client = self.client()?;
        let temp_path = dest_path.with_extension("part");
        client.download(url, &temp_path)?;
        commit(&temp_path, dest_path)
    }

    fn copy_local(&self, src: &Path, dest_path: &Path) -> Result<()> {
        debug!("Copying {} to {}", src.display(), dest_path.display());
        let temp_path = dest_path.with_extension("part");
        fs::copy(src, &temp_path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            Error::Transport(format!("Failed to copy {}: {}", src.display(), e))
        })?;
        commit(&temp_path, dest_path)
    }
}

impl Fetcher for MirrorFetcher {
    fn fetch(&self, package: &PackageMetadata, cache_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(cache_dir).map_err(|e| {
            Error::Transport(format!("Failed to create {}: {}", cache_dir.display(), e))
        })?;
        let dest_path = cache_dir.join(package.artifact_name());

        match self.locate(package) {
            MirrorSource::Http(url) => self.download(&url, &dest_path)?,
            MirrorSource::Directory(src) => self.copy_local(&src, &dest_path)?,
        }

        if let Some(expected) = &package.sha256 {
            if let Err(e) = verify_sha256(&dest_path, expected) {
                let _ = fs::remove_file(&dest_path);
                return Err(e);
            }
            debug!("Checksum verified for {}", dest_path.display());
        }

        Ok(dest_path)
    }
}

fn commit(temp_path: &Path, dest_path: &Path) -> Result<()> {
    fs::rename(temp_path, dest_path).map_err(|e| {
        let _ = fs::remove_file(temp_path);
        Error::Transport(format!(
            "Failed to move {} to {}: {}",
            temp_path.display(),
            dest_path.display(),
            e
        ))
    })
}

/// Hex SHA-256 of a file
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn verify_sha256(path: &Path, expected: &str) -> Result<()> {
    let actual = sha256_file(path)?;
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(Error::CorruptArtifact(format!(
            "checksum mismatch for {}: expected {}, got {}",
            path.display(),
            expected,
            actual
        )))
    }
}
