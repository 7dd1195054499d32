// src/pipeline/unpack.rs

//! Artifact expansion
//!
//! `.fox` artifacts are tarballs. The native compression is xz; gzip,
//! zstd and plain tar are accepted as well and told apart by magic bytes
//! rather than by file name.

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tar::Archive;
use tracing::debug;
use xz2::read::XzDecoder;

/// Expands an artifact into a directory tree
pub trait Unpacker {
    /// Unpack `artifact` into the existing directory `dest`
    fn unpack(&self, artifact: &Path, dest: &Path) -> Result<()>;
}

/// Artifact compression format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Xz,
    Gzip,
    Zstd,
    None,
}

/// Detect compression from the leading bytes of an artifact
pub fn detect_compression(magic: &[u8]) -> Option<Compression> {
    // xz: FD 37 7A 58 5A 00
    if magic.starts_with(&[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00]) {
        return Some(Compression::Xz);
    }
    // gzip: 1F 8B
    if magic.starts_with(&[0x1F, 0x8B]) {
        return Some(Compression::Gzip);
    }
    // zstd: 28 B5 2F FD
    if magic.starts_with(&[0x28, 0xB5, 0x2F, 0xFD]) {
        return Some(Compression::Zstd);
    }
    // POSIX tar: "ustar" at offset 257
    if magic.len() >= 262 && &magic[257..262] == b"ustar" {
        return Some(Compression::None);
    }
    None
}

/// Unpacks tarball artifacts with the `tar` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct TarUnpacker;

impl TarUnpacker {
    fn open(artifact: &Path) -> Result<Archive<Box<dyn Read>>> {
        let mut file = File::open(artifact).map_err(|e| {
            Error::CorruptArtifact(format!("Failed to open {}: {}", artifact.display(), e))
        })?;

        let mut magic = Vec::with_capacity(512);
        (&mut file)
            .take(512)
            .read_to_end(&mut magic)
            .map_err(|e| Error::CorruptArtifact(format!("Failed to read {}: {}", artifact.display(), e)))?;

        let compression = detect_compression(&magic).ok_or_else(|| {
            Error::CorruptArtifact(format!("Unrecognized artifact format: {}", artifact.display()))
        })?;
        debug!("Detected {:?} compression for {}", compression, artifact.display());

        // Reopen rather than seek so the decoder sees the whole stream
        let file = BufReader::new(File::open(artifact)?);
        let reader: Box<dyn Read> = match compression {
            Compression::Xz => Box::new(XzDecoder::new(file)),
            Compression::Gzip => Box::new(GzDecoder::new(file)),
            Compression::Zstd => Box::new(zstd::Decoder::with_buffer(file).map_err(|e| {
                Error::CorruptArtifact(format!("Failed to create zstd decoder: {}", e))
            })?),
            Compression::None => Box::new(file),
        };

        Ok(Archive::new(reader))
    }
}

impl Unpacker for TarUnpacker {
    fn unpack(&self, artifact: &Path, dest: &Path) -> Result<()> {
        let mut archive = Self::open(artifact)?;
        archive.set_preserve_permissions(true);
        archive.set_overwrite(true);
        archive.unpack(dest).map_err(|e| {
            Error::CorruptArtifact(format!("Failed to unpack {}: {}", artifact.display(), e))
        })?;
        debug!("Unpacked {} into {}", artifact.display(), dest.display());
        Ok(())
    }
}
