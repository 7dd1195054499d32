// src/filesystem.rs

//! Filesystem placement and removal
//!
//! Copies a staged package tree into its placement directory and deletes
//! it again from a manifest. Manifest entries are `/`-separated paths
//! relative to the placement directory and name regular files and
//! symlinks only; directories are created on demand and pruned when they
//! become empty.

use crate::error::{Error, Result};
use crate::pipeline::descriptor::DESCRIPTOR_FILE;
use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Replace `path` with `contents` via a sibling temp file and rename
///
/// Readers see either the old or the new content, never a torn write.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Copy everything under `staging` into `dest`
///
/// The top-level descriptor is not placed. Existing files are overwritten,
/// so placing the same staging tree twice converges to the same result.
/// Returns the sorted manifest of placed paths.
pub fn place(staging: &Path, dest: &Path) -> Result<Vec<String>> {
    // Check every name before touching `dest` so a rejected artifact
    // places nothing
    let mut entries = Vec::new();
    for entry in WalkDir::new(staging)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(io::Error::from)?;
        let relative = match entry.path().strip_prefix(staging) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => continue,
        };

        if entry.depth() == 1 && relative == Path::new(DESCRIPTOR_FILE) {
            continue;
        }
        let recorded = manifest_entry(&relative)?;
        entries.push((entry, relative, recorded));
    }

    fs::create_dir_all(dest)?;
    let mut manifest = Vec::new();

    for (entry, relative, recorded) in entries {
        let target = dest.join(&relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        clear_for_replacement(&target)?;

        if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            make_symlink(&link, &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }

        manifest.push(recorded);
    }

    manifest.sort();
    debug!("Placed {} file(s) into {}", manifest.len(), dest.display());
    Ok(manifest)
}

/// Delete every manifest path under `dest`, tolerating missing files
///
/// Returns the entries that could not be removed. Directories left empty
/// are pruned afterwards, `dest` included.
pub fn remove_placed(dest: &Path, manifest: &[String]) -> Vec<String> {
    let mut remaining = Vec::new();
    let mut parents = BTreeSet::new();

    for entry in manifest {
        let Some(path) = resolve_entry(dest, entry) else {
            warn!("Refusing to remove unsafe manifest path: {}", entry);
            remaining.push(entry.clone());
            continue;
        };

        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Already gone: {}", path.display());
            }
            Err(e) => {
                warn!("Failed to remove {}: {}", path.display(), e);
                remaining.push(entry.clone());
                continue;
            }
        }

        let mut dir = path.parent();
        while let Some(d) = dir {
            if !d.starts_with(dest) || d == dest {
                break;
            }
            parents.insert(d.to_path_buf());
            dir = d.parent();
        }
    }

    // Deepest first so children go before their parents
    let mut parents: Vec<PathBuf> = parents.into_iter().collect();
    parents.sort_by_key(|p| std::cmp::Reverse(p.components().count()));
    for dir in parents.iter().map(PathBuf::as_path).chain([dest]) {
        let _ = fs::remove_dir(dir);
    }

    remaining
}

/// Join a manifest entry onto `dest`, rejecting anything that could escape it
pub fn resolve_entry(dest: &Path, entry: &str) -> Option<PathBuf> {
    let relative = Path::new(entry);
    if entry.is_empty() || !relative.components().all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }
    Some(dest.join(relative))
}

/// Manifest line for a staged path
///
/// Manifests are newline-delimited UTF-8, so names that cannot be written
/// back verbatim are rejected rather than recorded lossily.
fn manifest_entry(relative: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        let part = component.as_os_str().to_str().ok_or_else(|| {
            Error::CorruptArtifact(format!(
                "artifact path is not valid UTF-8: {}",
                relative.display()
            ))
        })?;
        if part.contains(['\n', '\r']) {
            return Err(Error::CorruptArtifact(format!(
                "artifact path contains a line break: {:?}",
                relative
            )));
        }
        parts.push(part);
    }
    Ok(parts.join("/"))
}

fn clear_for_replacement(target: &Path) -> io::Result<()> {
    match fs::symlink_metadata(target) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(target),
        Ok(meta) if meta.file_type().is_symlink() => fs::remove_file(target),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn make_symlink(link: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(link, target)
}

#[cfg(not(unix))]
fn make_symlink(link: &Path, target: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("symlink {} -> {} not supported on this platform", target.display(), link.display()),
    ))
}
