// src/state.rs

//! Installed-state store
//!
//! The persisted record of which packages are installed and which files
//! each one placed. Two plain-text artifacts back it:
//!
//! - `installed.txt`: one package name per line
//! - `manifests/<name>.list`: one placed path per line
//!
//! Every mutation rewrites a complete fresh copy through a temp file and
//! rename, so a crash leaves either the old or the new content. The
//! manifest is written before the package joins `installed.txt`, which
//! means a name is never recorded without its file list.

use crate::catalog::is_valid_name;
use crate::config::Layout;
use crate::error::{Error, Result};
use crate::filesystem::write_atomic;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// What one installed package placed on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationRecord {
    pub name: String,
    /// Sorted paths relative to the package's placement directory
    pub files: Vec<String>,
}

impl InstallationRecord {
    pub fn new(name: impl Into<String>, files: impl IntoIterator<Item = String>) -> Self {
        let mut files: Vec<String> = files.into_iter().collect();
        files.sort();
        files.dedup();
        Self {
            name: name.into(),
            files,
        }
    }
}

/// Persisted mapping of package name to installation record
#[derive(Debug)]
pub struct StateStore {
    layout: Layout,
    records: BTreeMap<String, InstallationRecord>,
}

impl StateStore {
    /// Reconstruct the store from disk
    ///
    /// A missing `installed.txt` yields an empty store. A missing manifest
    /// yields a record with no files.
    pub fn load(layout: &Layout) -> Result<Self> {
        let installed_file = layout.installed_file();
        let names = match read_lines(&installed_file) {
            Ok(names) => names,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No installed set at {}, starting empty", installed_file.display());
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        let mut records = BTreeMap::new();
        for name in names {
            if !is_valid_name(&name) {
                warn!("Ignoring invalid package name in {}: {:?}", installed_file.display(), name);
                continue;
            }
            let manifest_file = layout.manifest_file(&name);
            let files = match read_lines(&manifest_file) {
                Ok(files) => files,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    warn!("Installed package {} has no manifest", name);
                    Vec::new()
                }
                Err(e) => return Err(e.into()),
            };
            records.insert(name.clone(), InstallationRecord::new(name, files));
        }

        debug!("Loaded {} installed package(s)", records.len());
        Ok(Self {
            layout: layout.clone(),
            records,
        })
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&InstallationRecord> {
        self.records.get(name)
    }

    /// Installed package names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn records(&self) -> impl Iterator<Item = &InstallationRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record `name` as installed with `files` and persist
    ///
    /// On failure the in-memory store is left as it was before the call.
    pub fn mark_installed(&mut self, name: &str, files: Vec<String>) -> Result<()> {
        if !is_valid_name(name) {
            return Err(Error::Persistence(format!(
                "package name {:?} cannot be recorded",
                name
            )));
        }
        let record = InstallationRecord::new(name, files);
        let manifest_file = self.layout.manifest_file(name);

        write_lines(&manifest_file, &record.files)?;

        let previous = self.records.insert(name.to_string(), record);
        if let Err(e) = self.persist() {
            match previous {
                Some(old) => {
                    if let Err(restore) = write_lines(&manifest_file, &old.files) {
                        warn!("Failed to restore manifest of {}: {}", name, restore);
                    }
                    self.records.insert(name.to_string(), old);
                }
                None => {
                    self.records.remove(name);
                    match fs::remove_file(&manifest_file) {
                        Ok(()) => {}
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                        Err(e) => warn!(
                            "Failed to delete manifest {}: {}",
                            manifest_file.display(),
                            e
                        ),
                    }
                }
            }
            return Err(e);
        }

        debug!("Recorded {} as installed", name);
        Ok(())
    }

    /// Drop the record for `name` and persist
    pub fn mark_removed(&mut self, name: &str) -> Result<Option<InstallationRecord>> {
        let Some(record) = self.records.remove(name) else {
            return Ok(None);
        };

        if let Err(e) = self.persist() {
            self.records.insert(name.to_string(), record);
            return Err(e);
        }

        let manifest_file = self.layout.manifest_file(name);
        match fs::remove_file(&manifest_file) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to delete manifest {}: {}", manifest_file.display(), e),
        }

        debug!("Recorded {} as removed", name);
        Ok(Some(record))
    }

    fn persist(&self) -> Result<()> {
        let names: Vec<String> = self.records.keys().cloned().collect();
        write_lines(&self.layout.installed_file(), &names)
    }
}

fn read_lines(path: &Path) -> io::Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .split('\n')
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    let mut content = String::new();
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            Error::Persistence(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }
    write_atomic(path, content.as_bytes())
        .map_err(|e| Error::Persistence(format!("Failed to write {}: {}", path.display(), e)))
}
