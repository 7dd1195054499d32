// src/resolver.rs

//! Direct-dependency checks
//!
//! fox uses a flat model: a package may be installed once every name in
//! its dependency list is installed, and may be removed once no installed
//! package lists it. Dependencies of dependencies are never pulled in.

use crate::catalog::{Catalog, PackageMetadata};
use crate::state::StateStore;
use std::collections::BTreeSet;

/// Read view of the installed set
pub trait InstalledSet {
    fn contains_package(&self, name: &str) -> bool;

    /// Installed names in a deterministic order
    fn package_names(&self) -> Vec<&str>;
}

impl InstalledSet for StateStore {
    fn contains_package(&self, name: &str) -> bool {
        self.is_installed(name)
    }

    fn package_names(&self) -> Vec<&str> {
        self.names().collect()
    }
}

impl InstalledSet for BTreeSet<String> {
    fn contains_package(&self, name: &str) -> bool {
        self.contains(name)
    }

    fn package_names(&self) -> Vec<&str> {
        self.iter().map(String::as_str).collect()
    }
}

/// Dependencies of `metadata` that are not installed, in declaration order
pub fn missing_dependencies<'a>(
    metadata: &'a PackageMetadata,
    installed: &impl InstalledSet,
) -> Vec<&'a str> {
    metadata
        .dependencies
        .iter()
        .map(String::as_str)
        .filter(|dep| !installed.contains_package(dep))
        .collect()
}

pub fn can_install(metadata: &PackageMetadata, installed: &impl InstalledSet) -> bool {
    missing_dependencies(metadata, installed).is_empty()
}

/// Installed packages whose catalog entry lists `name` as a dependency
///
/// Sorted by name. Installed packages that are no longer in the catalog
/// have no known dependencies and never block.
pub fn blocking_dependents(
    name: &str,
    catalog: &Catalog,
    installed: &impl InstalledSet,
) -> Vec<String> {
    installed
        .package_names()
        .into_iter()
        .filter(|pkg| *pkg != name)
        .filter_map(|pkg| catalog.lookup(pkg))
        .filter(|meta| meta.depends_on(name))
        .map(|meta| meta.name.clone())
        .collect()
}

/// Installed packages with at least one dependency that is not installed
pub fn dangling_dependencies(
    catalog: &Catalog,
    installed: &impl InstalledSet,
) -> Vec<(String, Vec<String>)> {
    installed
        .package_names()
        .into_iter()
        .filter_map(|pkg| catalog.lookup(pkg))
        .filter_map(|meta| {
            let missing = missing_dependencies(meta, installed);
            if missing.is_empty() {
                None
            } else {
                Some((
                    meta.name.clone(),
                    missing.into_iter().map(str::to_string).collect(),
                ))
            }
        })
        .collect()
}
