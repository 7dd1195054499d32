// src/pipeline/descriptor.rs

//! `.FOXINFO` package descriptor
//!
//! Every artifact carries a descriptor at its root in `key = value` form:
//!
//! ```text
//! # Generated by foxbuild
//! name = firefox
//! version = 1.0.0
//! description = Web browser
//! depend = gtk
//! maintainer = Mozilla
//! license = MPL-2.0
//! ```
//!
//! Only `name` is required. `depend` may repeat.

use crate::catalog::{PackageMetadata, is_valid_name};
use crate::error::{Error, Result};
use std::fs;
use std::io;
use std::path::Path;

/// File name of the descriptor inside an artifact
pub const DESCRIPTOR_FILE: &str = ".FOXINFO";

/// Parsed descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub name: String,
    pub version: String,
    pub description: String,
    pub dependencies: Vec<String>,
    pub maintainer: String,
    pub license: String,
}

impl Descriptor {
    /// Read the descriptor from the root of an unpacked tree
    pub fn read(staging: &Path) -> Result<Self> {
        let path = staging.join(DESCRIPTOR_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::MissingDescriptor(format!(
                    "no {} in unpacked artifact",
                    DESCRIPTOR_FILE
                )));
            }
            Err(e) => {
                return Err(Error::CorruptArtifact(format!(
                    "unreadable {}: {}",
                    DESCRIPTOR_FILE, e
                )));
            }
        };
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut name = None;
        let mut version = None;
        let mut description = None;
        let mut dependencies = Vec::new();
        let mut maintainer = None;
        let mut license = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let value = value.trim().to_string();
                match key.trim() {
                    "name" => name = Some(value),
                    "version" => version = Some(value),
                    "description" => description = Some(value),
                    "depend" if !value.is_empty() => dependencies.push(value),
                    "maintainer" => maintainer = Some(value),
                    "license" => license = Some(value),
                    _ => {}
                }
            }
        }

        let name = name.filter(|n| !n.is_empty()).ok_or_else(|| {
            Error::MissingDescriptor(format!("{} does not name the package", DESCRIPTOR_FILE))
        })?;
        if !is_valid_name(&name) {
            return Err(Error::CorruptArtifact(format!(
                "{} names an invalid package: {:?}",
                DESCRIPTOR_FILE, name
            )));
        }

        Ok(Self {
            name,
            version: version.unwrap_or_else(|| "unknown".to_string()),
            description: description.unwrap_or_default(),
            dependencies,
            maintainer: maintainer.unwrap_or_else(|| "unknown".to_string()),
            license: license.unwrap_or_else(|| "unknown".to_string()),
        })
    }

    pub fn to_metadata(&self) -> PackageMetadata {
        PackageMetadata::new(&self.name, &self.version, &self.description)
            .with_dependencies(self.dependencies.iter().cloned())
            .with_maintainer(&self.maintainer)
            .with_license(&self.license)
    }

    /// Render in `.FOXINFO` form
    pub fn render(&self) -> String {
        let mut out = format!(
            "name = {}\nversion = {}\ndescription = {}\n",
            self.name, self.version, self.description
        );
        for dep in &self.dependencies {
            out.push_str(&format!("depend = {}\n", dep));
        }
        out.push_str(&format!(
            "maintainer = {}\nlicense = {}\n",
            self.maintainer, self.license
        ));
        out
    }
}

impl From<&PackageMetadata> for Descriptor {
    fn from(pkg: &PackageMetadata) -> Self {
        Self {
            name: pkg.name.clone(),
            version: pkg.version.clone(),
            description: pkg.description.clone(),
            dependencies: pkg.dependencies.clone(),
            maintainer: pkg.maintainer.clone(),
            license: pkg.license.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_descriptor_parsing() {
        let content = r#"
# Sample .FOXINFO
name = firefox
version = 1.0.0
description = Web browser
depend = gtk
depend = nss
maintainer = Mozilla
license = MPL-2.0
"#;

        let desc = Descriptor::parse(content).unwrap();
        assert_eq!(desc.name, "firefox");
        assert_eq!(desc.version, "1.0.0");
        assert_eq!(desc.description, "Web browser");
        assert_eq!(desc.dependencies, vec!["gtk", "nss"]);
        assert_eq!(desc.maintainer, "Mozilla");
        assert_eq!(desc.license, "MPL-2.0");
    }

    #[test]
    fn test_optional_fields_default() {
        let desc = Descriptor::parse("name = curl\n").unwrap();
        assert_eq!(desc.version, "unknown");
        assert_eq!(desc.description, "");
        assert!(desc.dependencies.is_empty());
        assert_eq!(desc.maintainer, "unknown");
        assert_eq!(desc.license, "unknown");
    }

    #[test]
    fn test_name_is_required() {
        let result = Descriptor::parse("version = 1.0\n");
        assert!(matches!(result, Err(Error::MissingDescriptor(_))));

        let result = Descriptor::parse("name =\n");
        assert!(matches!(result, Err(Error::MissingDescriptor(_))));
    }

    #[test]
    fn test_unsafe_name_is_corrupt() {
        for content in ["name = ../gtk\n", "name = a/b\n", "name = ..\n"] {
            assert!(matches!(
                Descriptor::parse(content),
                Err(Error::CorruptArtifact(_))
            ));
        }
    }

    #[test]
    fn test_value_may_contain_equals() {
        let desc = Descriptor::parse("name = calc\ndescription = a = b solver\n").unwrap();
        assert_eq!(desc.description, "a = b solver");
    }

    #[test]
    fn test_read_missing_descriptor() {
        let temp = tempdir().unwrap();
        let result = Descriptor::read(temp.path());
        assert!(matches!(result, Err(Error::MissingDescriptor(_))));
    }

    #[test]
    fn test_render_parses_back_to_metadata() {
        let pkg = PackageMetadata::new("firefox", "1.0.0", "Web browser")
            .with_dependencies(["gtk"])
            .with_maintainer("Mozilla")
            .with_license("MPL-2.0");

        let rendered = Descriptor::from(&pkg).render();
        assert_eq!(Descriptor::parse(&rendered).unwrap().to_metadata(), pkg);
    }
}
