// src/error.rs

use thiserror::Error;

/// Core error types for fox
#[derive(Error, Debug)]
pub enum Error {
    /// Requested package is unknown to the catalog
    #[error("Package not found: {0}")]
    NotFound(String),

    /// A direct dependency of the package is not installed
    #[error("Cannot install {package}: missing dependency {missing}")]
    DependencyBlocked { package: String, missing: String },

    /// Installed packages still depend on the package
    #[error("{package} is required by installed package(s): {}", dependents.join(", "))]
    RemovalBlocked {
        package: String,
        dependents: Vec<String>,
    },

    /// Artifact could not be retrieved
    #[error("Transport error: {0}")]
    Transport(String),

    /// Artifact could not be expanded or failed verification
    #[error("Corrupt artifact: {0}")]
    CorruptArtifact(String),

    /// Unpacked artifact carries no .FOXINFO descriptor
    #[error("Package descriptor missing: {0}")]
    MissingDescriptor(String),

    /// Installed-state store could not be written
    #[error("Failed to persist installed state: {0}")]
    Persistence(String),

    /// Some manifest paths could not be deleted during removal
    #[error("Removal of {package} left {} file(s) behind", remaining.len())]
    RemovalIncomplete {
        package: String,
        remaining: Vec<String>,
    },

    /// Catalog index could not be read or parsed
    #[error("Catalog index error: {0}")]
    Index(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Transient failures that may succeed when the command is re-run
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Failures that must stop the rest of a batch
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Persistence(_))
    }
}

/// Result type alias using fox's Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removal_blocked_lists_dependents() {
        let err = Error::RemovalBlocked {
            package: "gtk".to_string(),
            dependents: vec!["firefox".to_string(), "gimp".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "gtk is required by installed package(s): firefox, gimp"
        );
    }

    #[test]
    fn test_error_classes() {
        assert!(Error::Transport("timeout".into()).is_retryable());
        assert!(!Error::CorruptArtifact("bad magic".into()).is_retryable());
        assert!(Error::Persistence("read-only".into()).is_fatal());
        assert!(!Error::NotFound("emacs".into()).is_fatal());
    }
}
