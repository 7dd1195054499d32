// src/lib.rs

//! fox Package Manager
//!
//! Local package-lifecycle manager for the Foxglove Linux distribution:
//! tracks known and installed packages, checks direct dependencies, and
//! installs or removes packages under a per-user root.
//!
//! # Architecture
//!
//! - Catalog: read-only name -> metadata mapping, built once per run
//! - State store: plain-text installed set plus one manifest per package
//! - Resolver: flat direct-dependency checks, no transitive resolution
//! - Pipeline: fetch -> unpack -> descriptor -> placement, behind traits
//! - Engine: per-package state machine with best-effort batch semantics

pub mod catalog;
pub mod config;
pub mod engine;
mod error;
pub mod filesystem;
pub mod http;
pub mod pipeline;
pub mod resolver;
pub mod state;

pub use catalog::{Catalog, PackageMetadata};
pub use config::Layout;
pub use engine::{BatchReport, Engine, Outcome};
pub use error::{Error, Result};
pub use pipeline::ArtifactPipeline;
pub use state::{InstallationRecord, StateStore};
