// src/engine.rs

//! Package operation engine
//!
//! Runs install, remove and search requests against one catalog, one
//! installed-state store and one artifact pipeline. Every requested
//! package reaches its own terminal state; a failure on one item never
//! stops the rest of the batch, with the single exception of a
//! persistence failure, after which the store can no longer be trusted
//! and the remaining items are skipped.
//!
//! Install: `NotFound | AlreadyInstalled | DependencyBlocked | Installed | Failed`
//!
//! Remove: `NotFound | NotInstalled | RemovalBlocked | Removed | Failed`

use crate::catalog::{Catalog, PackageMetadata};
use crate::config::Layout;
use crate::error::{Error, Result};
use crate::filesystem;
use crate::pipeline::{ArtifactPipeline, Staged};
use crate::resolver;
use crate::state::StateStore;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Successful terminal state of one requested package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Installed {
        name: String,
        version: String,
        files: usize,
    },
    AlreadyInstalled(String),
    Removed {
        name: String,
        files: usize,
    },
    NotInstalled(String),
}

impl Outcome {
    /// True for outcomes that changed nothing
    pub fn is_noop(&self) -> bool {
        matches!(self, Outcome::AlreadyInstalled(_) | Outcome::NotInstalled(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Installed { name, version, files } => {
                write!(f, "Installed {} {} ({} files)", name, version, files)
            }
            Outcome::AlreadyInstalled(name) => write!(f, "{} is already installed.", name),
            Outcome::Removed { name, files } => write!(f, "Removed {} ({} files)", name, files),
            Outcome::NotInstalled(name) => write!(f, "{} is not installed.", name),
        }
    }
}

/// Result for one requested item
#[derive(Debug)]
pub struct ItemReport {
    pub request: String,
    pub result: Result<Outcome>,
}

/// Per-item results of a batch, in request order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub items: Vec<ItemReport>,
    /// Requests never attempted because an earlier item hit a fatal error
    pub skipped: Vec<String>,
}

impl BatchReport {
    pub fn has_failures(&self) -> bool {
        !self.skipped.is_empty() || self.items.iter().any(|item| item.result.is_err())
    }

    pub fn aborted(&self) -> bool {
        !self.skipped.is_empty()
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &Outcome> {
        self.items.iter().filter_map(|item| item.result.as_ref().ok())
    }
}

/// Catalog entry annotated with its installed state
#[derive(Debug, Clone, Copy)]
pub struct SearchHit<'a> {
    pub package: &'a PackageMetadata,
    pub installed: bool,
}

/// Operation engine owning the state for one invocation
pub struct Engine {
    layout: Layout,
    catalog: Catalog,
    store: StateStore,
    pipeline: ArtifactPipeline,
}

impl Engine {
    pub fn new(layout: Layout, catalog: Catalog, store: StateStore, pipeline: ArtifactPipeline) -> Self {
        Self {
            layout,
            catalog,
            store,
            pipeline,
        }
    }

    /// Prepare the directory layout and load the installed-state store
    pub fn open(layout: Layout, catalog: Catalog, pipeline: ArtifactPipeline) -> Result<Self> {
        layout.ensure()?;
        let store = StateStore::load(&layout)?;
        Ok(Self::new(layout, catalog, store, pipeline))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Install each named package from the catalog
    pub fn install<S: AsRef<str>>(&mut self, names: &[S]) -> BatchReport {
        run_batch(names, |name| name.as_ref().to_string(), |name| self.install_one(name.as_ref()))
    }

    /// Install each pre-fetched artifact
    pub fn install_local<P: AsRef<Path>>(&mut self, paths: &[P]) -> BatchReport {
        run_batch(
            paths,
            |path| path.as_ref().display().to_string(),
            |path| self.install_local_one(path.as_ref()),
        )
    }

    /// Remove each named package
    pub fn remove<S: AsRef<str>>(&mut self, names: &[S]) -> BatchReport {
        run_batch(names, |name| name.as_ref().to_string(), |name| self.remove_one(name.as_ref()))
    }

    pub fn install_one(&mut self, name: &str) -> Result<Outcome> {
        let package = self
            .catalog
            .lookup(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;

        if self.store.is_installed(name) {
            return Ok(Outcome::AlreadyInstalled(name.to_string()));
        }
        check_dependencies(package, &self.store)?;

        info!("Installing {} {}", package.name, package.version);
        let staged = self.pipeline.prepare(package)?;
        self.commit(&staged)
    }

    pub fn install_local_one(&mut self, artifact: &Path) -> Result<Outcome> {
        if !artifact.is_file() {
            return Err(Error::Transport(format!(
                "{} is not a readable file",
                artifact.display()
            )));
        }

        let staged = self.pipeline.stage(artifact)?;
        let descriptor = staged.descriptor();
        let package = self
            .catalog
            .lookup(&descriptor.name)
            .ok_or_else(|| Error::NotFound(descriptor.name.clone()))?;

        if self.store.is_installed(&package.name) {
            return Ok(Outcome::AlreadyInstalled(package.name.clone()));
        }
        check_dependencies(package, &self.store)?;

        if descriptor.version != package.version {
            warn!(
                "{} from {} is version {}, catalog lists {}",
                package.name,
                artifact.display(),
                descriptor.version,
                package.version
            );
        }

        info!("Installing {} from {}", package.name, artifact.display());
        self.commit(&staged)
    }

    /// Place a staged package and record it
    fn commit(&mut self, staged: &Staged) -> Result<Outcome> {
        let descriptor = staged.descriptor();
        let dest = self.layout.package_dir(&descriptor.name);

        let manifest = staged.place(&dest)?;
        let files = manifest.len();
        if let Err(e) = self.store.mark_installed(&descriptor.name, manifest.clone()) {
            // Placed files are only tracked through the manifest
            let remaining = filesystem::remove_placed(&dest, &manifest);
            if !remaining.is_empty() {
                warn!(
                    "{} file(s) of {} remain under {} after a failed install",
                    remaining.len(),
                    descriptor.name,
                    dest.display()
                );
            }
            return Err(e);
        }

        info!("Installed {} into {}", descriptor.name, dest.display());
        Ok(Outcome::Installed {
            name: descriptor.name.clone(),
            version: descriptor.version.clone(),
            files,
        })
    }

    pub fn remove_one(&mut self, name: &str) -> Result<Outcome> {
        if !self.catalog.contains(name) {
            return Err(Error::NotFound(name.to_string()));
        }
        if !self.store.is_installed(name) {
            return Ok(Outcome::NotInstalled(name.to_string()));
        }

        let dependents = resolver::blocking_dependents(name, &self.catalog, &self.store);
        if !dependents.is_empty() {
            return Err(Error::RemovalBlocked {
                package: name.to_string(),
                dependents,
            });
        }

        info!("Removing {}", name);
        // Unrecord first: a crash after this point leaves stray files,
        // never a record whose files are gone.
        let record = match self.store.mark_removed(name)? {
            Some(record) => record,
            None => return Ok(Outcome::NotInstalled(name.to_string())),
        };

        let dest = self.layout.package_dir(name);
        let remaining = filesystem::remove_placed(&dest, &record.files);
        if !remaining.is_empty() {
            warn!(
                "{} is no longer installed but {} file(s) remain under {}",
                name,
                remaining.len(),
                dest.display()
            );
            return Err(Error::RemovalIncomplete {
                package: name.to_string(),
                remaining,
            });
        }

        debug!("Removed {} file(s) of {}", record.files.len(), name);
        Ok(Outcome::Removed {
            name: name.to_string(),
            files: record.files.len(),
        })
    }

    /// Catalog entries matching `query`, annotated with installed state
    pub fn search(&self, query: &str, ignore_case: bool) -> Vec<SearchHit<'_>> {
        search(&self.catalog, &self.store, query, ignore_case)
    }

    /// Placement directory of an installed package
    pub fn package_dir(&self, name: &str) -> PathBuf {
        self.layout.package_dir(name)
    }
}

/// Read-only search; needs no pipeline and never touches the store
pub fn search<'a>(
    catalog: &'a Catalog,
    store: &StateStore,
    query: &str,
    ignore_case: bool,
) -> Vec<SearchHit<'a>> {
    let matches = if ignore_case {
        catalog.search_ignore_case(query)
    } else {
        catalog.search(query)
    };

    matches
        .into_iter()
        .map(|package| SearchHit {
            package,
            installed: store.is_installed(&package.name),
        })
        .collect()
}

fn check_dependencies(package: &PackageMetadata, store: &StateStore) -> Result<()> {
    match resolver::missing_dependencies(package, store).first() {
        Some(missing) => Err(Error::DependencyBlocked {
            package: package.name.clone(),
            missing: missing.to_string(),
        }),
        None => Ok(()),
    }
}

fn run_batch<T, L, F>(requests: &[T], label: L, mut op: F) -> BatchReport
where
    L: Fn(&T) -> String,
    F: FnMut(&T) -> Result<Outcome>,
{
    let mut report = BatchReport::default();

    for (i, request) in requests.iter().enumerate() {
        let result = op(request);
        let fatal = matches!(&result, Err(e) if e.is_fatal());
        if let Err(e) = &result {
            debug!("{} failed: {}", label(request), e);
        }

        report.items.push(ItemReport {
            request: label(request),
            result,
        });

        if fatal {
            report.skipped = requests[i + 1..].iter().map(&label).collect();
            warn!("Stopping batch: {} request(s) skipped", report.skipped.len());
            break;
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Fetcher;
    use crate::pipeline::fake::{FakeFetcher, FakeUnpacker};
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn scenario_catalog() -> Catalog {
        Catalog::new([
            PackageMetadata::new("firefox", "1.0.0", "Web browser").with_dependencies(["gtk"]),
            PackageMetadata::new("gtk", "3.24", "GUI toolkit"),
            PackageMetadata::new("vim", "8.2", "Text editor"),
            PackageMetadata::new("nano", "6.0", "Simple text editor"),
            PackageMetadata::new("git", "2.34.1", "Version control system"),
        ])
    }

    fn engine_with(temp: &TempDir, fetcher: FakeFetcher, unpacker: FakeUnpacker) -> Engine {
        let layout = Layout::new(temp.path().join(".fox"));
        let pipeline = ArtifactPipeline::new(Box::new(fetcher), Box::new(unpacker), layout.cache_dir());
        Engine::open(layout, scenario_catalog(), pipeline).unwrap()
    }

    fn engine(temp: &TempDir) -> Engine {
        engine_with(temp, FakeFetcher::new(), FakeUnpacker::new())
    }

    fn single(report: BatchReport) -> Result<Outcome> {
        assert_eq!(report.items.len(), 1);
        report.items.into_iter().next().unwrap().result
    }

    #[test]
    fn test_dependency_scenario() {
        let temp = tempdir().unwrap();
        let mut engine = engine(&temp);

        match single(engine.install(&["firefox"])) {
            Err(Error::DependencyBlocked { package, missing }) => {
                assert_eq!(package, "firefox");
                assert_eq!(missing, "gtk");
            }
            other => panic!("expected DependencyBlocked, got {:?}", other),
        }

        assert!(matches!(single(engine.install(&["gtk"])), Ok(Outcome::Installed { .. })));
        assert!(matches!(single(engine.install(&["firefox"])), Ok(Outcome::Installed { .. })));

        match single(engine.remove(&["gtk"])) {
            Err(Error::RemovalBlocked { dependents, .. }) => assert_eq!(dependents, vec!["firefox"]),
            other => panic!("expected RemovalBlocked, got {:?}", other),
        }

        assert!(matches!(single(engine.remove(&["firefox"])), Ok(Outcome::Removed { .. })));
        assert!(matches!(single(engine.remove(&["gtk"])), Ok(Outcome::Removed { .. })));
        assert!(engine.store().is_empty());
    }

    #[test]
    fn test_install_places_files_and_records_manifest() {
        let temp = tempdir().unwrap();
        let mut engine = engine(&temp);

        let outcome = engine.install_one("vim").unwrap();

        assert_eq!(
            outcome,
            Outcome::Installed {
                name: "vim".to_string(),
                version: "8.2".to_string(),
                files: 2
            }
        );
        let dir = engine.package_dir("vim");
        assert!(dir.join("bin/vim").exists());
        assert!(dir.join("lib/libvim.so").exists());
        assert_eq!(
            engine.store().get("vim").unwrap().files,
            vec!["bin/vim", "lib/libvim.so"]
        );
    }

    #[test]
    fn test_install_unknown_package() {
        let temp = tempdir().unwrap();
        let mut engine = engine(&temp);
        assert!(matches!(engine.install_one("emacs"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_reinstall_is_noop() {
        let temp = tempdir().unwrap();
        let mut engine = engine(&temp);
        engine.install_one("vim").unwrap();
        let installed = fs::read(engine.layout().installed_file()).unwrap();
        let manifest = fs::read(engine.layout().manifest_file("vim")).unwrap();

        let outcome = engine.install_one("vim").unwrap();

        assert_eq!(outcome, Outcome::AlreadyInstalled("vim".to_string()));
        assert!(outcome.is_noop());
        assert_eq!(fs::read(engine.layout().installed_file()).unwrap(), installed);
        assert_eq!(fs::read(engine.layout().manifest_file("vim")).unwrap(), manifest);
    }

    #[test]
    fn test_batch_continues_after_failures() {
        let temp = tempdir().unwrap();
        let mut engine = engine_with(
            &temp,
            FakeFetcher::new().unreachable("git"),
            FakeUnpacker::new().corrupt("nano"),
        );

        let report = engine.install(&["emacs", "git", "nano", "firefox", "vim"]);

        assert_eq!(report.items.len(), 5);
        assert!(matches!(report.items[0].result, Err(Error::NotFound(_))));
        assert!(matches!(report.items[1].result, Err(Error::Transport(_))));
        assert!(matches!(report.items[2].result, Err(Error::CorruptArtifact(_))));
        assert!(matches!(report.items[3].result, Err(Error::DependencyBlocked { .. })));
        assert!(matches!(report.items[4].result, Ok(Outcome::Installed { .. })));
        assert!(report.has_failures());
        assert!(!report.aborted());

        let installed: Vec<_> = engine.store().names().collect();
        assert_eq!(installed, vec!["vim"]);
        assert!(!engine.package_dir("git").exists());
    }

    #[test]
    fn test_missing_descriptor_does_not_install() {
        let temp = tempdir().unwrap();
        let mut engine = engine_with(&temp, FakeFetcher::new(), FakeUnpacker::new().without_descriptor("vim"));

        let result = engine.install_one("vim");

        assert!(matches!(result, Err(Error::MissingDescriptor(_))));
        assert!(!engine.store().is_installed("vim"));
        assert!(!engine.package_dir("vim").exists());
    }

    #[test]
    fn test_install_then_remove_restores_store() {
        let temp = tempdir().unwrap();
        let mut engine = engine(&temp);
        engine.install_one("git").unwrap();
        let before = fs::read_to_string(engine.layout().installed_file()).unwrap();

        engine.install_one("vim").unwrap();
        engine.remove_one("vim").unwrap();

        assert_eq!(fs::read_to_string(engine.layout().installed_file()).unwrap(), before);
        assert!(!engine.layout().manifest_file("vim").exists());
        assert!(!engine.package_dir("vim").exists());
    }

    #[test]
    fn test_remove_not_installed() {
        let temp = tempdir().unwrap();
        let mut engine = engine(&temp);

        assert_eq!(engine.remove_one("vim").unwrap(), Outcome::NotInstalled("vim".to_string()));
        assert!(matches!(engine.remove_one("emacs"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_blocked_removal_changes_nothing() {
        let temp = tempdir().unwrap();
        let mut engine = engine(&temp);
        engine.install(&["gtk", "firefox"]);
        let installed = fs::read(engine.layout().installed_file()).unwrap();

        assert!(matches!(engine.remove_one("gtk"), Err(Error::RemovalBlocked { .. })));

        assert_eq!(fs::read(engine.layout().installed_file()).unwrap(), installed);
        assert!(engine.layout().manifest_file("gtk").exists());
        assert!(engine.package_dir("gtk").join("lib/libgtk.so").exists());
    }

    #[test]
    fn test_remove_tolerates_missing_files() {
        let temp = tempdir().unwrap();
        let mut engine = engine(&temp);
        engine.install_one("vim").unwrap();
        fs::remove_file(engine.package_dir("vim").join("bin/vim")).unwrap();

        let outcome = engine.remove_one("vim").unwrap();

        assert_eq!(outcome, Outcome::Removed { name: "vim".to_string(), files: 2 });
        assert!(!engine.package_dir("vim").exists());
    }

    #[test]
    fn test_installed_dependencies_hold_after_batch() {
        let temp = tempdir().unwrap();
        let mut engine = engine(&temp);

        engine.install(&["firefox", "gtk", "firefox", "vim"]);

        assert!(engine.store().is_installed("firefox"));
        assert!(resolver::dangling_dependencies(engine.catalog(), engine.store()).is_empty());
    }

    #[test]
    fn test_search_annotates_installed() {
        let temp = tempdir().unwrap();
        let mut engine = engine(&temp);
        engine.install_one("vim").unwrap();

        let hits = engine.search("text", true);
        let summary: Vec<_> = hits.iter().map(|h| (h.package.name.as_str(), h.installed)).collect();
        assert_eq!(summary, vec![("nano", false), ("vim", true)]);

        let hits = engine.search("text", false);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].package.name, "nano");
    }

    #[test]
    fn test_install_local_artifact() {
        let temp = tempdir().unwrap();
        let mut engine = engine(&temp);
        let gtk = engine.catalog().lookup("gtk").unwrap().clone();
        let artifact = FakeFetcher::new().fetch(&gtk, &temp.path().join("downloads")).unwrap();

        let report = engine.install_local(&[artifact.clone()]);
        assert!(matches!(report.items[0].result, Ok(Outcome::Installed { .. })));
        assert!(engine.store().is_installed("gtk"));

        let again = engine.install_local_one(&artifact).unwrap();
        assert_eq!(again, Outcome::AlreadyInstalled("gtk".to_string()));
    }

    #[test]
    fn test_install_local_checks_catalog_and_dependencies() {
        let temp = tempdir().unwrap();
        let mut engine = engine(&temp);
        let downloads = temp.path().join("downloads");

        let emacs = PackageMetadata::new("emacs", "29.1", "Extensible editor");
        let artifact = FakeFetcher::new().fetch(&emacs, &downloads).unwrap();
        assert!(matches!(engine.install_local_one(&artifact), Err(Error::NotFound(_))));

        let firefox = engine.catalog().lookup("firefox").unwrap().clone();
        let artifact = FakeFetcher::new().fetch(&firefox, &downloads).unwrap();
        assert!(matches!(
            engine.install_local_one(&artifact),
            Err(Error::DependencyBlocked { .. })
        ));

        let missing = engine.install_local_one(&downloads.join("nope.fox"));
        assert!(matches!(missing, Err(Error::Transport(_))));
    }

    #[test]
    fn test_persistence_failure_aborts_batch() {
        let temp = tempdir().unwrap();
        let mut engine = engine(&temp);
        let installed = engine.layout().installed_file();

        // A non-empty directory cannot be renamed over, even by root
        fs::create_dir_all(installed.join("blocker")).unwrap();
        let report = engine.install(&["vim", "git", "nano"]);

        assert!(matches!(report.items[0].result, Err(Error::Persistence(_))));
        assert!(report.aborted());
        assert!(report.has_failures());
        assert_eq!(report.items.len(), 1);
        assert_eq!(report.skipped, vec!["git", "nano"]);
        assert!(!engine.store().is_installed("vim"));
        assert!(!engine.layout().manifest_file("vim").exists());
        assert!(!engine.package_dir("vim").exists());
    }

    #[test]
    fn test_removal_reports_undeletable_files() {
        let temp = tempdir().unwrap();
        let mut engine = engine(&temp);
        engine.install_one("vim").unwrap();

        // A non-empty directory where the manifest expects a file
        let blocked = engine.package_dir("vim").join("bin/vim");
        fs::remove_file(&blocked).unwrap();
        fs::create_dir_all(blocked.join("keep")).unwrap();

        match engine.remove_one("vim") {
            Err(Error::RemovalIncomplete { package, remaining }) => {
                assert_eq!(package, "vim");
                assert_eq!(remaining, vec!["bin/vim"]);
            }
            other => panic!("expected RemovalIncomplete, got {:?}", other),
        }

        assert!(!engine.store().is_installed("vim"));
        assert!(!engine.layout().manifest_file("vim").exists());
        assert!(blocked.exists());
        assert!(!engine.package_dir("vim").join("lib/libvim.so").exists());

        let reloaded = StateStore::load(engine.layout()).unwrap();
        assert!(!reloaded.is_installed("vim"));
    }
}
