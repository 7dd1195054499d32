// src/main.rs

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use fox::catalog::IndexClient;
use fox::engine::BatchReport;
use fox::{ArtifactPipeline, Catalog, Engine, Layout, StateStore, resolver};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Parser)]
#[command(name = "fox")]
#[command(author, version, about = "The package manager for the Foxglove Linux distribution", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Base directory for fox state (default: ~/.fox)
    #[arg(long, env = "FOX_HOME", value_name = "DIR", global = true)]
    home: Option<PathBuf>,

    /// Target root packages are placed under (default: <home>/packages)
    #[arg(short, long, env = "FOX_ROOT", value_name = "DIR", global = true)]
    root: Option<PathBuf>,

    /// Mirror URL or directory to fetch artifacts from (default: <home>/mirror)
    #[arg(short, long, env = "FOX_MIRROR", value_name = "URL", global = true)]
    mirror: Option<String>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Install one or more packages
    Install {
        /// Names of the package(s) to install
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Install pre-fetched .fox artifacts
    InstallLocal {
        /// Path(s) to the artifact file(s)
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Remove one or more packages
    Remove {
        /// Names of the package(s) to remove
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Search for a package in the catalog
    Search {
        /// Substring of a package name or description
        query: String,
        /// Match regardless of case
        #[arg(short, long)]
        ignore_case: bool,
    },
    /// List installed packages
    List,
    /// Show details for a package
    Info {
        /// Package name
        name: String,
    },
    /// Download the catalog index from a mirror
    Sync {
        /// Mirror base URL (metadata.json is fetched from it)
        url: String,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        shell: Shell,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}

fn open_engine(cli: &Cli, layout: Layout) -> Result<Engine> {
    let catalog = Catalog::load(&layout)?;
    let mirror = match &cli.mirror {
        Some(mirror) => mirror.clone(),
        None => layout.home().join("mirror").display().to_string(),
    };
    let pipeline = ArtifactPipeline::from_mirror(&mirror, layout.cache_dir())?;
    Ok(Engine::open(layout, catalog, pipeline)?)
}

/// Print one line per item and return the exit status for the batch
fn print_report(report: &BatchReport) -> ExitCode {
    for item in &report.items {
        match &item.result {
            Ok(outcome) => println!("{}", outcome),
            Err(e) => eprintln!("error: {}", e),
        }
    }
    for request in &report.skipped {
        eprintln!("skipped: {}", request);
    }

    if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let layout = Layout::resolve(cli.home.clone(), cli.root.clone());

    match &cli.command {
        Some(Commands::Install { packages }) => {
            info!("Installing packages: {:?}", packages);
            let mut engine = open_engine(&cli, layout)?;
            Ok(print_report(&engine.install(packages)))
        }
        Some(Commands::InstallLocal { paths }) => {
            info!("Installing local artifacts: {:?}", paths);
            let mut engine = open_engine(&cli, layout)?;
            Ok(print_report(&engine.install_local(paths)))
        }
        Some(Commands::Remove { packages }) => {
            info!("Removing packages: {:?}", packages);
            let mut engine = open_engine(&cli, layout)?;
            Ok(print_report(&engine.remove(packages)))
        }
        Some(Commands::Search { query, ignore_case }) => {
            let catalog = Catalog::load(&layout)?;
            let store = StateStore::load(&layout)?;

            let hits = fox::engine::search(&catalog, &store, query, *ignore_case);
            if hits.is_empty() {
                println!("No packages found matching '{}'.", query);
            } else {
                println!("Search results for '{}':", query);
                for hit in &hits {
                    print!(
                        "{} ({}) - {}",
                        hit.package.name, hit.package.version, hit.package.description
                    );
                    if hit.installed {
                        print!(" [installed]");
                    }
                    println!();
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::List) => {
            let catalog = Catalog::load(&layout)?;
            let store = StateStore::load(&layout)?;

            if store.is_empty() {
                println!("No packages installed.");
            } else {
                println!("Installed packages:");
                for record in store.records() {
                    let version = catalog
                        .lookup(&record.name)
                        .map(|pkg| pkg.version.as_str())
                        .unwrap_or("unknown");
                    println!("  {} {} ({} files)", record.name, version, record.files.len());
                }
                println!("\nTotal: {} package(s)", store.len());
            }

            for (package, missing) in resolver::dangling_dependencies(&catalog, &store) {
                eprintln!(
                    "warning: {} is missing dependencies: {}",
                    package,
                    missing.join(", ")
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Info { name }) => {
            let catalog = Catalog::load(&layout)?;
            let store = StateStore::load(&layout)?;

            let Some(pkg) = catalog.lookup(name) else {
                eprintln!("Package not found: {}", name);
                return Ok(ExitCode::FAILURE);
            };

            println!("Name:         {}", pkg.name);
            println!("Version:      {}", pkg.version);
            println!("Description:  {}", pkg.description);
            println!(
                "Depends on:   {}",
                if pkg.dependencies.is_empty() {
                    "none".to_string()
                } else {
                    pkg.dependencies.join(", ")
                }
            );
            println!("Maintainer:   {}", pkg.maintainer);
            println!("License:      {}", pkg.license);
            match store.get(name) {
                Some(record) => println!("Installed:    yes ({} files)", record.files.len()),
                None => println!("Installed:    no"),
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Sync { url }) => {
            info!("Syncing catalog from {}", url);
            layout.ensure()?;
            let index = IndexClient::new()?.sync(url, &layout.catalog_file())?;
            println!(
                "Synced {} {} ({} packages)",
                index.name,
                index.version,
                index.packages.len()
            );
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(*shell, &mut Cli::command(), "fox", &mut io::stdout());
            Ok(ExitCode::SUCCESS)
        }
        None => {
            // No command provided, show help
            println!("fox Package Manager v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'fox --help' for usage information");
            Ok(ExitCode::SUCCESS)
        }
    }
}
