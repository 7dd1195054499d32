// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("fox")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Foxglove Contributors")
        .about("The package manager for the Foxglove Linux distribution")
        .subcommand_required(false)
        .arg(
            Arg::new("home")
                .long("home")
                .value_name("DIR")
                .global(true)
                .help("Base directory for fox state (default: ~/.fox, env FOX_HOME)"),
        )
        .arg(
            Arg::new("root")
                .short('r')
                .long("root")
                .value_name("DIR")
                .global(true)
                .help("Target root packages are placed under (env FOX_ROOT)"),
        )
        .arg(
            Arg::new("mirror")
                .short('m')
                .long("mirror")
                .value_name("URL")
                .global(true)
                .help("Mirror URL or directory to fetch artifacts from (env FOX_MIRROR)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("Increase log verbosity"),
        )
        .subcommand(
            Command::new("install")
                .about("Install one or more packages")
                .arg(
                    Arg::new("packages")
                        .required(true)
                        .num_args(1..)
                        .help("Names of the package(s) to install"),
                ),
        )
        .subcommand(
            Command::new("install-local")
                .about("Install pre-fetched .fox artifacts")
                .arg(
                    Arg::new("paths")
                        .required(true)
                        .num_args(1..)
                        .help("Path(s) to the artifact file(s)"),
                ),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove one or more packages")
                .arg(
                    Arg::new("packages")
                        .required(true)
                        .num_args(1..)
                        .help("Names of the package(s) to remove"),
                ),
        )
        .subcommand(
            Command::new("search")
                .about("Search for a package in the catalog")
                .arg(Arg::new("query").required(true).help("Substring of a package name or description"))
                .arg(
                    Arg::new("ignore_case")
                        .short('i')
                        .long("ignore-case")
                        .action(ArgAction::SetTrue)
                        .help("Match regardless of case"),
                ),
        )
        .subcommand(Command::new("list").about("List installed packages"))
        .subcommand(
            Command::new("info")
                .about("Show details for a package")
                .arg(Arg::new("name").required(true).help("Package name")),
        )
        .subcommand(
            Command::new("sync")
                .about("Download the catalog index from a mirror")
                .arg(Arg::new("url").required(true).help("Mirror base URL")),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("fox.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
