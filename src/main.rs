// src/main.rs

use anyhow::{Context, Result};
use clap::{ArgGroup, CommandFactory, Parser};
use clap_complete::Shell;
use raypm::config::{DEFAULT_ROOT, Settings};
use raypm::db::PackageDb;
use raypm::deptree::Tree;
use raypm::filesystem::{self, CleanScope, RootGuard};
use raypm::packages::{self, Descriptor};
use raypm::repository;
use std::io;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "raypm")]
#[command(author, version, about = "Source package manager for raylib projects", long_about = None)]
#[command(group(
    ArgGroup::new("operation")
        .required(true)
        .args(["list", "sync", "build", "info", "install", "remove", "clean", "completions"])
))]
struct Cli {
    /// List all available packages
    #[arg(long)]
    list: bool,

    /// Get the latest package index
    #[arg(long)]
    sync: bool,

    /// Build a package without installing it
    #[arg(long, value_name = "PACKAGE")]
    build: Option<String>,

    /// Show information about a package
    #[arg(long, value_name = "PACKAGE")]
    info: Option<String>,

    /// Install a package and its dependencies
    #[arg(long, value_name = "PACKAGE")]
    install: Option<String>,

    /// Remove a package
    #[arg(long, value_name = "PACKAGE")]
    remove: Option<String>,

    /// Clean raypm's storage ('cache' or 'all')
    #[arg(long, value_name = "SCOPE")]
    clean: Option<CleanScope>,

    /// Generate shell completion scripts
    #[arg(long, value_name = "SHELL")]
    completions: Option<Shell>,

    /// Target system (linux, windows, android); defaults to the host
    #[arg(long, value_name = "OS")]
    target: Option<String>,

    /// Root directory for packages, cache and database
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    output: Option<PathBuf>,

    /// Custom package descriptors directory
    #[arg(long, value_name = "PATH")]
    pkgs: Option<PathBuf>,

    /// Print debug logs
    #[arg(short, long)]
    debug: bool,
}

/// The single operation requested on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
enum Operation {
    List,
    Sync,
    Build(String),
    Info(String),
    Install(String),
    Remove(String),
    Clean(CleanScope),
    Completions(Shell),
}

impl Cli {
    fn operation(&self) -> Option<Operation> {
        if self.list {
            return Some(Operation::List);
        }
        if self.sync {
            return Some(Operation::Sync);
        }
        if let Some(scope) = self.clean {
            return Some(Operation::Clean(scope));
        }
        if let Some(shell) = self.completions {
            return Some(Operation::Completions(shell));
        }

        self.build
            .clone()
            .map(Operation::Build)
            .or_else(|| self.info.clone().map(Operation::Info))
            .or_else(|| self.install.clone().map(Operation::Install))
            .or_else(|| self.remove.clone().map(Operation::Remove))
    }

    fn root(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let operation = cli
        .operation()
        .context("There's nothing to do. Type 'raypm --help'")?;

    if let Operation::Completions(shell) = operation {
        clap_complete::generate(shell, &mut Cli::command(), "raypm", &mut io::stdout());
        return Ok(());
    }

    let settings = Settings::new(cli.root(), cli.pkgs.clone(), cli.target.as_deref())?;
    debug!("Root: {}", settings.root.display());
    debug!("Packages: {}", settings.pkgs_dir.display());
    debug!(
        "Host: {}, target: {}, cross: {}",
        settings.build.host, settings.build.target, settings.build.cross
    );

    match operation {
        Operation::List => list_packages(&settings),
        Operation::Info(name) => show_info(&settings, &name),
        Operation::Sync => with_root(&settings, || {
            match repository::sync_index(&settings)? {
                Some(version) => println!("Package index updated to {}", version),
                None => println!("Package index is up to date"),
            }
            Ok(())
        }),
        Operation::Clean(scope) => with_root(&settings, || {
            info!("Cleaning {}", scope.as_str());
            filesystem::clean(&settings.root, scope)?;
            Ok(())
        }),
        Operation::Install(name) => with_root(&settings, || install_package(&settings, &name)),
        Operation::Build(name) => with_root(&settings, || build_package(&settings, &name)),
        Operation::Remove(name) => with_root(&settings, || remove_package(&settings, &name)),
        Operation::Completions(_) => Ok(()),
    }
}

/// Run `f` with the root locked against other raypm processes and writable
fn with_root<T>(settings: &Settings, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let guard = RootGuard::acquire(&settings.root, &settings.lock_path)?;
    debug!("Holding {}", guard.lock_path().display());
    f()
}

fn list_packages(settings: &Settings) -> Result<()> {
    if !settings.pkgs_dir.is_dir() {
        anyhow::bail!(
            "No package index at {}. Run 'raypm --sync' first",
            settings.pkgs_dir.display()
        );
    }

    if let Some(version) = repository::index_version(settings) {
        println!("Package index {}", version);
    }

    let available = packages::list_available(&settings.pkgs_dir, &settings.build.target)?;
    for descriptor in &available {
        let marker = if settings.is_installed(&descriptor.name) {
            " [installed]"
        } else {
            ""
        };
        println!("{}{}", descriptor.name, marker);
        if !descriptor.description.is_empty() {
            println!("  {}", descriptor.description);
        }
    }
    println!("{} packages available", available.len());

    Ok(())
}

fn show_info(settings: &Settings, name: &str) -> Result<()> {
    let descriptor = Descriptor::load(&settings.package_dir(name), &settings.build.target)?;
    println!("{}", descriptor);
    if settings.is_installed(name) {
        println!("Installed: yes");
    }
    Ok(())
}

fn install_package(settings: &Settings, name: &str) -> Result<()> {
    info!("Installing package: {}", name);

    let mut db = PackageDb::open_or_new(&settings.db_path)?;
    let result = Tree::new(settings.tree_context(), name, &mut db).and_then(|mut tree| tree.install());
    let written = db.write();

    result?;
    written?;

    println!("Installed package: {}", name);
    Ok(())
}

fn build_package(settings: &Settings, name: &str) -> Result<()> {
    info!("Building package: {}", name);

    let mut db = PackageDb::open_or_new(&settings.db_path)?;
    let result = Tree::new(settings.tree_context(), name, &mut db).and_then(|mut tree| tree.build());
    let written = db.write();

    result?;
    written?;

    println!("Built package: {}", name);
    println!("  Sources: {}", settings.cache_dir().join(name).display());
    Ok(())
}

fn remove_package(settings: &Settings, name: &str) -> Result<()> {
    info!("Removing package: {}", name);

    if !settings.db_path.exists() {
        warn!("Package '{}' is not installed, nothing to remove", name);
        return Ok(());
    }

    let mut db = PackageDb::open(&settings.db_path)?;
    let result = Tree::new(settings.tree_context(), name, &mut db).and_then(|mut tree| tree.uninstall());
    let written = db.write();

    result?;
    written?;

    println!("Removed package: {}", name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> std::result::Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("raypm").chain(args.iter().copied()))
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_single_operation() {
        let cli = parse(&["--install", "raylib", "--target", "linux"]).unwrap();
        assert_eq!(cli.operation(), Some(Operation::Install("raylib".to_string())));
        assert_eq!(cli.target.as_deref(), Some("linux"));

        let cli = parse(&["--list"]).unwrap();
        assert_eq!(cli.operation(), Some(Operation::List));
    }

    #[test]
    fn test_operation_required() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["-d"]).is_err());
    }

    #[test]
    fn test_operations_conflict() {
        assert!(parse(&["--install", "raylib", "--remove", "glfw"]).is_err());
        assert!(parse(&["--list", "--sync"]).is_err());
    }

    #[test]
    fn test_clean_scope() {
        let cli = parse(&["--clean", "cache"]).unwrap();
        assert_eq!(cli.operation(), Some(Operation::Clean(CleanScope::Cache)));
        assert!(parse(&["--clean", "store"]).is_err());
    }

    #[test]
    fn test_root_option() {
        let cli = parse(&["--remove", "glfw", "-o", "/opt/raypm"]).unwrap();
        assert_eq!(cli.root(), PathBuf::from("/opt/raypm"));

        let cli = parse(&["--sync"]).unwrap();
        assert_eq!(cli.root(), PathBuf::from(DEFAULT_ROOT));
    }

    #[test]
    fn test_remove_without_database_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::new(dir.path(), None, None).unwrap();

        remove_package(&settings, "raylib").unwrap();
        assert!(!settings.db_path.exists());
    }

    #[test]
    fn test_locked_root_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::new(dir.path().join("root"), None, None).unwrap();
        let holder = RootGuard::acquire(&settings.root, &settings.lock_path).unwrap();

        let mut ran = false;
        let result = with_root(&settings, || {
            ran = true;
            Ok(())
        });
        assert!(result.is_err());
        assert!(!ran);

        drop(holder);
        assert!(with_root(&settings, || Ok(())).is_ok());
        assert!(!settings.lock_path.exists());
    }

    #[test]
    fn test_completions_shell() {
        let cli = parse(&["--completions", "bash"]).unwrap();
        assert_eq!(cli.operation(), Some(Operation::Completions(Shell::Bash)));
    }
}
