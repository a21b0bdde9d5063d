// src/config.rs

//! Runtime settings for raypm
//!
//! Settings are built once at startup from the command line and passed
//! down by reference; nothing reads global state after that.
//!
//! # Layout under the root directory
//!
//! - `pkgs/`: package descriptors (the synchronized index)
//! - `cache/<name>/`: fetched and unpacked sources
//! - `store/<name>/`: installed package outputs
//! - `db.json`: package relation database
//! - `lock`: inter-process lock file

use crate::deptree::TreeContext;
use crate::error::{Error, Result};
use std::path::PathBuf;

/// Default root directory, relative to the working directory
pub const DEFAULT_ROOT: &str = ".raypm";

/// GitHub repository publishing the package index
pub const DEFAULT_INDEX_REPO: &str = "mxk-9/raypkgs";

/// Systems packages can be built for
pub const SUPPORTED_TARGETS: &[&str] = &["linux", "windows", "android"];

/// Host/target pair of a build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Build {
    pub host: String,
    pub target: String,
    /// Target differs from host
    pub cross: bool,
}

impl Build {
    /// Resolve `target` against the running host; `None` or empty means native
    pub fn new(target: Option<&str>) -> Result<Self> {
        let host = std::env::consts::OS.to_string();

        let target = match target {
            None | Some("") => host.clone(),
            Some(t) if SUPPORTED_TARGETS.contains(&t) => t.to_string(),
            Some(t) => return Err(Error::UnsupportedTarget(t.to_string())),
        };

        Ok(Self {
            cross: target != host,
            host,
            target,
        })
    }
}

/// Immutable configuration of one raypm invocation
#[derive(Debug, Clone)]
pub struct Settings {
    pub root: PathBuf,
    pub pkgs_dir: PathBuf,
    pub lock_path: PathBuf,
    pub db_path: PathBuf,
    pub index_repo: String,
    pub build: Build,
}

impl Settings {
    pub fn new(root: impl Into<PathBuf>, pkgs_dir: Option<PathBuf>, target: Option<&str>) -> Result<Self> {
        let root = root.into();

        Ok(Self {
            pkgs_dir: pkgs_dir.unwrap_or_else(|| root.join("pkgs")),
            lock_path: root.join("lock"),
            db_path: root.join("db.json"),
            index_repo: DEFAULT_INDEX_REPO.to_string(),
            build: Build::new(target)?,
            root,
        })
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    pub fn store_dir(&self) -> PathBuf {
        self.root.join("store")
    }

    /// Directory holding the descriptor of `name`
    pub fn package_dir(&self, name: &str) -> PathBuf {
        self.pkgs_dir.join(name)
    }

    /// True when `name` has an output directory in the store
    pub fn is_installed(&self, name: &str) -> bool {
        self.store_dir().join(name).is_dir()
    }

    /// Context shared by every node of a dependency tree
    pub fn tree_context(&self) -> TreeContext {
        TreeContext::new(&self.root, &self.build.host, &self.build.target)
            .with_pkgs_dir(&self.pkgs_dir)
    }
}
