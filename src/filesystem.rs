// src/filesystem.rs

//! Process-level guards around the raypm root directory
//!
//! A single invocation owns the root for its whole duration: the lock file
//! keeps a second raypm process out, and the access guard keeps the tree
//! read-only while no operation is running. `RootGuard` takes both in
//! that order.

use crate::error::{Error, Result};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Exclusive lock on a raypm root, held until dropped
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    /// Create the lock file at `path`; fails with `Locked` if it already exists
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => {
                debug!("Acquired lock {}", path.display());
                Ok(Self { path })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(Error::Locked(path)),
            Err(e) => Err(Error::Io(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Released lock {}", self.path.display()),
            // `--clean all` takes the lock file with it
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove lock {}: {}", self.path.display(), e),
        }
    }
}

/// Exclusive, writable hold on a raypm root for one operation
///
/// The lock is taken before any permission changes, so a process that
/// loses the race leaves the winner's tree alone. Fields drop in order:
/// the tree goes read-only while the lock is still held.
#[derive(Debug)]
pub struct RootGuard {
    _access: AccessGuard,
    lock: LockFile,
}

impl RootGuard {
    pub fn acquire(root: &Path, lock_path: &Path) -> Result<Self> {
        fs::create_dir_all(root).map_err(|source| Error::DirectoryCreationFailed {
            path: root.to_path_buf(),
            source,
        })?;
        allow_writes(root)?;

        let lock = LockFile::acquire(lock_path)?;
        let access = AccessGuard::enable(root);
        Ok(Self {
            _access: access,
            lock,
        })
    }

    pub fn lock_path(&self) -> &Path {
        self.lock.path()
    }
}

/// Makes the root tree writable for as long as it lives
///
/// Dropping the guard removes write permission again. The `cache`
/// directory under the root is left alone either way, and the root
/// directory itself stays writable so the lock file can come and go.
/// Permissions are only managed on unix; elsewhere the guard does nothing.
#[derive(Debug)]
pub struct AccessGuard {
    root: PathBuf,
}

impl AccessGuard {
    pub fn enable(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        debug!("Enabling write access to {}", root.display());
        set_writable(&root, true);
        Self { root }
    }
}

impl Drop for AccessGuard {
    fn drop(&mut self) {
        debug!("Disabling write access to {}", self.root.display());
        set_writable(&self.root, false);
    }
}

#[cfg(unix)]
fn set_writable(root: &Path, writable: bool) {
    use std::os::unix::fs::PermissionsExt;
    use walkdir::WalkDir;

    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| !(entry.depth() == 1 && entry.file_name() == "cache"));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping {}", e);
                continue;
            }
        };
        if entry.path_is_symlink() || (!writable && entry.depth() == 0) {
            continue;
        }

        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let mode = metadata.permissions().mode();
        let mode = if writable { mode | 0o200 } else { mode & !0o222 };

        if let Err(e) = fs::set_permissions(entry.path(), fs::Permissions::from_mode(mode)) {
            warn!("Failed to change mode of {}: {}", entry.path().display(), e);
        }
    }
}

#[cfg(not(unix))]
fn set_writable(_root: &Path, _writable: bool) {}

/// Give the owner write access to `dir` itself
#[cfg(unix)]
fn allow_writes(dir: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(dir)?.permissions();
    if permissions.mode() & 0o200 == 0 {
        permissions.set_mode(permissions.mode() | 0o200);
        fs::set_permissions(dir, permissions)?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn allow_writes(_dir: &Path) -> Result<()> {
    Ok(())
}

/// What `--clean` removes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanScope {
    /// Fetched and unpacked sources
    Cache,
    /// The whole root directory
    All,
}

impl CleanScope {
    pub fn as_str(&self) -> &str {
        match self {
            CleanScope::Cache => "cache",
            CleanScope::All => "all",
        }
    }
}

impl FromStr for CleanScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "cache" => Ok(CleanScope::Cache),
            "all" => Ok(CleanScope::All),
            other => Err(format!("unknown clean scope '{}', expected 'cache' or 'all'", other)),
        }
    }
}

/// Remove the part of `root` selected by `scope`; missing directories are fine
pub fn clean(root: &Path, scope: CleanScope) -> Result<()> {
    let target = match scope {
        CleanScope::Cache => root.join("cache"),
        CleanScope::All => root.to_path_buf(),
    };

    match fs::remove_dir_all(&target) {
        Ok(()) => {
            info!("Removed {}", target.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Nothing to clean at {}", target.display());
            Ok(())
        }
        Err(e) => Err(Error::Io(e)),
    }
}
