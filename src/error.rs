// src/error.rs

use crate::deptree::Phase;
use std::path::PathBuf;
use thiserror::Error;

/// Core error types for raypm
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database entry and store directory disagree about a package
    #[error(
        "Inconsistent state for package '{package}': database entry present: {in_db}, store directory present: {in_store}"
    )]
    InconsistentState {
        package: String,
        in_db: bool,
        in_store: bool,
    },

    /// Removal refused because installed packages still depend on this one
    #[error("Package '{package}' is required by: {}", .dependents.join(", "))]
    RequiredByOthers {
        package: String,
        dependents: Vec<String>,
    },

    /// Relation store file missing or malformed
    #[error("Cannot read package database {path}: {reason}")]
    StoreUnreadable { path: PathBuf, reason: String },

    /// Relation store could not be written back
    #[error("Failed to write package database {path}: {source}")]
    PersistFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A package reaches itself through its dependencies
    #[error("Cyclic dependency: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    /// Dependency tree construction failed for a package
    #[error("Failed to resolve dependencies of '{package}': {source}")]
    Resolve {
        package: String,
        #[source]
        source: Box<Error>,
    },

    /// Package manifest unreadable or malformed
    #[error("Invalid package descriptor {path}: {reason}")]
    Descriptor { path: PathBuf, reason: String },

    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Archive format not handled by the unpacker
    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(String),

    /// Task command not known to the task runner
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// A lifecycle phase of a package failed
    #[error("{phase} phase of package '{package}' failed: {source}")]
    PhaseFailed {
        package: String,
        phase: Phase,
        #[source]
        source: Box<Error>,
    },

    /// Destination of a mkdir/copy task already exists
    #[error("Already exists: {0}")]
    AlreadyExists(PathBuf),

    /// External program exited unsuccessfully
    #[error("Command '{program}' failed: {status}")]
    CommandFailed { program: String, status: String },

    /// Download errors
    #[error("Download error: {0}")]
    Download(String),

    /// Archive reading/extraction errors
    #[error("Archive error: {0}")]
    Archive(String),

    /// Host distribution has no known package manager
    #[error("Package manager for '{0}' is not supported")]
    UnsupportedDistro(String),

    /// Requested target system is not known
    #[error("Undefined target system: {0}")]
    UnsupportedTarget(String),

    /// Another process holds the lock file
    #[error("Another process is using {0}")]
    Locked(PathBuf),
}

impl Error {
    /// Wrap this error as the failure of `phase` for `package`
    pub fn in_phase(self, package: &str, phase: Phase) -> Self {
        Error::PhaseFailed {
            package: package.to_string(),
            phase,
            source: Box::new(self),
        }
    }

    /// Innermost error, looking through resolve/phase wrappers
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Resolve { source, .. } | Error::PhaseFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type alias using raypm's Error type
pub type Result<T> = std::result::Result<T, Error>;
