// src/lib.rs

//! raypm package manager
//!
//! Builds packages from source into a private root directory, driven by
//! declarative JSON descriptors from a synchronized package index.
//!
//! # Architecture
//!
//! - Relation store: one JSON file recording which packages are installed
//!   and who depends on whom
//! - Dependency tree: resolved per operation from descriptors, installed
//!   depth-first with the store as the record of truth
//! - Phases: fetch, unpack, build, install and uninstall, each a list of
//!   declarative items expanded against per-package path variables

pub mod config;
pub mod db;
pub mod deptree;
mod error;
pub mod filesystem;
pub mod packages;
pub mod progress;
pub mod repository;
pub mod task;
pub mod unpack;
pub mod vars;

pub use config::Settings;
pub use db::PackageDb;
pub use deptree::{Phase, Tree, TreeContext};
pub use error::{Error, Result};
