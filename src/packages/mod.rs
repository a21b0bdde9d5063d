// src/packages/mod.rs

//! Package descriptors for raypm
//!
//! This module loads the per-package manifests that drive the lifecycle
//! phases and lists the packages available in a pkgs directory.

pub mod descriptor;

pub use descriptor::{CommandTask, Descriptor, FetchItem, UnpackItem};

use crate::error::Result;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Load the descriptor of every package directory under `pkgs_dir`, sorted by name
///
/// Directories without a manifest are skipped; a malformed manifest fails.
pub fn list_available(pkgs_dir: &Path, target: &str) -> Result<Vec<Descriptor>> {
    let mut descriptors = Vec::new();

    for entry in fs::read_dir(pkgs_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() || !path.join(descriptor::MANIFEST_FILE).is_file() {
            debug!("Skipping {}", path.display());
            continue;
        }
        descriptors.push(Descriptor::load(&path, target)?);
    }

    descriptors.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(descriptors)
}
