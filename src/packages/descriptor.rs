// src/packages/descriptor.rs

//! Package descriptor loading
//!
//! A package directory holds a `package.json` manifest and optionally a
//! `package_<target>.json` overlay whose phase lists are appended to the
//! base manifest's lists.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Manifest file name inside a package directory
pub const MANIFEST_FILE: &str = "package.json";

/// One download of the fetch phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchItem {
    /// Source URL
    pub from: String,
    /// Destination path tokens, joined after expansion
    #[serde(default)]
    pub to: Vec<String>,
}

/// One archive extraction of the unpack phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnpackItem {
    /// Archive format (`zip`, `7z`, `tar.gz`, `tar.xz`)
    #[serde(alias = "type")]
    pub format: String,
    #[serde(default)]
    pub src: Vec<String>,
    #[serde(default)]
    pub dest: Vec<String>,
    /// Extract only entries under these archive paths
    #[serde(default)]
    pub selected_items: Option<Vec<String>>,
}

/// One command of the build, install or uninstall phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandTask {
    /// One of `exec`, `mkdir`, `copy`, `overwrite`, `pkgman`
    pub command: String,
    pub exec_base: Vec<String>,
    pub args: Vec<String>,
    pub from: Vec<String>,
    pub to: Vec<String>,
    pub path: Vec<String>,
}

/// Static metadata and lifecycle tasks of one package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Descriptor {
    pub name: String,
    pub description: String,
    pub version: String,
    pub dependencies: Vec<String>,
    pub systems: Vec<String>,

    pub fetch_phase: Vec<FetchItem>,
    pub unpack_phase: Vec<UnpackItem>,
    pub build_phase: Vec<CommandTask>,
    pub install_phase: Vec<CommandTask>,
    pub uninstall_phase: Vec<CommandTask>,
}

impl Descriptor {
    /// Load the descriptor stored in `package_dir` for `target`
    ///
    /// An empty `target` skips the overlay lookup. A manifest without a
    /// name takes the directory name; a manifest naming a different package
    /// is rejected.
    pub fn load(package_dir: &Path, target: &str) -> Result<Self> {
        let manifest = package_dir.join(MANIFEST_FILE);
        debug!("Loading package descriptor {}", manifest.display());

        let mut descriptor = Self::parse_file(&manifest)?;

        if let Some(dir_name) = package_dir.file_name().and_then(|n| n.to_str()) {
            if descriptor.name.is_empty() {
                descriptor.name = dir_name.to_string();
            } else if descriptor.name != dir_name {
                return Err(Error::Descriptor {
                    path: manifest,
                    reason: format!(
                        "manifest names '{}' but lives in '{}'",
                        descriptor.name, dir_name
                    ),
                });
            }
        }

        if !target.is_empty() {
            let overlay_path = package_dir.join(format!("package_{}.json", target));
            if overlay_path.is_file() {
                debug!("OS-dependent manifest found: {}", overlay_path.display());
                let overlay = Self::parse_file(&overlay_path)?;
                descriptor.append_phases(overlay);
            }
        }

        Ok(descriptor)
    }

    fn parse_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::Descriptor {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        serde_json::from_str(&content).map_err(|e| Error::Descriptor {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Concatenate the phase lists of `overlay` onto this descriptor's lists
    pub fn append_phases(&mut self, overlay: Descriptor) {
        self.fetch_phase.extend(overlay.fetch_phase);
        self.unpack_phase.extend(overlay.unpack_phase);
        self.build_phase.extend(overlay.build_phase);
        self.install_phase.extend(overlay.install_phase);
        self.uninstall_phase.extend(overlay.uninstall_phase);
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Name: {}", self.name)?;
        if !self.version.is_empty() {
            writeln!(f, "Version: {}", self.version)?;
        }
        write!(f, "Description: {}", self.description)?;
        if !self.systems.is_empty() {
            write!(f, "\nSystems: {}", self.systems.join(", "))?;
        }
        if !self.dependencies.is_empty() {
            write!(f, "\nDepends on:")?;
            for dep in &self.dependencies {
                write!(f, "\n\t+ {}", dep)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const BASE: &str = r#"{
        "name": "raylib",
        "description": "Simple game library",
        "version": "5.5",
        "dependencies": ["glfw"],
        "fetch_phase": [{"from": "https://example.com/raylib.zip", "to": ["$fetch", "raylib.zip"]}],
        "unpack_phase": [{"type": "zip", "src": ["$fetch", "raylib.zip"], "dest": ["$src"]}],
        "install_phase": [{"command": "mkdir", "path": ["$out", "lib"]}]
    }"#;

    #[test]
    fn test_load_base_manifest() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("raylib");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join(MANIFEST_FILE), BASE).unwrap();

        let desc = Descriptor::load(&pkg, "").unwrap();
        assert_eq!(desc.name, "raylib");
        assert_eq!(desc.version, "5.5");
        assert_eq!(desc.dependencies, vec!["glfw".to_string()]);
        assert_eq!(desc.unpack_phase[0].format, "zip");
        assert!(desc.unpack_phase[0].selected_items.is_none());
        assert_eq!(desc.install_phase[0].command, "mkdir");
        assert!(desc.build_phase.is_empty());
    }

    #[test]
    fn test_overlay_appends_phases() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("raylib");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join(MANIFEST_FILE), BASE).unwrap();
        fs::write(
            pkg.join("package_linux.json"),
            r#"{
                "install_phase": [{"command": "pkgman"}],
                "uninstall_phase": [{"command": "pkgman"}]
            }"#,
        )
        .unwrap();

        let desc = Descriptor::load(&pkg, "linux").unwrap();
        let commands: Vec<&str> = desc.install_phase.iter().map(|t| t.command.as_str()).collect();
        assert_eq!(commands, vec!["mkdir", "pkgman"]);
        assert_eq!(desc.uninstall_phase.len(), 1);
        assert_eq!(desc.fetch_phase.len(), 1);

        let windows = Descriptor::load(&pkg, "windows").unwrap();
        assert_eq!(windows.install_phase.len(), 1);
    }

    #[test]
    fn test_name_defaults_to_directory() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("glfw");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join(MANIFEST_FILE), r#"{"description": "windowing"}"#).unwrap();

        let desc = Descriptor::load(&pkg, "linux").unwrap();
        assert_eq!(desc.name, "glfw");
    }

    #[test]
    fn test_name_mismatch_rejected() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("glfw");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join(MANIFEST_FILE), r#"{"name": "sdl2"}"#).unwrap();

        assert!(matches!(
            Descriptor::load(&pkg, ""),
            Err(Error::Descriptor { .. })
        ));
    }

    #[test]
    fn test_missing_and_malformed_manifest() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("broken");
        fs::create_dir_all(&pkg).unwrap();

        assert!(matches!(
            Descriptor::load(&pkg, ""),
            Err(Error::Descriptor { .. })
        ));

        fs::write(pkg.join(MANIFEST_FILE), r#"{"dependencies": "glfw"}"#).unwrap();
        assert!(matches!(
            Descriptor::load(&pkg, ""),
            Err(Error::Descriptor { .. })
        ));
    }

    #[test]
    fn test_display_lists_dependencies() {
        let desc = Descriptor {
            name: "raylib".to_string(),
            description: "Simple game library".to_string(),
            dependencies: vec!["glfw".to_string()],
            ..Default::default()
        };
        let text = desc.to_string();
        assert!(text.starts_with("Name: raylib\n"));
        assert!(text.contains("Depends on:\n\t+ glfw"));
        assert!(!text.contains("Version"));
    }
}
