// src/deptree/phases.rs

//! Phase executor
//!
//! Installation runs Fetch, Unpack, Build, creates the output directory and
//! runs Install; removal runs the single Uninstall phase. Every item is a
//! blocking call and the first failure stops the remaining items.

use crate::error::{Error, Result};
use crate::packages::{CommandTask, Descriptor, FetchItem, UnpackItem};
use crate::repository::Downloader;
use crate::task;
use crate::unpack;
use crate::vars::Variables;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, error, info};

/// Stage of the package lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Fetch,
    Unpack,
    Build,
    Install,
    Uninstall,
}

impl Phase {
    pub fn as_str(&self) -> &str {
        match self {
            Phase::Fetch => "fetch",
            Phase::Unpack => "unpack",
            Phase::Build => "build",
            Phase::Install => "install",
            Phase::Uninstall => "uninstall",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fetch, unpack and build a package without installing it
pub(crate) fn prepare(descriptor: &Descriptor, vars: &Variables) -> Result<()> {
    let name = descriptor.name.as_str();

    fetch_phase(&descriptor.fetch_phase, vars).map_err(|e| fail(e, name, Phase::Fetch))?;
    unpack_phase(&descriptor.unpack_phase, vars).map_err(|e| fail(e, name, Phase::Unpack))?;
    task_phase(Phase::Build, &descriptor.build_phase, vars)
        .map_err(|e| fail(e, name, Phase::Build))?;

    Ok(())
}

/// Full installation pipeline of one package
pub(crate) fn install(descriptor: &Descriptor, vars: &Variables) -> Result<()> {
    prepare(descriptor, vars)?;

    let out_dir = &vars.output_dir;
    fs::create_dir_all(out_dir).map_err(|source| {
        error!("Failed to create directory '{}': {}", out_dir.display(), source);
        Error::DirectoryCreationFailed {
            path: out_dir.clone(),
            source,
        }
    })?;

    task_phase(Phase::Install, &descriptor.install_phase, vars)
        .map_err(|e| fail(e, &descriptor.name, Phase::Install))
}

/// Removal pipeline of one package
pub(crate) fn uninstall(descriptor: &Descriptor, vars: &Variables) -> Result<()> {
    task_phase(Phase::Uninstall, &descriptor.uninstall_phase, vars)
        .map_err(|e| fail(e, &descriptor.name, Phase::Uninstall))
}

fn fail(err: Error, package: &str, phase: Phase) -> Error {
    error!("{} phase of '{}' failed: {}", phase, package, err);
    err.in_phase(package, phase)
}

fn fetch_phase(items: &[FetchItem], vars: &Variables) -> Result<()> {
    if items.is_empty() {
        return Ok(());
    }

    let downloader = Downloader::new()?;
    for item in items {
        info!("Getting '{}'", item.from);
        downloader.get(&item.from, &fetch_destination(item, vars))?;
    }
    Ok(())
}

/// Destination of a fetch item; without `to`, the URL's file name under `$fetch`
fn fetch_destination(item: &FetchItem, vars: &Variables) -> PathBuf {
    if !item.to.is_empty() {
        return vars.join(&item.to);
    }

    let file_name = item
        .from
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("download");
    vars.fetch_dir.join(file_name)
}

fn unpack_phase(items: &[UnpackItem], vars: &Variables) -> Result<()> {
    for item in items {
        let src = vars.join(&item.src);
        let dest = vars.join(&item.dest);
        debug!("Unpack {} -> {}", src.display(), dest.display());

        unpack::unpack(&item.format, &src, &dest, item.selected_items.as_deref())?;
    }
    Ok(())
}

fn task_phase(phase: Phase, tasks: &[CommandTask], vars: &Variables) -> Result<()> {
    for item in tasks {
        task::run(phase, item, vars)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::tempdir;

    fn vars_in(root: &Path) -> Variables {
        Variables::new(root, &root.join("pkgs"), "raylib")
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(Phase::Fetch.to_string(), "fetch");
        assert_eq!(Phase::Uninstall.as_str(), "uninstall");
    }

    #[test]
    fn test_fetch_destination() {
        let vars = vars_in(Path::new("/r"));
        let explicit = FetchItem {
            from: "https://example.com/raylib-5.5.zip".to_string(),
            to: vec!["$cache".to_string(), "raylib.zip".to_string()],
        };
        assert_eq!(
            fetch_destination(&explicit, &vars),
            PathBuf::from("/r/cache/raylib/raylib.zip")
        );

        let implicit = FetchItem {
            from: "https://example.com/raylib-5.5.zip".to_string(),
            to: Vec::new(),
        };
        assert_eq!(
            fetch_destination(&implicit, &vars),
            PathBuf::from("/r/cache/raylib/fetch/raylib-5.5.zip")
        );
    }

    #[test]
    fn test_install_creates_output_before_install_phase() {
        let dir = tempdir().unwrap();
        let vars = vars_in(dir.path());
        let descriptor = Descriptor {
            name: "raylib".to_string(),
            install_phase: vec![CommandTask {
                command: "mkdir".to_string(),
                path: vec!["$out".to_string(), "lib".to_string()],
                ..Default::default()
            }],
            ..Default::default()
        };

        install(&descriptor, &vars).unwrap();
        assert!(vars.output_dir.join("lib").is_dir());
    }

    #[test]
    fn test_build_failure_is_tagged_with_phase() {
        let dir = tempdir().unwrap();
        let vars = vars_in(dir.path());
        let descriptor = Descriptor {
            name: "raylib".to_string(),
            build_phase: vec![CommandTask {
                command: "compile".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let err = install(&descriptor, &vars).unwrap_err();
        match &err {
            Error::PhaseFailed { package, phase, .. } => {
                assert_eq!(package, "raylib");
                assert_eq!(*phase, Phase::Build);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(err.root_cause(), Error::UnknownCommand(_)));
        assert!(!vars.output_dir.exists());
    }

    #[test]
    fn test_unpack_failure_stops_pipeline() {
        let dir = tempdir().unwrap();
        let vars = vars_in(dir.path());
        let descriptor = Descriptor {
            name: "raylib".to_string(),
            unpack_phase: vec![UnpackItem {
                format: "rar".to_string(),
                src: vec!["$fetch".to_string(), "raylib.rar".to_string()],
                dest: vec!["$src".to_string()],
                selected_items: None,
            }],
            ..Default::default()
        };

        let err = install(&descriptor, &vars).unwrap_err();
        assert!(matches!(err, Error::PhaseFailed { phase: Phase::Unpack, .. }));
        assert!(matches!(err.root_cause(), Error::UnsupportedFormat(_)));
    }
}
