// src/task/mod.rs

//! Command tasks of the build, install and uninstall phases
//!
//! A task names one of a fixed set of commands; its path and argument
//! tokens are expanded against the package's variables before running.

use crate::deptree::Phase;
use crate::error::{Error, Result};
use crate::packages::CommandTask;
use crate::progress;
use crate::vars::Variables;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use tracing::{debug, info};

/// Source of the host distribution id used by `pkgman`
const OS_RELEASE: &str = "/etc/os-release";

/// Commands a task may run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskCommand {
    Exec,
    Mkdir,
    Copy,
    Overwrite,
    PackageManager,
}

impl TaskCommand {
    pub fn as_str(&self) -> &str {
        match self {
            TaskCommand::Exec => "exec",
            TaskCommand::Mkdir => "mkdir",
            TaskCommand::Copy => "copy",
            TaskCommand::Overwrite => "overwrite",
            TaskCommand::PackageManager => "pkgman",
        }
    }
}

impl FromStr for TaskCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "exec" => Ok(TaskCommand::Exec),
            "mkdir" => Ok(TaskCommand::Mkdir),
            "copy" => Ok(TaskCommand::Copy),
            "overwrite" => Ok(TaskCommand::Overwrite),
            "pkgman" => Ok(TaskCommand::PackageManager),
            _ => Err(Error::UnknownCommand(s.to_string())),
        }
    }
}

/// Run one task of `phase`
pub fn run(phase: Phase, task: &CommandTask, vars: &Variables) -> Result<()> {
    let command: TaskCommand = task.command.parse()?;
    debug!("{} phase: running '{}'", phase, command.as_str());

    match command {
        TaskCommand::Exec => {
            let program = vars.join(&task.exec_base);
            let args = vars.expand(&task.args);
            exec(&program, &args)
        }
        TaskCommand::Mkdir => mkdir(&vars.join(&task.path)),
        TaskCommand::Copy | TaskCommand::Overwrite => copy_item(
            &vars.join(&task.from),
            &vars.join(&task.to),
            command == TaskCommand::Overwrite,
        ),
        TaskCommand::PackageManager => {
            let distro = read_distro_id(Path::new(OS_RELEASE))?;
            pkgman(&distro, phase, &vars.package_source_dir)
        }
    }
}

fn exec(program: &Path, args: &[String]) -> Result<()> {
    info!("Running {} {}", program.display(), args.join(" "));

    let status = Command::new(program).args(args).status().map_err(|e| Error::CommandFailed {
        program: program.display().to_string(),
        status: e.to_string(),
    })?;

    if !status.success() {
        return Err(Error::CommandFailed {
            program: program.display().to_string(),
            status: status.to_string(),
        });
    }
    Ok(())
}

fn mkdir(dir: &Path) -> Result<()> {
    if dir.exists() {
        return Err(Error::AlreadyExists(dir.to_path_buf()));
    }

    fs::create_dir_all(dir).map_err(|source| Error::DirectoryCreationFailed {
        path: dir.to_path_buf(),
        source,
    })?;
    debug!("'{}' created", dir.display());
    Ok(())
}

/// Copy a file or directory tree from `from` to `to`
fn copy_item(from: &Path, to: &Path, overwrite: bool) -> Result<()> {
    if to.exists() && !overwrite {
        return Err(Error::AlreadyExists(to.to_path_buf()));
    }

    if from.is_dir() {
        fs::create_dir_all(to)?;
        for entry in fs::read_dir(from)? {
            let entry = entry?;
            copy_item(&entry.path(), &to.join(entry.file_name()), overwrite)?;
        }
    } else {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        copy_file(from, to).map_err(|e| {
            Error::Io(io::Error::new(
                e.kind(),
                format!("Failed to copy '{}' to '{}': {}", from.display(), to.display(), e),
            ))
        })?;
    }

    debug!("'{}' created", to.display());
    Ok(())
}

/// Copy one file's bytes and permissions, showing progress
fn copy_file(from: &Path, to: &Path) -> io::Result<u64> {
    let source = File::open(from)?;
    let metadata = source.metadata()?;
    let label = from
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();

    let bar = progress::transfer(&label, Some(metadata.len()));
    let copied = io::copy(&mut bar.wrap_read(source), &mut File::create(to)?);
    bar.finish_and_clear();

    let copied = copied?;
    fs::set_permissions(to, metadata.permissions())?;
    Ok(copied)
}

/// Read the `ID=` value of an os-release file
fn read_distro_id(os_release: &Path) -> Result<String> {
    let content = fs::read_to_string(os_release)?;

    content
        .lines()
        .find_map(|line| line.strip_prefix("ID="))
        .map(|id| id.trim().trim_matches('"').to_string())
        .ok_or_else(|| Error::UnsupportedDistro("unknown".to_string()))
}

/// Base command line of the native package manager of `distro` for `phase`
///
/// Install and build phases install packages, the uninstall phase removes them.
fn package_manager_command(distro: &str, phase: Phase) -> Option<Vec<&'static str>> {
    let removing = phase == Phase::Uninstall;

    let command = match distro {
        "arch" | "manjaro" => {
            let action = if removing { "-R" } else { "-Sy" };
            vec!["pacman", action, "--noconfirm", "--needed"]
        }
        "fedora" => vec!["dnf", if removing { "remove" } else { "install" }],
        "ubuntu" | "debian" => vec!["apt", if removing { "purge" } else { "install" }],
        "void" => vec![if removing { "xbps-remove" } else { "xbps-install" }],
        _ => return None,
    };

    Some(command)
}

/// Package list file for `manager` in a package's descriptor directory
fn package_list_path(package_dir: &Path, manager: &str) -> PathBuf {
    package_dir.join(format!("{}.txt", manager))
}

fn pkgman(distro: &str, phase: Phase, package_dir: &Path) -> Result<()> {
    info!("Linux distro is '{}'", distro);

    let base = package_manager_command(distro, phase)
        .ok_or_else(|| Error::UnsupportedDistro(distro.to_string()))?;

    let list_path = package_list_path(package_dir, base[0]);
    let packages = fs::read_to_string(&list_path)?;

    let mut args: Vec<String> = base.iter().map(|s| s.to_string()).collect();
    args.extend(
        packages
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from),
    );

    exec(Path::new("sudo"), &args)
}
