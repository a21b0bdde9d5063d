// src/unpack/mod.rs

//! Archive extraction for the unpack phase
//!
//! Supported formats are a closed set (`ArchiveFormat`); every format feeds
//! its entries through the same `EntrySink`, which applies item selection,
//! path sanitizing and the skip-if-present rule.

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use xz2::read::XzDecoder;

/// Archive formats the unpack phase understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    SevenZip,
    TarGz,
    TarXz,
}

impl ArchiveFormat {
    pub fn as_str(&self) -> &str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::SevenZip => "7z",
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::TarXz => "tar.xz",
        }
    }

    /// Feed every entry of the archive at `src` into `sink`
    fn extract(&self, src: &Path, sink: &mut EntrySink<'_>) -> Result<()> {
        match self {
            ArchiveFormat::Zip => extract_zip(src, sink),
            ArchiveFormat::SevenZip => extract_7z(src, sink),
            ArchiveFormat::TarGz => extract_tar(GzDecoder::new(open_archive(src)?), sink),
            ArchiveFormat::TarXz => extract_tar(XzDecoder::new(open_archive(src)?), sink),
        }
    }
}

impl FromStr for ArchiveFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "zip" => Ok(ArchiveFormat::Zip),
            "7z" => Ok(ArchiveFormat::SevenZip),
            "tar.gz" | "tgz" => Ok(ArchiveFormat::TarGz),
            "tar.xz" | "txz" => Ok(ArchiveFormat::TarXz),
            _ => Err(Error::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extract the `format` archive at `src` into `dest`
///
/// With `selected_items`, only entries under one of the listed archive
/// paths are extracted, re-rooted so that the last component of the
/// matching item sits directly under `dest`. Files already present at
/// their destination are skipped with a warning, and a file whose data
/// cannot be read in full is never left behind. Returns the number of
/// files written.
pub fn unpack(
    format: &str,
    src: &Path,
    dest: &Path,
    selected_items: Option<&[String]>,
) -> Result<usize> {
    let format: ArchiveFormat = format.parse()?;
    info!("Unpacking {} ({}) into {}", src.display(), format, dest.display());

    let mut sink = EntrySink::new(dest, selected_items)?;
    format.extract(src, &mut sink)?;

    debug!("Wrote {} files from {}", sink.written, src.display());
    Ok(sink.written)
}

fn open_archive(src: &Path) -> Result<File> {
    File::open(src)
        .map_err(|e| Error::Archive(format!("Failed to open archive {}: {}", src.display(), e)))
}

fn extract_zip(src: &Path, sink: &mut EntrySink<'_>) -> Result<()> {
    let mut archive = zip::ZipArchive::new(open_archive(src)?)
        .map_err(|e| Error::Archive(format!("Failed to read zip {}: {}", src.display(), e)))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| Error::Archive(format!("Failed to read zip entry: {}", e)))?;
        let name = entry.name().to_string();
        let is_dir = entry.is_dir();
        sink.write_entry(&name, is_dir, &mut entry)?;
    }

    Ok(())
}

fn extract_7z(src: &Path, sink: &mut EntrySink<'_>) -> Result<()> {
    let mut archive = sevenz_rust::SevenZReader::open(src, sevenz_rust::Password::empty())
        .map_err(|e| Error::Archive(format!("Failed to read 7z {}: {}", src.display(), e)))?;

    // The reader callback has its own error type; park ours and stop iterating
    let mut failure = None;
    archive
        .for_each_entries(|entry, data| {
            // The reader keeps calling into later folders after a `false`
            if failure.is_some() {
                return Ok(false);
            }
            match sink.write_entry(entry.name(), entry.is_directory(), data) {
                Ok(()) => Ok(true),
                Err(e) => {
                    failure = Some(e);
                    Ok(false)
                }
            }
        })
        .map_err(|e| Error::Archive(format!("Failed to extract 7z {}: {}", src.display(), e)))?;

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn extract_tar<R: Read>(reader: R, sink: &mut EntrySink<'_>) -> Result<()> {
    let mut archive = tar::Archive::new(reader);

    for entry in archive
        .entries()
        .map_err(|e| Error::Archive(format!("Failed to read archive entries: {}", e)))?
    {
        let mut entry =
            entry.map_err(|e| Error::Archive(format!("Failed to read archive entry: {}", e)))?;

        let name = entry
            .path()
            .map_err(|e| Error::Archive(format!("Failed to get entry path: {}", e)))?
            .to_string_lossy()
            .to_string();

        let kind = entry.header().entry_type();
        if !(kind.is_dir() || kind.is_file()) {
            debug!("Skipping non-regular entry {}", name);
            continue;
        }

        sink.write_entry(&name, kind.is_dir(), &mut entry)?;
    }

    Ok(())
}

/// Destination side of an extraction
struct EntrySink<'a> {
    dest: &'a Path,
    selected: Option<Vec<PathBuf>>,
    written: usize,
}

impl<'a> EntrySink<'a> {
    fn new(dest: &'a Path, selected_items: Option<&[String]>) -> Result<Self> {
        let selected = selected_items
            .map(|items| items.iter().map(|item| sanitize(item)).collect::<Result<Vec<_>>>())
            .transpose()?;

        Ok(Self {
            dest,
            selected,
            written: 0,
        })
    }

    /// Where `entry` lands under `dest`, or `None` if it is not selected
    fn target_path(&self, entry: &Path) -> Option<PathBuf> {
        let Some(selected) = &self.selected else {
            return Some(self.dest.join(entry));
        };

        selected.iter().find(|item| entry.starts_with(item)).map(|item| {
            let parent = item.parent().unwrap_or(Path::new(""));
            let relative = entry.strip_prefix(parent).unwrap_or(entry);
            self.dest.join(relative)
        })
    }

    fn write_entry(&mut self, name: &str, is_dir: bool, reader: &mut dyn Read) -> Result<()> {
        let entry = sanitize(name)?;
        if entry.as_os_str().is_empty() {
            return Ok(());
        }

        let Some(target) = self.target_path(&entry) else {
            debug!("Skipping '{}': not selected", name);
            // Solid archives share one stream; the next entry starts after this one
            io::copy(reader, &mut io::sink())?;
            return Ok(());
        };

        if is_dir {
            fs::create_dir_all(&target)?;
            return Ok(());
        }

        if target.exists() {
            warn!(
                "File '{}' already exists, seems archive is already unpacked",
                target.display()
            );
            io::copy(reader, &mut io::sink())?;
            return Ok(());
        }

        let parent = target.parent().unwrap_or(self.dest);
        fs::create_dir_all(parent)?;

        // Only a fully read entry shows up at `target`
        let mut out = NamedTempFile::new_in(parent)?;
        io::copy(reader, &mut out)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            out.as_file().set_permissions(fs::Permissions::from_mode(0o644))?;
        }
        out.persist(&target).map_err(|e| Error::Io(e.error))?;
        self.written += 1;
        debug!("Extracted {}", target.display());
        Ok(())
    }
}

/// Normalize an archive path, refusing anything that escapes the destination
fn sanitize(name: &str) -> Result<PathBuf> {
    let mut clean = PathBuf::new();

    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::Archive(format!("Unsafe entry path: {}", name)));
            }
        }
    }

    Ok(clean)
}
