// src/repository/mod.rs

//! Remote sources for raypm
//!
//! This module provides functionality for:
//! - Downloading package sources in the fetch phase
//! - Synchronizing the package index from the latest GitHub release

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::progress;
use crate::unpack;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Connection timeout for HTTP requests (30 seconds)
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound for a whole transfer; source archives can be large
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(30 * 60);

const GITHUB_API: &str = "https://api.github.com";

const USER_AGENT: &str = concat!("raypm/", env!("CARGO_PKG_VERSION"));

/// File recording the synchronized index version
pub const INDEX_INFO_FILE: &str = "info.txt";

/// Downloadable file attached to a release
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub browser_download_url: String,
}

/// GitHub release of the package index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// Blocking HTTP client for sources and index releases
pub struct Downloader {
    client: Client,
}

impl Downloader {
    /// Create a new downloader
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(TRANSFER_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Download(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Download `url` to `dest_path`
    ///
    /// An existing `dest_path` is kept and the download skipped; returns
    /// whether anything was fetched. Data is streamed into a temporary file
    /// next to the destination and renamed into place once complete, so an
    /// interrupted transfer never leaves a file that passes as present.
    pub fn get(&self, url: &str, dest_path: &Path) -> Result<bool> {
        if dest_path.exists() {
            warn!("File '{}' exists, skip downloading", dest_path.display());
            return Ok(false);
        }

        info!("Downloading {} to {}", url, dest_path.display());

        let dir = match dest_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|source| Error::DirectoryCreationFailed {
            path: dir.clone(),
            source,
        })?;

        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::Download(format!("Failed to get '{}': {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::Download(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let label = dest_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| url.to_string());
        let bar = progress::transfer(&label, response.content_length());

        let mut tmp = NamedTempFile::new_in(&dir)?;
        let copied = io::copy(&mut bar.wrap_read(&mut response), &mut tmp);
        bar.finish_and_clear();
        copied.map_err(|e| Error::Download(format!("Failed to write downloaded data: {}", e)))?;
        tmp.persist(dest_path).map_err(|e| Error::Io(e.error))?;

        info!("Successfully downloaded to {}", dest_path.display());
        Ok(true)
    }

    /// Newest release of the GitHub repository `repo` (`owner/name`)
    pub fn latest_release(&self, repo: &str) -> Result<Release> {
        let url = format!("{}/repos/{}/releases?per_page=1", GITHUB_API, repo);
        debug!("Requesting {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .map_err(|e| Error::Download(format!("Failed to query releases: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Download(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let releases: Vec<Release> = response
            .json()
            .map_err(|e| Error::Download(format!("Failed to parse releases JSON: {}", e)))?;

        releases
            .into_iter()
            .next()
            .ok_or_else(|| Error::Download(format!("Repository {} has no releases", repo)))
    }
}

/// Bring the package index under the root directory up to date
///
/// Returns the new index version, or `None` when the latest release is
/// already present in the cache.
pub fn sync_index(settings: &Settings) -> Result<Option<String>> {
    info!("Synchronizing package index from {}", settings.index_repo);

    let downloader = Downloader::new()?;
    let release = downloader.latest_release(&settings.index_repo)?;
    debug!("Latest version: {}", release.tag_name);

    let asset = release.assets.first().ok_or_else(|| {
        Error::Download(format!("Release {} has no assets", release.tag_name))
    })?;

    let archive = index_archive_path(settings, &release.tag_name);
    if archive.exists() {
        info!("Packages database is up to date");
        return Ok(None);
    }

    downloader.get(&asset.browser_download_url, &archive)?;

    // Stale manifests would otherwise survive: unpack skips existing files
    let index_dir = settings.root.join("pkgs");
    if index_dir.exists() {
        debug!("Removing previous index {}", index_dir.display());
        fs::remove_dir_all(&index_dir)?;
    }

    unpack::unpack("zip", &archive, &settings.root, None)?;

    fs::create_dir_all(&index_dir)?;
    fs::write(index_dir.join(INDEX_INFO_FILE), &release.tag_name)?;

    info!("Package index is at version {}", release.tag_name);
    Ok(Some(release.tag_name))
}

/// Version recorded by the last successful sync, if any
pub fn index_version(settings: &Settings) -> Option<String> {
    fs::read_to_string(settings.root.join("pkgs").join(INDEX_INFO_FILE))
        .ok()
        .map(|s| s.trim().to_string())
}

fn index_archive_path(settings: &Settings, tag: &str) -> PathBuf {
    settings.cache_dir().join(format!("{}.zip", tag))
}
