//! Self-update: version polling and staged replacement of the data directory.
//!
//! # Flow
//!
//! ```text
//! copy data dir -> <data>.staging
//!     ↓
//! download update files (or zip snapshot) over the staged copy
//!     ↓
//! verify (non-empty, catalogue parses, optional SHA-256 manifest)
//!     ↓
//! data -> <data>.backup, staging -> data, drop backup
//! ```
//!
//! Nothing under the live data directory is written until verification has
//! passed. A failed swap puts the backup back.

use crate::catalogue::Catalogue;
use crate::config::Settings;
use crate::download;
use crate::error::{InstallError, IoContext, Result};
use crate::installer::{copy_recursive, move_items, payload_root};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Result of comparing the local and remote version strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStatus {
    pub current: String,
    pub remote: String,
    pub available: bool,
}

/// Where the new files come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateSource {
    /// Individual files below the raw base URL
    Files(Vec<String>),
    /// Zip of the repository; `subdir` selects the data folder inside it
    Snapshot { url: String, subdir: Option<String> },
}

impl UpdateSource {
    /// Snapshot when requested and configured, individual files otherwise
    pub fn from_settings(settings: &Settings, prefer_snapshot: bool) -> Self {
        match (&settings.snapshot_url, prefer_snapshot) {
            (Some(url), true) => Self::Snapshot {
                url: url.clone(),
                subdir: settings.snapshot_subdir.clone(),
            },
            _ => Self::Files(settings.update_files.clone()),
        }
    }
}

/// What a completed self-update installed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub files: usize,
    pub version: String,
}

/// Version recorded in the marker file, or the built-in one
pub fn current_version(version_path: &Path) -> String {
    fs::read_to_string(version_path)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string())
}

/// Any difference counts as an update; remote text is trimmed first
pub fn compare_versions(current: &str, remote: &str) -> UpdateStatus {
    let remote = remote.trim().to_string();
    UpdateStatus {
        current: current.to_string(),
        available: !remote.is_empty() && remote != current,
        remote,
    }
}

/// Fetch `version_url` and compare it against `current`
pub fn check(version_url: &str, current: &str, timeout: Duration) -> Result<UpdateStatus> {
    let remote = download::fetch_text(version_url, timeout)?;
    Ok(compare_versions(current, &remote))
}

/// Poll the configured remote version file
pub fn check_for_update(settings: &Settings) -> Result<UpdateStatus> {
    let current = current_version(&settings.version_path());
    let status = check(&settings.version_url(), &current, settings.version_timeout())?;
    if status.available {
        info!("Update available: {} -> {}", status.current, status.remote);
    } else {
        info!("Version {} is current", status.current);
    }
    Ok(status)
}

fn sibling(dir: &Path, suffix: &str) -> PathBuf {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "data".to_string());
    dir.with_file_name(format!("{}.{}", name, suffix))
}

/// Removes a leftover directory on drop
struct ScratchDir(PathBuf);

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.0.exists() {
            if let Err(e) = fs::remove_dir_all(&self.0) {
                warn!("Could not remove {}: {}", self.0.display(), e);
            }
        }
    }
}

/// Download, verify and swap in a new data directory
pub fn self_update(settings: &Settings, source: &UpdateSource) -> Result<UpdateOutcome> {
    let data_dir = &settings.data_dir;
    let staging = ScratchDir(sibling(data_dir, "staging"));
    if staging.0.exists() {
        fs::remove_dir_all(&staging.0).at_path(&staging.0)?;
    }

    if data_dir.is_dir() {
        copy_recursive(data_dir, &staging.0).at_path(&staging.0)?;
    } else {
        fs::create_dir_all(&staging.0).at_path(&staging.0)?;
    }

    let files = match source {
        UpdateSource::Files(names) => stage_files(settings, names, &staging.0)?,
        UpdateSource::Snapshot { url, subdir } => {
            stage_snapshot(settings, url, subdir.as_deref(), &staging.0)?
        }
    };

    verify_staging(settings, &staging.0)?;
    swap_in(&staging.0, data_dir)?;

    let version = current_version(&settings.version_path());
    info!("Self-update installed {} files, now at {}", files, version);
    Ok(UpdateOutcome { files, version })
}

fn stage_files(settings: &Settings, names: &[String], staging: &Path) -> Result<usize> {
    for name in names {
        let url = format!("{}{}", settings.raw_base_url, name);
        let bytes = download::download_to_file(&url, &staging.join(name), settings.update_timeout())?;
        if bytes == 0 {
            return Err(InstallError::integrity(format!("{} is empty", name)));
        }
    }
    Ok(names.len())
}

fn stage_snapshot(
    settings: &Settings,
    url: &str,
    subdir: Option<&str>,
    staging: &Path,
) -> Result<usize> {
    let zip_path = settings.temp_dir.join("picon-updater-snapshot.zip");
    let _zip_guard = ScratchFile(zip_path.clone());
    download::download_to_file(url, &zip_path, settings.archive_timeout())?;

    let extract = tempfile::Builder::new()
        .prefix("picon_snapshot")
        .tempdir_in(&settings.temp_dir)
        .at_path(&settings.temp_dir)?;
    let count = extract_zip(&zip_path, extract.path())?;
    if count == 0 {
        return Err(InstallError::archive("snapshot contains no files"));
    }

    let mut root = payload_root(extract.path())?;
    if let Some(sub) = subdir {
        root = root.join(sub);
        if !root.is_dir() {
            return Err(InstallError::archive(format!(
                "snapshot has no directory {}",
                sub
            )));
        }
    }

    reject_empty_files(&root)?;
    let (moved, skipped) = move_items(&root, staging)?;
    if skipped > 0 {
        return Err(InstallError::integrity(format!(
            "{} snapshot items could not be staged",
            skipped
        )));
    }
    Ok(moved)
}

/// Every regular file under `root` must have content
fn reject_empty_files(root: &Path) -> Result<()> {
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| InstallError::integrity(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let len = entry.metadata().map_err(|e| InstallError::integrity(e.to_string()))?.len();
        if len == 0 {
            let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
            return Err(InstallError::integrity(format!("{} is empty", rel.display())));
        }
    }
    Ok(())
}

/// Deletes a file on drop
struct ScratchFile(PathBuf);

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if self.0.exists() {
            let _ = fs::remove_file(&self.0);
        }
    }
}

/// Extract regular files and directories from a zip; links and escaping
/// names are dropped. Returns the number of files written.
pub fn extract_zip(zip_path: &Path, dest: &Path) -> Result<usize> {
    let file = File::open(zip_path).at_path(zip_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut written = 0usize;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(rel) = entry.enclosed_name() else {
            warn!("Dropping zip member with unsafe name {}", entry.name());
            continue;
        };
        let is_link = entry
            .unix_mode()
            .map(|mode| mode & 0o170000 == 0o120000)
            .unwrap_or(false);
        if is_link {
            debug!("Dropping zip link member {}", rel.display());
            continue;
        }

        let out = dest.join(&rel);
        if entry.is_dir() {
            fs::create_dir_all(&out).at_path(&out)?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent).at_path(parent)?;
        }
        let mut out_file = File::create(&out).at_path(&out)?;
        io::copy(&mut entry, &mut out_file).at_path(&out)?;
        written += 1;
    }

    Ok(written)
}

/// Reject a staged tree that would leave the application unusable
pub fn verify_staging(settings: &Settings, staging: &Path) -> Result<()> {
    let catalogue = staging.join(&settings.catalogue_file);
    if catalogue.exists() {
        Catalogue::load(&catalogue)
            .map_err(|e| InstallError::integrity(format!("staged catalogue: {}", e)))?;
    }

    let version = staging.join(&settings.version_file);
    if version.exists() && fs::read_to_string(&version).at_path(&version)?.trim().is_empty() {
        return Err(InstallError::integrity("staged version marker is empty"));
    }

    if let Some(manifest) = &settings.checksum_manifest {
        let url = format!("{}{}", settings.raw_base_url, manifest);
        let text = download::fetch_text(&url, settings.update_timeout())?;
        verify_manifest(&text, staging)?;
    }

    Ok(())
}

/// Check `sha256sum`-style lines against files under `root`
pub fn verify_manifest(manifest: &str, root: &Path) -> Result<()> {
    for line in manifest.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Some((expected, name)) = line.split_once(char::is_whitespace) else {
            return Err(InstallError::integrity(format!("bad manifest line: {}", line)));
        };
        let name = name.trim().trim_start_matches('*');
        if name.contains("..") || name.starts_with('/') {
            return Err(InstallError::integrity(format!("bad manifest path: {}", name)));
        }

        let path = root.join(name);
        let actual = sha256_file(&path)?;
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(InstallError::integrity(format!(
                "checksum mismatch for {}",
                name
            )));
        }
        debug!("Checksum ok for {}", name);
    }
    Ok(())
}

pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).at_path(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).at_path(path)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Replace `live` with `staging`, restoring the old tree if the swap fails
pub fn swap_in(staging: &Path, live: &Path) -> Result<()> {
    let backup = ScratchDir(sibling(live, "backup"));
    if backup.0.exists() {
        fs::remove_dir_all(&backup.0).at_path(&backup.0)?;
    }

    let had_live = live.exists();
    if had_live {
        fs::rename(live, &backup.0).at_path(live)?;
    }

    if let Err(e) = fs::rename(staging, live) {
        if had_live {
            if let Err(restore) = fs::rename(&backup.0, live) {
                warn!("Could not restore {}: {}", live.display(), restore);
            }
        }
        return Err(InstallError::filesystem(live, e));
    }

    debug!("Swapped {} into {}", staging.display(), live.display());
    Ok(())
}
