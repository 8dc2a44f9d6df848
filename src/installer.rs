//! Archive installer
//!
//! Turns a downloaded picon pack into the contents of the picon directory.
//!
//! # Tarball flow
//!
//! ```text
//! extract -> scratch dir (links dropped)
//!     ↓
//! pick payload root (single wrapper dir is flattened)
//!     ↓
//! set previews aside (only if nested in target)
//!     ↓
//! clear target -> move payload items in -> restore previews
//!     ↓
//! normalize permissions -> touch force_reload
//! ```
//!
//! The archive and the scratch directory are removed on every exit path by
//! drop guards. Individual members or items that cannot be extracted or
//! moved are logged and skipped; only an archive that yields nothing at all
//! is fatal.

use crate::catalogue::CatalogueEntry;
use crate::config::Settings;
use crate::download;
use crate::error::{InstallError, IoContext, Result};
use crate::package_manager::{install_package, PackageManager};
use crate::picon_dir;
use flate2::read::GzDecoder;
use std::fs::{self, File, OpenOptions};
use std::io::Read;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use strum::Display;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use xz2::read::XzDecoder;

/// Marker file whose mtime tells the host image cache to reload
pub const SENTINEL_FILE: &str = "force_reload";

/// Installable archive kinds, detected from the file name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ArchiveKind {
    #[strum(serialize = "ipk")]
    Ipk,
    #[strum(serialize = "tar.xz")]
    TarXz,
    #[strum(serialize = "tar.gz")]
    TarGz,
}

impl ArchiveKind {
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        if name.ends_with(".ipk") {
            Some(Self::Ipk)
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Some(Self::TarXz)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else {
            None
        }
    }

    pub fn is_tarball(self) -> bool {
        matches!(self, Self::TarXz | Self::TarGz)
    }
}

/// What an install did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub kind: ArchiveKind,
    pub target: Option<PathBuf>,
    pub package: Option<String>,
    pub extracted: usize,
    pub moved: usize,
    pub skipped: usize,
}

impl InstallReport {
    fn new(kind: ArchiveKind) -> Self {
        Self {
            kind,
            target: None,
            package: None,
            extracted: 0,
            moved: 0,
            skipped: 0,
        }
    }
}

/// Knobs for the tarball flow
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Local preview images that must survive clearing the target
    pub previews_dir: Option<PathBuf>,
    /// Where the scratch extraction directory is created
    pub scratch_parent: PathBuf,
}

/// Deletes the consumed archive when dropped
struct ConsumedArchive<'a>(&'a Path);

impl Drop for ConsumedArchive<'_> {
    fn drop(&mut self) {
        if self.0.exists() {
            match fs::remove_file(self.0) {
                Ok(()) => debug!("Removed archive {}", self.0.display()),
                Err(e) => warn!("Could not remove archive {}: {}", self.0.display(), e),
            }
        }
    }
}

/// Moves a previews directory to a hidden spot in the target and back on drop
struct PreviewsAside {
    original: PathBuf,
    parked: PathBuf,
}

impl PreviewsAside {
    /// Park `previews` if it exists and is a strict descendant of `target`
    fn park(previews: &Path, target: &Path) -> Result<Option<Self>> {
        if previews == target || !previews.starts_with(target) || !previews.exists() {
            return Ok(None);
        }

        // Parked inside the target so the move never crosses a mount point
        let parked = target.join(format!(".picon-previews-{}", std::process::id()));
        if fs::symlink_metadata(&parked).is_ok() {
            remove_any(&parked).at_path(&parked)?;
        }
        move_path(previews, &parked).at_path(previews)?;
        debug!("Parked {} at {}", previews.display(), parked.display());

        Ok(Some(Self {
            original: previews.to_path_buf(),
            parked,
        }))
    }
}

impl Drop for PreviewsAside {
    fn drop(&mut self) {
        if fs::symlink_metadata(&self.original).is_ok() {
            if let Err(e) = remove_any(&self.original) {
                warn!("Could not clear {}: {}", self.original.display(), e);
            }
        }
        if let Some(parent) = self.original.parent() {
            let _ = fs::create_dir_all(parent);
        }
        match move_path(&self.parked, &self.original) {
            Ok(()) => debug!("Restored previews to {}", self.original.display()),
            Err(e) => warn!(
                "Could not restore previews from {} to {}: {}",
                self.parked.display(),
                self.original.display(),
                e
            ),
        }
    }
}

/// Installs archives according to the runtime settings
pub struct Installer<'a> {
    settings: &'a Settings,
    package_manager: &'a dyn PackageManager,
}

impl<'a> Installer<'a> {
    pub fn new(settings: &'a Settings, package_manager: &'a dyn PackageManager) -> Self {
        Self {
            settings,
            package_manager,
        }
    }

    /// Download the archive a catalogue entry points at and install it
    pub fn install_entry(&self, entry: &CatalogueEntry) -> Result<InstallReport> {
        let url = entry
            .archive_url()
            .ok_or_else(|| InstallError::catalogue(format!("{} has no URL", entry.name)))?;
        let file_name = download::file_name_from_url(url)
            .ok_or_else(|| InstallError::UnknownFormat(url.to_string()))?;
        if ArchiveKind::detect(Path::new(&file_name)).is_none() {
            return Err(InstallError::UnknownFormat(file_name));
        }

        let archive_path = self.settings.temp_dir.join(&file_name);
        download::download_to_file(url, &archive_path, self.settings.archive_timeout())?;
        self.install(&archive_path)
    }

    /// Install a downloaded archive, consuming it.
    pub fn install(&self, archive_path: &Path) -> Result<InstallReport> {
        let _consumed = ConsumedArchive(archive_path);

        let kind = ArchiveKind::detect(archive_path).ok_or_else(|| {
            InstallError::UnknownFormat(archive_path.display().to_string())
        })?;
        info!("Installing {} archive {}", kind, archive_path.display());

        match kind {
            ArchiveKind::Ipk => {
                let name = install_package(self.package_manager, archive_path)?;
                let mut report = InstallReport::new(kind);
                report.package = Some(name);
                Ok(report)
            }
            ArchiveKind::TarXz | ArchiveKind::TarGz => {
                let target = picon_dir::ensure_target(
                    &self.settings.picon_link,
                    &self.settings.default_picon_dir,
                )?;
                let options = InstallOptions {
                    previews_dir: Some(self.settings.previews_dir.clone()),
                    scratch_parent: self.settings.temp_dir.clone(),
                };
                install_archive(archive_path, &target, &options)
            }
        }
    }
}

/// Install a tarball into an already resolved `target_dir`.
///
/// The archive is deleted on return, success or not.
pub fn install_archive(
    archive_path: &Path,
    target_dir: &Path,
    options: &InstallOptions,
) -> Result<InstallReport> {
    let _consumed = ConsumedArchive(archive_path);

    let kind = ArchiveKind::detect(archive_path)
        .filter(|k| k.is_tarball())
        .ok_or_else(|| InstallError::UnknownFormat(archive_path.display().to_string()))?;

    fs::create_dir_all(&options.scratch_parent).at_path(&options.scratch_parent)?;
    let scratch = tempfile::Builder::new()
        .prefix("picon_extract")
        .tempdir_in(&options.scratch_parent)
        .at_path(&options.scratch_parent)?;

    let mut report = InstallReport::new(kind);
    report.target = Some(target_dir.to_path_buf());

    let (extracted, dropped) = extract_tarball(archive_path, kind, scratch.path())?;
    report.extracted = extracted;
    report.skipped += dropped;
    if extracted == 0 {
        return Err(InstallError::archive(format!(
            "{} contains no installable members",
            archive_path.display()
        )));
    }

    let payload = payload_root(scratch.path())?;

    {
        let previews = match &options.previews_dir {
            Some(previews) => PreviewsAside::park(previews, target_dir)?,
            None => None,
        };
        clear_directory_except(target_dir, previews.as_ref().map(|p| p.parked.as_path()))?;
        let (moved, skipped) = move_items(&payload, target_dir)?;
        report.moved = moved;
        report.skipped += skipped;
    }

    normalize_permissions(target_dir);
    touch(&target_dir.join(SENTINEL_FILE))?;

    info!(
        "Installed {} items into {} ({} skipped)",
        report.moved,
        target_dir.display(),
        report.skipped
    );
    Ok(report)
}

/// Unpack regular files and directories; returns (unpacked, dropped)
pub fn extract_tarball(archive_path: &Path, kind: ArchiveKind, dest: &Path) -> Result<(usize, usize)> {
    let file = File::open(archive_path).at_path(archive_path)?;
    let reader: Box<dyn Read> = match kind {
        ArchiveKind::TarXz => Box::new(XzDecoder::new(file)),
        ArchiveKind::TarGz => Box::new(GzDecoder::new(file)),
        ArchiveKind::Ipk => {
            return Err(InstallError::UnknownFormat(archive_path.display().to_string()));
        }
    };

    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(false);
    archive.set_unpack_xattrs(false);
    archive.set_overwrite(true);

    let entries = archive
        .entries()
        .map_err(|e| InstallError::archive(format!("cannot read {}: {}", archive_path.display(), e)))?;

    let mut unpacked = 0usize;
    let mut dropped = 0usize;

    for entry in entries {
        let mut entry = match entry {
            Ok(entry) => entry,
            Err(e) if unpacked == 0 => {
                return Err(InstallError::archive(format!(
                    "{} is not a readable tarball: {}",
                    archive_path.display(),
                    e
                )));
            }
            Err(e) => {
                warn!("Stopping extraction of {}: {}", archive_path.display(), e);
                break;
            }
        };

        let entry_type = entry.header().entry_type();
        let name = entry
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "<invalid path>".to_string());

        if entry_type.is_symlink() || entry_type.is_hard_link() {
            debug!("Dropping link member {}", name);
            dropped += 1;
            continue;
        }
        if !entry_type.is_file() && !entry_type.is_dir() {
            debug!("Dropping special member {} ({:?})", name, entry_type);
            dropped += 1;
            continue;
        }

        match entry.unpack_in(dest) {
            Ok(true) => unpacked += 1,
            Ok(false) => {
                warn!("Dropping member {} that escapes the extraction root", name);
                dropped += 1;
            }
            Err(e) => {
                warn!("Failed to extract {}: {}", name, e);
                dropped += 1;
            }
        }
    }

    debug!(
        "Extracted {} members from {} ({} dropped)",
        unpacked,
        archive_path.display(),
        dropped
    );
    Ok((unpacked, dropped))
}

/// The directory whose children get installed.
///
/// Exactly one top-level directory means the pack was wrapped in a folder and
/// that folder is the payload; anything else means the scratch root is.
pub fn payload_root(scratch: &Path) -> Result<PathBuf> {
    let entries: Vec<fs::DirEntry> = fs::read_dir(scratch)
        .at_path(scratch)?
        .collect::<std::io::Result<_>>()
        .at_path(scratch)?;

    if let [only] = entries.as_slice() {
        let is_dir = only.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir {
            return Ok(only.path());
        }
    }
    Ok(scratch.to_path_buf())
}

/// Remove every entry of `dir`
pub fn clear_directory(dir: &Path) -> Result<()> {
    clear_directory_except(dir, None)
}

fn clear_directory_except(dir: &Path, keep: Option<&Path>) -> Result<()> {
    for entry in fs::read_dir(dir).at_path(dir)? {
        let path = entry.at_path(dir)?.path();
        if keep == Some(path.as_path()) {
            continue;
        }
        remove_any(&path).at_path(&path)?;
    }
    Ok(())
}

/// Move each child of `src` into `dest`, replacing same-named items.
/// Returns (moved, skipped).
pub fn move_items(src: &Path, dest: &Path) -> Result<(usize, usize)> {
    let mut moved = 0usize;
    let mut skipped = 0usize;

    for entry in fs::read_dir(src).at_path(src)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", src.display(), e);
                skipped += 1;
                continue;
            }
        };
        let from = entry.path();
        let to = dest.join(entry.file_name());

        if fs::symlink_metadata(&to).is_ok() {
            if let Err(e) = remove_any(&to) {
                warn!("Cannot replace {}: {}", to.display(), e);
                skipped += 1;
                continue;
            }
        }

        match move_path(&from, &to) {
            Ok(()) => moved += 1,
            Err(e) => {
                warn!("Failed to move {} to {}: {}", from.display(), to.display(), e);
                skipped += 1;
            }
        }
    }

    Ok((moved, skipped))
}

/// Rename, falling back to copy+delete across filesystems
fn move_path(from: &Path, to: &Path) -> std::io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    copy_recursive(from, to)?;
    remove_any(from)
}

pub(crate) fn copy_recursive(from: &Path, to: &Path) -> std::io::Result<()> {
    if !fs::symlink_metadata(from)?.is_dir() {
        fs::copy(from, to)?;
        return Ok(());
    }
    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry.map_err(std::io::Error::other)?;
        let rel = entry
            .path()
            .strip_prefix(from)
            .map_err(std::io::Error::other)?;
        let out = to.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&out)?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &out)?;
        }
    }
    Ok(())
}

/// Recursive remove for directories, unlink for everything else
fn remove_any(path: &Path) -> std::io::Result<()> {
    let meta = fs::symlink_metadata(path)?;
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Directories 0755, files 0644, links untouched
pub fn normalize_permissions(root: &Path) {
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Permission walk error under {}: {}", root.display(), e);
                continue;
            }
        };
        let mode = if entry.file_type().is_dir() {
            0o755
        } else if entry.file_type().is_file() {
            0o644
        } else {
            continue;
        };
        if let Err(e) = fs::set_permissions(entry.path(), fs::Permissions::from_mode(mode)) {
            warn!("Cannot chmod {}: {}", entry.path().display(), e);
        }
    }
}

/// Create `path` if needed and bump its mtime
pub fn touch(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .at_path(path)?;
    file.set_modified(SystemTime::now()).at_path(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_detect_archive_kind() {
        assert_eq!(ArchiveKind::detect(Path::new("/tmp/a_1.0_all.ipk")), Some(ArchiveKind::Ipk));
        assert_eq!(ArchiveKind::detect(Path::new("/tmp/a.tar.xz")), Some(ArchiveKind::TarXz));
        assert_eq!(ArchiveKind::detect(Path::new("/tmp/A.TGZ")), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::detect(Path::new("/tmp/a.zip")), None);
    }

    #[test]
    fn test_payload_root_single_directory_is_flattened() {
        let scratch = tempdir().unwrap();
        fs::create_dir_all(scratch.path().join("picon/sub")).unwrap();
        fs::write(scratch.path().join("picon/a.png"), b"a").unwrap();
        assert_eq!(payload_root(scratch.path()).unwrap(), scratch.path().join("picon"));
    }

    #[test]
    fn test_payload_root_single_file_is_root() {
        let scratch = tempdir().unwrap();
        fs::write(scratch.path().join("a.png"), b"a").unwrap();
        assert_eq!(payload_root(scratch.path()).unwrap(), scratch.path());
    }

    #[test]
    fn test_payload_root_empty_is_root() {
        let scratch = tempdir().unwrap();
        assert_eq!(payload_root(scratch.path()).unwrap(), scratch.path());
    }

    #[test]
    fn test_payload_root_two_entries_is_root() {
        let scratch = tempdir().unwrap();
        fs::create_dir(scratch.path().join("one")).unwrap();
        fs::write(scratch.path().join("b.png"), b"b").unwrap();
        assert_eq!(payload_root(scratch.path()).unwrap(), scratch.path());
    }

    #[test]
    fn test_move_items_replaces_conflicts() {
        let root = tempdir().unwrap();
        let src = root.path().join("src");
        let dest = root.path().join("dest");
        fs::create_dir_all(src.join("dir")).unwrap();
        fs::write(src.join("dir/new.png"), b"new").unwrap();
        fs::write(src.join("file.png"), b"new").unwrap();
        fs::create_dir_all(dest.join("dir")).unwrap();
        fs::write(dest.join("dir/old.png"), b"old").unwrap();
        fs::write(dest.join("file.png"), b"old").unwrap();

        let (moved, skipped) = move_items(&src, &dest).unwrap();
        assert_eq!((moved, skipped), (2, 0));
        assert!(!dest.join("dir/old.png").exists());
        assert_eq!(fs::read(dest.join("dir/new.png")).unwrap(), b"new");
        assert_eq!(fs::read(dest.join("file.png")).unwrap(), b"new");
    }

    #[test]
    fn test_previews_outside_target_are_not_parked() {
        let root = tempdir().unwrap();
        let target = root.path().join("picon");
        let previews = root.path().join("previews");
        fs::create_dir_all(&target).unwrap();
        fs::create_dir_all(&previews).unwrap();
        assert!(PreviewsAside::park(&previews, &target).unwrap().is_none());
        assert!(previews.exists());
    }

    #[test]
    fn test_previews_prefix_sibling_is_not_descendant() {
        let root = tempdir().unwrap();
        let target = root.path().join("picon");
        let previews = root.path().join("picon-previews");
        fs::create_dir_all(&target).unwrap();
        fs::create_dir_all(&previews).unwrap();
        assert!(PreviewsAside::park(&previews, &target).unwrap().is_none());
    }

    #[test]
    fn test_previews_guard_restores_on_drop() {
        let root = tempdir().unwrap();
        let target = root.path().join("picon");
        let previews = target.join("previews");
        fs::create_dir_all(&previews).unwrap();
        fs::write(previews.join("astra.png"), b"png").unwrap();

        {
            let guard = PreviewsAside::park(&previews, &target).unwrap().unwrap();
            assert!(!previews.exists());
            assert!(guard.parked.starts_with(&target));
            clear_directory_except(&target, Some(&guard.parked)).unwrap();
            assert!(guard.parked.join("astra.png").is_file());
        }
        assert_eq!(fs::read(previews.join("astra.png")).unwrap(), b"png");
        let leftovers: Vec<_> = fs::read_dir(&target).unwrap().collect();
        assert_eq!(leftovers.len(), 1, "only the restored previews dir remains");
    }

    #[test]
    fn test_previews_park_without_touching_target_parent() {
        let root = tempdir().unwrap();
        let mount = root.path().join("media");
        let target = mount.join("usb");
        let previews = target.join("previews");
        fs::create_dir_all(&previews).unwrap();
        fs::write(previews.join("astra.png"), b"png").unwrap();
        fs::write(target.join("old.png"), b"old").unwrap();
        let before: Vec<_> = fs::read_dir(&mount).unwrap().map(|e| e.unwrap().path()).collect();

        {
            let guard = PreviewsAside::park(&previews, &target).unwrap().unwrap();
            let after: Vec<_> = fs::read_dir(&mount).unwrap().map(|e| e.unwrap().path()).collect();
            assert_eq!(before, after, "nothing is parked next to the target");
            clear_directory_except(&target, Some(&guard.parked)).unwrap();
        }
        assert!(!target.join("old.png").exists());
        assert_eq!(fs::read(previews.join("astra.png")).unwrap(), b"png");
    }

    #[test]
    fn test_normalize_permissions() {
        let root = tempdir().unwrap();
        let dir = root.path().join("d");
        fs::create_dir(&dir).unwrap();
        let file = dir.join("f.png");
        fs::write(&file, b"x").unwrap();
        fs::set_permissions(&file, fs::Permissions::from_mode(0o700)).unwrap();
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o700)).unwrap();

        normalize_permissions(root.path());
        assert_eq!(fs::metadata(&dir).unwrap().permissions().mode() & 0o777, 0o755);
        assert_eq!(fs::metadata(&file).unwrap().permissions().mode() & 0o777, 0o644);
    }

    #[test]
    fn test_touch_creates_and_keeps_content() {
        let root = tempdir().unwrap();
        let path = root.path().join(SENTINEL_FILE);
        touch(&path).unwrap();
        assert!(path.exists());
        fs::write(&path, b"keep").unwrap();
        touch(&path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"keep");
    }

    #[test]
    fn test_install_archive_rejects_ipk() {
        let root = tempdir().unwrap();
        let archive = root.path().join("a_all.ipk");
        fs::write(&archive, b"x").unwrap();
        let options = InstallOptions {
            previews_dir: None,
            scratch_parent: root.path().join("tmp"),
        };
        let err = install_archive(&archive, &root.path().join("picon"), &options).unwrap_err();
        assert!(matches!(err, InstallError::UnknownFormat(_)));
        assert!(!archive.exists());
    }
}
