//! Picon target directory resolution.
//!
//! Boxes commonly relocate picons to USB or HDD storage and leave a `/picon`
//! symlink behind. When that link resolves to a directory it wins; otherwise
//! the image default is used. The chosen directory is created if missing.

use crate::error::{IoContext, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Resolve the install directory without touching the filesystem beyond reads
pub fn resolve_target(link: &Path, default_dir: &Path) -> PathBuf {
    let is_link = fs::symlink_metadata(link)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false);

    if is_link {
        if let Ok(real) = fs::canonicalize(link) {
            if real.is_dir() {
                debug!("Picon link {} resolves to {}", link.display(), real.display());
                return real;
            }
        }
        debug!(
            "Picon link {} is dangling or not a directory, using default",
            link.display()
        );
    }

    default_dir.to_path_buf()
}

/// Resolve the install directory and create it (0755) when absent
pub fn ensure_target(link: &Path, default_dir: &Path) -> Result<PathBuf> {
    let target = resolve_target(link, default_dir);
    if !target.exists() {
        info!("Creating picon directory {}", target.display());
        create_dir_0755(&target)?;
    }
    Ok(target)
}

fn create_dir_0755(path: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o755)
        .create(path)
        .at_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::{symlink, PermissionsExt};
    use tempfile::tempdir;

    #[test]
    fn test_symlink_to_directory_wins() {
        let root = tempdir().unwrap();
        let real = root.path().join("hdd_picon");
        fs::create_dir(&real).unwrap();
        let link = root.path().join("picon");
        symlink(&real, &link).unwrap();

        let target = resolve_target(&link, &root.path().join("default"));
        assert_eq!(target, fs::canonicalize(&real).unwrap());
    }

    #[test]
    fn test_missing_link_uses_default() {
        let root = tempdir().unwrap();
        let default_dir = root.path().join("default");
        let target = resolve_target(&root.path().join("nope"), &default_dir);
        assert_eq!(target, default_dir);
    }

    #[test]
    fn test_dangling_link_uses_default() {
        let root = tempdir().unwrap();
        let link = root.path().join("picon");
        symlink(root.path().join("gone"), &link).unwrap();
        let default_dir = root.path().join("default");
        assert_eq!(resolve_target(&link, &default_dir), default_dir);
    }

    #[test]
    fn test_plain_directory_at_link_path_is_ignored() {
        let root = tempdir().unwrap();
        let not_a_link = root.path().join("picon");
        fs::create_dir(&not_a_link).unwrap();
        let default_dir = root.path().join("default");
        assert_eq!(resolve_target(&not_a_link, &default_dir), default_dir);
    }

    #[test]
    fn test_ensure_creates_with_0755() {
        let root = tempdir().unwrap();
        let default_dir = root.path().join("share/enigma2/picon");
        let target = ensure_target(&root.path().join("nope"), &default_dir).unwrap();
        assert!(target.is_dir());
        let mode = fs::metadata(&target).unwrap().permissions().mode() & 0o777;
        // umask can only clear bits
        assert_eq!(mode & !0o755, 0);
    }
}
