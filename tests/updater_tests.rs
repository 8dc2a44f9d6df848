//! Tests for version checks and staged self-update
//!
//! Remote files are served from a local directory through `file://` URLs.
//!
//! These tests verify:
//! - Version comparison against the remote marker
//! - File-list updates keeping unrelated local files
//! - Verification failures leaving the live directory untouched
//! - SHA-256 manifest checking
//! - Zip snapshot updates with wrapper flattening and link dropping

use piconupdater::config::Settings;
use piconupdater::error::InstallError;
use piconupdater::updater::{self, UpdateSource};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tempfile::{tempdir, TempDir};
use zip::write::SimpleFileOptions;

const OLD_CATALOGUE: &str = r#"[{"name": "Old", "preview": ""}]"#;
const NEW_CATALOGUE: &str = r#"[{"name": "New", "preview": "", "url": "https://example.org/new.tar.xz"}]"#;

struct Fixture {
    root: TempDir,
    settings: Settings,
}

impl Fixture {
    fn new() -> Self {
        let root = tempdir().unwrap();
        let data = root.path().join("PiconUpdater");
        let remote = root.path().join("remote");
        fs::create_dir_all(data.join("previews")).unwrap();
        fs::create_dir_all(&remote).unwrap();

        fs::write(data.join("picons.json"), OLD_CATALOGUE).unwrap();
        fs::write(data.join("version"), "1.2\n").unwrap();
        fs::write(data.join("settings.json"), "{}").unwrap();
        fs::write(data.join("previews/astra.png"), b"png").unwrap();

        fs::write(remote.join("picons.json"), NEW_CATALOGUE).unwrap();
        fs::write(remote.join("version"), "1.3\n").unwrap();

        let settings = Settings {
            data_dir: data.clone(),
            previews_dir: data.join("previews"),
            temp_dir: root.path().join("tmp"),
            raw_base_url: format!("file://{}/", remote.display()),
            ..Settings::default()
        };
        Self { root, settings }
    }

    fn data(&self) -> &Path {
        &self.settings.data_dir
    }

    fn remote(&self) -> std::path::PathBuf {
        self.root.path().join("remote")
    }

    fn assert_untouched(&self) {
        assert_eq!(fs::read_to_string(self.data().join("version")).unwrap(), "1.2\n");
        assert_eq!(
            fs::read_to_string(self.data().join("picons.json")).unwrap(),
            OLD_CATALOGUE
        );
        self.assert_no_leftovers();
    }

    fn assert_no_leftovers(&self) {
        assert!(!self.root.path().join("PiconUpdater.staging").exists());
        assert!(!self.root.path().join("PiconUpdater.backup").exists());
    }
}

fn files_source() -> UpdateSource {
    UpdateSource::Files(vec!["picons.json".into(), "version".into()])
}

// =============================================================================
// Version Check Tests
// =============================================================================

#[test]
fn test_check_reports_newer_remote() {
    let fx = Fixture::new();
    let status = updater::check_for_update(&fx.settings).unwrap();
    assert_eq!(status.current, "1.2");
    assert_eq!(status.remote, "1.3");
    assert!(status.available);
}

#[test]
fn test_check_same_version_is_not_available() {
    let fx = Fixture::new();
    fs::write(fx.remote().join("version"), "1.2").unwrap();
    let status = updater::check(&fx.settings.version_url(), "1.2", fx.settings.version_timeout())
        .unwrap();
    assert!(!status.available);
}

#[test]
fn test_check_unreachable_remote_is_error() {
    let fx = Fixture::new();
    fs::remove_file(fx.remote().join("version")).unwrap();
    assert!(updater::check_for_update(&fx.settings).is_err());
}

// =============================================================================
// File-List Update Tests
// =============================================================================

#[test]
fn test_files_update_replaces_listed_files_only() {
    let fx = Fixture::new();
    let outcome = updater::self_update(&fx.settings, &files_source()).unwrap();

    assert_eq!(outcome.files, 2);
    assert_eq!(outcome.version, "1.3");
    assert_eq!(
        fs::read_to_string(fx.data().join("picons.json")).unwrap(),
        NEW_CATALOGUE
    );
    assert_eq!(fs::read_to_string(fx.data().join("settings.json")).unwrap(), "{}");
    assert_eq!(fs::read(fx.data().join("previews/astra.png")).unwrap(), b"png");
    fx.assert_no_leftovers();
}

#[test]
fn test_invalid_remote_catalogue_is_rejected() {
    let fx = Fixture::new();
    fs::write(fx.remote().join("picons.json"), "<html>404</html>").unwrap();

    let err = updater::self_update(&fx.settings, &files_source()).unwrap_err();
    assert!(matches!(err, InstallError::Integrity(_)));
    fx.assert_untouched();
}

#[test]
fn test_empty_remote_file_is_rejected() {
    let fx = Fixture::new();
    fs::write(fx.remote().join("version"), "").unwrap();

    let err = updater::self_update(&fx.settings, &files_source()).unwrap_err();
    assert!(matches!(err, InstallError::Integrity(_)));
    fx.assert_untouched();
}

#[test]
fn test_missing_remote_file_is_network_error() {
    let fx = Fixture::new();
    fs::remove_file(fx.remote().join("picons.json")).unwrap();

    let err = updater::self_update(&fx.settings, &files_source()).unwrap_err();
    assert!(matches!(err, InstallError::Network(_)));
    fx.assert_untouched();
}

#[test]
fn test_leftover_staging_is_replaced() {
    let fx = Fixture::new();
    let staging = fx.root.path().join("PiconUpdater.staging");
    fs::create_dir_all(&staging).unwrap();
    fs::write(staging.join("junk"), b"junk").unwrap();

    updater::self_update(&fx.settings, &files_source()).unwrap();
    assert!(!fx.data().join("junk").exists());
}

// =============================================================================
// Checksum Manifest Tests
// =============================================================================

fn write_manifest(fx: &Fixture, tamper: bool) {
    let remote = fx.remote();
    let catalogue_hash = if tamper {
        "0".repeat(64)
    } else {
        updater::sha256_file(&remote.join("picons.json")).unwrap()
    };
    let version_hash = updater::sha256_file(&remote.join("version")).unwrap();
    fs::write(
        remote.join("checksums.sha256"),
        format!("{}  picons.json\n{}  version\n", catalogue_hash, version_hash),
    )
    .unwrap();
}

#[test]
fn test_matching_manifest_allows_update() {
    let mut fx = Fixture::new();
    fx.settings.checksum_manifest = Some("checksums.sha256".into());
    write_manifest(&fx, false);

    updater::self_update(&fx.settings, &files_source()).unwrap();
    assert_eq!(fs::read_to_string(fx.data().join("version")).unwrap(), "1.3\n");
}

#[test]
fn test_tampered_file_fails_manifest() {
    let mut fx = Fixture::new();
    fx.settings.checksum_manifest = Some("checksums.sha256".into());
    write_manifest(&fx, true);

    let err = updater::self_update(&fx.settings, &files_source()).unwrap_err();
    assert!(matches!(err, InstallError::Integrity(_)));
    fx.assert_untouched();
}

// =============================================================================
// Snapshot Update Tests
// =============================================================================

fn build_zip(path: &Path, files: &[(&str, &[u8])], links: &[(&str, &str)]) {
    let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
    for (name, data) in files {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(data).unwrap();
    }
    for (name, target) in links {
        zip.add_symlink(*name, *target, SimpleFileOptions::default())
            .unwrap();
    }
    zip.finish().unwrap();
}

#[test]
fn test_snapshot_update_flattens_wrapper_and_subdir() {
    let fx = Fixture::new();
    let zip_path = fx.root.path().join("main.zip");
    build_zip(
        &zip_path,
        &[
            ("PiconUpdater-main/README.md", b"readme"),
            ("PiconUpdater-main/plugin/picons.json", NEW_CATALOGUE.as_bytes()),
            ("PiconUpdater-main/plugin/version", b"2.0\n"),
        ],
        &[],
    );

    let source = UpdateSource::Snapshot {
        url: format!("file://{}", zip_path.display()),
        subdir: Some("plugin".into()),
    };
    let outcome = updater::self_update(&fx.settings, &source).unwrap();

    assert_eq!(outcome.version, "2.0");
    assert!(!fx.data().join("README.md").exists());
    assert_eq!(
        fs::read_to_string(fx.data().join("picons.json")).unwrap(),
        NEW_CATALOGUE
    );
    assert!(fx.data().join("settings.json").exists());
    assert!(!fx.settings.temp_dir.join("picon-updater-snapshot.zip").exists());
    fx.assert_no_leftovers();
}

#[test]
fn test_snapshot_missing_subdir_is_rejected() {
    let fx = Fixture::new();
    let zip_path = fx.root.path().join("main.zip");
    build_zip(&zip_path, &[("PiconUpdater-main/version", b"2.0")], &[]);

    let source = UpdateSource::Snapshot {
        url: format!("file://{}", zip_path.display()),
        subdir: Some("plugin".into()),
    };
    let err = updater::self_update(&fx.settings, &source).unwrap_err();
    assert!(matches!(err, InstallError::ArchiveFormat(_)));
    fx.assert_untouched();
}

#[test]
fn test_snapshot_with_empty_file_is_rejected() {
    let fx = Fixture::new();
    let zip_path = fx.root.path().join("main.zip");
    build_zip(
        &zip_path,
        &[
            ("PiconUpdater-main/plugin/picons.json", NEW_CATALOGUE.as_bytes()),
            ("PiconUpdater-main/plugin/version", b"2.0\n"),
            ("PiconUpdater-main/plugin/skin.xml", b""),
        ],
        &[],
    );

    let source = UpdateSource::Snapshot {
        url: format!("file://{}", zip_path.display()),
        subdir: Some("plugin".into()),
    };
    let err = updater::self_update(&fx.settings, &source).unwrap_err();
    match err {
        InstallError::Integrity(msg) => assert!(msg.contains("skin.xml")),
        other => panic!("unexpected error: {other:?}"),
    }
    fx.assert_untouched();
}

#[test]
fn test_extract_zip_drops_links() {
    let root = tempdir().unwrap();
    let zip_path = root.path().join("s.zip");
    build_zip(
        &zip_path,
        &[("a/version", b"1")],
        &[("a/passwd", "/etc/passwd")],
    );

    let dest = root.path().join("out");
    fs::create_dir_all(&dest).unwrap();
    let written = updater::extract_zip(&zip_path, &dest).unwrap();
    assert_eq!(written, 1);
    assert!(dest.join("a/version").is_file());
    assert!(fs::symlink_metadata(dest.join("a/passwd")).is_err());
}

#[test]
fn test_corrupt_zip_is_archive_error() {
    let root = tempdir().unwrap();
    let zip_path = root.path().join("s.zip");
    fs::write(&zip_path, b"not a zip").unwrap();
    let err = updater::extract_zip(&zip_path, root.path()).unwrap_err();
    assert!(matches!(err, InstallError::ArchiveFormat(_)));
}
