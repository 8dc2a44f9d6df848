//! Settings file handling.
//!
//! All paths, URLs and timeouts live here so the installer, updater and
//! browser never hardcode box-specific locations. Every field has a default
//! matching a stock enigma2 image, so a missing settings file is not an error.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the settings file looked up inside `data_dir`
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Runtime settings that can be saved/loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Local layout
    pub data_dir: PathBuf, // Holds catalogue, version marker, settings
    pub catalogue_file: String,
    pub version_file: String,
    pub picon_link: PathBuf, // Followed when it points at a directory
    pub default_picon_dir: PathBuf,
    pub previews_dir: PathBuf, // Bundled preview images, protected during installs
    pub temp_dir: PathBuf,
    pub log_file: PathBuf,

    // Remote layout
    pub raw_base_url: String,
    pub update_files: Vec<String>,
    pub snapshot_url: Option<String>,
    pub snapshot_subdir: Option<String>,
    pub checksum_manifest: Option<String>,

    // Host integration
    pub package_manager: String,
    pub host_process: String,
    pub restart_host: bool,
    pub restart_delay_ms: u64,

    // Timeouts (seconds)
    pub version_timeout_secs: u64,
    pub preview_timeout_secs: u64,
    pub update_timeout_secs: u64,
    pub archive_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/usr/lib/enigma2/python/Plugins/Extensions/PiconUpdater"),
            catalogue_file: "picons.json".to_string(),
            version_file: "version".to_string(),
            picon_link: PathBuf::from("/picon"),
            default_picon_dir: PathBuf::from("/usr/share/enigma2/picon"),
            previews_dir: PathBuf::from(
                "/usr/lib/enigma2/python/Plugins/Extensions/PiconUpdater/previews",
            ),
            temp_dir: PathBuf::from("/tmp"),
            log_file: PathBuf::from("/tmp/picon-updater.log"),
            raw_base_url: "https://raw.githubusercontent.com/OliOli2013/PiconUpdater/main/"
                .to_string(),
            update_files: vec!["picons.json".to_string(), "version".to_string()],
            snapshot_url: None,
            snapshot_subdir: None,
            checksum_manifest: None,
            package_manager: "opkg".to_string(),
            host_process: "enigma2".to_string(),
            restart_host: true,
            restart_delay_ms: 3000,
            version_timeout_secs: 3,
            preview_timeout_secs: 5,
            update_timeout_secs: 10,
            archive_timeout_secs: 300,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings from {:?}", path.as_ref()))?;

        let settings: Self =
            serde_json::from_str(&content).context("Failed to parse settings JSON")?;

        Ok(settings)
    }

    /// Save settings to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize settings to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write settings to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Resolve settings for this run.
    ///
    /// An explicit path must exist. Without one, `<data_dir>/settings.json`
    /// is used when present, otherwise defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        let settings = match explicit {
            Some(path) => Self::load_from_file(path)?,
            None => {
                let candidate = Self::default().data_dir.join(SETTINGS_FILE_NAME);
                if candidate.is_file() {
                    Self::load_from_file(&candidate)?
                } else {
                    Self::default()
                }
            }
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if self.catalogue_file.trim().is_empty() {
            anyhow::bail!("catalogue_file must be specified");
        }
        if self.version_file.trim().is_empty() {
            anyhow::bail!("version_file must be specified");
        }
        if self.package_manager.trim().is_empty() {
            anyhow::bail!("package_manager must be specified");
        }
        if self.host_process.trim().is_empty() || self.host_process.contains('/') {
            anyhow::bail!("host_process must be a bare process name");
        }

        let url = self.raw_base_url.trim();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            anyhow::bail!("raw_base_url must start with http:// or https://");
        }
        if !url.ends_with('/') {
            anyhow::bail!("raw_base_url must end with '/'");
        }

        for name in &self.update_files {
            if name.is_empty() || name.contains("..") || name.starts_with('/') {
                anyhow::bail!("update_files entry {:?} is not a plain relative name", name);
            }
        }

        if let Some(snapshot) = &self.snapshot_url {
            if !snapshot.starts_with("http://") && !snapshot.starts_with("https://") {
                anyhow::bail!("snapshot_url must start with http:// or https://");
            }
        }

        if self.version_timeout_secs == 0
            || self.preview_timeout_secs == 0
            || self.update_timeout_secs == 0
            || self.archive_timeout_secs == 0
        {
            anyhow::bail!("timeouts must be greater than zero");
        }

        Ok(())
    }

    pub fn catalogue_path(&self) -> PathBuf {
        self.data_dir.join(&self.catalogue_file)
    }

    pub fn version_path(&self) -> PathBuf {
        self.data_dir.join(&self.version_file)
    }

    pub fn version_url(&self) -> String {
        format!("{}{}", self.raw_base_url, self.version_file)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    pub fn version_timeout(&self) -> Duration {
        Duration::from_secs(self.version_timeout_secs)
    }

    pub fn preview_timeout(&self) -> Duration {
        Duration::from_secs(self.preview_timeout_secs)
    }

    pub fn update_timeout(&self) -> Duration {
        Duration::from_secs(self.update_timeout_secs)
    }

    pub fn archive_timeout(&self) -> Duration {
        Duration::from_secs(self.archive_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_validate() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);
        fs::write(&path, r#"{ "host_process": "neutrino", "restart_host": false }"#).unwrap();

        let settings = Settings::load_from_file(&path).unwrap();
        assert_eq!(settings.host_process, "neutrino");
        assert!(!settings.restart_host);
        assert_eq!(settings.package_manager, "opkg");
        assert_eq!(settings.default_picon_dir, PathBuf::from("/usr/share/enigma2/picon"));
    }

    #[test]
    fn test_save_then_load_is_identical() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);
        let mut settings = Settings::default();
        settings.snapshot_url = Some("https://example.org/main.zip".into());
        settings.save_to_file(&path).unwrap();

        assert_eq!(Settings::load_from_file(&path).unwrap(), settings);
    }

    #[test]
    fn test_rejects_base_url_without_trailing_slash() {
        let settings = Settings {
            raw_base_url: "https://example.org/repo".into(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_rejects_escaping_update_file() {
        let settings = Settings {
            update_files: vec!["../../etc/passwd".into()],
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_rejects_host_process_path() {
        let settings = Settings {
            host_process: "/usr/bin/enigma2".into(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_version_url_joins_base() {
        let settings = Settings::default();
        assert_eq!(
            settings.version_url(),
            "https://raw.githubusercontent.com/OliOli2013/PiconUpdater/main/version"
        );
    }
}
