//! Error handling module for the picon updater
//!
//! Every failure the browser can report to the user is one of these variants.
//! Task boundaries convert them into notification text; nothing below the UI
//! is allowed to panic on a bad archive, a dead network or a read-only disk.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for catalogue, download and install operations
#[derive(Error, Debug)]
pub enum InstallError {
    /// Catalogue file missing or malformed
    #[error("Catalogue error: {0}")]
    CatalogueLoad(String),

    /// Any HTTP(S) or local-URI fetch failure
    #[error("Download error: {0}")]
    Network(String),

    /// Archive unreadable, corrupt or empty
    #[error("Archive error: {0}")]
    ArchiveFormat(String),

    /// Downloaded file has an extension we cannot install
    #[error("Unknown archive format: {0}")]
    UnknownFormat(String),

    /// Permission or IO failure on a specific path
    #[error("Filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Package manager exited non-zero
    #[error("Package manager failed for {name}: {output}")]
    PackageManager { name: String, output: String },

    /// Staged update failed verification
    #[error("Integrity check failed: {0}")]
    Integrity(String),

    /// IO errors without a more specific path
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for picon updater operations
pub type Result<T> = std::result::Result<T, InstallError>;

impl InstallError {
    /// Create a catalogue error
    pub fn catalogue(msg: impl Into<String>) -> Self {
        Self::CatalogueLoad(msg.into())
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create an archive format error
    pub fn archive(msg: impl Into<String>) -> Self {
        Self::ArchiveFormat(msg.into())
    }

    /// Create a filesystem error bound to `path`
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Create an integrity error
    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }
}

impl From<reqwest::Error> for InstallError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<zip::result::ZipError> for InstallError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::ArchiveFormat(err.to_string())
    }
}

/// Extension for attaching a path to raw IO results
pub trait IoContext<T> {
    fn at_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn at_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| InstallError::filesystem(path, e))
    }
}
