//! Blocking HTTP(S) and `file://` fetches.
//!
//! Every download here is a whole-file transfer with a single timeout; there
//! are no retries. Callers run these on the task executor thread, never on
//! the render path.

use crate::error::{InstallError, IoContext, Result};
use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("picon-updater/", env!("CARGO_PKG_VERSION"));

fn client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| InstallError::network(format!("failed to create HTTP client: {}", e)))
}

/// Local path for a `file://` URI, if it is one
pub fn local_path(uri: &str) -> Option<PathBuf> {
    uri.strip_prefix("file://").map(PathBuf::from)
}

/// Last path segment of a URL, without query or fragment
pub fn file_name_from_url(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let name = without_query.rsplit('/').next()?.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Fetch a small text resource
pub fn fetch_text(url: &str, timeout: Duration) -> Result<String> {
    if let Some(path) = local_path(url) {
        return fs::read_to_string(&path).at_path(path);
    }

    debug!("GET {}", url);
    let response = client(timeout)?.get(url).send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(InstallError::network(format!("{} returned {}", url, status)));
    }
    Ok(response.text()?)
}

/// Download `url` into `dest`, replacing any existing file.
///
/// A partially written file is removed when the transfer fails.
pub fn download_to_file(url: &str, dest: &Path, timeout: Duration) -> Result<u64> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).at_path(parent)?;
    }

    let result = if let Some(src) = local_path(url) {
        if !src.is_file() {
            return Err(InstallError::network(format!(
                "local file {} does not exist",
                src.display()
            )));
        }
        fs::copy(&src, dest).at_path(dest)
    } else {
        stream_http(url, dest, timeout)
    };

    match result {
        Ok(bytes) => {
            info!("Downloaded {} ({} bytes) to {}", url, bytes, dest.display());
            Ok(bytes)
        }
        Err(e) => {
            let _ = fs::remove_file(dest);
            Err(e)
        }
    }
}

fn stream_http(url: &str, dest: &Path, timeout: Duration) -> Result<u64> {
    debug!("GET {} -> {}", url, dest.display());
    let mut response = client(timeout)?.get(url).send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(InstallError::network(format!("{} returned {}", url, status)));
    }

    let mut file = File::create(dest).at_path(dest)?;
    let bytes = io::copy(&mut response, &mut file)
        .map_err(|e| InstallError::network(format!("transfer of {} failed: {}", url, e)))?;
    file.flush().at_path(dest)?;
    Ok(bytes)
}
