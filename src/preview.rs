//! Preview image fetching.
//!
//! The preview for the highlighted pack is copied (`file://`) or downloaded
//! into a single scratch file that is overwritten on every selection change.
//! Decoding is left to whoever displays it; the browser shows path and size.

use crate::download;
use crate::error::{IoContext, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// File name used for the scratch preview inside the temp dir
pub const PREVIEW_FILE: &str = "picon_preview.png";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preview {
    /// Image fetched to `path`
    Ready { path: PathBuf, bytes: u64 },
    /// Entry has no preview, or its local file is gone
    Missing,
}

/// Fetch the preview at `uri` into `<temp_dir>/picon_preview.png`
pub fn load_preview(uri: &str, temp_dir: &Path, timeout: Duration) -> Result<Preview> {
    let dest = temp_dir.join(PREVIEW_FILE);
    if dest.exists() {
        fs::remove_file(&dest).at_path(&dest)?;
    }

    let uri = uri.trim();
    if uri.is_empty() {
        return Ok(Preview::Missing);
    }
    if let Some(local) = download::local_path(uri) {
        if !local.is_file() {
            debug!("Local preview {} not found", local.display());
            return Ok(Preview::Missing);
        }
    }

    let bytes = download::download_to_file(uri, &dest, timeout)?;
    Ok(Preview::Ready { path: dest, bytes })
}
