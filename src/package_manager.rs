//! Package-manager integration for `.ipk` picon packs
//!
//! Packs shipped as packages are installed through the box's own package
//! manager rather than unpacked by hand. The previous version of the package
//! is removed first (ignoring "not installed"), then the new file is
//! installed with `--force-overwrite` so files owned by other picon packages
//! can be replaced.

use crate::error::{InstallError, Result};
use crate::process_guard::run_tracked;
use regex::Regex;
use std::path::Path;
use std::process::{Command, Output};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

static VERSION_SUFFIX: OnceLock<Regex> = OnceLock::new();

fn version_suffix() -> &'static Regex {
    VERSION_SUFFIX.get_or_init(|| {
        Regex::new(r"([_-][0-9._-]+_all$|_all$)").expect("static pattern is valid")
    })
}

/// Derive the package name from an `.ipk` file name.
///
/// `foo-bar_1.2.3_all.ipk` gives `foo-bar`, `plugin_all.ipk` gives `plugin`,
/// anything without a recognised suffix is returned minus `.ipk`.
pub fn package_name_from_ipk(file_name: &str) -> String {
    let base = file_name
        .rsplit_once(".ipk")
        .map(|(stem, _)| stem)
        .unwrap_or(file_name);
    match version_suffix().find(base) {
        Some(m) => base[..m.start()].to_string(),
        None => base.to_string(),
    }
}

/// Operations the installer needs from a package manager
pub trait PackageManager {
    /// Remove `name`, tolerating dependents
    fn remove(&self, name: &str) -> Result<()>;

    /// Install the package file at `path`, overwriting foreign files
    fn install(&self, path: &Path) -> Result<()>;
}

/// `opkg`-compatible command-line package manager
#[derive(Debug, Clone)]
pub struct Opkg {
    program: String,
}

impl Opkg {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: &[&str], subject: &str) -> Result<Output> {
        debug!("Running {} {:?}", self.program, args);
        run_tracked(Command::new(&self.program).args(args)).map_err(|e| {
            InstallError::PackageManager {
                name: subject.to_string(),
                output: format!("failed to run {}: {}", self.program, e),
            }
        })
    }
}

impl Default for Opkg {
    fn default() -> Self {
        Self::new("opkg")
    }
}

impl PackageManager for Opkg {
    fn remove(&self, name: &str) -> Result<()> {
        let output = self.run(&["remove", "--force-depends", name], name)?;
        if !output.status.success() {
            return Err(InstallError::PackageManager {
                name: name.to_string(),
                output: captured_text(&output),
            });
        }
        Ok(())
    }

    fn install(&self, path: &Path) -> Result<()> {
        let path_str = path.to_string_lossy();
        let output = self.run(&["install", "--force-overwrite", &path_str], &path_str)?;
        if !output.status.success() {
            return Err(InstallError::PackageManager {
                name: path_str.into_owned(),
                output: captured_text(&output),
            });
        }
        Ok(())
    }
}

/// Prefer stderr, fall back to stdout, then the exit code
fn captured_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !stderr.is_empty() {
        return stderr;
    }
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !stdout.is_empty() {
        return stdout;
    }
    format!("exit code {:?}", output.status.code())
}

/// Replace any installed copy of the package with the file at `package_path`.
///
/// Removal failure is only logged. The package file is deleted afterwards
/// whether or not the install succeeded.
pub fn install_package(pm: &dyn PackageManager, package_path: &Path) -> Result<String> {
    let file_name = package_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = package_name_from_ipk(&file_name);

    let result = (|| {
        if let Err(e) = pm.remove(&name) {
            debug!("Removal of {} skipped: {}", name, e);
        }
        pm.install(package_path)?;
        info!("Installed package {} from {}", name, package_path.display());
        Ok(name.clone())
    })();

    if package_path.exists() {
        if let Err(e) = std::fs::remove_file(package_path) {
            warn!("Could not delete {}: {}", package_path.display(), e);
        }
    }

    result
}
