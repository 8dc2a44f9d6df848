//! Picon Updater Library
//!
//! Catalogue browsing, picon-pack installation and self-update for enigma2
//! set-top boxes, with a terminal front end.

pub mod app;
pub mod catalogue;
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod input;
pub mod installer;
pub mod package_manager;
pub mod picon_dir;
pub mod preview;
pub mod process_guard;
pub mod task_executor;
pub mod theme;
pub mod ui;
pub mod updater;

// Re-export main types for convenience
pub use app::{Dialog, Effect, InputEvent, Transition, ViewState};
pub use catalogue::{Catalogue, CatalogueEntry, Satellites};
pub use config::Settings;
pub use error::{InstallError, Result};
pub use installer::{install_archive, ArchiveKind, InstallOptions, InstallReport, Installer};
pub use package_manager::{package_name_from_ipk, Opkg, PackageManager};
pub use preview::Preview;
pub use process_guard::{ChildRegistry, CommandProcessGroup};
pub use task_executor::{Task, TaskOutcome, TaskRequest, TaskResponse};
pub use updater::{UpdateOutcome, UpdateSource, UpdateStatus};
