//! task_executor.rs - Runs blocking work on a dedicated background thread.
//!
//! Downloads, installs, version checks and host restarts all block for
//! seconds at a time. The UI thread sends a `TaskRequest` and keeps drawing;
//! the worker answers with a `TaskResponse` carrying the same id. Requests
//! are handled strictly in order, one at a time.

use crate::catalogue::CatalogueEntry;
use crate::config::Settings;
use crate::installer::{InstallReport, Installer};
use crate::package_manager::{Opkg, PackageManager};
use crate::preview::{self, Preview};
use crate::process_guard;
use crate::updater::{self, UpdateOutcome, UpdateSource, UpdateStatus};
use std::sync::mpsc::{Receiver, Sender};
use std::thread::JoinHandle;
use tracing::{debug, error};

/// Unique identifier for each task request/response pair.
pub type TaskId = u64;

/// Blocking operations the worker knows how to run
#[derive(Debug, Clone)]
pub enum Task {
    /// Fetch a preview image into the scratch file
    LoadPreview(String),
    /// Download and install the entry's archive
    Install(CatalogueEntry),
    /// Poll the remote version file
    CheckUpdate,
    /// Stage and swap in new application files
    SelfUpdate { snapshot: bool },
    /// Wait the configured delay, then kill the host GUI
    RestartHost,
}

/// A request to run a task.
#[derive(Debug)]
pub struct TaskRequest {
    pub id: TaskId,
    pub task: Task,
}

/// Successful result of a task
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Preview(Preview),
    Installed(InstallReport),
    UpdateChecked(UpdateStatus),
    SelfUpdated(UpdateOutcome),
    HostRestarted(usize),
}

/// The response to a `TaskRequest`; errors are already rendered for display.
#[derive(Debug)]
pub struct TaskResponse {
    pub id: TaskId,
    pub task: Task,
    pub outcome: Result<TaskOutcome, String>,
}

/// Run one task to completion on the calling thread
pub fn run_task(
    settings: &Settings,
    package_manager: &dyn PackageManager,
    task: &Task,
) -> crate::error::Result<TaskOutcome> {
    match task {
        Task::LoadPreview(uri) => {
            preview::load_preview(uri, &settings.temp_dir, settings.preview_timeout())
                .map(TaskOutcome::Preview)
        }
        Task::Install(entry) => Installer::new(settings, package_manager)
            .install_entry(entry)
            .map(TaskOutcome::Installed),
        Task::CheckUpdate => updater::check_for_update(settings).map(TaskOutcome::UpdateChecked),
        Task::SelfUpdate { snapshot } => {
            let source = UpdateSource::from_settings(settings, *snapshot);
            updater::self_update(settings, &source).map(TaskOutcome::SelfUpdated)
        }
        Task::RestartHost => Ok(TaskOutcome::HostRestarted(process_guard::restart_host(
            &settings.host_process,
            settings.restart_delay(),
        ))),
    }
}

/// Spawns the worker thread.
///
/// The thread exits when the request sender is dropped or the response
/// receiver goes away.
pub fn spawn_executor_thread(
    settings: Settings,
    request_rx: Receiver<TaskRequest>,
    response_tx: Sender<TaskResponse>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        debug!("Task executor thread started.");
        let package_manager = Opkg::new(settings.package_manager.clone());

        while let Ok(request) = request_rx.recv() {
            debug!("Running task {}: {:?}", request.id, request.task);
            let outcome = run_task(&settings, &package_manager, &request.task).map_err(|e| {
                error!("Task {} failed: {}", request.id, e);
                e.to_string()
            });

            let response = TaskResponse {
                id: request.id,
                task: request.task,
                outcome,
            };
            if response_tx.send(response).is_err() {
                debug!("Response channel closed, stopping task executor.");
                break;
            }
        }
        debug!("Task executor thread finished.");
    })
}
