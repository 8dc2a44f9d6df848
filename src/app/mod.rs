//! Application module
//!
//! - `state` - `ViewState`, input events, effects and the pure transition
//! - Main module - `App`, which owns the terminal loop, carries out effects on
//!   the task executor and turns task responses back into input events

mod state;

pub use state::{Dialog, Effect, InputEvent, Transition, ViewState, PAGE_SIZE};

use crate::catalogue::Catalogue;
use crate::config::Settings;
use crate::input::{KeyContext, KeyMap};
use crate::task_executor::{
    spawn_executor_thread, Task, TaskId, TaskOutcome, TaskRequest, TaskResponse,
};
use crate::ui::UiRenderer;
use crossterm::event::Event;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info};

/// Convert a task response into the event the view state understands.
///
/// Preview responses are only delivered when they answer the most recent
/// preview request; older ones are stale and dropped.
pub fn event_for_response(response: TaskResponse, latest_preview: Option<TaskId>) -> Option<InputEvent> {
    match (response.task, response.outcome) {
        (Task::LoadPreview(_), outcome) => {
            if latest_preview != Some(response.id) {
                debug!("Dropping stale preview response {}", response.id);
                return None;
            }
            Some(match outcome {
                Ok(TaskOutcome::Preview(preview)) => InputEvent::PreviewLoaded(preview),
                Ok(other) => InputEvent::PreviewFailed(format!("unexpected outcome {:?}", other)),
                Err(e) => InputEvent::PreviewFailed(e),
            })
        }
        (Task::Install(_), Ok(TaskOutcome::Installed(report))) => {
            Some(InputEvent::InstallFinished(Ok(report)))
        }
        (Task::Install(_), Err(e)) => Some(InputEvent::InstallFinished(Err(e))),
        (Task::CheckUpdate, Ok(TaskOutcome::UpdateChecked(status))) => {
            Some(InputEvent::UpdateChecked(Ok(status)))
        }
        (Task::CheckUpdate, Err(e)) => Some(InputEvent::UpdateChecked(Err(e))),
        (Task::SelfUpdate { .. }, Ok(TaskOutcome::SelfUpdated(outcome))) => {
            Some(InputEvent::SelfUpdateFinished(Ok(outcome)))
        }
        (Task::SelfUpdate { .. }, Err(e)) => Some(InputEvent::SelfUpdateFinished(Err(e))),
        (Task::RestartHost, Ok(TaskOutcome::HostRestarted(killed))) => {
            info!("Host restart signalled {} processes", killed);
            None
        }
        (task, outcome) => {
            error!("Mismatched response for {:?}: {:?}", task, outcome);
            None
        }
    }
}

/// Main application struct
pub struct App {
    settings: Settings,
    catalogue: Catalogue,
    state: ViewState,
    keymap: KeyMap,
    ui_renderer: UiRenderer,
    allow_restart: bool,
    /// Requests to the task executor thread
    request_tx: Sender<TaskRequest>,
    /// Responses from the task executor thread (polled in main loop)
    response_rx: Receiver<TaskResponse>,
    next_id: TaskId,
    latest_preview: Option<TaskId>,
    worker: JoinHandle<()>,
}

impl App {
    pub fn new(settings: Settings, catalogue: Catalogue, current_version: String, allow_restart: bool) -> Self {
        let (request_tx, request_rx) = mpsc::channel();
        let (response_tx, response_rx) = mpsc::channel();
        let worker = spawn_executor_thread(settings.clone(), request_rx, response_tx);

        Self {
            settings,
            catalogue,
            state: ViewState::new(current_version),
            keymap: KeyMap::new(),
            ui_renderer: UiRenderer::new(),
            allow_restart,
            request_tx,
            response_rx,
            next_id: 0,
            latest_preview: None,
            worker,
        }
    }

    /// Close the request channel and wait for the worker to drain it.
    ///
    /// Requests already queued, such as a host restart, still run.
    pub fn shutdown(self) {
        let App {
            request_tx,
            response_rx,
            worker,
            ..
        } = self;
        drop(request_tx);
        if worker.join().is_err() {
            error!("Task executor thread panicked");
        }
        drop(response_rx);
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    fn submit(&mut self, task: Task) -> Option<TaskId> {
        self.next_id += 1;
        let id = self.next_id;
        match self.request_tx.send(TaskRequest { id, task }) {
            Ok(()) => Some(id),
            Err(e) => {
                error!("Task executor is gone, dropping {:?}", e.0.task);
                None
            }
        }
    }

    /// Carry out effects; returns true when the app should exit
    fn dispatch(&mut self, effects: Vec<Effect>) -> bool {
        let mut quit = false;
        for effect in effects {
            debug!("Dispatching {:?}", effect);
            match effect {
                Effect::LoadPreview(uri) => {
                    self.latest_preview = self.submit(Task::LoadPreview(uri));
                }
                Effect::Install(entry) => {
                    info!("Installing picon pack {}", entry.name);
                    self.submit(Task::Install(entry));
                }
                Effect::CheckUpdate => {
                    self.submit(Task::CheckUpdate);
                }
                Effect::SelfUpdate => {
                    let snapshot = self.settings.snapshot_url.is_some();
                    self.submit(Task::SelfUpdate { snapshot });
                }
                Effect::RestartHost => {
                    if self.allow_restart && self.settings.restart_host {
                        self.submit(Task::RestartHost);
                    } else {
                        info!("Host restart disabled, not restarting {}", self.settings.host_process);
                    }
                }
                Effect::Quit => quit = true,
            }
        }
        quit
    }

    fn apply(&mut self, event: InputEvent) -> bool {
        let transition = self.state.next(&self.catalogue, event);
        self.state = transition.state;
        self.dispatch(transition.effects)
    }

    fn poll_task_responses(&mut self) -> bool {
        let mut quit = false;
        while let Ok(response) = self.response_rx.try_recv() {
            if let Some(event) = event_for_response(response, self.latest_preview) {
                quit |= self.apply(event);
            }
        }
        quit
    }

    /// Run the main application loop
    pub fn run(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    ) -> std::io::Result<()> {
        info!("Starting browser loop");

        let startup = ViewState::startup(&self.catalogue, self.state.current_version.clone());
        self.state = startup.state;
        if self.dispatch(startup.effects) {
            return Ok(());
        }

        loop {
            if self.poll_task_responses() {
                break;
            }

            if crossterm::event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = crossterm::event::read()? {
                    let context = KeyContext::for_state(&self.state);
                    if let Some(event) = self.keymap.map(context, key) {
                        if self.apply(event) {
                            break;
                        }
                    }
                }
            }

            terminal.draw(|f| {
                self.ui_renderer
                    .render(f, &self.state, &self.catalogue, &self.keymap)
            })?;
        }

        info!("Browser loop finished");
        Ok(())
    }
}
