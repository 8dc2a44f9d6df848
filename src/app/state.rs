//! Browser view state
//!
//! `ViewState` is a plain value. `ViewState::next` takes the current state,
//! the catalogue and one `InputEvent`, and returns the following state plus
//! the side effects the event loop has to carry out. Nothing in here touches
//! the network, the disk or the terminal.

use crate::catalogue::{Catalogue, CatalogueEntry};
use crate::installer::InstallReport;
use crate::preview::Preview;
use crate::updater::{UpdateOutcome, UpdateStatus};

/// Rows skipped by PageUp/PageDown
pub const PAGE_SIZE: usize = 8;

/// Modal notification or question over the browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialog {
    Info(String),
    Error(String),
    /// Yes/no: reinstall the plugin even though it is current
    ConfirmReinstall(String),
}

impl Dialog {
    pub fn message(&self) -> &str {
        match self {
            Dialog::Info(msg) | Dialog::Error(msg) | Dialog::ConfirmReinstall(msg) => msg,
        }
    }

    pub fn is_question(&self) -> bool {
        matches!(self, Dialog::ConfirmReinstall(_))
    }
}

/// Everything that can move the browser from one state to the next
#[derive(Debug, Clone)]
pub enum InputEvent {
    Up,
    Down,
    PageUp,
    PageDown,
    /// Blue button
    NextCategory,
    /// OK: install the highlighted pack
    Confirm,
    /// Green button
    UpdatePlugin,
    /// Yellow button
    Language,
    /// Red button / cancel
    Exit,
    DialogYes,
    DialogNo,
    Dismiss,

    // Task completions
    PreviewLoaded(Preview),
    PreviewFailed(String),
    UpdateChecked(Result<UpdateStatus, String>),
    InstallFinished(Result<InstallReport, String>),
    SelfUpdateFinished(Result<UpdateOutcome, String>),
}

/// Work requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    LoadPreview(String),
    Install(CatalogueEntry),
    CheckUpdate,
    SelfUpdate,
    RestartHost,
    Quit,
}

/// Result of `ViewState::next`
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: ViewState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn stay(state: ViewState) -> Self {
        Self {
            state,
            effects: Vec::new(),
        }
    }
}

/// What the browser screen shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub category_idx: usize,
    pub selected: usize,
    pub dialog: Option<Dialog>,
    pub status: String,
    pub current_version: String,
    pub update_available: bool,
    pub remote_version: Option<String>,
    pub preview: Option<Preview>,
    pub busy: bool,
}

impl ViewState {
    pub fn new(current_version: impl Into<String>) -> Self {
        Self {
            category_idx: 0,
            selected: 0,
            dialog: None,
            status: String::new(),
            current_version: current_version.into(),
            update_available: false,
            remote_version: None,
            preview: None,
            busy: false,
        }
    }

    /// First state shown on screen, with the startup work it needs
    pub fn startup(catalogue: &Catalogue, current_version: impl Into<String>) -> Transition {
        let state = Self::new(current_version);
        let mut effects = Vec::new();
        if let Some(entry) = state.selected_entry(catalogue) {
            effects.push(Effect::LoadPreview(entry.preview.clone()));
        }
        effects.push(Effect::CheckUpdate);
        Transition { state, effects }
    }

    pub fn selected_entry<'c>(&self, catalogue: &'c Catalogue) -> Option<&'c CatalogueEntry> {
        catalogue.entry(self.category_idx, self.selected)
    }

    /// "Satellite (12)", or a placeholder when there is nothing to list
    pub fn category_label(&self, catalogue: &Catalogue) -> String {
        match catalogue.category_name(self.category_idx) {
            Some(name) => format!("{} ({})", name, catalogue.entries(self.category_idx).len()),
            None => "No data".to_string(),
        }
    }

    pub fn green_label(&self) -> &'static str {
        if self.update_available {
            "Update!"
        } else {
            "Update"
        }
    }

    /// Text for the description panel
    pub fn description(&self, catalogue: &Catalogue) -> String {
        match self.selected_entry(catalogue) {
            Some(entry) => format!("{}\n\n[OK] - Download selected picon pack", entry.description()),
            None => "List is empty".to_string(),
        }
    }

    pub fn next(&self, catalogue: &Catalogue, event: InputEvent) -> Transition {
        let mut state = self.clone();

        match event {
            InputEvent::PreviewLoaded(preview) => {
                state.status = match preview {
                    Preview::Missing => "No preview".to_string(),
                    Preview::Ready { .. } => String::new(),
                };
                state.preview = Some(preview);
                Transition::stay(state)
            }
            InputEvent::PreviewFailed(_) => {
                state.preview = None;
                state.status = "Preview error".to_string();
                Transition::stay(state)
            }
            InputEvent::UpdateChecked(Ok(status)) => {
                state.update_available = status.available;
                if status.available {
                    state.status = format!("New version available: {}", status.remote);
                    state.remote_version = Some(status.remote);
                } else {
                    state.status = "Plugin is up to date.".to_string();
                    state.remote_version = None;
                }
                Transition::stay(state)
            }
            InputEvent::UpdateChecked(Err(_)) => Transition::stay(state),
            InputEvent::InstallFinished(result) => {
                state.busy = false;
                match result {
                    Ok(_) => {
                        state.status = "Installed".to_string();
                        state.dialog = Some(Dialog::Info("Installed! Restarting GUI...".into()));
                        Transition {
                            state,
                            effects: vec![Effect::RestartHost],
                        }
                    }
                    Err(e) => {
                        state.status = "Install failed".to_string();
                        state.dialog = Some(Dialog::Error(format!("Install error: {}", e)));
                        Transition::stay(state)
                    }
                }
            }
            InputEvent::SelfUpdateFinished(result) => {
                state.busy = false;
                match result {
                    Ok(outcome) => {
                        state.current_version = outcome.version;
                        state.update_available = false;
                        state.remote_version = None;
                        state.status = "Plugin updated".to_string();
                        state.dialog = Some(Dialog::Info(
                            "Plugin updated successfully! The GUI will be restarted.".into(),
                        ));
                        Transition {
                            state,
                            effects: vec![Effect::RestartHost],
                        }
                    }
                    Err(e) => {
                        state.status = "Update error!".to_string();
                        state.dialog = Some(Dialog::Error(format!("Plugin update error: {}", e)));
                        Transition::stay(state)
                    }
                }
            }
            event if state.dialog.is_some() => state.dialog_input(event),
            event => state.browse_input(catalogue, event),
        }
    }

    fn dialog_input(mut self, event: InputEvent) -> Transition {
        let question = self.dialog.as_ref().is_some_and(Dialog::is_question);
        match event {
            InputEvent::DialogYes if question => {
                self.dialog = None;
                self.begin_self_update()
            }
            InputEvent::DialogYes
            | InputEvent::DialogNo
            | InputEvent::Dismiss
            | InputEvent::Exit
            | InputEvent::Confirm => {
                self.dialog = None;
                Transition::stay(self)
            }
            _ => Transition::stay(self),
        }
    }

    fn browse_input(mut self, catalogue: &Catalogue, event: InputEvent) -> Transition {
        let len = catalogue.entries(self.category_idx).len();

        match event {
            InputEvent::Up => {
                let target = self.selected.saturating_sub(1);
                self.move_selection(catalogue, target)
            }
            InputEvent::Down => {
                let target = (self.selected + 1).min(len.saturating_sub(1));
                self.move_selection(catalogue, target)
            }
            InputEvent::PageUp => {
                let target = self.selected.saturating_sub(PAGE_SIZE);
                self.move_selection(catalogue, target)
            }
            InputEvent::PageDown => {
                let target = (self.selected + PAGE_SIZE).min(len.saturating_sub(1));
                self.move_selection(catalogue, target)
            }
            InputEvent::NextCategory => {
                let count = catalogue.category_count();
                if count <= 1 {
                    return Transition::stay(self);
                }
                self.category_idx = (self.category_idx + 1) % count;
                self.selected = 0;
                self.selection_changed(catalogue)
            }
            InputEvent::Confirm => {
                if self.busy {
                    return Transition::stay(self);
                }
                let Some(entry) = self.selected_entry(catalogue).cloned() else {
                    return Transition::stay(self);
                };
                if entry.archive_url().is_none() {
                    self.dialog = Some(Dialog::Error("No URL!".into()));
                    return Transition::stay(self);
                }
                self.busy = true;
                self.status = "Downloading picons...".to_string();
                Transition {
                    state: self,
                    effects: vec![Effect::Install(entry)],
                }
            }
            InputEvent::UpdatePlugin => {
                if self.busy {
                    return Transition::stay(self);
                }
                if self.update_available {
                    return self.begin_self_update();
                }
                self.dialog = Some(Dialog::ConfirmReinstall(format!(
                    "Plugin is up to date (v{}). Force reinstall from GitHub?",
                    self.current_version
                )));
                Transition::stay(self)
            }
            InputEvent::Language => {
                self.dialog = Some(Dialog::Info("System language is used by default.".into()));
                Transition::stay(self)
            }
            // An install or update runs to completion once started
            InputEvent::Exit if self.busy => {
                self.status = "Please wait, operation in progress...".to_string();
                Transition::stay(self)
            }
            InputEvent::Exit => Transition {
                state: self,
                effects: vec![Effect::Quit],
            },
            _ => Transition::stay(self),
        }
    }

    fn move_selection(mut self, catalogue: &Catalogue, target: usize) -> Transition {
        if target == self.selected {
            return Transition::stay(self);
        }
        self.selected = target;
        self.selection_changed(catalogue)
    }

    fn selection_changed(mut self, catalogue: &Catalogue) -> Transition {
        self.preview = None;
        match self.selected_entry(catalogue) {
            Some(entry) => {
                let uri = entry.preview.clone();
                self.status = "Loading preview...".to_string();
                Transition {
                    state: self,
                    effects: vec![Effect::LoadPreview(uri)],
                }
            }
            None => {
                self.status.clear();
                Transition::stay(self)
            }
        }
    }

    fn begin_self_update(mut self) -> Transition {
        self.busy = true;
        self.status = "Downloading plugin update...".to_string();
        Transition {
            state: self,
            effects: vec![Effect::SelfUpdate],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, category: &str, url: Option<&str>) -> CatalogueEntry {
        CatalogueEntry {
            name: name.to_string(),
            category: category.to_string(),
            preview: format!("file:///previews/{}.png", name),
            url: url.map(str::to_string),
            satellites: None,
        }
    }

    #[test]
    fn test_startup_loads_preview_and_checks_version() {
        let catalogue = Catalogue::from_entries(vec![entry("Astra", "Satellite", None)]);
        let t = ViewState::startup(&catalogue, "1.2");
        assert_eq!(
            t.effects,
            vec![
                Effect::LoadPreview("file:///previews/Astra.png".into()),
                Effect::CheckUpdate
            ]
        );
    }

    #[test]
    fn test_dialog_swallows_navigation() {
        let catalogue = Catalogue::from_entries(vec![
            entry("A", "Satellite", None),
            entry("B", "Satellite", None),
        ]);
        let mut state = ViewState::new("1.2");
        state.dialog = Some(Dialog::Info("hi".into()));

        let t = state.next(&catalogue, InputEvent::Down);
        assert_eq!(t.state.selected, 0);
        assert!(t.effects.is_empty());

        let t = t.state.next(&catalogue, InputEvent::Dismiss);
        assert!(t.state.dialog.is_none());
    }

    #[test]
    fn test_yes_on_info_dialog_only_closes_it() {
        let catalogue = Catalogue::default();
        let mut state = ViewState::new("1.2");
        state.dialog = Some(Dialog::Error("No URL!".into()));
        let t = state.next(&catalogue, InputEvent::DialogYes);
        assert!(t.state.dialog.is_none());
        assert!(t.effects.is_empty());
    }

    #[test]
    fn test_description_for_empty_list() {
        let state = ViewState::new("1.2");
        assert_eq!(state.description(&Catalogue::degraded()), "List is empty");
        assert_eq!(state.category_label(&Catalogue::default()), "No data");
        assert_eq!(state.category_label(&Catalogue::degraded()), "Error (0)");
    }
}
