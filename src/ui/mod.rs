//! User interface rendering module
//!
//! - `header` - Title bar, footer and colour-button bar
//! - `browser` - Category label, pack list, preview and description panels
//! - `dialogs` - Notification and yes/no dialogs drawn over the browser

mod browser;
mod dialogs;
mod header;

use crate::app::ViewState;
use crate::catalogue::Catalogue;
use crate::input::{KeyContext, KeyMap};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    Frame,
};

pub use header::footer_text;

/// UI renderer for the browser screen
pub struct UiRenderer {
    footer_base: String,
}

impl Default for UiRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl UiRenderer {
    pub fn new() -> Self {
        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        Self {
            footer_base: format!("Picon Updater | 📅 {}", today),
        }
    }

    pub fn render(&self, f: &mut Frame, state: &ViewState, catalogue: &Catalogue, keymap: &KeyMap) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Title
                Constraint::Min(8),    // Browser
                Constraint::Length(1), // Status
                Constraint::Length(1), // Footer
                Constraint::Length(1), // Colour buttons
                Constraint::Length(1), // Key hints
            ])
            .split(f.area());

        header::render_title(f, chunks[0], &state.current_version);
        browser::render_browser(f, chunks[1], state, catalogue);
        header::render_status(f, chunks[2], &state.status);
        header::render_footer(f, chunks[3], &self.footer_base, state);
        header::render_buttons(f, chunks[4], state, catalogue);
        header::render_hints(f, chunks[5], keymap, KeyContext::for_state(state));

        if let Some(dialog) = &state.dialog {
            dialogs::render_dialog(f, dialog);
        }
    }
}
