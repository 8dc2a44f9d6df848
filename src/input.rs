//! Keyboard mapping
//!
//! Translates crossterm key presses into `InputEvent`s. The four colour
//! buttons of a remote control map to F1..F4 and to mnemonic letters.

use crate::app::{InputEvent, ViewState};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Which set of bindings is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyContext {
    Browse,
    Notification,
    Question,
}

impl KeyContext {
    pub fn for_state(state: &ViewState) -> Self {
        match &state.dialog {
            None => Self::Browse,
            Some(dialog) if dialog.is_question() => Self::Question,
            Some(_) => Self::Notification,
        }
    }
}

/// A keybinding definition
#[derive(Debug, Clone)]
pub struct Keybinding {
    pub key: KeyCode,
    pub event: InputEvent,
    pub display: &'static str,
    pub description: &'static str,
}

impl Keybinding {
    fn new(key: KeyCode, event: InputEvent, display: &'static str, description: &'static str) -> Self {
        Self {
            key,
            event,
            display,
            description,
        }
    }
}

/// Context-aware key map
pub struct KeyMap {
    browse: Vec<Keybinding>,
    notification: Vec<Keybinding>,
    question: Vec<Keybinding>,
}

impl Default for KeyMap {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyMap {
    pub fn new() -> Self {
        use InputEvent as E;
        use KeyCode as K;

        let browse = vec![
            Keybinding::new(K::Up, E::Up, "↑", "Up"),
            Keybinding::new(K::Char('k'), E::Up, "k", "Up"),
            Keybinding::new(K::Down, E::Down, "↓", "Down"),
            Keybinding::new(K::Char('j'), E::Down, "j", "Down"),
            Keybinding::new(K::Left, E::PageUp, "←", "Page up"),
            Keybinding::new(K::PageUp, E::PageUp, "PgUp", "Page up"),
            Keybinding::new(K::Right, E::PageDown, "→", "Page down"),
            Keybinding::new(K::PageDown, E::PageDown, "PgDn", "Page down"),
            Keybinding::new(K::Enter, E::Confirm, "OK", "Install"),
            Keybinding::new(K::F(1), E::Exit, "F1", "Exit"),
            Keybinding::new(K::Char('r'), E::Exit, "r", "Exit"),
            Keybinding::new(K::Char('q'), E::Exit, "q", "Exit"),
            Keybinding::new(K::Esc, E::Exit, "Esc", "Exit"),
            Keybinding::new(K::F(2), E::UpdatePlugin, "F2", "Update"),
            Keybinding::new(K::Char('g'), E::UpdatePlugin, "g", "Update"),
            Keybinding::new(K::F(3), E::Language, "F3", "Language"),
            Keybinding::new(K::Char('y'), E::Language, "y", "Language"),
            Keybinding::new(K::F(4), E::NextCategory, "F4", "Next category"),
            Keybinding::new(K::Char('b'), E::NextCategory, "b", "Next category"),
            Keybinding::new(K::Tab, E::NextCategory, "Tab", "Next category"),
        ];

        let notification = vec![
            Keybinding::new(K::Enter, E::Dismiss, "OK", "Close"),
            Keybinding::new(K::Esc, E::Dismiss, "Esc", "Close"),
            Keybinding::new(K::Char(' '), E::Dismiss, "Space", "Close"),
        ];

        let question = vec![
            Keybinding::new(K::Char('y'), E::DialogYes, "y", "Yes"),
            Keybinding::new(K::Enter, E::DialogYes, "OK", "Yes"),
            Keybinding::new(K::Char('n'), E::DialogNo, "n", "No"),
            Keybinding::new(K::Esc, E::DialogNo, "Esc", "No"),
        ];

        Self {
            browse,
            notification,
            question,
        }
    }

    fn bindings(&self, context: KeyContext) -> &[Keybinding] {
        match context {
            KeyContext::Browse => &self.browse,
            KeyContext::Notification => &self.notification,
            KeyContext::Question => &self.question,
        }
    }

    /// Event for a key press, if it is bound in `context`
    pub fn map(&self, context: KeyContext, key: KeyEvent) -> Option<InputEvent> {
        if key.kind == KeyEventKind::Release {
            return None;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(InputEvent::Exit);
        }

        let code = match key.code {
            KeyCode::Char(c) => KeyCode::Char(c.to_ascii_lowercase()),
            other => other,
        };
        self.bindings(context)
            .iter()
            .find(|b| b.key == code)
            .map(|b| b.event.clone())
    }

    /// One hint per distinct description, first binding wins
    pub fn hints(&self, context: KeyContext) -> Vec<(&'static str, &'static str)> {
        let mut hints: Vec<(&'static str, &'static str)> = Vec::new();
        for binding in self.bindings(context) {
            if !hints.iter().any(|(_, d)| *d == binding.description) {
                hints.push((binding.display, binding.description));
            }
        }
        hints
    }
}
