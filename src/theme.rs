//! Colours and styles for the browser screen
//!
//! All colours are defined here rather than hardcoded in the renderer.
//!
//! ```rust
//! use piconupdater::theme::{Colors, Styles, ColourButton};
//! use ratatui::style::Style;
//!
//! let style = Style::default().fg(Colors::PRIMARY);
//! let green = Styles::button(ColourButton::Green);
//! ```

use ratatui::style::{Color, Modifier, Style};

// =============================================================================
// COLOR PALETTE
// =============================================================================

pub struct Colors;

impl Colors {
    /// Panel background
    pub const BG_PRIMARY: Color = Color::Rgb(20, 20, 30);

    /// Dialog background
    pub const BG_DIALOG: Color = Color::Rgb(30, 30, 40);

    pub const FG_PRIMARY: Color = Color::White;
    pub const FG_SECONDARY: Color = Color::Gray;
    pub const FG_MUTED: Color = Color::DarkGray;

    /// Borders, titles, highlights
    pub const PRIMARY: Color = Color::Cyan;

    /// Selected list row
    pub const SECONDARY: Color = Color::Yellow;

    pub const SUCCESS: Color = Color::Green;
    pub const WARNING: Color = Color::Yellow;
    pub const ERROR: Color = Color::Red;

    // Remote-control colour buttons
    pub const KEY_RED: Color = Color::Rgb(170, 20, 20);
    pub const KEY_GREEN: Color = Color::Rgb(20, 140, 40);
    pub const KEY_YELLOW: Color = Color::Rgb(190, 160, 0);
    pub const KEY_BLUE: Color = Color::Rgb(20, 60, 170);
}

/// The four colour keys along the bottom of the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColourButton {
    Red,
    Green,
    Yellow,
    Blue,
}

impl ColourButton {
    pub fn color(self) -> Color {
        match self {
            ColourButton::Red => Colors::KEY_RED,
            ColourButton::Green => Colors::KEY_GREEN,
            ColourButton::Yellow => Colors::KEY_YELLOW,
            ColourButton::Blue => Colors::KEY_BLUE,
        }
    }
}

// =============================================================================
// STYLES
// =============================================================================

pub struct Styles;

impl Styles {
    pub fn text() -> Style {
        Style::default().fg(Colors::FG_PRIMARY)
    }

    pub fn text_muted() -> Style {
        Style::default().fg(Colors::FG_MUTED)
    }

    pub fn title() -> Style {
        Style::default()
            .fg(Colors::PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    /// Category label above the list
    pub fn category() -> Style {
        Style::default()
            .fg(Colors::SECONDARY)
            .add_modifier(Modifier::BOLD)
    }

    pub fn border() -> Style {
        Style::default().fg(Colors::PRIMARY)
    }

    pub fn panel_bg() -> Style {
        Style::default().bg(Colors::BG_PRIMARY)
    }

    pub fn dialog_bg() -> Style {
        Style::default().bg(Colors::BG_DIALOG)
    }

    pub fn selected() -> Style {
        Style::default()
            .fg(Color::Black)
            .bg(Colors::SECONDARY)
            .add_modifier(Modifier::BOLD)
    }

    pub fn status() -> Style {
        Style::default().fg(Colors::FG_SECONDARY)
    }

    /// Footer notice when a newer version exists
    pub fn update_notice() -> Style {
        Style::default()
            .fg(Colors::WARNING)
            .add_modifier(Modifier::BOLD)
    }

    pub fn error() -> Style {
        Style::default().fg(Colors::ERROR).add_modifier(Modifier::BOLD)
    }

    pub fn success() -> Style {
        Style::default().fg(Colors::SUCCESS)
    }

    pub fn button(button: ColourButton) -> Style {
        Style::default()
            .fg(Colors::FG_PRIMARY)
            .bg(button.color())
            .add_modifier(Modifier::BOLD)
    }
}
