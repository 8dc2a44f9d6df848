//! Title bar, footer, status line and the colour-button bar

use crate::app::ViewState;
use crate::catalogue::Catalogue;
use crate::input::{KeyContext, KeyMap};
use crate::theme::{ColourButton, Styles};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Render the title box; the version follows self-updates
pub fn render_title(f: &mut Frame, area: Rect, current_version: &str) {
    let widget = Paragraph::new(format!("Picon Updater v{}", current_version))
        .block(Block::default().borders(Borders::ALL).border_style(Styles::border()))
        .alignment(Alignment::Center)
        .style(Styles::title());
    f.render_widget(widget, area);
}

pub fn render_status(f: &mut Frame, area: Rect, status: &str) {
    f.render_widget(Paragraph::new(status.to_string()).style(Styles::status()), area);
}

/// Footer with an update notice appended when a newer version is known
pub fn footer_text(base: &str, state: &ViewState) -> String {
    match (&state.remote_version, state.update_available) {
        (Some(remote), true) => format!("{} | ⚠ UPDATE: {}", base, remote),
        _ => base.to_string(),
    }
}

pub fn render_footer(f: &mut Frame, area: Rect, base: &str, state: &ViewState) {
    let style = if state.update_available {
        Styles::update_notice()
    } else {
        Styles::text_muted()
    };
    let widget = Paragraph::new(footer_text(base, state))
        .style(style)
        .alignment(Alignment::Center);
    f.render_widget(widget, area);
}

/// Red / green / yellow / blue buttons
pub fn render_buttons(f: &mut Frame, area: Rect, state: &ViewState, catalogue: &Catalogue) {
    let cells = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 4); 4])
        .split(area);

    let blue = catalogue.next_category_label(state.category_idx);
    let buttons = [
        (ColourButton::Red, "Exit".to_string()),
        (ColourButton::Green, state.green_label().to_string()),
        (ColourButton::Yellow, "Language".to_string()),
        (ColourButton::Blue, blue),
    ];

    for (cell, (button, label)) in cells.iter().zip(buttons) {
        if label.is_empty() {
            continue;
        }
        let widget = Paragraph::new(label)
            .style(Styles::button(button))
            .alignment(Alignment::Center);
        f.render_widget(widget, *cell);
    }
}

pub fn render_hints(f: &mut Frame, area: Rect, keymap: &KeyMap, context: KeyContext) {
    let mut spans = Vec::new();
    for (key, description) in keymap.hints(context) {
        spans.push(Span::styled(format!(" {} ", key), Styles::category()));
        spans.push(Span::styled(format!("{}  ", description), Styles::text_muted()));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}
