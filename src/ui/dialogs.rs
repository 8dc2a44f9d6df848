//! Dialog rendering
//!
//! Dialogs are drawn centred over the browser, which stays visible behind.

use crate::app::Dialog;
use crate::theme::Styles;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

/// Centred rectangle taking the given percentages of `area`
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

pub fn render_dialog(f: &mut Frame, dialog: &Dialog) {
    let area = centered_rect(60, 30, f.area());

    let (title, border) = match dialog {
        Dialog::Info(_) => (" Information ", Styles::success()),
        Dialog::Error(_) => (" Error ", Styles::error()),
        Dialog::ConfirmReinstall(_) => (" Question ", Styles::category()),
    };
    let hint = if dialog.is_question() {
        "[y] Yes   [n] No"
    } else {
        "[OK] Close"
    };

    let widget = Paragraph::new(format!("{}\n\n{}", dialog.message(), hint))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border)
                .title(title),
        )
        .style(Styles::dialog_bg())
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    f.render_widget(Clear, area);
    f.render_widget(widget, area);
}
