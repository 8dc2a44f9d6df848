//! Pack list, preview and description panels

use crate::app::ViewState;
use crate::catalogue::Catalogue;
use crate::preview::Preview;
use crate::theme::Styles;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::Line,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

pub fn render_browser(f: &mut Frame, area: Rect, state: &ViewState, catalogue: &Catalogue) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(area);

    render_list(f, columns[0], state, catalogue);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(columns[1]);
    render_preview(f, right[0], state);
    render_description(f, right[1], state, catalogue);
}

fn render_list(f: &mut Frame, area: Rect, state: &ViewState, catalogue: &Catalogue) {
    let items: Vec<ListItem> = catalogue
        .entries(state.category_idx)
        .iter()
        .map(|entry| ListItem::new(entry.name.clone()))
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Styles::border())
        .title(Line::styled(
            format!(" {} ", state.category_label(catalogue)),
            Styles::category(),
        ));

    let mut list_state = ListState::default();
    if !items.is_empty() {
        list_state.select(Some(state.selected));
    }

    let list = List::new(items)
        .block(block)
        .style(Styles::text())
        .highlight_style(Styles::selected())
        .highlight_symbol("> ");
    f.render_stateful_widget(list, area, &mut list_state);
}

fn render_preview(f: &mut Frame, area: Rect, state: &ViewState) {
    let text = match &state.preview {
        Some(Preview::Ready { path, bytes }) => {
            format!("{}\n{} bytes", path.display(), bytes)
        }
        Some(Preview::Missing) => "No preview".to_string(),
        None => String::new(),
    };
    let widget = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Styles::border())
                .title(" Preview "),
        )
        .style(Styles::panel_bg())
        .wrap(Wrap { trim: true });
    f.render_widget(widget, area);
}

fn render_description(f: &mut Frame, area: Rect, state: &ViewState, catalogue: &Catalogue) {
    let widget = Paragraph::new(state.description(catalogue))
        .block(Block::default().borders(Borders::ALL).border_style(Styles::border()))
        .style(Styles::text())
        .wrap(Wrap { trim: false });
    f.render_widget(widget, area);
}
