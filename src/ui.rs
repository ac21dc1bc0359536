use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Position, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};

use taskgrid::grid::{GridSnapshot, HeaderCell, PagerSummary, SortDirection};

use crate::app::AppConfig;
use crate::model::{Model, UIData};

#[derive(Debug)]
pub struct TableUI {
    state: TableState,
    popup_width: u16,
    popup_height: u16,
}

impl TableUI {
    pub fn new(_cfg: &AppConfig) -> Self {
        Self {
            state: TableState::default(),
            popup_width: 60,
            popup_height: 50,
        }
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let data = model.get_uidata();

        let [table_area, pager_area, cmd_area] = Layout::vertical([
            Constraint::Fill(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        self.draw_table(&data, frame, table_area);
        frame.render_widget(Self::pager_line(&data.snapshot.pager), pager_area);
        self.draw_cmd_line(&data, frame, cmd_area);

        if data.show_popup {
            self.draw_popup(data.popup_message, frame);
        }
    }

    fn draw_table(&mut self, data: &UIData, frame: &mut Frame, area: Rect) {
        let snapshot: &GridSnapshot = data.snapshot;

        let header = Row::new(snapshot.headers.iter().map(Self::header_cell))
            .style(Style::new().bold().fg(Color::LightCyan))
            .bottom_margin(1);

        let rows = snapshot.rows.iter().map(|row| {
            Row::new(
                row.cells
                    .iter()
                    .map(|c| Cell::from(c.text.as_str()).style(c.class.style())),
            )
        });

        let widths = snapshot
            .headers
            .iter()
            .map(|h| Constraint::Fill(h.width));

        let mut title = vec![
            Span::styled(format!(" {} ", data.name), Style::new().bold()),
            Span::styled(
                format!("[{}] ", snapshot.pager.total),
                Style::new().fg(Color::LightCyan),
            ),
        ];
        if !data.filters.is_empty() {
            let filters = data
                .filters
                .iter()
                .map(|f| f.to_string())
                .collect::<Vec<String>>()
                .join(" AND ");
            title.push(Span::styled(
                format!("where {filters} "),
                Style::new().fg(Color::Magenta),
            ));
        }

        let mut block = Block::bordered()
            .title(Line::from(title).centered())
            .border_set(border::THICK);
        if let Some(summary) = data.default_filters.summary() {
            block = block.title_bottom(
                Line::from(format!(" query: {summary} "))
                    .right_aligned()
                    .fg(Color::DarkGray),
            );
        }

        let table = Table::new(rows, widths)
            .header(header)
            .block(block)
            .row_highlight_style(Style::new().add_modifier(Modifier::REVERSED))
            .cell_highlight_style(Style::new().add_modifier(Modifier::BOLD | Modifier::UNDERLINED));

        if snapshot.rows.is_empty() {
            self.state.select(None);
        } else {
            self.state.select(Some(data.selected_row));
        }
        self.state.select_column(Some(data.selected_column));

        frame.render_stateful_widget(table, area, &mut self.state);
    }

    fn header_cell(header: &HeaderCell) -> Cell<'_> {
        let mut label = header.label.clone();
        match header.sort {
            Some(SortDirection::Asc) => label.push_str(" ▲"),
            Some(SortDirection::Desc) => label.push_str(" ▼"),
            None => (),
        }
        if header.filtered {
            label.push_str(" *");
        }
        Cell::from(label)
    }

    fn pager_line(pager: &PagerSummary) -> Paragraph<'static> {
        let mut spans = vec![
            Span::raw(format!(
                "{}-{} of {}",
                pager.first_row, pager.last_row, pager.total
            )),
            Span::raw("  |  "),
            Span::raw(format!("page {}/{}", pager.page, pager.page_count)),
            Span::raw("  |  "),
            Span::raw(format!("{} rows per page", pager.page_size)),
        ];
        if pager.is_loading {
            spans.push(Span::raw("  "));
            spans.push(Span::styled("Loading…", Style::new().fg(Color::Yellow).bold()));
        }
        Paragraph::new(Line::from(spans).right_aligned())
    }

    fn draw_cmd_line(&self, data: &UIData, frame: &mut Frame, area: Rect) {
        if data.active_cmdinput {
            let prompt = "filter> ";
            let line = Line::from(vec![
                Span::styled(prompt, Style::new().fg(Color::LightCyan)),
                Span::raw(data.cmdinput.input.as_str()),
            ]);
            frame.render_widget(Paragraph::new(line), area);
            frame.set_cursor_position(Position::new(
                area.x + (prompt.len() + data.cmdinput.cursor_pos) as u16,
                area.y,
            ));
        } else {
            let line = Line::from(vec![
                Span::styled(data.status_message, Style::new().italic()),
            ]);
            frame.render_widget(Paragraph::new(line), area);
        }
    }

    fn draw_popup(&self, message: &str, frame: &mut Frame) {
        let area = popup_area(frame.area(), self.popup_width, self.popup_height);
        let block = Block::bordered()
            .title(Line::from(" Esc to close ").centered())
            .border_set(border::ROUNDED);
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(message).wrap(Wrap { trim: false }).block(block),
            area,
        );
    }
}

/// Centered rect taking `percent_x` by `percent_y` of `area`.
fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::vertical([Constraint::Percentage(percent_y)]).flex(Flex::Center);
    let horizontal = Layout::horizontal([Constraint::Percentage(percent_x)]).flex(Flex::Center);
    let [area] = vertical.areas(area);
    let [area] = horizontal.areas(area);
    area
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn popup_is_centered() {
        let area = Rect::new(0, 0, 100, 40);
        let popup = popup_area(area, 60, 50);
        assert_eq!(popup, Rect::new(20, 10, 60, 20));
    }

    #[test]
    fn header_marks_sort_and_filter() {
        let header = HeaderCell {
            field: "status",
            label: "State".into(),
            width: 100,
            sort: Some(SortDirection::Desc),
            filtered: true,
        };
        assert_eq!(TableUI::header_cell(&header), Cell::from("State ▼ *"));
    }
}
