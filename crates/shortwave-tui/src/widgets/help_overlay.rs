//! Help overlay: centered popup with the controls and an about box.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::theme::{C_BG, C_MUTED, C_PANEL_BORDER, C_PRIMARY, C_SECONDARY};

const POPUP_WIDTH_PERCENT: u16 = 60;

fn section(title: &str) -> Line<'_> {
    Line::from(Span::styled(
        format!(" {}", title),
        Style::default().fg(C_MUTED).add_modifier(Modifier::BOLD),
    ))
}

fn help_row<'a>(key: &'a str, desc: &'a str) -> Line<'a> {
    Line::from(vec![
        Span::raw(" "),
        Span::styled(
            format!("{:<16}", key),
            Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
        ),
        Span::styled(desc, Style::default().fg(C_SECONDARY)),
    ])
}

/// Name, version and description from the package manifest.
pub fn about_lines() -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(Span::styled(
            format!(" {} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            format!(" {}", env!("CARGO_PKG_DESCRIPTION")),
            Style::default().fg(C_SECONDARY),
        )),
    ];
    let authors = env!("CARGO_PKG_AUTHORS");
    if !authors.is_empty() {
        lines.push(Line::from(Span::styled(
            format!(" built by {}", authors.replace(':', ", ")),
            Style::default().fg(C_SECONDARY),
        )));
    }
    lines
}

fn help_lines() -> Vec<Line<'static>> {
    let mut lines = vec![
        section("tuning"),
        help_row("↑ / ↓  or  k / j", "fine tune ±0.1 MHz"),
        help_row("→ / ←  or  l / h", "coarse tune ±1 MHz"),
        help_row("drag dial", "sweep the band"),
        help_row("wheel on dial", "fine tune"),
        Line::from(""),
        section("volume & power"),
        help_row("+ / -", "volume up / down"),
        help_row("drag knob", "up is louder"),
        help_row("p / space", "power on / off"),
        Line::from(""),
        section("app"),
        help_row("?", "toggle this help"),
        help_row("q / Ctrl+C", "quit"),
        Line::from(""),
        section("about"),
    ];
    lines.extend(about_lines());
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        " press ? or esc to close",
        Style::default().fg(C_MUTED),
    )));
    lines
}

pub fn draw_help_overlay(frame: &mut Frame, area: Rect) {
    let lines = help_lines();
    let popup = centered_rect(POPUP_WIDTH_PERCENT, lines.len() as u16 + 2, area);
    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(C_PANEL_BORDER))
                    .title(Span::styled(" help ", Style::default().fg(C_SECONDARY)))
                    .style(Style::default().bg(C_BG)),
            )
            .wrap(Wrap { trim: false }),
        popup,
    );
}

fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(height.min(r.height)),
            Constraint::Min(0),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vert[1])[1]
}
