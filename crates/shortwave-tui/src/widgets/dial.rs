//! Tuning dial: MHz scale, station marks and the needle.
//!
//! ```text
//!  10    12    14    16    18    20    22 ...
//!  ┴──┬──┴──┬──┴──┬──┴──┬──┴──┬──┴──┬──┴──
//!       ▾        ▾┃          ▾
//! ```

use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use shortwave_core::tuner::{FREQ_MAX_MHZ, FREQ_MIN_MHZ};
use shortwave_core::StationTable;

use crate::theme::{C_DIAL, C_MUTED, C_NEEDLE, C_SECONDARY, C_STATION_MARK};

/// MHz between labelled ticks.
const LABEL_EVERY_MHZ: f32 = 2.0;

/// Column (0-based, within `width`) that shows `mhz`.
pub fn column_for(mhz: f32, width: u16) -> u16 {
    if width <= 1 {
        return 0;
    }
    let frac = ((mhz - FREQ_MIN_MHZ) / (FREQ_MAX_MHZ - FREQ_MIN_MHZ)).clamp(0.0, 1.0);
    (frac * (width - 1) as f32).round() as u16
}

/// Frequency covered by one column of a dial `width` columns wide, so a
/// pointer dragged along the dial keeps the needle under it.
pub fn mhz_per_column(width: u16) -> f32 {
    (FREQ_MAX_MHZ - FREQ_MIN_MHZ) / width.saturating_sub(1).max(1) as f32
}

fn scale_lines(width: u16) -> (String, String) {
    let w = width as usize;
    let mut labels = vec![' '; w];
    let mut ticks = vec!['─'; w];

    let mut mhz = FREQ_MIN_MHZ;
    while mhz <= FREQ_MAX_MHZ + f32::EPSILON {
        let col = column_for(mhz, width) as usize;
        ticks[col] = '┴';
        let text = format!("{}", mhz as u32);
        // Right-align the last label so it stays inside the dial.
        let start = if col + text.len() > w {
            w.saturating_sub(text.len())
        } else {
            col
        };
        for (i, ch) in text.chars().enumerate() {
            if let Some(slot) = labels.get_mut(start + i) {
                *slot = ch;
            }
        }
        let mid = column_for(mhz + LABEL_EVERY_MHZ / 2.0, width) as usize;
        if mid < w && mhz + LABEL_EVERY_MHZ / 2.0 <= FREQ_MAX_MHZ {
            ticks[mid] = '┬';
        }
        mhz += LABEL_EVERY_MHZ;
    }
    (labels.into_iter().collect(), ticks.into_iter().collect())
}

fn marker_line(width: u16, table: &StationTable, needle_col: u16, powered: bool) -> Line<'static> {
    let mut cells: Vec<(char, Style)> = vec![(' ', Style::default()); width as usize];
    for station in table.stations() {
        let col = column_for(station.frequency_mhz, width) as usize;
        if let Some(cell) = cells.get_mut(col) {
            *cell = ('▾', Style::default().fg(C_STATION_MARK));
        }
    }
    let needle_color = if powered { C_NEEDLE } else { C_MUTED };
    if let Some(cell) = cells.get_mut(needle_col as usize) {
        *cell = ('┃', Style::default().fg(needle_color));
    }

    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut current: Option<Style> = None;
    let mut buf = String::new();
    for (ch, style) in cells {
        if current != Some(style) {
            if let Some(s) = current.take() {
                spans.push(Span::styled(std::mem::take(&mut buf), s));
            }
            current = Some(style);
        }
        buf.push(ch);
    }
    if let Some(s) = current {
        spans.push(Span::styled(buf, s));
    }
    Line::from(spans)
}

/// Draw the dial into `area` (three rows: labels, ticks, marks + needle).
pub fn draw_dial(
    frame: &mut Frame,
    area: Rect,
    frequency_mhz: f32,
    table: &StationTable,
    powered: bool,
) {
    if area.width < 4 || area.height == 0 {
        return;
    }
    let glass = if powered { C_DIAL } else { C_SECONDARY };
    let (labels, ticks) = scale_lines(area.width);
    let needle_col = column_for(frequency_mhz, area.width);

    let lines = vec![
        Line::from(Span::styled(labels, Style::default().fg(glass))),
        Line::from(Span::styled(ticks, Style::default().fg(glass))),
        marker_line(area.width, table, needle_col, powered),
    ];
    frame.render_widget(Paragraph::new(lines), area);
}
