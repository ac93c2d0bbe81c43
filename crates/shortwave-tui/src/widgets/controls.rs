//! Volume knob and power button.

use ratatui::{
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::theme::{C_DIAL, C_MUTED, C_POWER_ON, C_SECONDARY};

/// Knob face: eight positions from fully counter-clockwise to fully
/// clockwise.
const KNOB_FACES: [char; 8] = ['◜', '◜', '◝', '◝', '◞', '◞', '◟', '◟'];

fn knob_face(volume: f32) -> char {
    let idx = (volume.clamp(0.0, 1.0) * (KNOB_FACES.len() - 1) as f32).round() as usize;
    KNOB_FACES[idx.min(KNOB_FACES.len() - 1)]
}

/// Vertical volume gauge, filled from the bottom.
pub fn draw_volume_knob(frame: &mut Frame, area: Rect, volume: f32, powered: bool) {
    if area.width < 3 || area.height < 2 {
        return;
    }
    let color = if powered { C_DIAL } else { C_MUTED };
    let gauge_rows = area.height.saturating_sub(2) as usize;
    let filled = (volume.clamp(0.0, 1.0) * gauge_rows as f32).round() as usize;

    let mut lines = Vec::with_capacity(area.height as usize);
    lines.push(Line::from(Span::styled("VOL", Style::default().fg(C_SECONDARY))));
    for row in 0..gauge_rows {
        let from_bottom = gauge_rows - row;
        let ch = if from_bottom <= filled { "███" } else { "░░░" };
        lines.push(Line::from(Span::styled(ch, Style::default().fg(color))));
    }
    lines.push(Line::from(vec![
        Span::styled(knob_face(volume).to_string(), Style::default().fg(color)),
        Span::styled(
            format!("{:>3}", (volume * 100.0).round() as u32),
            Style::default().fg(C_SECONDARY),
        ),
    ]));
    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), area);
}

pub fn draw_power_button(frame: &mut Frame, area: Rect, powered: bool) {
    if area.width == 0 || area.height == 0 {
        return;
    }
    let (lamp, style) = if powered {
        ("●", Style::default().fg(C_POWER_ON).add_modifier(Modifier::BOLD))
    } else {
        ("○", Style::default().fg(C_MUTED))
    };
    let line = Line::from(vec![
        Span::styled("[ ", Style::default().fg(C_SECONDARY)),
        Span::styled(lamp, style),
        Span::styled(" POWER ]", Style::default().fg(C_SECONDARY)),
    ]);
    frame.render_widget(Paragraph::new(line).alignment(Alignment::Center), area);
}
