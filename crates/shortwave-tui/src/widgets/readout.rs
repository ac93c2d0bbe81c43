//! Frequency readout, signal bars and the station label.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use shortwave_core::{SignalReading, Station};

use crate::theme::{style_readout, C_ERROR, C_MUTED, C_PRIMARY, C_SECONDARY, C_SIGNAL, C_WARNING};

const BARS: [char; 5] = ['▂', '▃', '▅', '▆', '█'];

/// Five bars, lit from the left according to `reading.bars()`.
pub fn signal_bars(reading: &SignalReading, powered: bool) -> Vec<Span<'static>> {
    let lit = if powered { reading.bars() as usize } else { 0 };
    BARS.iter()
        .enumerate()
        .map(|(i, ch)| {
            let color = if i < lit { C_SIGNAL } else { C_MUTED };
            Span::styled(ch.to_string(), Style::default().fg(color))
        })
        .collect()
}

/// What to say under the frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Status<'a> {
    Off,
    Station(&'a Station),
    StreamLost(&'a Station),
    NoSignal,
    /// In range but too weak to label.
    Faint,
}

pub fn status<'a>(
    powered: bool,
    label: Option<&'a Station>,
    reading: &SignalReading,
    stream_failed: bool,
) -> Status<'a> {
    if !powered {
        return Status::Off;
    }
    match label {
        Some(station) if stream_failed => Status::StreamLost(station),
        Some(station) => Status::Station(station),
        None if reading.is_locked() => Status::Faint,
        None => Status::NoSignal,
    }
}

/// How far off a weak, unlabelled station the dial sits.
fn tuning_offset(reading: &SignalReading) -> Option<String> {
    reading
        .distance_mhz
        .map(|d| format!("{:.2} MHz off station", d))
}

pub fn draw_readout(
    frame: &mut Frame,
    area: Rect,
    frequency_mhz: f32,
    reading: &SignalReading,
    status: Status<'_>,
) {
    if area.width < 10 || area.height == 0 {
        return;
    }
    let powered = status != Status::Off;

    let mut top = vec![
        Span::styled(format!("{:>6.2}", frequency_mhz), style_readout(powered)),
        Span::styled(" MHz   ", Style::default().fg(C_SECONDARY)),
    ];
    top.extend(signal_bars(reading, powered));
    if powered {
        top.push(Span::styled(
            format!(" {:>3}%", reading.strength),
            Style::default().fg(C_SECONDARY),
        ));
    }

    let (name, detail) = match status {
        Status::Off => (
            Span::styled("-- power off --", Style::default().fg(C_MUTED)),
            Span::raw(""),
        ),
        Status::Station(station) => (
            Span::styled(
                station.name.clone(),
                Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
            ),
            Span::styled(station.description.clone(), Style::default().fg(C_SECONDARY)),
        ),
        Status::StreamLost(station) => (
            Span::styled(
                station.name.clone(),
                Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
            ),
            Span::styled("STREAM LOST", Style::default().fg(C_ERROR)),
        ),
        Status::NoSignal => (
            Span::styled("NO SIGNAL", Style::default().fg(C_WARNING)),
            Span::raw(""),
        ),
        Status::Faint => (
            Span::styled("· · ·", Style::default().fg(C_SECONDARY)),
            Span::styled(
                tuning_offset(reading).unwrap_or_default(),
                Style::default().fg(C_MUTED),
            ),
        ),
    };

    let lines = vec![Line::from(top), Line::from(name), Line::from(detail)];
    frame.render_widget(Paragraph::new(lines), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(nearest: Option<usize>, strength: u8) -> SignalReading {
        SignalReading {
            nearest,
            distance_mhz: Some(0.0),
            strength,
        }
    }

    #[test]
    fn faint_signal_shows_offset() {
        let r = SignalReading {
            nearest: Some(0),
            distance_mhz: Some(0.34),
            strength: 20,
        };
        assert_eq!(tuning_offset(&r).as_deref(), Some("0.34 MHz off station"));
        let empty = SignalReading {
            nearest: None,
            distance_mhz: None,
            strength: 5,
        };
        assert_eq!(tuning_offset(&empty), None);
    }

    #[test]
    fn status_follows_power_and_signal() {
        let station = Station::new(12.0, "A", "first", None);
        let r = reading(Some(0), 90);
        assert_eq!(status(false, Some(&station), &r, false), Status::Off);
        assert_eq!(status(true, Some(&station), &r, false), Status::Station(&station));
        assert_eq!(status(true, Some(&station), &r, true), Status::StreamLost(&station));
        assert_eq!(status(true, None, &reading(Some(0), 20), false), Status::Faint);
        assert_eq!(status(true, None, &reading(None, 12), false), Status::NoSignal);
    }

    #[test]
    fn bars_dark_when_off() {
        let r = reading(Some(0), 90);
        let lit = |spans: &[Span]| {
            spans
                .iter()
                .filter(|s| s.style.fg == Some(C_SIGNAL))
                .count()
        };
        assert_eq!(lit(&signal_bars(&r, true)), r.bars() as usize);
        assert_eq!(lit(&signal_bars(&r, false)), 0);
    }
}
