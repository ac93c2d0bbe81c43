//! VU meter: segmented LED strip per channel with peak hold.
//!
//! Levels come in linear 0..1 (already smoothed by the mixer) and are drawn
//! on a dB scale so quiet static still moves the needle.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::theme::{C_MUTED, C_SECONDARY};

// ═════════════════════════════════════════════════════════════════════════════
// dB SCALE
// ═════════════════════════════════════════════════════════════════════════════

const DB_MIN: f32 = -54.0;
const DB_MAX: f32 = 0.0;
const DB_RANGE: f32 = DB_MAX - DB_MIN;

/// Perceptual gamma for low-level detail.
const GAMMA: f32 = 0.72;

const SEGMENT_WIDTH: usize = 2;
const SEGMENT_GAP: usize = 1;

/// Peak marker fall per UI tick, in meter fraction.
const PEAK_FALL_PER_TICK: f32 = 0.012;
/// Ticks a peak is held before it starts to fall.
const PEAK_HOLD_TICKS: u32 = 24;

fn level_to_db(level: f32) -> f32 {
    if level <= 0.0 {
        return -90.0;
    }
    (20.0 * level.log10()).clamp(-90.0, 0.0)
}

/// Convert dB to normalized 0..1 position.
fn db_to_frac(db: f32) -> f32 {
    let linear = ((db - DB_MIN) / DB_RANGE).clamp(0.0, 1.0);
    linear.powf(GAMMA)
}

/// Meter position (0..1) for a linear level.
pub fn level_to_frac(level: f32) -> f32 {
    db_to_frac(level_to_db(level))
}

// ═════════════════════════════════════════════════════════════════════════════
// COLORS
// ═════════════════════════════════════════════════════════════════════════════

struct MeterColors;

impl MeterColors {
    const LOW: Color = Color::Rgb(60, 150, 90);
    const MID: Color = Color::Rgb(220, 180, 60);
    const HIGH: Color = Color::Rgb(230, 80, 50);
    const PEAK: Color = Color::Rgb(255, 210, 160);

    /// Zone color by position (0.0 = quiet, 1.0 = clip).
    fn zone_color(position_frac: f32) -> Color {
        let t = position_frac.clamp(0.0, 1.0);
        if t < 0.6 {
            Self::lerp_color(Self::LOW, Self::MID, t / 0.6)
        } else {
            Self::lerp_color(Self::MID, Self::HIGH, (t - 0.6) / 0.4)
        }
    }

    fn lerp_u8(a: u8, b: u8, t: f32) -> u8 {
        let tt = t.clamp(0.0, 1.0);
        (a as f32 + (b as f32 - a as f32) * tt).round() as u8
    }

    fn lerp_color(a: Color, b: Color, t: f32) -> Color {
        let (ar, ag, ab) = match a {
            Color::Rgb(r, g, b) => (r, g, b),
            _ => (0, 0, 0),
        };
        let (br, bg, bb) = match b {
            Color::Rgb(r, g, b) => (r, g, b),
            _ => (0, 0, 0),
        };
        Color::Rgb(
            Self::lerp_u8(ar, br, t),
            Self::lerp_u8(ag, bg, t),
            Self::lerp_u8(ab, bb, t),
        )
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// PEAK HOLD
// ═════════════════════════════════════════════════════════════════════════════

/// Per-channel peak marker, updated once per UI tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeakHold {
    frac: f32,
    held_ticks: u32,
}

impl PeakHold {
    pub fn update(&mut self, frac: f32) {
        if frac >= self.frac {
            self.frac = frac;
            self.held_ticks = 0;
        } else if self.held_ticks < PEAK_HOLD_TICKS {
            self.held_ticks += 1;
        } else {
            self.frac = (self.frac - PEAK_FALL_PER_TICK).max(frac);
        }
    }

    pub fn frac(&self) -> f32 {
        self.frac
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// METER BUILDER
// ═════════════════════════════════════════════════════════════════════════════

/// One LED-strip line.  `level_frac` and `peak_frac` are meter positions.
pub fn build_meter(level_frac: f32, peak_frac: f32, width: usize) -> Line<'static> {
    let unit = SEGMENT_WIDTH + SEGMENT_GAP;
    let num_segments = width / unit;
    if num_segments == 0 {
        return Line::from(vec![]);
    }
    let lit = (level_frac.clamp(0.0, 1.0) * num_segments as f32).round() as usize;
    let peak_segment = if peak_frac > 0.0 {
        Some(((peak_frac * num_segments as f32) as usize).min(num_segments - 1))
    } else {
        None
    };

    let mut spans: Vec<Span<'static>> = Vec::with_capacity(num_segments * 2);
    for seg in 0..num_segments {
        let seg_frac = seg as f32 / num_segments as f32;
        let (text, color) = if Some(seg) == peak_segment && seg >= lit {
            ("▐▌", MeterColors::PEAK)
        } else if seg < lit {
            ("▮▮", MeterColors::zone_color(seg_frac))
        } else {
            ("┆┆", C_MUTED)
        };
        spans.push(Span::styled(text, Style::default().fg(color)));
        if seg + 1 < num_segments {
            spans.push(Span::raw(" "));
        }
    }
    Line::from(spans)
}

/// Draw both channels, one row each, with an `L`/`R` prefix.
pub fn draw_vu_meter(
    frame: &mut Frame,
    area: Rect,
    levels: (f32, f32),
    peaks: (&PeakHold, &PeakHold),
) {
    if area.width < 4 || area.height == 0 {
        return;
    }
    let width = area.width.saturating_sub(2) as usize;
    let rows = [
        ("L", levels.0, peaks.0),
        ("R", levels.1, peaks.1),
    ];
    let lines: Vec<Line<'static>> = rows
        .iter()
        .take(area.height as usize)
        .map(|(label, level, peak)| {
            let mut spans = vec![Span::styled(
                format!("{} ", label),
                Style::default().fg(C_SECONDARY),
            )];
            spans.extend(build_meter(level_to_frac(*level), peak.frac(), width).spans);
            Line::from(spans)
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_scale_edges() {
        assert_eq!(level_to_frac(0.0), 0.0);
        assert_eq!(level_to_frac(1.0), 1.0);
        assert!(level_to_frac(0.1) > 0.0 && level_to_frac(0.1) < 1.0);
    }

    #[test]
    fn meter_has_one_span_per_segment_plus_gaps() {
        let line = build_meter(0.5, 0.8, 30);
        // 10 segments, 9 gaps.
        assert_eq!(line.spans.len(), 19);
        let lit = line
            .spans
            .iter()
            .filter(|s| s.content.as_ref() == "▮▮")
            .count();
        assert_eq!(lit, 5);
        assert!(line.spans.iter().any(|s| s.content.as_ref() == "▐▌"));
    }

    #[test]
    fn narrow_meter_is_empty() {
        assert!(build_meter(1.0, 1.0, 2).spans.is_empty());
    }

    #[test]
    fn peak_holds_then_falls() {
        let mut peak = PeakHold::default();
        peak.update(0.8);
        for _ in 0..PEAK_HOLD_TICKS {
            peak.update(0.1);
        }
        assert_eq!(peak.frac(), 0.8);
        peak.update(0.1);
        assert!(peak.frac() < 0.8);
        for _ in 0..200 {
            peak.update(0.1);
        }
        assert_eq!(peak.frac(), 0.1);
    }
}
