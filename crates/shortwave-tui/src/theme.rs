//! Color palette and style constants for the tuner face.

use ratatui::style::{Color, Modifier, Style};

// ── Color palette ─────────────────────────────────────────────────────────────

pub const C_BG: Color = Color::Rgb(18, 16, 14);
pub const C_PANEL_BORDER: Color = Color::Rgb(64, 52, 40);
pub const C_PRIMARY: Color = Color::Rgb(226, 214, 190);
pub const C_SECONDARY: Color = Color::Rgb(150, 136, 112);
pub const C_MUTED: Color = Color::Rgb(72, 64, 56);
/// Backlit dial glass.
pub const C_DIAL: Color = Color::Rgb(255, 176, 72);
pub const C_NEEDLE: Color = Color::Rgb(255, 80, 64);
pub const C_STATION_MARK: Color = Color::Rgb(120, 190, 140);
pub const C_SIGNAL: Color = Color::Rgb(80, 200, 120);
pub const C_WARNING: Color = Color::Rgb(255, 184, 80);
pub const C_ERROR: Color = Color::Rgb(255, 95, 95);
pub const C_POWER_ON: Color = Color::Rgb(255, 64, 48);

// ── Predefined styles ─────────────────────────────────────────────────────────

pub fn style_default() -> Style {
    Style::default().fg(C_PRIMARY).bg(C_BG)
}

pub fn style_muted() -> Style {
    Style::default().fg(C_MUTED)
}

pub fn style_secondary() -> Style {
    Style::default().fg(C_SECONDARY)
}

pub fn style_border() -> Style {
    Style::default().fg(C_PANEL_BORDER)
}

pub fn style_readout(powered: bool) -> Style {
    if powered {
        Style::default().fg(C_DIAL).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(C_MUTED)
    }
}
