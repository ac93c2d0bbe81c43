//! Signal model: tuned frequency → nearest station + strength.
//!
//! Everything here is a pure function of the frequency and the station table.
//! In particular the ambient floor used between stations depends on the
//! frequency only, so re-tuning to the same spot always reads the same.

use crate::station::{Station, StationTable};

/// A station further than this from the dial is not "in range".
pub const LOCK_RANGE_MHZ: f32 = 0.5;

/// Strength above which a station is worth connecting to.
pub const CONNECT_THRESHOLD: u8 = 50;

/// Strength above which the station label is shown.
pub const LABEL_THRESHOLD: u8 = 30;

/// Distance tiers, checked in order with a strict `<`.
const STRENGTH_TIERS: [(f32, u8); 4] = [(0.05, 90), (0.10, 70), (0.20, 50), (0.50, 20)];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalReading {
    /// Index into the station table, set iff a station is within
    /// `LOCK_RANGE_MHZ`.
    pub nearest: Option<usize>,
    /// Distance to the closest station in the table (in range or not).
    /// `None` only for an empty table.
    pub distance_mhz: Option<f32>,
    /// 0..=100.
    pub strength: u8,
}

impl SignalReading {
    pub fn station<'a>(&self, table: &'a StationTable) -> Option<&'a Station> {
        self.nearest.and_then(|idx| table.get(idx))
    }

    pub fn is_locked(&self) -> bool {
        self.nearest.is_some()
    }

    /// Whether the tuner should hold a stream open for this reading.
    pub fn wants_stream(&self) -> bool {
        self.nearest.is_some() && self.strength > CONNECT_THRESHOLD
    }

    /// Whether the station name/description should be displayed.
    pub fn shows_label(&self) -> bool {
        self.nearest.is_some() && self.strength > LABEL_THRESHOLD
    }

    /// Signal bars (0..=5) for the meter display.
    pub fn bars(&self) -> u8 {
        ((self.strength as u16 * 5 + 50) / 100).min(5) as u8
    }
}

/// Evaluate the signal at `frequency_mhz`.
pub fn evaluate(table: &StationTable, frequency_mhz: f32) -> SignalReading {
    let mut best: Option<(usize, f32)> = None;
    for (idx, station) in table.stations().iter().enumerate() {
        let distance = (frequency_mhz - station.frequency_mhz).abs();
        // Strict `<` keeps the earlier table entry on a tie.
        match best {
            Some((_, d)) if distance >= d => {}
            _ => best = Some((idx, distance)),
        }
    }

    match best {
        Some((idx, distance)) if distance <= LOCK_RANGE_MHZ => SignalReading {
            nearest: Some(idx),
            distance_mhz: Some(distance),
            strength: strength_for_distance(distance),
        },
        other => SignalReading {
            nearest: None,
            distance_mhz: other.map(|(_, d)| d),
            strength: ambient_floor(frequency_mhz),
        },
    }
}

/// Tiered strength for a station `distance_mhz` away.
pub fn strength_for_distance(distance_mhz: f32) -> u8 {
    for (limit, strength) in STRENGTH_TIERS {
        if distance_mhz < limit {
            return strength;
        }
    }
    0
}

/// Background noise strength between stations: `5 + 15·sin(f)` clamped to
/// 0..=100 and truncated.
pub fn ambient_floor(frequency_mhz: f32) -> u8 {
    let raw = 5.0 + 15.0 * frequency_mhz.sin();
    if raw.is_nan() {
        return 0;
    }
    raw.clamp(0.0, 100.0) as u8
}
