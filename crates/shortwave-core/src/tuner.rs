//! Tuner state: the single owner of frequency, volume and power.

pub const FREQ_MIN_MHZ: f32 = 10.0;
pub const FREQ_MAX_MHZ: f32 = 34.0;

/// Fine step (up/down keys).
pub const FINE_STEP_MHZ: f32 = 0.1;
/// Coarse step (left/right keys).
pub const COARSE_STEP_MHZ: f32 = 1.0;

/// Discrete tuning commands coming from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    FineUp,
    FineDown,
    CoarseUp,
    CoarseDown,
}

impl Step {
    pub fn delta_mhz(self) -> f32 {
        match self {
            Step::FineUp => FINE_STEP_MHZ,
            Step::FineDown => -FINE_STEP_MHZ,
            Step::CoarseUp => COARSE_STEP_MHZ,
            Step::CoarseDown => -COARSE_STEP_MHZ,
        }
    }
}

/// Frequency and volume are clamped on every write; the fields are private
/// so nothing can bypass that.
#[derive(Debug, Clone, PartialEq)]
pub struct TunerState {
    frequency_mhz: f32,
    volume: f32,
    power: bool,
}

impl TunerState {
    pub fn new(frequency_mhz: f32, volume: f32) -> Self {
        let mut state = Self {
            frequency_mhz: FREQ_MIN_MHZ,
            volume: 0.0,
            power: false,
        };
        state.set_frequency(frequency_mhz);
        state.set_volume(volume);
        state
    }

    pub fn frequency_mhz(&self) -> f32 {
        self.frequency_mhz
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn power(&self) -> bool {
        self.power
    }

    /// Returns the clamped value actually stored.
    pub fn set_frequency(&mut self, mhz: f32) -> f32 {
        self.frequency_mhz = clamp_frequency(mhz);
        self.frequency_mhz
    }

    pub fn set_volume(&mut self, volume: f32) -> f32 {
        self.volume = clamp_volume(volume);
        self.volume
    }

    pub fn set_power(&mut self, on: bool) {
        self.power = on;
    }
}

impl Default for TunerState {
    fn default() -> Self {
        Self::new(15.0, 0.5)
    }
}

/// NaN collapses to the bottom of the band.
pub fn clamp_frequency(mhz: f32) -> f32 {
    if mhz.is_nan() {
        return FREQ_MIN_MHZ;
    }
    mhz.clamp(FREQ_MIN_MHZ, FREQ_MAX_MHZ)
}

pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        return 0.0;
    }
    volume.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_clamp_to_bounds() {
        let mut state = TunerState::default();
        assert_eq!(state.set_frequency(1000.0), 34.0);
        assert_eq!(state.set_frequency(-3.0), 10.0);
        assert_eq!(state.set_volume(-5.0), 0.0);
        assert_eq!(state.set_volume(7.5), 1.0);
        assert_eq!(state.frequency_mhz(), 10.0);
        assert_eq!(state.volume(), 1.0);
    }

    #[test]
    fn nan_and_infinity_are_clamped() {
        let mut state = TunerState::default();
        assert_eq!(state.set_frequency(f32::NAN), FREQ_MIN_MHZ);
        assert_eq!(state.set_frequency(f32::INFINITY), FREQ_MAX_MHZ);
        assert_eq!(state.set_volume(f32::NAN), 0.0);
        assert_eq!(state.set_volume(f32::NEG_INFINITY), 0.0);
    }

    #[test]
    fn constructor_clamps_and_starts_powered_off() {
        let state = TunerState::new(50.0, 2.0);
        assert_eq!(state.frequency_mhz(), FREQ_MAX_MHZ);
        assert_eq!(state.volume(), 1.0);
        assert!(!state.power());
    }

    #[test]
    fn step_deltas() {
        assert_eq!(Step::FineUp.delta_mhz(), 0.1);
        assert_eq!(Step::FineDown.delta_mhz(), -0.1);
        assert_eq!(Step::CoarseUp.delta_mhz(), 1.0);
        assert_eq!(Step::CoarseDown.delta_mhz(), -1.0);
    }
}
