//! TuningController: turns input gestures into tuner state and engine
//! intents.
//!
//! Every frequency mutation runs the same pipeline: clamp, evaluate the
//! signal, switch or clear the station, then re-push the ambient gains.

use tracing::debug;

use crate::engine::AudioEngine;
use crate::signal::{self, SignalReading};
use crate::station::{Station, StationTable};
use crate::tuner::{Step, TunerState};

/// What a pointer drag is moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragTarget {
    /// Horizontal drag on the dial moves frequency.
    Dial,
    /// Vertical drag on the knob moves volume (up is louder).
    Volume,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragState {
    Idle,
    Dragging {
        target: DragTarget,
        /// Pointer coordinate at pointer-down, along the drag axis.
        anchor: f32,
        /// Frequency or volume at pointer-down.
        start_value: f32,
    },
}

/// Pointer sensitivity, in units per pointer coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragScale {
    pub mhz_per_unit: f32,
    pub volume_per_unit: f32,
}

impl Default for DragScale {
    fn default() -> Self {
        Self {
            mhz_per_unit: 0.05,
            volume_per_unit: 0.05,
        }
    }
}

pub struct TuningController {
    table: StationTable,
    state: TunerState,
    reading: SignalReading,
    engine: AudioEngine,
    drag: DragState,
    scale: DragScale,
}

impl TuningController {
    pub fn new(table: StationTable, state: TunerState, engine: AudioEngine) -> Self {
        let reading = signal::evaluate(&table, state.frequency_mhz());
        let mut controller = Self {
            table,
            state,
            reading,
            engine,
            drag: DragState::Idle,
            scale: DragScale::default(),
        };
        if controller.state.power() {
            controller.engine.start();
        }
        controller.push_ambient();
        controller
    }

    pub fn with_drag_scale(mut self, scale: DragScale) -> Self {
        self.scale = scale;
        self
    }

    pub fn drag_scale(&self) -> DragScale {
        self.scale
    }

    /// Change pointer sensitivity, e.g. when the dial is redrawn at a new
    /// width.
    pub fn set_drag_scale(&mut self, scale: DragScale) {
        self.scale = scale;
    }

    pub fn state(&self) -> &TunerState {
        &self.state
    }

    pub fn reading(&self) -> SignalReading {
        self.reading
    }

    pub fn table(&self) -> &StationTable {
        &self.table
    }

    pub fn engine(&self) -> &AudioEngine {
        &self.engine
    }

    pub fn drag_state(&self) -> DragState {
        self.drag
    }

    /// Station shown on the display, if the signal is good enough to label.
    pub fn label(&self) -> Option<&Station> {
        if self.reading.shows_label() {
            self.reading.station(&self.table)
        } else {
            None
        }
    }

    // ---- pointer ----

    pub fn pointer_down(&mut self, target: DragTarget, pos: f32) {
        let start_value = match target {
            DragTarget::Dial => self.state.frequency_mhz(),
            DragTarget::Volume => self.state.volume(),
        };
        self.drag = DragState::Dragging {
            target,
            anchor: pos,
            start_value,
        };
    }

    /// Move an active drag.  Ignored while idle.
    pub fn pointer_move(&mut self, pos: f32) {
        let DragState::Dragging {
            target,
            anchor,
            start_value,
        } = self.drag
        else {
            return;
        };
        match target {
            DragTarget::Dial => {
                self.set_frequency(start_value + (pos - anchor) * self.scale.mhz_per_unit)
            }
            DragTarget::Volume => {
                self.set_volume(start_value + (anchor - pos) * self.scale.volume_per_unit)
            }
        }
    }

    pub fn pointer_up(&mut self) {
        self.drag = DragState::Idle;
    }

    // ---- frequency ----

    pub fn step(&mut self, step: Step) {
        self.tune_by(step.delta_mhz());
    }

    pub fn tune_by(&mut self, delta_mhz: f32) {
        self.set_frequency(self.state.frequency_mhz() + delta_mhz);
    }

    pub fn set_frequency(&mut self, mhz: f32) {
        let f = self.state.set_frequency(mhz);
        self.reading = signal::evaluate(&self.table, f);
        self.retune();
        self.push_ambient();
    }

    // ---- volume ----

    pub fn set_volume(&mut self, volume: f32) {
        self.state.set_volume(volume);
        self.push_ambient();
    }

    pub fn adjust_volume(&mut self, delta: f32) {
        self.set_volume(self.state.volume() + delta);
    }

    // ---- power ----

    pub fn toggle_power(&mut self) {
        if self.state.power() {
            self.power_off();
        } else {
            self.power_on();
        }
    }

    /// Starts static only.  A stream is connected by the next tuning step
    /// that finds a strong station.
    pub fn power_on(&mut self) {
        if self.state.power() {
            return;
        }
        self.state.set_power(true);
        self.engine.start();
        self.push_ambient();
    }

    pub fn power_off(&mut self) {
        if !self.state.power() {
            return;
        }
        self.state.set_power(false);
        self.drag = DragState::Idle;
        self.engine.stop();
    }

    /// Periodic housekeeping from the UI tick.  Returns the smoothed VU
    /// levels to draw.
    pub fn tick(&mut self) -> (f32, f32) {
        self.engine.collect_retired();
        self.engine.vu_levels()
    }

    fn retune(&mut self) {
        if !self.state.power() {
            return;
        }
        match self.reading.nearest {
            Some(idx) => {
                if self.engine.active_station() != Some(idx) && self.reading.wants_stream() {
                    if let Some(station) = self.table.get(idx) {
                        self.engine.switch_station(idx, station);
                    }
                }
            }
            None => {
                if self.engine.active_station().is_some() {
                    debug!(
                        "signal lost at {:.2} MHz",
                        self.state.frequency_mhz()
                    );
                }
                self.engine.clear_station();
            }
        }
    }

    fn push_ambient(&mut self) {
        self.engine
            .set_ambient(self.reading.strength, self.state.volume());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::STATIC_BASE_VOLUME;
    use crate::error::StreamResult;
    use crate::mixer::{mixer_channel_with_noise, AudioCallback, Gains, Mixer, MIXER_CHANNELS};
    use crate::noise::StaticNoiseGenerator;
    use crate::stream::{OpenedStream, StreamCloser, StreamSource, ToneStream};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Log(Arc<Mutex<Vec<String>>>);

    struct RecordingSource(Log);

    impl StreamSource for RecordingSource {
        fn open(&mut self, station: &Station, sample_rate: u32) -> StreamResult<OpenedStream> {
            self.0 .0.lock().unwrap().push(station.name.clone());
            Ok(OpenedStream {
                handle: Box::new(ToneStream::new(station, sample_rate)),
                closer: StreamCloser::noop(),
            })
        }
    }

    fn controller() -> (TuningController, Mixer, Log) {
        let log = Log::default();
        let (handle, mixer) =
            mixer_channel_with_noise(StaticNoiseGenerator::seeded(9, 48_000, MIXER_CHANNELS));
        let engine = AudioEngine::new(
            handle,
            Box::new(RecordingSource(log.clone())),
            48_000,
            STATIC_BASE_VOLUME,
        );
        let table = StationTable::new(vec![
            Station::new(12.0, "A", "first", None),
            Station::new(16.0, "B", "second", None),
        ]);
        let c = TuningController::new(table, TunerState::new(14.0, 0.5), engine);
        (c, mixer, log)
    }

    fn opened(log: &Log) -> Vec<String> {
        log.0.lock().unwrap().clone()
    }

    #[test]
    fn starts_off_and_idle() {
        let (c, _mixer, _log) = controller();
        assert!(!c.state().power());
        assert_eq!(c.drag_state(), DragState::Idle);
        assert_eq!(c.engine().gains(), Gains::SILENT);
    }

    #[test]
    fn power_on_is_a_cold_start() {
        let (mut c, _mixer, log) = controller();
        c.set_frequency(12.0);
        c.power_on();
        assert!(opened(&log).is_empty());
        assert_eq!(c.engine().active_station(), None);
        // Static is audible right away.
        assert!(c.engine().gains().static_gain > 0.0);

        c.tune_by(0.0);
        assert_eq!(opened(&log), vec!["A".to_string()]);
    }

    #[test]
    fn tuning_switches_only_on_new_strong_station() {
        let (mut c, _mixer, log) = controller();
        c.power_on();
        c.set_frequency(12.0);
        c.set_frequency(12.03);
        c.set_frequency(11.98);
        assert_eq!(opened(&log), vec!["A".to_string()]);

        // Weak reception of another station keeps the current stream.
        c.set_frequency(15.85);
        assert_eq!(c.reading().nearest, Some(1));
        assert_eq!(c.engine().active_station(), Some(0));

        c.set_frequency(16.0);
        assert_eq!(opened(&log), vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn leaving_range_clears_station() {
        let (mut c, _mixer, _log) = controller();
        c.power_on();
        c.set_frequency(16.0);
        assert_eq!(c.engine().active_station(), Some(1));
        c.set_frequency(14.0);
        assert_eq!(c.reading().nearest, None);
        assert_eq!(c.engine().active_station(), None);
    }

    #[test]
    fn ambient_is_pushed_every_step() {
        let (mut c, _mixer, _log) = controller();
        c.power_on();
        c.set_frequency(11.6);
        let far = c.engine().gains();
        c.set_frequency(11.95);
        let near = c.engine().gains();
        assert!(near.stream_gain > far.stream_gain);
        assert!(near.static_gain < far.static_gain);
    }

    #[test]
    fn steps_and_clamping() {
        let (mut c, _mixer, _log) = controller();
        c.step(Step::CoarseUp);
        assert!((c.state().frequency_mhz() - 15.0).abs() < 1e-4);
        c.step(Step::FineDown);
        assert!((c.state().frequency_mhz() - 14.9).abs() < 1e-4);
        c.set_frequency(1000.0);
        assert_eq!(c.state().frequency_mhz(), 34.0);
        c.set_volume(-5.0);
        assert_eq!(c.state().volume(), 0.0);
    }

    #[test]
    fn dial_drag_moves_frequency_from_anchor() {
        let (mut c, _mixer, _log) = controller();
        c.pointer_down(DragTarget::Dial, 10.0);
        c.pointer_move(30.0);
        assert!((c.state().frequency_mhz() - 15.0).abs() < 1e-4);
        c.pointer_move(0.0);
        assert!((c.state().frequency_mhz() - 13.5).abs() < 1e-4);
        c.pointer_up();
        assert_eq!(c.drag_state(), DragState::Idle);
        c.pointer_move(100.0);
        assert!((c.state().frequency_mhz() - 13.5).abs() < 1e-4);
    }

    #[test]
    fn knob_drag_up_is_louder() {
        let (mut c, _mixer, _log) = controller();
        c.pointer_down(DragTarget::Volume, 10.0);
        c.pointer_move(6.0);
        assert!((c.state().volume() - 0.7).abs() < 1e-4);
        c.pointer_move(100.0);
        assert_eq!(c.state().volume(), 0.0);
    }

    #[test]
    fn power_off_silences_and_drops_stream() {
        let (mut c, mut mixer, _log) = controller();
        c.power_on();
        c.set_frequency(16.0);
        let mut buf = vec![0.0f32; 128];
        mixer.produce(&mut buf);

        c.power_off();
        assert_eq!(c.engine().active_station(), None);
        assert_eq!(c.engine().gains(), Gains::SILENT);
        mixer.produce(&mut buf);
        assert!(buf.iter().all(|&s| s == 0.0));

        // Tuning while off does not connect anything.
        c.set_frequency(12.0);
        assert_eq!(c.engine().active_station(), None);
    }

    #[test]
    fn label_requires_strength_over_thirty() {
        let (mut c, _mixer, _log) = controller();
        c.set_frequency(16.0);
        assert_eq!(c.label().map(|s| s.name.as_str()), Some("B"));
        c.set_frequency(16.3);
        assert!(c.reading().is_locked());
        assert!(c.label().is_none());
    }
}
