//! AudioEngine: control-thread face of the mixer.
//!
//! Owns the stream source and the control end of the mixer queues.  Tracks
//! which station (if any) is attached, derives gains from strength and
//! volume, and posts intents to the audio thread.  Stream failures are
//! logged and swallowed: the radio keeps hissing.
//!
//! Power and gains are stored straight into the mixer's atomics.  Stream
//! changes go through the command queue; if it is full the newest change
//! waits in a single pending slot and is retried on every later call,
//! including the UI tick.

use tracing::{debug, info, warn};

use crate::mixer::{Gains, MixerCommand, MixerHandle, MixerLevels};
use crate::signal::CONNECT_THRESHOLD;
use crate::station::Station;
use crate::stream::{StreamCloser, StreamSource};

/// Default scale applied to static before volume.
pub const STATIC_BASE_VOLUME: f32 = 0.8;
/// Static never drops below `volume * STATIC_FLOOR` while powered on and
/// without a strong station.
pub const STATIC_FLOOR: f32 = 0.1;

/// Gain envelope for a given signal strength.
///
/// ```text
/// static = volume · (100 − strength)/100 · base      (≥ volume·0.1 if strength < 50)
/// stream = volume · strength/100
/// ```
///
/// Powered off → both zero.
pub fn compute_gains(strength: u8, volume: f32, powered: bool, static_base_volume: f32) -> Gains {
    if !powered {
        return Gains::SILENT;
    }
    let strength = strength.min(100) as f32;
    let volume = crate::tuner::clamp_volume(volume);
    let static_level = (100.0 - strength) / 100.0;
    let mut static_gain = volume * static_level * static_base_volume;
    if strength < CONNECT_THRESHOLD as f32 {
        static_gain = static_gain.max(volume * STATIC_FLOOR);
    }
    Gains {
        static_gain,
        stream_gain: volume * (strength / 100.0),
    }
}

/// The station currently handed to the mixer.
struct ActiveStation {
    idx: usize,
    /// `None` when opening failed and we are playing static in its place.
    closer: Option<StreamCloser>,
}

pub struct AudioEngine {
    mixer: MixerHandle,
    source: Box<dyn StreamSource>,
    sample_rate: u32,
    static_base_volume: f32,
    powered: bool,
    active: Option<ActiveStation>,
    gains: Gains,
    /// Stream change the queue had no room for.  A newer change supersedes
    /// it: both `Attach` and `Detach` replace whatever is playing.
    pending: Option<MixerCommand>,
}

impl AudioEngine {
    pub fn new(
        mixer: MixerHandle,
        source: Box<dyn StreamSource>,
        sample_rate: u32,
        static_base_volume: f32,
    ) -> Self {
        Self {
            mixer,
            source,
            sample_rate,
            static_base_volume,
            powered: false,
            active: None,
            gains: Gains::SILENT,
            pending: None,
        }
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// Station the engine is tuned to (whether or not its stream opened).
    pub fn active_station(&self) -> Option<usize> {
        self.active.as_ref().map(|a| a.idx)
    }

    /// True when the active station has a live stream behind it.
    pub fn has_stream(&self) -> bool {
        self.active.as_ref().is_some_and(|a| a.closer.is_some())
    }

    /// Gains derived from the latest strength and volume, as published to
    /// the mixer.
    pub fn gains(&self) -> Gains {
        self.gains
    }

    pub fn levels(&self) -> &MixerLevels {
        self.mixer.levels()
    }

    /// Smoothed VU levels for the meter.
    pub fn vu_levels(&self) -> (f32, f32) {
        self.mixer.levels().vu()
    }

    /// Power on.  Starts static only; streams wait for the next tuning
    /// evaluation.
    pub fn start(&mut self) {
        self.collect_retired();
        if self.powered {
            return;
        }
        info!("engine: power on");
        self.powered = true;
        self.mixer.set_running(true);
    }

    /// Power off.  Closes any stream and silences the mixer.
    pub fn stop(&mut self) {
        self.collect_retired();
        if !self.powered {
            return;
        }
        info!("engine: power off");
        self.powered = false;
        self.close_active();
        self.publish_gains(Gains::SILENT);
        self.mixer.set_running(false);
    }

    /// Close whatever is playing and open `station`.  Failure to open leaves
    /// the engine on static with `idx` still tracked, so further tuning
    /// inside the same station does not hammer the source.
    pub fn switch_station(&mut self, idx: usize, station: &Station) {
        self.collect_retired();
        if !self.powered {
            debug!("engine: ignoring switch to {} while off", station.name);
            return;
        }
        self.close_active();

        info!(
            "engine: switching to {} ({:.2} MHz)",
            station.name, station.frequency_mhz
        );
        let closer = match self.source.open(station, self.sample_rate) {
            Ok(opened) => {
                self.post(MixerCommand::Attach(opened.handle));
                Some(opened.closer)
            }
            Err(e) => {
                warn!(
                    "engine: could not open {} ({}): {}; staying on static",
                    station.name,
                    station.locator(),
                    e
                );
                None
            }
        };
        self.active = Some(ActiveStation { idx, closer });
    }

    /// Stop any stream; no station tracked.
    pub fn clear_station(&mut self) {
        self.collect_retired();
        if self.active.is_some() {
            debug!("engine: clearing station");
        }
        self.close_active();
    }

    /// Re-derive gains from `strength` and `volume` and push them.
    pub fn set_ambient(&mut self, strength: u8, volume: f32) {
        self.collect_retired();
        let gains = compute_gains(strength, volume, self.powered, self.static_base_volume);
        if gains != self.gains {
            self.publish_gains(gains);
        }
    }

    /// Release handles the audio thread has finished with, then retry a
    /// stream change that found the queue full.
    pub fn collect_retired(&mut self) -> usize {
        let n = self.mixer.collect_retired();
        self.flush_pending();
        n
    }

    /// A stream change is still waiting for queue space.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn close_active(&mut self) {
        if let Some(active) = self.active.take() {
            if let Some(closer) = active.closer {
                closer.close();
                self.post(MixerCommand::Detach);
            }
        }
    }

    fn publish_gains(&mut self, gains: Gains) {
        self.gains = gains;
        self.mixer.set_gains(gains);
    }

    fn post(&mut self, cmd: MixerCommand) {
        self.flush_pending();
        if let Some(stale) = self.pending.replace(cmd) {
            debug!("engine: {:?} superseded before the mixer saw it", stale);
        }
        self.flush_pending();
        if let Some(cmd) = &self.pending {
            warn!("engine: mixer queue full, holding {:?}", cmd);
        }
    }

    fn flush_pending(&mut self) {
        if let Some(cmd) = self.pending.take() {
            if let Err(cmd) = self.mixer.send(cmd) {
                self.pending = Some(cmd);
            }
        }
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.close_active();
    }
}
