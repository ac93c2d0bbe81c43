//! Audio-callback side of the engine.
//!
//! ```text
//!   AudioEngine (control thread)              Mixer (audio thread)
//!   ────────────────────────────              ────────────────────
//!   MixerHandle::set_gains/set_running ─────► MixerControls (atomics)
//!   MixerHandle::send(Attach|Detach) ──rtrb─► drain commands
//!                                             noise + stream → out
//!   MixerHandle::collect_retired() ◄──rtrb─── retired stream handles
//!   MixerLevels (atomics) ◄────────────────── VU, running, stream flags
//! ```
//!
//! Power and gains are plain values, so they travel through atomics and can
//! never be lost to a full queue.  Only stream handles need the queue.
//!
//! The mixer never allocates in the steady state, never locks and never
//! drops a stream itself: replaced handles travel back to the control
//! thread to be dropped there.  A command is only applied while the retire
//! queue has room for the handle it may displace.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crate::noise::StaticNoiseGenerator;
use crate::stream::{stereo_peaks, StreamHandle, STREAM_CHANNELS};

/// Interleaved stereo throughout; the device layer maps to its own layout.
pub const MIXER_CHANNELS: usize = STREAM_CHANNELS;

pub const COMMAND_QUEUE_CAPACITY: usize = 64;
/// Every queued command can displace at most one handle, plus the one a
/// failed or stopped stream gives up.
pub const RETIRED_QUEUE_CAPACITY: usize = COMMAND_QUEUE_CAPACITY + 1;
/// Pre-sized scratch for stream reads (frames).  Grows only if a device asks
/// for a bigger buffer.
const SCRATCH_FRAMES: usize = 8192;

/// EMA weight of the newest VU reading.
const VU_ATTACK: f32 = 0.7;
/// Maximum share of static in the VU reading while a stream plays.
const VU_STATIC_WEIGHT: f32 = 0.3;

/// Registered with the host audio API; called once per device buffer.
pub trait AudioCallback: Send {
    /// Fill `out` (interleaved stereo) and return the number of samples
    /// written.
    fn produce(&mut self, out: &mut [f32]) -> usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Gains {
    pub static_gain: f32,
    pub stream_gain: f32,
}

impl Gains {
    pub const SILENT: Gains = Gains {
        static_gain: 0.0,
        stream_gain: 0.0,
    };

    /// Both gains in one word so the audio thread never sees half an update.
    fn pack(self) -> u64 {
        ((self.static_gain.to_bits() as u64) << 32) | self.stream_gain.to_bits() as u64
    }

    fn unpack(bits: u64) -> Self {
        Self {
            static_gain: f32::from_bits((bits >> 32) as u32),
            stream_gain: f32::from_bits(bits as u32),
        }
    }
}

/// Stream changes posted from the control thread.
pub enum MixerCommand {
    /// Replace the current stream (if any) with this one.
    Attach(Box<dyn StreamHandle>),
    /// Drop the current stream; static only.
    Detach,
}

impl std::fmt::Debug for MixerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MixerCommand::Attach(h) => write!(f, "Attach({})", h.locator()),
            MixerCommand::Detach => write!(f, "Detach"),
        }
    }
}

// ── shared atomics ────────────────────────────────────────────────────────────

fn load_f32(a: &AtomicU32) -> f32 {
    f32::from_bits(a.load(Ordering::Relaxed))
}

fn store_f32(a: &AtomicU32, v: f32) {
    a.store(v.to_bits(), Ordering::Relaxed);
}

/// Settings the control thread publishes for the mixer.  Written only by
/// `MixerHandle`.
#[derive(Debug, Default)]
struct MixerControls {
    gains: AtomicU64,
    running: AtomicBool,
    /// Bumped on every power-on so the mixer can reset even if it never
    /// observed the preceding power-off.
    starts: AtomicU64,
}

/// State the audio thread publishes for the UI.  Written only by the mixer.
#[derive(Debug, Default)]
pub struct MixerLevels {
    vu_left: AtomicU32,
    vu_right: AtomicU32,
    running: AtomicBool,
    stream_active: AtomicBool,
    stream_failed: AtomicBool,
    callbacks: AtomicU64,
}

impl MixerLevels {
    /// Smoothed VU levels, each 0..=1.
    pub fn vu(&self) -> (f32, f32) {
        (load_f32(&self.vu_left), load_f32(&self.vu_right))
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// A stream is attached and feeding the mix.
    pub fn stream_active(&self) -> bool {
        self.stream_active.load(Ordering::Relaxed)
    }

    /// The last attached stream died on its own and was dropped from the mix.
    pub fn stream_failed(&self) -> bool {
        self.stream_failed.load(Ordering::Relaxed)
    }

    /// Number of audio callbacks served so far.
    pub fn callbacks(&self) -> u64 {
        self.callbacks.load(Ordering::Relaxed)
    }
}

// ── control-side handle ───────────────────────────────────────────────────────

/// Control-thread end of the mixer queues.
pub struct MixerHandle {
    commands: rtrb::Producer<MixerCommand>,
    retired: rtrb::Consumer<Box<dyn StreamHandle>>,
    controls: Arc<MixerControls>,
    levels: Arc<MixerLevels>,
}

impl MixerHandle {
    /// Post a stream change.  Gives it back if the queue is full (audio
    /// thread stalled).
    pub fn send(&mut self, cmd: MixerCommand) -> Result<(), MixerCommand> {
        self.commands.push(cmd).map_err(|e| match e {
            rtrb::PushError::Full(value) => value,
        })
    }

    /// Takes effect on the next callback; never fails.
    pub fn set_gains(&self, gains: Gains) {
        self.controls.gains.store(gains.pack(), Ordering::Relaxed);
    }

    /// Power the mixer on or off.  Off silences the output and releases the
    /// stream; on restarts the static.
    pub fn set_running(&self, running: bool) {
        if running {
            self.controls.starts.fetch_add(1, Ordering::Relaxed);
        }
        self.controls.running.store(running, Ordering::Release);
    }

    /// Drop every handle the mixer has let go of.  Returns how many.
    pub fn collect_retired(&mut self) -> usize {
        let mut n = 0;
        while let Ok(handle) = self.retired.pop() {
            tracing::debug!("mixer: released {}", handle.locator());
            drop(handle);
            n += 1;
        }
        n
    }

    pub fn levels(&self) -> &MixerLevels {
        &self.levels
    }
}

/// Create the two ends of a mixer for a device running at `sample_rate`.
pub fn mixer_channel(sample_rate: u32) -> (MixerHandle, Mixer) {
    mixer_channel_with_noise(StaticNoiseGenerator::new(sample_rate, MIXER_CHANNELS))
}

pub fn mixer_channel_with_noise(noise: StaticNoiseGenerator) -> (MixerHandle, Mixer) {
    let (cmd_tx, cmd_rx) = rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY);
    let (retired_tx, retired_rx) = rtrb::RingBuffer::new(RETIRED_QUEUE_CAPACITY);
    let controls = Arc::new(MixerControls::default());
    let levels = Arc::new(MixerLevels::default());

    let handle = MixerHandle {
        commands: cmd_tx,
        retired: retired_rx,
        controls: Arc::clone(&controls),
        levels: Arc::clone(&levels),
    };
    let mixer = Mixer {
        commands: cmd_rx,
        retired: retired_tx,
        noise,
        stream: None,
        gains: Gains::SILENT,
        running: false,
        starts_seen: 0,
        vu: (0.0, 0.0),
        controls,
        levels,
        scratch: vec![0.0; SCRATCH_FRAMES * MIXER_CHANNELS],
    };
    (handle, mixer)
}

// ── audio-side mixer ──────────────────────────────────────────────────────────

pub struct Mixer {
    commands: rtrb::Consumer<MixerCommand>,
    retired: rtrb::Producer<Box<dyn StreamHandle>>,
    noise: StaticNoiseGenerator,
    stream: Option<Box<dyn StreamHandle>>,
    gains: Gains,
    running: bool,
    starts_seen: u64,
    vu: (f32, f32),
    controls: Arc<MixerControls>,
    levels: Arc<MixerLevels>,
    scratch: Vec<f32>,
}

impl Mixer {
    /// Gains used by the last callback.
    pub fn gains(&self) -> Gains {
        self.gains
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// Pick up power and gain changes from the control thread.
    fn sync_controls(&mut self) {
        let starts = self.controls.starts.load(Ordering::Relaxed);
        self.running = self.controls.running.load(Ordering::Acquire);
        if starts != self.starts_seen {
            self.starts_seen = starts;
            self.noise.reset();
            self.levels.stream_failed.store(false, Ordering::Relaxed);
        }
        self.gains = Gains::unpack(self.controls.gains.load(Ordering::Relaxed));
    }

    /// Apply queued stream changes while there is room to hand back what
    /// they displace.
    fn drain_commands(&mut self) {
        while self.retired.slots() > 0 {
            let Ok(cmd) = self.commands.pop() else {
                break;
            };
            match cmd {
                MixerCommand::Attach(handle) => {
                    self.retire_stream();
                    self.stream = Some(handle);
                }
                MixerCommand::Detach => {
                    self.retire_stream();
                }
            }
            self.levels.stream_failed.store(false, Ordering::Relaxed);
        }
    }

    /// Hand the current stream back to the control thread.  Keeps it when
    /// the retire queue is full; it is tried again next callback.
    fn retire_stream(&mut self) -> bool {
        let Some(handle) = self.stream.take() else {
            return true;
        };
        match self.retired.push(handle) {
            Ok(()) => true,
            Err(rtrb::PushError::Full(handle)) => {
                self.stream = Some(handle);
                false
            }
        }
    }

    fn publish_vu(&mut self, instant: (f32, f32)) {
        self.vu.0 = VU_ATTACK * instant.0 + (1.0 - VU_ATTACK) * self.vu.0;
        self.vu.1 = VU_ATTACK * instant.1 + (1.0 - VU_ATTACK) * self.vu.1;
        store_f32(&self.levels.vu_left, self.vu.0.clamp(0.0, 1.0));
        store_f32(&self.levels.vu_right, self.vu.1.clamp(0.0, 1.0));
    }
}

impl AudioCallback for Mixer {
    fn produce(&mut self, out: &mut [f32]) -> usize {
        self.sync_controls();
        self.drain_commands();
        self.levels.callbacks.fetch_add(1, Ordering::Relaxed);
        self.levels.running.store(self.running, Ordering::Relaxed);

        if !self.running {
            self.retire_stream();
            out.fill(0.0);
            self.levels.stream_active.store(false, Ordering::Relaxed);
            self.publish_vu((0.0, 0.0));
            return out.len();
        }

        // Static is always rendered while powered on.
        self.noise.fill(out, self.gains.static_gain);
        let static_levels = stereo_peaks(out);

        if self.stream.as_ref().is_some_and(|s| s.has_failed()) && self.retire_stream() {
            self.levels.stream_failed.store(true, Ordering::Relaxed);
        }

        let mut instant = static_levels;
        if let Some(stream) = self.stream.as_mut().filter(|s| !s.has_failed()) {
            if self.scratch.len() < out.len() {
                self.scratch.resize(out.len(), 0.0);
            }
            let scratch = &mut self.scratch[..out.len()];
            stream.read(scratch);
            let gain = self.gains.stream_gain;
            for (o, s) in out.iter_mut().zip(scratch.iter()) {
                *o += s * gain;
            }
            let (sl, sr) = stream.instant_levels().unwrap_or((0.0, 0.0));
            instant = (
                (sl * gain + VU_STATIC_WEIGHT * static_levels.0).min(1.0),
                (sr * gain + VU_STATIC_WEIGHT * static_levels.1).min(1.0),
            );
        }
        self.levels
            .stream_active
            .store(self.stream.is_some(), Ordering::Relaxed);

        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
        self.publish_vu(instant);
        out.len()
    }
}
