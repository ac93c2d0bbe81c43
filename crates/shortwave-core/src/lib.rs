//! Core of the shortwave tuner: station table, signal model, static and
//! stream audio sources, the mixer that runs on the audio thread and the
//! controller that ties user input to all of it.

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod mixer;
pub mod noise;
pub mod platform;
pub mod signal;
pub mod station;
pub mod stream;
pub mod tuner;

pub use controller::{DragScale, DragState, DragTarget, TuningController};
pub use engine::{compute_gains, AudioEngine};
pub use error::{StreamError, StreamResult};
pub use mixer::{mixer_channel, AudioCallback, Gains, Mixer, MixerHandle, MixerLevels};
pub use signal::SignalReading;
pub use station::{Station, StationTable};
pub use stream::{StationStreamSource, StreamHandle, StreamSource};
pub use tuner::{Step, TunerState};
