use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub tuner: TunerConfig,
    #[serde(default)]
    pub stations: StationsConfig,
    #[serde(default)]
    pub stream: StreamConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Output device name.  `None` picks the host default.
    #[serde(default)]
    pub device: Option<String>,
    /// Requested device buffer in frames.  `None` lets the host decide.
    #[serde(default)]
    pub buffer_frames: Option<u32>,
    /// Scale applied to static before volume.
    #[serde(default = "default_static_base_volume")]
    pub static_base_volume: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunerConfig {
    #[serde(default = "default_initial_frequency")]
    pub initial_frequency_mhz: f32,
    #[serde(default = "default_initial_volume")]
    pub initial_volume: f32,
    /// Volume moved per terminal cell of vertical drag on the knob.
    #[serde(default = "default_knob_volume_per_cell")]
    pub knob_volume_per_cell: f32,
}

/// Where the station table comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationsConfig {
    /// Local TOML station file.  Defaults to `$CONFIG/shortwave/stations.toml`;
    /// the built-in table is used when it does not exist.
    #[serde(default = "default_stations_toml")]
    pub stations_toml: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Explicit ffmpeg binary; otherwise `FFMPEG_PATH`, beside the exe, PATH.
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
    /// Decoded audio held between the decoder and the audio callback.
    #[serde(default = "default_buffer_ms")]
    pub buffer_ms: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            buffer_frames: None,
            static_base_volume: default_static_base_volume(),
        }
    }
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            initial_frequency_mhz: default_initial_frequency(),
            initial_volume: default_initial_volume(),
            knob_volume_per_cell: default_knob_volume_per_cell(),
        }
    }
}

impl Default for StationsConfig {
    fn default() -> Self {
        Self {
            stations_toml: default_stations_toml(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            buffer_ms: default_buffer_ms(),
        }
    }
}

fn default_static_base_volume() -> f32 {
    0.8
}

fn default_initial_frequency() -> f32 {
    15.0
}

fn default_initial_volume() -> f32 {
    0.5
}

fn default_knob_volume_per_cell() -> f32 {
    0.05
}

fn default_buffer_ms() -> u32 {
    2000
}

fn default_stations_toml() -> PathBuf {
    platform::config_dir().join("stations.toml")
}

impl Config {
    /// Read the config file if present.  Nothing is ever written back.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.audio.static_base_volume, 0.8);
        assert_eq!(config.audio.device, None);
        assert_eq!(config.tuner.initial_frequency_mhz, 15.0);
        assert_eq!(config.tuner.initial_volume, 0.5);
        assert_eq!(config.stream.buffer_ms, 2000);
        assert!(config
            .stations
            .stations_toml
            .ends_with("shortwave/stations.toml"));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.tuner.knob_volume_per_cell, 0.05);
        assert!(!dir.path().join("config.toml").exists());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[audio]\ndevice = \"USB DAC\"\n\n[tuner]\ninitial_volume = 0.9"
        )
        .unwrap();
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.audio.device.as_deref(), Some("USB DAC"));
        assert_eq!(config.audio.static_base_volume, 0.8);
        assert_eq!(config.tuner.initial_volume, 0.9);
        assert_eq!(config.tuner.initial_frequency_mhz, 15.0);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[tuner\ninitial_volume = ").unwrap();
        assert!(Config::load_from(file.path()).is_err());
    }
}
