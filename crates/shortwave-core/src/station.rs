use serde::Deserialize;
use std::path::Path;

use crate::tuner::{FREQ_MAX_MHZ, FREQ_MIN_MHZ};

/// A fixed point on the dial.  Loaded once at startup and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub frequency_mhz: f32,
    pub name: String,
    /// Short blurb shown under the name once the signal is readable.
    pub description: String,
    /// Opaque stream URL handed to the decoder.  `None` means the station is
    /// rendered as a synthesized tone.
    pub stream_url: Option<String>,
}

impl Station {
    pub fn new(frequency_mhz: f32, name: &str, description: &str, stream_url: Option<&str>) -> Self {
        Self {
            frequency_mhz,
            name: name.to_string(),
            description: description.to_string(),
            stream_url: stream_url.map(str::to_string),
        }
    }

    /// Locator string for logging and display; tone stations get a pseudo-URL.
    pub fn locator(&self) -> String {
        match &self.stream_url {
            Some(url) => url.clone(),
            None => format!("tone://{:.2}", self.frequency_mhz),
        }
    }
}

/// Ordered registry of known stations.  Order matters: nearest-station
/// lookup keeps the earlier entry on equal distance.
#[derive(Debug, Clone, Default)]
pub struct StationTable {
    stations: Vec<Station>,
}

impl StationTable {
    pub fn new(stations: Vec<Station>) -> Self {
        Self { stations }
    }

    /// The table shipped with the binary, used when no station file exists.
    pub fn builtin() -> Self {
        Self::new(vec![
            Station::new(
                11.85,
                "Radio Paradise",
                "Eclectic mix of rock, world and electronica",
                Some("https://stream.radioparadise.com/mp3-128"),
            ),
            Station::new(
                13.41,
                "Number Station",
                "Repeating tones of unknown origin",
                None,
            ),
            Station::new(
                15.77,
                "Groove Salad",
                "Ambient downtempo beats and grooves",
                Some("https://ice1.somafm.com/groovesalad-128-mp3"),
            ),
            Station::new(
                17.64,
                "Drone Zone",
                "Atmospheric textures with minimal beats",
                Some("https://ice1.somafm.com/dronezone-128-mp3"),
            ),
            Station::new(
                21.52,
                "Time Signal",
                "Carrier tone from a distant beacon",
                None,
            ),
            Station::new(
                25.90,
                "Secret Agent",
                "Soundtrack for your stylish, mysterious life",
                Some("https://ice1.somafm.com/secretagent-128-mp3"),
            ),
            Station::new(
                29.30,
                "Deep Space One",
                "Deep ambient electronic and space music",
                Some("https://ice1.somafm.com/deepspaceone-128-mp3"),
            ),
            Station::new(
                32.15,
                "Weather Beacon",
                "Slow pulsing test carrier",
                None,
            ),
        ])
    }

    /// Load the station file if it exists, otherwise fall back to the
    /// built-in table.
    pub fn load_or_builtin(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let table = load_stations_from_toml(path)?;
            tracing::info!(
                "Loaded {} stations from {}",
                table.len(),
                path.display()
            );
            Ok(table)
        } else {
            let table = Self::builtin();
            tracing::info!(
                "No station file at {}, using {} built-in stations",
                path.display(),
                table.len()
            );
            Ok(table)
        }
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn get(&self, idx: usize) -> Option<&Station> {
        self.stations.get(idx)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

// ── TOML station loader ───────────────────────────────────────────────────────

/// Matches the `[[station]]` array in the station file.  Kept apart from
/// `Station` so the file schema can change without touching the engine types.
#[derive(Debug, Deserialize)]
struct TomlStationFile {
    #[serde(default)]
    station: Vec<TomlStation>,
}

#[derive(Debug, Deserialize)]
struct TomlStation {
    frequency: f32,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    url: String,
}

pub fn load_stations_from_toml(path: &Path) -> anyhow::Result<StationTable> {
    let content = std::fs::read_to_string(path)?;
    parse_stations_from_toml_str(&content)
}

pub fn parse_stations_from_toml_str(content: &str) -> anyhow::Result<StationTable> {
    let file: TomlStationFile = toml::from_str(content)?;
    let mut stations = Vec::with_capacity(file.station.len());
    for s in file.station {
        if !(FREQ_MIN_MHZ..=FREQ_MAX_MHZ).contains(&s.frequency) {
            anyhow::bail!(
                "station {:?} at {} MHz is outside the {}-{} MHz band",
                s.name,
                s.frequency,
                FREQ_MIN_MHZ,
                FREQ_MAX_MHZ
            );
        }
        let url = s.url.trim();
        stations.push(Station {
            frequency_mhz: s.frequency,
            name: s.name,
            description: s.description,
            stream_url: if url.is_empty() {
                None
            } else {
                Some(url.to_string())
            },
        });
    }
    Ok(StationTable::new(stations))
}
