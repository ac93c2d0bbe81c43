mod action;
mod app;
mod output;
mod theme;
mod widgets;

use anyhow::Context;
use tracing::{info, warn};

use shortwave_core::config::Config;
use shortwave_core::platform;
use shortwave_core::{
    AudioEngine, DragScale, StationStreamSource, StationTable, TunerState, TuningController,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let log_path = data_dir.join("shortwave.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Allow RUST_LOG override.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,shortwave_core=debug,shortwave_tui=debug".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    // Print log path to stderr so the operator can tail it immediately.
    eprintln!("shortwave log: {}", log_path.display());

    info!("shortwave starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let config_path = Config::config_path();
    let config = match Config::load_from(&config_path) {
        Ok(config) => {
            info!("config: {}", config_path.display());
            config
        }
        Err(e) => {
            warn!("config {} unreadable ({}), using defaults", config_path.display(), e);
            Config::default()
        }
    };

    // ── Stations ─────────────────────────────────────────────────────────────
    let table = StationTable::load_or_builtin(&config.stations.stations_toml)?;

    // ── Audio device ─────────────────────────────────────────────────────────
    let (output, mixer) =
        output::start(&config.audio).context("audio output device unavailable")?;
    info!(
        "output: {} ({} Hz, {} ch)",
        output.device_name(),
        output.sample_rate(),
        output.channels()
    );

    // ── Engine + controller ──────────────────────────────────────────────────
    let source = StationStreamSource::new(
        config.stream.ffmpeg_path.clone(),
        config.stream.buffer_ms,
        tokio::runtime::Handle::current(),
    );
    let engine = AudioEngine::new(
        mixer,
        Box::new(source),
        output.sample_rate(),
        config.audio.static_base_volume,
    );
    let state = TunerState::new(
        config.tuner.initial_frequency_mhz,
        config.tuner.initial_volume,
    );
    // The dial sensitivity follows the dial width and is set at first draw.
    let controller = TuningController::new(table, state, engine).with_drag_scale(DragScale {
        volume_per_unit: config.tuner.knob_volume_per_cell,
        ..DragScale::default()
    });

    // ── Run TUI ──────────────────────────────────────────────────────────────
    app::App::new(controller).run().await?;

    drop(output);
    info!("shortwave stopped");
    Ok(())
}
