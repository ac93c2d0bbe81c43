use thiserror::Error;

/// Failures opening a station stream.  None of these are fatal: the engine
/// logs them and keeps playing static.
#[derive(Error, Debug)]
pub enum StreamError {
    /// ffmpeg could not be located.
    #[error("no decoder available: ffmpeg binary not found")]
    NoDecoder,

    /// The decoder process failed to start.
    #[error("failed to spawn decoder for {locator}: {source}")]
    Spawn {
        locator: String,
        #[source]
        source: std::io::Error,
    },

    /// The decoder started without a readable stdout.
    #[error("decoder for {0} has no stdout pipe")]
    MissingStdout(String),

    /// The locator is empty or not something the decoder understands.
    #[error("invalid stream locator: {0:?}")]
    InvalidLocator(String),
}

pub type StreamResult<T> = Result<T, StreamError>;
