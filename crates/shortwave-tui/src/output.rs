//! Audio device output.
//!
//! Opens a cpal output stream and moves the [`Mixer`] into its callback.  The
//! mixer renders interleaved stereo; the callback maps that onto whatever
//! channel count and sample format the device wants.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use thiserror::Error;
use tracing::{debug, error, info};

use shortwave_core::config::AudioConfig;
use shortwave_core::mixer::{mixer_channel, MIXER_CHANNELS};
use shortwave_core::{AudioCallback, Mixer, MixerHandle};

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("no audio output device available")]
    NoDevice,

    #[error("audio device not found: {0}")]
    DeviceNotFound(String),

    #[error("failed to get device config: {0}")]
    Config(String),

    #[error("failed to build audio stream: {0}")]
    Build(String),

    #[error("failed to start audio stream: {0}")]
    Play(String),

    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),
}

/// Keeps the device stream alive.  Dropping it stops audio.
pub struct AudioOutput {
    _stream: Stream,
    sample_rate: u32,
    channels: u16,
    device_name: String,
}

impl AudioOutput {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

/// Open the configured device and start the mixer on it.  Returns the
/// output plus the control end of the mixer.
pub fn start(config: &AudioConfig) -> Result<(AudioOutput, MixerHandle), AudioError> {
    let host = cpal::default_host();
    let device = match &config.device {
        Some(name) => find_device(&host, name)?,
        None => host.default_output_device().ok_or(AudioError::NoDevice)?,
    };
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    info!("using audio device: {}", device_name);

    let supported = device
        .default_output_config()
        .map_err(|e| AudioError::Config(e.to_string()))?;
    let sample_format = supported.sample_format();
    let mut stream_config: StreamConfig = supported.into();
    if let Some(frames) = config.buffer_frames {
        stream_config.buffer_size = cpal::BufferSize::Fixed(frames);
    }
    let sample_rate = stream_config.sample_rate.0;
    let channels = stream_config.channels;
    info!(
        "audio config: {} channels, {}Hz, {:?}, buffer {:?}",
        channels, sample_rate, sample_format, stream_config.buffer_size
    );

    let (handle, mixer) = mixer_channel(sample_rate);
    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, mixer)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, mixer)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, mixer)?,
        other => return Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
    };
    stream
        .play()
        .map_err(|e| AudioError::Play(e.to_string()))?;
    debug!("audio stream started");

    Ok((
        AudioOutput {
            _stream: stream,
            sample_rate,
            channels,
            device_name,
        },
        handle,
    ))
}

fn find_device(host: &cpal::Host, name: &str) -> Result<cpal::Device, AudioError> {
    let devices = host
        .output_devices()
        .map_err(|e| AudioError::Config(e.to_string()))?;
    for device in devices {
        if device.name().map(|n| n == name).unwrap_or(false) {
            return Ok(device);
        }
    }
    Err(AudioError::DeviceNotFound(name.to_string()))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut mixer: Mixer,
) -> Result<Stream, AudioError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    // Grown once if the device asks for more than this.
    let mut stereo: Vec<f32> = vec![0.0; 4096 * MIXER_CHANNELS];

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels.max(1);
                let needed = frames * MIXER_CHANNELS;
                if stereo.len() < needed {
                    stereo.resize(needed, 0.0);
                }
                let stereo = &mut stereo[..needed];
                mixer.produce(stereo);
                write_frames(data, channels, stereo);
            },
            |err| error!("audio stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::Build(e.to_string()))
}

/// Map interleaved stereo onto `channels` device channels.  Mono devices get
/// the average; extra channels are silent.
fn write_frames<T>(data: &mut [T], channels: usize, stereo: &[f32])
where
    T: SizedSample + FromSample<f32>,
{
    if channels == 0 {
        return;
    }
    for (frame, lr) in data
        .chunks_mut(channels)
        .zip(stereo.chunks(MIXER_CHANNELS))
    {
        let (l, r) = (lr[0], lr.get(1).copied().unwrap_or(lr[0]));
        if channels == 1 {
            frame[0] = T::from_sample(0.5 * (l + r));
            continue;
        }
        frame[0] = T::from_sample(l);
        frame[1] = T::from_sample(r);
        for sample in frame.iter_mut().skip(2) {
            *sample = T::from_sample(0.0f32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stereo_passes_through() {
        let mut out = [0.0f32; 4];
        write_frames(&mut out, 2, &[0.1, -0.2, 0.3, -0.4]);
        assert_eq!(out, [0.1, -0.2, 0.3, -0.4]);
    }

    #[test]
    fn mono_device_gets_average() {
        let mut out = [0.0f32; 2];
        write_frames(&mut out, 1, &[0.2, 0.4, -1.0, 1.0]);
        assert!((out[0] - 0.3).abs() < 1e-6);
        assert_eq!(out[1], 0.0);
    }

    #[test]
    fn surround_extras_are_silent() {
        let mut out = [9.0f32; 8];
        write_frames(&mut out, 4, &[0.5, 0.25, -0.5, -0.25]);
        assert_eq!(out, [0.5, 0.25, 0.0, 0.0, -0.5, -0.25, 0.0, 0.0]);
    }

    #[test]
    fn integer_formats_convert() {
        let mut out = [0i16; 2];
        write_frames(&mut out, 2, &[1.0, -1.0]);
        assert_eq!(out[0], i16::MAX);
        assert!(out[1] <= -i16::MAX);
    }
}
