//! Station audio sources.
//!
//! Architecture:
//!
//! ```text
//!   control thread                         audio thread
//!   ──────────────                         ────────────
//!   StreamSource::open(station) ──Box<dyn StreamHandle>──► Mixer (read/levels)
//!         │                                                    │
//!         └─ StreamCloser::close()                             │
//!      drop(handle)  ◄─────────────── retired handle ──────────┘
//! ```
//!
//! Opening and closing happen on the control thread; `read` is called from
//! the audio callback and never blocks.  `open` hands back two halves: the
//! `StreamHandle` that moves to the audio thread and a `StreamCloser` that
//! stays with the caller, so a stream can be shut down immediately without
//! waiting for the audio thread to give its half back.
//!
//! Two implementations:
//!   - `ToneStream`  : synthesized carrier for stations without a URL.
//!   - `FfmpegStream`: ffmpeg decodes the URL to f32le stereo; a tokio task
//!                      feeds a lock-free ring consumed by `read`.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStdout, Command};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::error::{StreamError, StreamResult};
use crate::station::Station;

/// Streams are always interleaved stereo.
pub const STREAM_CHANNELS: usize = 2;

/// Opens handles for stations.  Implemented by the real decoder-backed
/// source and by test doubles.
pub trait StreamSource: Send {
    fn open(&mut self, station: &Station, sample_rate: u32) -> StreamResult<OpenedStream>;
}

/// Both halves of a freshly opened stream.
pub struct OpenedStream {
    pub handle: Box<dyn StreamHandle>,
    pub closer: StreamCloser,
}

/// Control-side release of a stream.  Closing is idempotent and also happens
/// on drop.
pub struct StreamCloser(Option<Box<dyn FnOnce() + Send>>);

impl StreamCloser {
    pub fn new(close: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(close)))
    }

    /// For sources that hold nothing worth releasing.
    pub fn noop() -> Self {
        Self(None)
    }

    pub fn close(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(close) = self.0.take() {
            close();
        }
    }
}

impl Drop for StreamCloser {
    fn drop(&mut self) {
        self.run();
    }
}

/// A live, decoded feed for one station.
pub trait StreamHandle: Send {
    fn locator(&self) -> &str;

    /// Write up to `out.len()` interleaved stereo samples.  Never blocks; the
    /// unfilled tail is zeroed.  Returns the number of real samples written.
    fn read(&mut self, out: &mut [f32]) -> usize;

    /// Peak levels of the last `read`, or `None` while no audio has arrived.
    fn instant_levels(&self) -> Option<(f32, f32)>;

    /// True once the feed has died on its own (network drop, decoder exit).
    fn has_failed(&self) -> bool;
}

/// Peak absolute value per channel of an interleaved stereo block.
pub fn stereo_peaks(samples: &[f32]) -> (f32, f32) {
    let mut left = 0.0f32;
    let mut right = 0.0f32;
    for frame in samples.chunks(STREAM_CHANNELS) {
        left = left.max(frame[0].abs());
        if let Some(r) = frame.get(1) {
            right = right.max(r.abs());
        }
    }
    (left.min(1.0), right.min(1.0))
}

// ── dispatching source ────────────────────────────────────────────────────────

/// The production source: tone for URL-less stations, ffmpeg otherwise.
/// Decoder tasks run on `runtime`.
pub struct StationStreamSource {
    ffmpeg_path: Option<PathBuf>,
    buffer_ms: u32,
    runtime: Handle,
}

impl StationStreamSource {
    pub fn new(ffmpeg_path: Option<PathBuf>, buffer_ms: u32, runtime: Handle) -> Self {
        Self {
            ffmpeg_path,
            buffer_ms,
            runtime,
        }
    }
}

impl StreamSource for StationStreamSource {
    fn open(&mut self, station: &Station, sample_rate: u32) -> StreamResult<OpenedStream> {
        match &station.stream_url {
            None => Ok(OpenedStream {
                handle: Box::new(ToneStream::new(station, sample_rate)),
                closer: StreamCloser::noop(),
            }),
            Some(url) => {
                let ffmpeg = self
                    .ffmpeg_path
                    .clone()
                    .filter(|p| p.exists())
                    .or_else(crate::platform::find_ffmpeg_binary)
                    .ok_or(StreamError::NoDecoder)?;
                FfmpegStream::spawn(&self.runtime, &ffmpeg, url, sample_rate, self.buffer_ms)
            }
        }
    }
}

// ── synthesized tone ──────────────────────────────────────────────────────────

const TONE_BASE_HZ: f32 = 220.0;
const TONE_HZ_PER_MHZ: f32 = 20.0;
const TONE_AMPLITUDE: f32 = 0.5;
/// Slow pulse of the carrier, in Hz.
const TONE_PULSE_HZ: f32 = 0.5;

pub struct ToneStream {
    locator: String,
    pitch_hz: f32,
    sample_rate: f32,
    phase: f32,
    pulse_phase: f32,
    levels: Option<(f32, f32)>,
}

impl ToneStream {
    pub fn new(station: &Station, sample_rate: u32) -> Self {
        Self {
            locator: station.locator(),
            pitch_hz: tone_pitch_hz(station.frequency_mhz),
            sample_rate: sample_rate.max(1) as f32,
            phase: 0.0,
            pulse_phase: 0.0,
            levels: None,
        }
    }
}

/// Carrier pitch for a station: higher on the dial, higher in pitch.
pub fn tone_pitch_hz(frequency_mhz: f32) -> f32 {
    TONE_BASE_HZ + (frequency_mhz - crate::tuner::FREQ_MIN_MHZ).max(0.0) * TONE_HZ_PER_MHZ
}

impl StreamHandle for ToneStream {
    fn locator(&self) -> &str {
        &self.locator
    }

    fn read(&mut self, out: &mut [f32]) -> usize {
        use std::f32::consts::TAU;
        let step = TAU * self.pitch_hz / self.sample_rate;
        let pulse_step = TAU * TONE_PULSE_HZ / self.sample_rate;
        for frame in out.chunks_mut(STREAM_CHANNELS) {
            let envelope = TONE_AMPLITUDE * (0.75 + 0.25 * self.pulse_phase.sin());
            let value = envelope * self.phase.sin();
            for sample in frame.iter_mut() {
                *sample = value;
            }
            self.phase = (self.phase + step) % TAU;
            self.pulse_phase = (self.pulse_phase + pulse_step) % TAU;
        }
        self.levels = Some(stereo_peaks(out));
        out.len()
    }

    fn instant_levels(&self) -> Option<(f32, f32)> {
        self.levels
    }

    fn has_failed(&self) -> bool {
        false
    }
}

// ── ffmpeg-backed stream ──────────────────────────────────────────────────────

/// Audio that must be queued before playback starts, to ride out jitter.
const PREBUFFER_MS: u32 = 250;
const READ_CHUNK_BYTES: usize = 4096;
/// Wait before retrying a push into a full ring.
const RING_FULL_BACKOFF: Duration = Duration::from_millis(5);

pub struct FfmpegStream {
    locator: String,
    consumer: rtrb::Consumer<f32>,
    /// Set by the decoder task when ffmpeg stops on its own.
    ended: Arc<AtomicBool>,
    prebuffer_samples: usize,
    primed: bool,
    levels: Option<(f32, f32)>,
}

impl FfmpegStream {
    /// Start ffmpeg on `url` and a decoder task on `runtime` feeding the
    /// ring.  The closer aborts the task, which drops the child and kills
    /// the process.
    pub fn spawn(
        runtime: &Handle,
        ffmpeg: &Path,
        url: &str,
        sample_rate: u32,
        buffer_ms: u32,
    ) -> StreamResult<OpenedStream> {
        let url = url.trim();
        if url.is_empty() {
            return Err(StreamError::InvalidLocator(url.to_string()));
        }

        let rate = sample_rate.to_string();
        info!("ffmpeg: opening {} at {} Hz", url, sample_rate);
        let _guard = runtime.enter();
        let mut child = Command::new(ffmpeg)
            .args([
                "-hide_banner",
                "-loglevel",
                "error",
                "-nostdin",
                "-fflags",
                "nobuffer",
                "-flags",
                "low_delay",
                "-probesize",
                "64k",
                "-analyzeduration",
                "200000",
                "-i",
                url,
                "-vn",
                "-ac",
                "2",
                "-ar",
                &rate,
                "-f",
                "f32le",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| StreamError::Spawn {
                locator: url.to_string(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| StreamError::MissingStdout(url.to_string()))?;

        let capacity = ring_capacity(sample_rate, buffer_ms);
        let (producer, consumer) = rtrb::RingBuffer::<f32>::new(capacity);
        let ended = Arc::new(AtomicBool::new(false));
        let task = runtime.spawn(run_decoder(
            child,
            stdout,
            producer,
            ended.clone(),
            url.to_string(),
        ));

        let abort = task.abort_handle();
        let locator = url.to_string();
        let closer = StreamCloser::new(move || {
            info!("ffmpeg: closing {}", locator);
            abort.abort();
        });
        let stream = Self::from_ring(
            url.to_string(),
            consumer,
            ended,
            ring_capacity(sample_rate, PREBUFFER_MS).min(capacity / 2),
        );
        Ok(OpenedStream {
            handle: Box::new(stream),
            closer,
        })
    }

    fn from_ring(
        locator: String,
        consumer: rtrb::Consumer<f32>,
        ended: Arc<AtomicBool>,
        prebuffer_samples: usize,
    ) -> Self {
        Self {
            locator,
            consumer,
            ended,
            prebuffer_samples,
            primed: false,
            levels: None,
        }
    }
}

/// Ring size in samples for `ms` of stereo audio.
fn ring_capacity(sample_rate: u32, ms: u32) -> usize {
    let frames = sample_rate as usize * ms.max(1) as usize / 1000;
    (frames * STREAM_CHANNELS).max(STREAM_CHANNELS * 1024)
}

/// Why the pump stopped.
#[derive(Debug, PartialEq, Eq)]
enum PumpEnd {
    /// The decoder closed its output.
    Eof,
    /// The stream handle was dropped; nobody is listening.
    Abandoned,
}

/// Owns the ffmpeg child for the life of the stream.  Aborting the task
/// drops the child, and `kill_on_drop` takes the process down with it.
async fn run_decoder(
    mut child: Child,
    stdout: ChildStdout,
    producer: rtrb::Producer<f32>,
    ended: Arc<AtomicBool>,
    locator: String,
) {
    match pump_pcm(stdout, producer).await {
        Ok(PumpEnd::Abandoned) => {
            debug!("ffmpeg: {} no longer read, stopping decoder", locator);
            return;
        }
        Ok(PumpEnd::Eof) => warn!("ffmpeg: stream {} ended", locator),
        Err(e) => warn!("ffmpeg: read error on {}: {}", locator, e),
    }
    ended.store(true, Ordering::Release);
    match child.wait().await {
        Ok(status) => debug!("ffmpeg: {} exited: {}", locator, status),
        Err(e) => debug!("ffmpeg: wait on {} failed: {}", locator, e),
    }
}

/// Pump decoded f32le bytes into the ring.  A sample split across two reads
/// is carried over; a trailing partial sample at EOF is discarded.
async fn pump_pcm<R: AsyncRead + Unpin>(
    mut reader: R,
    mut producer: rtrb::Producer<f32>,
) -> std::io::Result<PumpEnd> {
    let mut buf = vec![0u8; READ_CHUNK_BYTES];
    let mut carry = [0u8; 4];
    let mut carried = 0usize;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(PumpEnd::Eof);
        }

        let mut bytes = &buf[..n];
        if carried > 0 {
            let take = (4 - carried).min(bytes.len());
            carry[carried..carried + take].copy_from_slice(&bytes[..take]);
            carried += take;
            bytes = &bytes[take..];
            if carried < 4 {
                continue;
            }
            carried = 0;
            if !push_sample(&mut producer, f32::from_le_bytes(carry)).await {
                return Ok(PumpEnd::Abandoned);
            }
        }

        let mut words = bytes.chunks_exact(4);
        for w in &mut words {
            let sample = f32::from_le_bytes([w[0], w[1], w[2], w[3]]);
            if !push_sample(&mut producer, sample).await {
                return Ok(PumpEnd::Abandoned);
            }
        }
        let rest = words.remainder();
        carry[..rest.len()].copy_from_slice(rest);
        carried = rest.len();
    }
}

/// Returns false once the consumer is gone.
async fn push_sample(producer: &mut rtrb::Producer<f32>, sample: f32) -> bool {
    let mut value = sample;
    loop {
        if producer.is_abandoned() {
            return false;
        }
        match producer.push(value) {
            Ok(()) => return true,
            Err(rtrb::PushError::Full(v)) => {
                value = v;
                tokio::time::sleep(RING_FULL_BACKOFF).await;
            }
        }
    }
}

impl StreamHandle for FfmpegStream {
    fn locator(&self) -> &str {
        &self.locator
    }

    fn read(&mut self, out: &mut [f32]) -> usize {
        let available = self.consumer.slots();
        if !self.primed {
            if available < self.prebuffer_samples && !self.ended.load(Ordering::Acquire) {
                out.fill(0.0);
                return 0;
            }
            self.primed = true;
        }

        // Keep frames whole so left/right never swap.
        let wanted = out.len().min(available);
        let wanted = wanted - wanted % STREAM_CHANNELS;
        let mut written = 0;
        if wanted > 0 {
            if let Ok(chunk) = self.consumer.read_chunk(wanted) {
                let (first, second) = chunk.as_slices();
                out[..first.len()].copy_from_slice(first);
                out[first.len()..first.len() + second.len()].copy_from_slice(second);
                written = first.len() + second.len();
                chunk.commit_all();
            }
        }
        out[written..].fill(0.0);

        if written > 0 {
            self.levels = Some(stereo_peaks(&out[..written]));
        } else if self.levels.is_some() {
            self.levels = Some((0.0, 0.0));
        }
        written
    }

    fn instant_levels(&self) -> Option<(f32, f32)> {
        self.levels
    }

    fn has_failed(&self) -> bool {
        // A lone trailing sample can never make a whole frame.
        self.ended.load(Ordering::Acquire) && self.consumer.slots() < STREAM_CHANNELS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone_station() -> Station {
        Station::new(20.0, "Tone", "", None)
    }

    #[test]
    fn tone_pitch_rises_with_frequency() {
        assert_eq!(tone_pitch_hz(10.0), 220.0);
        assert_eq!(tone_pitch_hz(20.0), 420.0);
        assert!(tone_pitch_hz(34.0) > tone_pitch_hz(33.0));
    }

    #[test]
    fn tone_fills_whole_buffer_and_reports_levels() {
        let mut tone = ToneStream::new(&tone_station(), 48_000);
        assert_eq!(tone.instant_levels(), None);
        let mut buf = vec![0.0f32; 2048];
        assert_eq!(tone.read(&mut buf), 2048);
        let (l, r) = tone.instant_levels().unwrap();
        assert!(l > 0.2 && l <= TONE_AMPLITUDE);
        assert_eq!(l, r);
        assert!(buf.iter().all(|s| s.abs() <= TONE_AMPLITUDE));
        assert!(!tone.has_failed());
        assert_eq!(tone.locator(), "tone://20.00");
    }

    #[test]
    fn tone_channels_are_identical() {
        let mut tone = ToneStream::new(&tone_station(), 44_100);
        let mut buf = vec![0.0f32; 64];
        tone.read(&mut buf);
        for frame in buf.chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
    }

    #[test]
    fn stereo_peaks_per_channel() {
        let block = [0.1, -0.4, -0.3, 0.2, 0.05, 0.0];
        assert_eq!(stereo_peaks(&block), (0.3, 0.4));
        assert_eq!(stereo_peaks(&[]), (0.0, 0.0));
    }

    #[tokio::test]
    async fn tone_source_needs_no_decoder() {
        let mut source = StationStreamSource::new(
            Some(PathBuf::from("/nonexistent/ffmpeg")),
            500,
            Handle::current(),
        );
        let opened = source.open(&tone_station(), 48_000).unwrap();
        assert!(opened.handle.locator().starts_with("tone://"));
        opened.closer.close();
    }

    #[test]
    fn closer_runs_exactly_once() {
        use std::sync::atomic::AtomicUsize;
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let closer = StreamCloser::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        closer.close();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let c = count.clone();
        drop(StreamCloser::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_url_is_invalid() {
        let err = FfmpegStream::spawn(&Handle::current(), Path::new("ffmpeg"), "  ", 48_000, 500)
            .err()
            .unwrap();
        assert!(matches!(err, StreamError::InvalidLocator(_)));
    }

    fn le_bytes(samples: &[f32]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn drain(consumer: &mut rtrb::Consumer<f32>) -> Vec<f32> {
        std::iter::from_fn(|| consumer.pop().ok()).collect()
    }

    #[tokio::test]
    async fn pump_reassembles_samples_split_across_reads() {
        let bytes = le_bytes(&[0.25, -0.5, 0.75]);
        // 3 bytes, then 5, then the rest plus a stray partial sample.
        let mut tail = bytes[8..].to_vec();
        tail.extend_from_slice(&[0xAA, 0xBB]);
        let reader = (&bytes[..3]).chain(&bytes[3..8]).chain(&tail[..]);

        let (producer, mut consumer) = rtrb::RingBuffer::new(16);
        let end = pump_pcm(reader, producer).await.unwrap();
        assert_eq!(end, PumpEnd::Eof);
        assert_eq!(drain(&mut consumer), vec![0.25, -0.5, 0.75]);
    }

    #[tokio::test]
    async fn pump_stops_when_the_stream_is_dropped() {
        let bytes = le_bytes(&[0.1; 8]);
        let (producer, consumer) = rtrb::RingBuffer::new(2);
        drop(consumer);
        let end = pump_pcm(&bytes[..], producer).await.unwrap();
        assert_eq!(end, PumpEnd::Abandoned);
    }

    fn ring_stream(prebuffer: usize) -> (FfmpegStream, rtrb::Producer<f32>, Arc<AtomicBool>) {
        let (producer, consumer) = rtrb::RingBuffer::new(64);
        let ended = Arc::new(AtomicBool::new(false));
        let stream =
            FfmpegStream::from_ring("http://test".into(), consumer, ended.clone(), prebuffer);
        (stream, producer, ended)
    }

    #[test]
    fn read_waits_for_prebuffer() {
        let (mut stream, mut producer, _ended) = ring_stream(8);
        for _ in 0..6 {
            producer.push(0.5).unwrap();
        }
        let mut out = vec![1.0f32; 8];
        assert_eq!(stream.read(&mut out), 0);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(stream.instant_levels(), None);

        for _ in 0..4 {
            producer.push(0.5).unwrap();
        }
        assert_eq!(stream.read(&mut out), 8);
        assert!(out.iter().all(|&s| s == 0.5));
        assert_eq!(stream.instant_levels(), Some((0.5, 0.5)));
    }

    #[test]
    fn read_keeps_frames_whole() {
        let (mut stream, mut producer, _ended) = ring_stream(0);
        for s in [0.1, -0.2, 0.3, -0.4, 0.5] {
            producer.push(s).unwrap();
        }
        let mut out = vec![9.0f32; 8];
        assert_eq!(stream.read(&mut out), 4);
        assert_eq!(&out[..4], &[0.1, -0.2, 0.3, -0.4]);
        assert!(out[4..].iter().all(|&s| s == 0.0));

        // The odd sample waits for its partner.
        producer.push(-0.6).unwrap();
        assert_eq!(stream.read(&mut out), 2);
        assert_eq!(&out[..2], &[0.5, -0.6]);
    }

    #[test]
    fn ended_decoder_fails_once_drained() {
        let (mut stream, mut producer, ended) = ring_stream(100);
        for s in [0.2, 0.2, 0.2] {
            producer.push(s).unwrap();
        }
        ended.store(true, Ordering::Release);
        assert!(!stream.has_failed());

        // An ended decoder flushes what it has without waiting to prime.
        let mut out = vec![0.0f32; 8];
        assert_eq!(stream.read(&mut out), 2);
        assert!(stream.has_failed());
    }

    #[test]
    fn ring_capacity_has_floor() {
        assert_eq!(ring_capacity(48_000, 1000), 96_000);
        assert_eq!(ring_capacity(8_000, 1), 2048);
    }
}
