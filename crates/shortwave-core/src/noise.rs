//! Static noise: uniform white noise with a slow breathing multiplier.
//!
//! The multiplier is three superposed sines of elapsed time so the static
//! floor never sounds frozen.  Elapsed time is counted in rendered frames,
//! which tracks wall-clock time while the device is running.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// (angular rate in rad/s, amplitude)
const WOBBLE: [(f64, f32); 3] = [(1.3, 0.03), (3.7, 0.02), (5.9, 0.015)];

pub struct StaticNoiseGenerator {
    rng: SmallRng,
    sample_rate: u32,
    channels: usize,
    frames_rendered: u64,
}

impl StaticNoiseGenerator {
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        Self::with_rng(SmallRng::from_entropy(), sample_rate, channels)
    }

    /// Deterministic generator for tests.
    pub fn seeded(seed: u64, sample_rate: u32, channels: usize) -> Self {
        Self::with_rng(SmallRng::seed_from_u64(seed), sample_rate, channels)
    }

    fn with_rng(rng: SmallRng, sample_rate: u32, channels: usize) -> Self {
        Self {
            rng,
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
            frames_rendered: 0,
        }
    }

    pub fn reset(&mut self) {
        self.frames_rendered = 0;
    }

    /// Fill an interleaved buffer with noise at `gain`.  Each channel gets
    /// independent samples.
    pub fn fill(&mut self, out: &mut [f32], gain: f32) {
        let channels = self.channels;
        let mut frame_idx = self.frames_rendered;
        for frame in out.chunks_mut(channels) {
            let t = frame_idx as f64 / self.sample_rate as f64;
            let scale = gain * wobble(t);
            for sample in frame.iter_mut() {
                *sample = self.rng.gen_range(-1.0f32..=1.0) * scale;
            }
            frame_idx += 1;
        }
        self.frames_rendered = frame_idx;
    }
}

/// Volume multiplier at `t` seconds; stays within 1 ± 0.065.
pub fn wobble(t: f64) -> f32 {
    let mut m = 1.0f32;
    for (rate, amp) in WOBBLE {
        m += amp * (rate * t).sin() as f32;
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wobble_stays_near_unity() {
        for i in 0..10_000 {
            let m = wobble(i as f64 * 0.01);
            assert!((0.93..=1.07).contains(&m), "m={m}");
        }
        assert_eq!(wobble(0.0), 1.0);
    }

    #[test]
    fn zero_gain_is_silent() {
        let mut gen = StaticNoiseGenerator::seeded(7, 48_000, 2);
        let mut buf = vec![1.0f32; 512];
        gen.fill(&mut buf, 0.0);
        assert!(buf.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn samples_are_bounded_by_gain() {
        let mut gen = StaticNoiseGenerator::seeded(1, 44_100, 2);
        let mut buf = vec![0.0f32; 4096];
        gen.fill(&mut buf, 0.5);
        let bound = 0.5 * 1.07;
        assert!(buf.iter().all(|s| s.abs() <= bound));
        // White noise at this gain should not be all near zero.
        let peak = buf.iter().fold(0.0f32, |a, s| a.max(s.abs()));
        assert!(peak > 0.25);
    }

    #[test]
    fn clock_advances_per_frame() {
        let mut gen = StaticNoiseGenerator::seeded(3, 1_000, 2);
        let mut buf = vec![0.0f32; 200];
        gen.fill(&mut buf, 1.0);
        assert_eq!(gen.frames_rendered, 100);
        gen.reset();
        assert_eq!(gen.frames_rendered, 0);
    }

    #[test]
    fn same_seed_same_noise() {
        let mut a = StaticNoiseGenerator::seeded(42, 48_000, 2);
        let mut b = StaticNoiseGenerator::seeded(42, 48_000, 2);
        let mut buf_a = vec![0.0f32; 256];
        let mut buf_b = vec![0.0f32; 256];
        a.fill(&mut buf_a, 0.8);
        b.fill(&mut buf_b, 0.8);
        assert_eq!(buf_a, buf_b);
    }
}
