//! Test helpers and fixtures for samplekit integration tests
//!
//! Signals are synthetic and deterministic so expected loop points, onsets
//! and root notes are known in advance.
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): Exact operations (dB round trips, scaling)
//! - `POSITION_EPSILON` (1e-9): Timeline positions in seconds
//! - `INT16_EPSILON`: 16-bit quantization step

#![allow(dead_code)]

pub mod tolerances;

use std::path::Path;
use samplekit::prelude::*;

/// Default test sample rate
pub const TEST_SAMPLE_RATE: u32 = 22050;

/// Create a session for an instrument with default settings.
pub fn test_session(instrument: &str) -> AudioSession {
    AudioSession::builder()
        .instrument(instrument)
        .build()
        .expect("Failed to create test session")
}

/// Generate a test signal: sine wave at given frequency for specified samples.
pub fn generate_sine(frequency: f64, sample_rate: u32, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            (2.0 * std::f64::consts::PI * frequency * t).sin() as f32
        })
        .collect()
}

/// Generate silence (zero samples).
pub fn generate_silence(num_samples: usize) -> Vec<f32> {
    vec![0.0; num_samples]
}

/// Generate white noise (random samples in -1..1).
pub fn generate_noise(num_samples: usize, seed: u64) -> Vec<f32> {
    // Simple LCG for reproducible "random" noise
    let mut rng = seed;
    (0..num_samples)
        .map(|_| {
            rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((rng >> 33) as f32 / u32::MAX as f32) * 4.0 - 1.0
        })
        .collect()
}

/// Generate single-sample clicks at the given positions.
pub fn generate_clicks(num_samples: usize, positions: &[usize]) -> Vec<f32> {
    let mut samples = vec![0.0; num_samples];
    for &p in positions {
        if p < num_samples {
            samples[p] = 1.0;
        }
    }
    samples
}

/// Decaying plucks of `frequency` starting at each of `hits` (seconds).
pub fn generate_plucks(frequency: f64, sample_rate: u32, duration_secs: f64, hits: &[f64]) -> Vec<f32> {
    let sr = sample_rate as f64;
    let mut samples = vec![0.0f32; (duration_secs * sr) as usize];
    for &hit in hits {
        let start = (hit * sr) as usize;
        for i in 0..(0.4 * sr) as usize {
            let Some(out) = samples.get_mut(start + i) else {
                break;
            };
            let t = i as f64 / sr;
            *out = (0.8 * (-12.0 * t).exp() * (2.0 * std::f64::consts::PI * frequency * t).sin()) as f32;
        }
    }
    samples
}

/// Silence, a steady note of `sustain_secs`, then silence.
pub fn generate_sustain(frequency: f64, sample_rate: u32, lead_secs: f64, sustain_secs: f64) -> Vec<f32> {
    let lead = (lead_secs * sample_rate as f64) as usize;
    let mut samples = generate_silence(lead);
    samples.extend(
        generate_sine(frequency, sample_rate, (sustain_secs * sample_rate as f64) as usize)
            .into_iter()
            .map(|s| 0.3 * s),
    );
    samples.extend(generate_silence(lead));
    samples
}

/// Wrap samples into a buffer.
pub fn buffer(samples: Vec<f32>, sample_rate: u32) -> AudioBuffer {
    AudioBuffer::new(samples, sample_rate).expect("Failed to create buffer")
}

/// Calculate RMS of a signal.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Calculate peak amplitude of a signal.
pub fn peak(samples: &[f32]) -> f32 {
    samples
        .iter()
        .map(|s| s.abs())
        .fold(0.0_f32, |a, b| a.max(b))
}

/// Assert that a signal is approximately silent (all values near zero).
pub fn assert_silence(samples: &[f32], tolerance: f32) {
    let max = peak(samples);
    assert!(
        max <= tolerance,
        "Expected silence, but peak amplitude was {}",
        max
    );
}

/// Assert that a signal has content (not silent).
pub fn assert_has_audio(samples: &[f32], min_rms: f32) {
    let r = rms(samples);
    assert!(
        r >= min_rms,
        "Expected audio content with RMS >= {}, but RMS was {}",
        min_rms,
        r
    );
}

/// Largest sample-to-sample jump, a cheap detector for clicks at cut points.
pub fn max_step(samples: &[f32]) -> f32 {
    samples
        .windows(2)
        .map(|w| (w[1] - w[0]).abs())
        .fold(0.0_f32, f32::max)
}

/// Write mono 16-bit samples to a WAV file.
pub fn write_wav_i16(path: &Path, samples: &[f32], sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("Failed to create WAV");
    for &s in samples {
        let value = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(value).expect("Failed to write sample");
    }
    writer.finalize().expect("Failed to finalize WAV");
}

/// Install a tracing subscriber honoring `RUST_LOG`; repeated calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
