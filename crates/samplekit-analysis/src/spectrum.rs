//! Short-time spectra
//!
//! Centered, Hann-windowed power spectrogram used by onset detection.
//! Frame `t` is centered on sample `t * hop_length`; the signal is zero
//! padded by `n_fft / 2` on both sides.

use rustfft::{num_complex::Complex, FftPlanner};
use samplekit_core::{Error, Result};

/// Periodic Hann window of `size` samples.
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let angle = 2.0 * core::f32::consts::PI * i as f32 / size as f32;
            0.5 * (1.0 - angle.cos())
        })
        .collect()
}

/// Power spectrogram, `frames x (n_fft / 2 + 1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    frames: Vec<Vec<f32>>,
    n_fft: usize,
    hop_length: usize,
}

impl Spectrogram {
    /// Compute the centered power spectrogram of `samples`.
    pub fn power(samples: &[f32], n_fft: usize, hop_length: usize) -> Result<Self> {
        if n_fft < 2 || hop_length == 0 {
            return Err(Error::InvalidConfig(format!(
                "n_fft ({}) must be at least 2 and hop_length ({}) positive",
                n_fft, hop_length
            )));
        }
        if samples.is_empty() {
            return Err(Error::EmptyBuffer);
        }

        let pad = n_fft / 2;
        let mut padded = vec![0.0f32; samples.len() + 2 * pad];
        padded[pad..pad + samples.len()].copy_from_slice(samples);

        let num_frames = 1 + (padded.len() - n_fft) / hop_length;
        let bins = n_fft / 2 + 1;
        let window = hann_window(n_fft);
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);

        let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];
        let mut frames = Vec::with_capacity(num_frames);
        for t in 0..num_frames {
            let start = t * hop_length;
            for ((slot, &s), &w) in buffer
                .iter_mut()
                .zip(&padded[start..start + n_fft])
                .zip(&window)
            {
                *slot = Complex::new(s * w, 0.0);
            }
            fft.process(&mut buffer);
            frames.push(buffer[..bins].iter().map(|c| c.norm_sqr()).collect());
        }

        Ok(Self {
            frames,
            n_fft,
            hop_length,
        })
    }

    /// Convert power to dB in place: `10 * log10(max(p, 1e-10))`, floored at
    /// `max - top_db`.
    pub fn to_db(&mut self, top_db: f32) {
        let mut peak = f32::NEG_INFINITY;
        for frame in &mut self.frames {
            for p in frame.iter_mut() {
                *p = 10.0 * p.max(1e-10).log10();
                peak = peak.max(*p);
            }
        }
        let floor = peak - top_db;
        for frame in &mut self.frames {
            for p in frame.iter_mut() {
                *p = p.max(floor);
            }
        }
    }

    #[inline]
    pub fn frames(&self) -> &[Vec<f32>] {
        &self.frames
    }

    #[inline]
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    /// Center frequency of `bin` in Hz.
    pub fn bin_frequency(&self, bin: usize, sample_rate: u32) -> f64 {
        bin as f64 * sample_rate as f64 / self.n_fft as f64
    }
}
