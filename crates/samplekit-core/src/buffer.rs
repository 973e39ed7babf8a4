//! Mono audio buffer handed to the analysis functions.

use crate::{Error, Result};

/// Immutable mono sample buffer with a known sample rate.
///
/// Analysis functions only borrow it for the duration of a call.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Create a buffer from mono samples.
    ///
    /// Fails with [`Error::InvalidConfig`] when `sample_rate` is zero.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(Error::InvalidConfig("sample_rate must be positive".into()));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Sum several equally long channels into one mono buffer.
    ///
    /// Shorter channels are treated as zero-padded.
    pub fn from_channels(channels: &[Vec<f32>], sample_rate: u32) -> Result<Self> {
        let len = channels.iter().map(Vec::len).max().unwrap_or(0);
        let mut mono = vec![0.0f32; len];
        for channel in channels {
            for (out, &s) in mono.iter_mut().zip(channel.iter()) {
                *out += s;
            }
        }
        Self::new(mono, sample_rate)
    }

    /// Sum interleaved frames into mono.
    pub fn from_interleaved(interleaved: &[f32], channels: usize, sample_rate: u32) -> Result<Self> {
        if channels == 0 {
            return Err(Error::InvalidConfig("channel count must be positive".into()));
        }
        let mono = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum())
            .collect();
        Self::new(mono, sample_rate)
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Absolute peak amplitude, 0.0 for an empty buffer.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// Borrow `[start, end)`.
    pub fn slice(&self, start: usize, end: usize) -> Result<&[f32]> {
        if start > end || end > self.samples.len() {
            return Err(Error::InvalidBounds {
                start: start as f64,
                end: end as f64,
            });
        }
        Ok(&self.samples[start..end])
    }

    /// Copy `[start, end)` into a new buffer with the same sample rate.
    pub fn sub_buffer(&self, start: usize, end: usize) -> Result<AudioBuffer> {
        let slice = self.slice(start, end)?;
        Ok(Self {
            samples: slice.to_vec(),
            sample_rate: self.sample_rate,
        })
    }

    /// Scale every sample (item/take volume in the host).
    pub fn scaled(mut self, gain: f32) -> Self {
        for s in &mut self.samples {
            *s *= gain;
        }
        self
    }

    /// Sample index to seconds.
    #[inline]
    pub fn samples_to_secs(&self, samples: usize) -> f64 {
        samples as f64 / self.sample_rate as f64
    }

    /// Seconds to sample index, truncating toward zero.
    #[inline]
    pub fn secs_to_samples(&self, secs: f64) -> usize {
        (secs * self.sample_rate as f64).max(0.0) as usize
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}
