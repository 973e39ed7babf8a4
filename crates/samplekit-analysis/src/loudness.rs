//! Loudness analysis
//!
//! Whole-buffer RMS, framed RMS and its median (a per-region loudness
//! fingerprint), and threshold crossings over the framed RMS curve.
//!
//! Frames are not centered: frame `f` covers
//! `[f * hop_length, f * hop_length + frame_length)`.

use samplekit_core::{Direction, Error, Result};

/// Framing parameters for RMS curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct LoudnessConfig {
    pub frame_length: usize,
    pub hop_length: usize,
}

impl Default for LoudnessConfig {
    fn default() -> Self {
        Self {
            frame_length: 2048,
            hop_length: 512,
        }
    }
}

impl LoudnessConfig {
    pub fn new(frame_length: usize, hop_length: usize) -> Self {
        Self {
            frame_length,
            hop_length,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_length == 0 {
            return Err(Error::InvalidConfig("frame_length must be positive".into()));
        }
        if self.hop_length == 0 {
            return Err(Error::InvalidConfig("hop_length must be positive".into()));
        }
        Ok(())
    }

    /// Number of whole frames that fit in `len` samples.
    pub fn frame_count(&self, len: usize) -> usize {
        if len < self.frame_length || self.hop_length == 0 {
            0
        } else {
            (len - self.frame_length) / self.hop_length + 1
        }
    }
}

/// `20 * log10(amplitude)`, failing for non-positive amplitudes.
pub fn amplitude_to_db(amplitude: f64) -> Result<f64> {
    if !(amplitude > 0.0) {
        return Err(Error::Domain { value: amplitude });
    }
    Ok(20.0 * amplitude.log10())
}

/// `10^(db / 20)`.
#[inline]
pub fn db_to_amplitude(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Root-mean-square of the whole slice.
pub fn rms(samples: &[f32]) -> Result<f64> {
    if samples.is_empty() {
        return Err(Error::EmptyBuffer);
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    Ok((sum_sq / samples.len() as f64).sqrt())
}

/// RMS of every frame.
///
/// Fails with [`Error::EmptyBuffer`] when the slice is shorter than one frame.
pub fn frame_rms(samples: &[f32], config: &LoudnessConfig) -> Result<Vec<f64>> {
    config.validate()?;
    let count = config.frame_count(samples.len());
    if count == 0 {
        return Err(Error::EmptyBuffer);
    }

    // Prefix sums of squares keep each frame O(1).
    let mut cum_sq = Vec::with_capacity(samples.len() + 1);
    cum_sq.push(0.0f64);
    let mut acc = 0.0f64;
    for &s in samples {
        acc += (s as f64) * (s as f64);
        cum_sq.push(acc);
    }

    let n = config.frame_length as f64;
    Ok((0..count)
        .map(|f| {
            let start = f * config.hop_length;
            let energy = cum_sq[start + config.frame_length] - cum_sq[start];
            (energy.max(0.0) / n).sqrt()
        })
        .collect())
}

/// Median of the framed RMS curve.
pub fn median_rms(samples: &[f32], config: &LoudnessConfig) -> Result<f64> {
    let mut frames = frame_rms(samples, config)?;
    median(&mut frames).ok_or(Error::EmptyBuffer)
}

/// Numeric median, averaging the two middle values for even counts.
pub(crate) fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Parameters of a threshold-crossing scan.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct CrossingQuery {
    /// RMS level to compare every frame against.
    pub target: f64,
    pub direction: Direction,
    /// Match frames `<= target` instead of `>= target`.
    pub below: bool,
    /// Require the next frame in scan order to match too.
    pub want_trend: bool,
    pub start_offset: Option<usize>,
    pub end_offset: Option<usize>,
}

impl CrossingQuery {
    /// First frame at or above `target`, scanning left to right.
    pub fn above(target: f64) -> Self {
        Self {
            target,
            direction: Direction::Right,
            below: false,
            want_trend: false,
            start_offset: None,
            end_offset: None,
        }
    }

    /// First frame at or below `target`, scanning left to right.
    pub fn below(target: f64) -> Self {
        Self {
            below: true,
            ..Self::above(target)
        }
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_trend(mut self, want_trend: bool) -> Self {
        self.want_trend = want_trend;
        self
    }

    /// Restrict the scan to `[start, end)` samples.
    pub fn range(mut self, start: Option<usize>, end: Option<usize>) -> Self {
        self.start_offset = start;
        self.end_offset = end;
        self
    }

    #[inline]
    fn matches(&self, value: f64) -> bool {
        if self.below {
            value <= self.target
        } else {
            value >= self.target
        }
    }
}

/// Frame that satisfied a [`CrossingQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Crossing {
    /// Frame index within the scanned range.
    pub frame: usize,
    /// Absolute sample position.
    ///
    /// Right scans report the frame's leading edge, left scans its
    /// trailing edge (clipped to the range end).
    pub sample: usize,
}

/// Scan the framed RMS of `samples` for the first frame meeting `query`.
pub fn first_crossing(
    samples: &[f32],
    query: &CrossingQuery,
    config: &LoudnessConfig,
) -> Result<Crossing> {
    let start = query.start_offset.unwrap_or(0);
    let end = query.end_offset.unwrap_or(samples.len());
    if start >= end || end > samples.len() {
        return Err(Error::InvalidBounds {
            start: start as f64,
            end: end as f64,
        });
    }

    let range = &samples[start..end];
    let frames = frame_rms(range, config)?;
    let count = frames.len();

    let order: Box<dyn Iterator<Item = usize>> = match query.direction {
        Direction::Right => Box::new(0..count),
        Direction::Left => Box::new((0..count).rev()),
    };
    let next_in_scan = |f: usize| -> Option<usize> {
        match query.direction {
            Direction::Right => (f + 1 < count).then_some(f + 1),
            Direction::Left => f.checked_sub(1),
        }
    };

    for frame in order {
        if !query.matches(frames[frame]) {
            continue;
        }
        if query.want_trend {
            match next_in_scan(frame) {
                Some(next) if query.matches(frames[next]) => {}
                _ => continue,
            }
        }

        let sample = match query.direction {
            Direction::Right => start + frame * config.hop_length,
            Direction::Left => start + ((frame + 1) * config.hop_length).min(range.len()),
        };
        tracing::debug!(
            frame,
            sample,
            rms = frames[frame],
            target = query.target,
            direction = %query.direction,
            "RMS crossing found"
        );
        return Ok(Crossing { frame, sample });
    }

    Err(Error::NoCrossing {
        target: query.target,
    })
}
