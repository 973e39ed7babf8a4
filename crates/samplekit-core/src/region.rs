//! Computed positions: loop candidates, onset events and region bounds.

use crate::{Error, Result};

/// Candidate loop point inside a buffer.
///
/// Valid only when `start_sample < end_sample <= buffer_len`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct LoopCandidate {
    pub start_sample: usize,
    pub end_sample: usize,
    pub correlation: f64,
}

impl LoopCandidate {
    pub fn new(start_sample: usize, end_sample: usize, correlation: f64) -> Self {
        Self {
            start_sample,
            end_sample,
            correlation,
        }
    }

    /// Check against the length of the buffer the candidate was found in.
    pub fn validate(&self, buffer_len: usize) -> Result<()> {
        if self.start_sample >= self.end_sample || self.end_sample > buffer_len {
            return Err(Error::InvalidBounds {
                start: self.start_sample as f64,
                end: self.end_sample as f64,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end_sample.saturating_sub(self.start_sample)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Detected onset and the energy-rise point it was backtracked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct OnsetEvent {
    pub onset_sample: usize,
    /// Always `<= onset_sample`.
    pub backtrack_sample: usize,
}

impl OnsetEvent {
    pub fn new(onset_sample: usize, backtrack_sample: usize) -> Self {
        Self {
            onset_sample,
            backtrack_sample: backtrack_sample.min(onset_sample),
        }
    }
}

/// Region bounds in seconds, `start < end`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct RegionBounds {
    start: f64,
    end: f64,
}

impl RegionBounds {
    pub fn new(start: f64, end: f64) -> Result<Self> {
        if !(start < end) || !start.is_finite() || !end.is_finite() {
            return Err(Error::InvalidBounds { start, end });
        }
        Ok(Self { start, end })
    }

    #[inline]
    pub fn start(&self) -> f64 {
        self.start
    }

    #[inline]
    pub fn end(&self) -> f64 {
        self.end
    }

    #[inline]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, pos: f64) -> bool {
        pos >= self.start && pos < self.end
    }

    pub fn overlaps(&self, other: &RegionBounds) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Shift both edges by `offset` seconds.
    pub fn shifted(&self, offset: f64) -> Self {
        Self {
            start: self.start + offset,
            end: self.end + offset,
        }
    }
}
