//! Time units and scan directions.
//!
//! Lengths and offsets travel as plain `f64` values tagged with a
//! [`TimeUnit`]. Conversions to samples and frames truncate toward zero,
//! frames are `hop_length` samples apart.

use crate::{Error, Result};
use core::fmt;
use core::str::FromStr;

/// Unit used to interpret a scalar length or offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum TimeUnit {
    Samples,
    Milliseconds,
    Seconds,
    /// Analysis frames, `hop_length` samples apart.
    Frames,
}

impl TimeUnit {
    /// Convert `value` from `from` into `to`.
    ///
    /// `hop_length` is only consulted when either side is [`TimeUnit::Frames`]
    /// and must then be non-zero.
    pub fn convert(
        value: f64,
        from: TimeUnit,
        to: TimeUnit,
        sample_rate: u32,
        hop_length: usize,
    ) -> Result<f64> {
        if from == to {
            return Ok(value);
        }
        if sample_rate == 0 {
            return Err(Error::InvalidConfig("sample_rate must be positive".into()));
        }
        if (from == TimeUnit::Frames || to == TimeUnit::Frames) && hop_length == 0 {
            return Err(Error::InvalidUnit(
                "frame conversion requires a non-zero hop_length".into(),
            ));
        }

        let sr = sample_rate as f64;
        let samples = match from {
            TimeUnit::Samples => value,
            TimeUnit::Milliseconds => (value / 1000.0 * sr).trunc(),
            TimeUnit::Seconds => (value * sr).trunc(),
            TimeUnit::Frames => value * hop_length as f64,
        };

        Ok(match to {
            TimeUnit::Samples => samples,
            TimeUnit::Milliseconds => samples / sr * 1000.0,
            TimeUnit::Seconds => samples / sr,
            TimeUnit::Frames => (samples / hop_length as f64).floor(),
        })
    }

    /// Convert to a sample count (non-negative, truncated).
    pub fn to_samples(self, value: f64, sample_rate: u32, hop_length: usize) -> Result<usize> {
        let samples = Self::convert(value, self, TimeUnit::Samples, sample_rate, hop_length)?;
        Ok(samples.max(0.0) as usize)
    }

    /// Convert to a frame count (non-negative, floored).
    pub fn to_frames(self, value: f64, sample_rate: u32, hop_length: usize) -> Result<usize> {
        let frames = Self::convert(value, self, TimeUnit::Frames, sample_rate, hop_length)?;
        Ok(frames.max(0.0) as usize)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Samples => "samples",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "seconds",
            TimeUnit::Frames => "frames",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "samples" | "sample" | "spl" => Ok(TimeUnit::Samples),
            "ms" | "milliseconds" => Ok(TimeUnit::Milliseconds),
            "s" | "sec" | "seconds" => Ok(TimeUnit::Seconds),
            "frames" | "frame" => Ok(TimeUnit::Frames),
            other => Err(Error::InvalidUnit(other.to_string())),
        }
    }
}

/// Scan direction over a sequence of frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum Direction {
    /// From the end toward the start.
    Left,
    /// From the start toward the end.
    #[default]
    Right,
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "reverse" => Ok(Direction::Left),
            "right" | "forward" => Ok(Direction::Right),
            other => Err(Error::InvalidDirection(other.to_string())),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Left => f.write_str("left"),
            Direction::Right => f.write_str("right"),
        }
    }
}
