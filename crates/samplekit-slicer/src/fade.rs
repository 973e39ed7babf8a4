//! Fade curves understood by the host.

use crate::{Error, Result};
use core::fmt;
use core::str::FromStr;

/// The host's seven fade curve shapes, identified by code `0..=6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum FadeShape {
    Linear,
    #[default]
    SmoothUp,
    SmoothDown,
    HardUp,
    HardDown,
    SmoothSpline,
    HardSpline,
}

impl FadeShape {
    pub const ALL: [FadeShape; 7] = [
        FadeShape::Linear,
        FadeShape::SmoothUp,
        FadeShape::SmoothDown,
        FadeShape::HardUp,
        FadeShape::HardDown,
        FadeShape::SmoothSpline,
        FadeShape::HardSpline,
    ];

    /// Host curve code.
    pub fn code(self) -> u8 {
        match self {
            FadeShape::Linear => 0,
            FadeShape::SmoothUp => 1,
            FadeShape::SmoothDown => 2,
            FadeShape::HardUp => 3,
            FadeShape::HardDown => 4,
            FadeShape::SmoothSpline => 5,
            FadeShape::HardSpline => 6,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        Self::ALL
            .get(code as usize)
            .copied()
            .ok_or_else(|| Error::Host(format!("unknown fade shape code {}", code)))
    }

    pub fn label(self) -> &'static str {
        match self {
            FadeShape::Linear => "flat",
            FadeShape::SmoothUp => "smooth up",
            FadeShape::SmoothDown => "smooth down",
            FadeShape::HardUp => "hard up",
            FadeShape::HardDown => "hard down",
            FadeShape::SmoothSpline => "smooth spline",
            FadeShape::HardSpline => "hard spline",
        }
    }

    /// Fade-in gain at normalized position `t` (clamped to `[0, 1]`).
    ///
    /// Every curve is monotonic with `gain(0) == 0` and `gain(1) == 1`.
    /// A fade-out plays the curve backwards: `gain(1 - t)`.
    pub fn gain(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            FadeShape::Linear => t,
            FadeShape::SmoothUp => 1.0 - (1.0 - t).powi(2),
            FadeShape::SmoothDown => t * t,
            FadeShape::HardUp => 1.0 - (1.0 - t).powi(4),
            FadeShape::HardDown => t.powi(4),
            FadeShape::SmoothSpline => t * t * (3.0 - 2.0 * t),
            FadeShape::HardSpline => t * t * t * (t * (6.0 * t - 15.0) + 10.0),
        }
    }
}

impl fmt::Display for FadeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FadeShape {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flat" | "linear" => Ok(FadeShape::Linear),
            "smooth up" => Ok(FadeShape::SmoothUp),
            "smooth down" => Ok(FadeShape::SmoothDown),
            // "har up" is how older project files spell it
            "hard up" | "har up" => Ok(FadeShape::HardUp),
            "hard down" => Ok(FadeShape::HardDown),
            "smooth spline" => Ok(FadeShape::SmoothSpline),
            "hard spline" => Ok(FadeShape::HardSpline),
            other => Err(Error::Host(format!("unknown fade shape '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum FadeDirection {
    In,
    Out,
}

/// Fade applied to one edge of an item.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Fade {
    pub direction: FadeDirection,
    /// Length in seconds.
    pub length: f64,
    pub shape: FadeShape,
}

impl Fade {
    pub fn fade_in(length: f64, shape: FadeShape) -> Self {
        Self {
            direction: FadeDirection::In,
            length,
            shape,
        }
    }

    pub fn fade_out(length: f64, shape: FadeShape) -> Self {
        Self {
            direction: FadeDirection::Out,
            length,
            shape,
        }
    }

    /// Gain at `pos` seconds from the start of an item of `item_length`.
    pub fn gain_at(&self, pos: f64, item_length: f64) -> f64 {
        if self.length <= 0.0 {
            return 1.0;
        }
        match self.direction {
            FadeDirection::In => self.shape.gain(pos / self.length),
            FadeDirection::Out => self.shape.gain((item_length - pos) / self.length),
        }
    }
}
