//! Error types for samplekit-core.

use thiserror::Error;

/// Error type for analysis and data-model operations.
///
/// Every variant is scoped to a single call. Nothing here is retried: the
/// analysis is deterministic, so the same input fails the same way.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Buffer is empty or shorter than one analysis frame")]
    EmptyBuffer,

    #[error("Value {value} is outside the function domain")]
    Domain { value: f64 },

    #[error("Invalid direction: {0}. Expected 'left' or 'right'")]
    InvalidDirection(String),

    #[error("Invalid time unit: {0}")]
    InvalidUnit(String),

    #[error("No frame crosses the RMS target {target}")]
    NoCrossing { target: f64 },

    #[error("Closest correlation {achieved:.4} is below minimum {required:.4}")]
    LoopNotFound { achieved: f64, required: f64 },

    #[error("Pitch tracking failed: {0}")]
    PitchTracking(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid bounds: start={start}, end={end}")]
    InvalidBounds { start: f64, end: f64 },

    #[error("Invalid note: {0}")]
    InvalidNote(String),
}

impl Error {
    /// Stable code for the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::EmptyBuffer => "EMPTY_BUFFER",
            Error::Domain { .. } => "DOMAIN",
            Error::InvalidDirection(_) => "INVALID_DIRECTION",
            Error::InvalidUnit(_) => "INVALID_UNIT",
            Error::NoCrossing { .. } => "NO_CROSSING",
            Error::LoopNotFound { .. } => "LOOP_NOT_FOUND",
            Error::PitchTracking(_) => "PITCH_TRACKING",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::InvalidBounds { .. } => "INVALID_BOUNDS",
            Error::InvalidNote(_) => "INVALID_NOTE",
        }
    }

    /// `true` for the "no good loop here" outcome, as opposed to bad input.
    pub fn is_loop_not_found(&self) -> bool {
        matches!(self, Error::LoopNotFound { .. })
    }

    /// `true` when the caller supplied degenerate or unrecognized input.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::EmptyBuffer
                | Error::Domain { .. }
                | Error::InvalidDirection(_)
                | Error::InvalidUnit(_)
                | Error::InvalidConfig(_)
                | Error::InvalidBounds { .. }
                | Error::InvalidNote(_)
        )
    }
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
