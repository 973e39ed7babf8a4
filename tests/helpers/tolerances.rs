//! Tolerance constants for audio testing.
//!
//! Different operations require different precision levels.

/// Floating point rounding errors (dB round trips, exact gain).
pub const FLOAT_EPSILON: f32 = 1e-6;

/// Timeline positions and lengths in seconds.
pub const POSITION_EPSILON: f64 = 1e-9;

/// Correlation required of a loop cut from a pure tone.
pub const TONE_CORRELATION: f64 = 0.99;

/// Silence threshold (~-80dB).
/// Values below this are considered silent.
pub const SILENCE_THRESHOLD: f32 = 0.0001;

/// 16-bit quantization step size.
/// Use when testing bit-depth conversion to 16-bit.
pub const INT16_EPSILON: f32 = 1.0 / 32768.0;
