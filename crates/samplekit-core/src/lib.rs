//! # samplekit-core
//!
//! Data model shared by the samplekit crates:
//! - [`AudioBuffer`]: mono samples plus sample rate, borrowed by analysis calls
//! - [`TimeUnit`] and [`Direction`]: tagged scalars and scan direction
//! - [`LoopCandidate`], [`OnsetEvent`], [`RegionBounds`]: computed positions
//! - note-name helpers and the error type
//!
//! ```rust
//! use samplekit_core::{AudioBuffer, TimeUnit};
//!
//! let buffer = AudioBuffer::new(vec![0.0; 44100], 44100).unwrap();
//! let hop = TimeUnit::Seconds.to_frames(0.5, buffer.sample_rate(), 512).unwrap();
//! assert_eq!(hop, 43);
//! ```

pub mod buffer;
pub mod error;
pub mod note;
pub mod region;
pub mod units;

pub use buffer::AudioBuffer;
pub use error::{Error, Result};
pub use note::{freq_to_midi, hz_to_note, midi_to_freq, midi_to_note, note_to_hz, note_to_midi};
pub use region::{LoopCandidate, OnsetEvent, RegionBounds};
pub use units::{Direction, TimeUnit};
