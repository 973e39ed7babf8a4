//! # samplekit - Sample Library Editing Toolkit
//!
//! Finds loop points, loudness levels and note boundaries in mono recordings
//! and turns them into named regions of a host project.
//!
//! ## Architecture
//!
//! samplekit is an umbrella crate that coordinates:
//! - **samplekit-core** - Data model (buffers, time units, region bounds, note names)
//! - **samplekit-analysis** - Loudness, loop correlation search, onset and pitch boundaries
//! - **samplekit-slicer** - Host editing trait, loop cuts, articulation strategies, region naming
//!
//! ## Quick Start
//!
//! ```ignore
//! use samplekit::prelude::*;
//!
//! let session = AudioSession::builder()
//!     .instrument("cello")
//!     .build()?;
//!
//! let buffer = samplekit::wav::load_mono("cello_C3_ff.wav")?;
//! let mut host = MemoryHost::new(buffer);
//! let items = host.items();
//!
//! // Loop the sustain of one long note
//! let region = session.make_loop(&mut host, items[0])?;
//!
//! // Or cut short notes into round robins
//! session.run_articulation(&mut host, "shorts", &metadata! {}, "cut", items.clone())?;
//! let regions = session.run_articulation(&mut host, "shorts", &metadata! {}, "regions", host.items())?;
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - WAV input
//! - `wav` - WAV loading through hound
//! - `serialization` - serde derives on configs and data types

/// Re-export of samplekit-core for direct access
pub use samplekit_core as core;

pub use samplekit_analysis as analysis;
pub use samplekit_slicer as slicer;

// Data model
pub use samplekit_core::{
    hz_to_note, note_to_hz, AudioBuffer, Direction, LoopCandidate, OnsetEvent, RegionBounds,
    TimeUnit,
};

// Analysis
pub use samplekit_analysis::{
    amplitude_to_db, db_to_amplitude, AnalysisHandle, Crossing, CrossingQuery, LoopMatch,
    LoopSearchConfig, LoudnessConfig, OnsetConfig, Onsets, PitchConfig,
};

// Slicing
pub use samplekit_slicer::{
    metadata, Articulation, ArticulationParams, ArticulationRegistry, Fade, FadeShape, ItemId,
    LoopSlicer, LoopSlicerSettings, MemoryHost, MetaValue, RegionHost, RegionMask, RegionMetadata,
    TaggedRegion, Wildcard, WildcardValues,
};

mod builder;
mod error;
mod session;

#[cfg(feature = "wav")]
pub mod wav;

pub use builder::AudioSessionBuilder;
pub use error::{Error, Result};
pub use session::AudioSession;

/// Convenience prelude for common imports
pub mod prelude {
    // Session
    pub use crate::{AudioSession, AudioSessionBuilder};

    // Essential types
    pub use crate::core::{AudioBuffer, RegionBounds, TimeUnit};

    // Analysis configs
    pub use crate::analysis::{LoopSearchConfig, LoudnessConfig, OnsetConfig, PitchConfig};

    // Host editing
    pub use crate::slicer::{metadata, ItemId, MemoryHost, RegionHost, RegionMask, TaggedRegion};
}
