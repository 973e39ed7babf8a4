//! # samplekit Slicer
//!
//! Turns analysis results into edits of a host project.
//!
//! This crate provides:
//! - **Host capability**: the [`RegionHost`] trait and an in-memory [`MemoryHost`]
//! - **Loop cutting**: [`LoopSlicer`] places a crossfaded head copy at the loop end
//! - **Articulations**: sustain and short-note strategies behind an [`ArticulationRegistry`]
//! - **Region naming**: wildcard masks such as `$instrument,$articulation,$rr,$root`
//!
//! ## Example
//!
//! ```rust
//! use samplekit_analysis::{find_loop, LoopSearchConfig};
//! use samplekit_core::AudioBuffer;
//! use samplekit_slicer::{LoopSlicer, LoopSlicerSettings, MemoryHost, RegionHost};
//!
//! let sr = 8000;
//! let samples: Vec<f32> = (0..sr)
//!     .map(|i| (2.0 * std::f32::consts::PI * 100.0 * i as f32 / sr as f32).sin())
//!     .collect();
//! let buffer = AudioBuffer::new(samples, sr as u32).unwrap();
//! let config = LoopSearchConfig {
//!     corr_window_secs: 0.01,
//!     slide_window_secs: 0.02,
//!     ..LoopSearchConfig::default()
//! };
//! let found = find_loop(&buffer, &config).unwrap();
//!
//! let mut host = MemoryHost::new(buffer);
//! let item = host.items()[0];
//! let slicer = LoopSlicer::new(LoopSlicerSettings::default()).unwrap();
//! let region = slicer.cut_and_fade(&mut host, item, &found).unwrap();
//! assert_eq!(host.loop_points(), Some(region.bounds));
//! ```

pub mod articulation;
pub mod error;
pub mod fade;
pub mod host;
pub mod loop_slicer;
pub mod memory_host;
pub mod metadata;
pub mod wildcard;

pub use articulation::{
    write_regions, Articulation, ArticulationParams, ArticulationRegistry, RegionContents,
    ShortsArticulation, ShortsSettings, SliceContext, SustainArticulation, SustainSettings,
};
pub use error::{Error, Result};
pub use fade::{Fade, FadeDirection, FadeShape};
pub use host::{ItemId, RegionHost, RegionId};
pub use loop_slicer::{LoopSlicer, LoopSlicerSettings};
pub use memory_host::{HostOp, MemoryHost};
pub use metadata::{MetaValue, RegionMetadata, TaggedRegion};
pub use wildcard::{RegionMask, Wildcard, WildcardValues};
