//! # samplekit Analysis
//!
//! Offline analysis of mono sample recordings.
//!
//! This crate provides:
//! - **Loudness**: whole-buffer and framed RMS, median RMS, threshold crossings
//! - **Loop search**: correlation-based loop points with iterative refinement
//! - **Onset detection**: spectral flux, peak picking and backtracking
//! - **Pitch tracking**: probabilistic YIN, root notes and unvoiced boundaries
//!
//! Every function reads a borrowed [`AudioBuffer`](samplekit_core::AudioBuffer)
//! and keeps no reference after returning.
//!
//! ## Example
//!
//! ```rust
//! use samplekit_analysis::{find_loop, LoopSearchConfig};
//! use samplekit_core::AudioBuffer;
//!
//! let sr = 8000;
//! let samples: Vec<f32> = (0..sr)
//!     .map(|i| (2.0 * std::f32::consts::PI * 100.0 * i as f32 / sr as f32).sin())
//!     .collect();
//! let buffer = AudioBuffer::new(samples, sr as u32).unwrap();
//!
//! let config = LoopSearchConfig {
//!     corr_window_secs: 0.01,
//!     slide_window_secs: 0.02,
//!     ..LoopSearchConfig::default()
//! };
//! let found = find_loop(&buffer, &config).unwrap();
//! assert!(found.end_seconds() > found.start_seconds());
//! ```

pub mod correlation;
pub mod loop_search;
pub mod loudness;
pub mod onset;
pub mod pitch;
pub mod spectrum;

mod handle;

pub use correlation::{correlation_score, pearson};
pub use handle::AnalysisHandle;
pub use loop_search::{find_loop, LoopMatch, LoopSearchConfig};
pub use loudness::{
    amplitude_to_db, db_to_amplitude, first_crossing, frame_rms, median_rms, rms, Crossing,
    CrossingQuery, LoudnessConfig,
};
pub use onset::{backtrack, detect_onsets, onset_strength, peak_pick, OnsetConfig, Onsets, PeakPickParams};
pub use pitch::{
    estimate_root_note, first_unvoiced_after, track_pitch, PitchConfig, PitchFrame, PitchTrack,
    PitchTracker,
};
pub use spectrum::Spectrogram;
