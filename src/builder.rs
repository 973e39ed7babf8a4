//! Builder for configuring and constructing an `AudioSession`.

use crate::{AudioSession, Result};
use samplekit_analysis::{AnalysisHandle, LoopSearchConfig, LoudnessConfig, OnsetConfig, PitchConfig};
use samplekit_slicer::{ArticulationRegistry, LoopSlicer, LoopSlicerSettings, RegionMask};

/// Every setting has the default of the editing tool it replaces; `build()`
/// validates the whole set at once.
///
/// # Example
///
/// ```rust
/// use samplekit::prelude::*;
///
/// let session = AudioSession::builder()
///     .instrument("violin")
///     .region_mask(RegionMask::new("$instrument,$articulation,$rr,$root", "_"))
///     .loop_search(LoopSearchConfig {
///         corr_threshold: 0.99,
///         ..LoopSearchConfig::default()
///     })
///     .build()
///     .unwrap();
///
/// assert_eq!(session.instrument(), "violin");
/// ```
#[derive(Debug, Clone, Default)]
pub struct AudioSessionBuilder {
    loudness: LoudnessConfig,
    loop_search: LoopSearchConfig,
    onset: OnsetConfig,
    pitch: PitchConfig,
    loop_slicer: LoopSlicerSettings,
    registry: Option<ArticulationRegistry>,
    mask: RegionMask,
    instrument: String,
}

impl AudioSessionBuilder {
    /// Default: frame 2048, hop 512
    pub fn loudness(mut self, config: LoudnessConfig) -> Self {
        self.loudness = config;
        self
    }

    pub fn loop_search(mut self, config: LoopSearchConfig) -> Self {
        self.loop_search = config;
        self
    }

    pub fn onset(mut self, config: OnsetConfig) -> Self {
        self.onset = config;
        self
    }

    /// Default: C1 to C7
    pub fn pitch(mut self, config: PitchConfig) -> Self {
        self.pitch = config;
        self
    }

    pub fn loop_slicer(mut self, settings: LoopSlicerSettings) -> Self {
        self.loop_slicer = settings;
        self
    }

    /// Use `registry` instead of a fresh one holding the built-in strategies.
    ///
    /// The registry is shared, so strategies registered later are visible
    /// to the session.
    pub fn registry(mut self, registry: ArticulationRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Default: `$instrument,$articulation,$part,$dyn,$rr,$root` joined by `_`
    pub fn region_mask(mut self, mask: RegionMask) -> Self {
        self.mask = mask;
        self
    }

    pub fn instrument(mut self, name: impl Into<String>) -> Self {
        self.instrument = name.into();
        self
    }

    pub fn build(self) -> Result<AudioSession> {
        let analysis = AnalysisHandle::new(self.loudness, self.loop_search, self.onset, self.pitch);
        analysis.validate()?;
        let loop_slicer = LoopSlicer::new(self.loop_slicer)?;
        let registry = self
            .registry
            .unwrap_or_else(ArticulationRegistry::with_builtins);

        tracing::debug!(
            instrument = %self.instrument,
            mask = %self.mask,
            articulations = ?registry.names(),
            "Audio session built"
        );

        Ok(AudioSession::from_parts(
            analysis,
            loop_slicer,
            registry,
            self.mask,
            self.instrument,
        ))
    }
}
