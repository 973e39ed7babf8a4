//! Audio session: the explicit context every operation runs in.

use crate::{AudioSessionBuilder, Result};
use samplekit_analysis::{AnalysisHandle, LoopMatch, Onsets};
use samplekit_core::AudioBuffer;
use samplekit_slicer::{
    write_regions, ArticulationParams, ArticulationRegistry, ItemId, LoopSlicer, RegionHost,
    RegionMask, SliceContext, TaggedRegion,
};

/// Analysis settings, slicing settings and naming context for one editing session.
///
/// Nothing here is global. Hosts are passed into each call, so one session
/// can drive several projects and tests can use [`MemoryHost`](samplekit_slicer::MemoryHost).
///
/// # Example
///
/// ```rust
/// use samplekit::prelude::*;
///
/// let session = AudioSession::builder().instrument("cello").build().unwrap();
///
/// let sr = 8000;
/// let samples: Vec<f32> = (0..2 * sr)
///     .map(|i| (2.0 * std::f32::consts::PI * 100.0 * i as f32 / sr as f32).sin())
///     .collect();
/// let mut host = MemoryHost::new(AudioBuffer::new(samples, sr as u32).unwrap());
/// let item = host.items()[0];
///
/// let region = session.make_loop(&mut host, item).unwrap();
/// assert_eq!(host.loop_points(), Some(region.bounds));
/// ```
#[derive(Debug, Clone)]
pub struct AudioSession {
    analysis: AnalysisHandle,
    loop_slicer: LoopSlicer,
    registry: ArticulationRegistry,
    mask: RegionMask,
    instrument: String,
}

impl AudioSession {
    pub fn builder() -> AudioSessionBuilder {
        AudioSessionBuilder::default()
    }

    pub(crate) fn from_parts(
        analysis: AnalysisHandle,
        loop_slicer: LoopSlicer,
        registry: ArticulationRegistry,
        mask: RegionMask,
        instrument: String,
    ) -> Self {
        Self {
            analysis,
            loop_slicer,
            registry,
            mask,
            instrument,
        }
    }

    pub fn analysis(&self) -> &AnalysisHandle {
        &self.analysis
    }

    pub fn loop_slicer(&self) -> &LoopSlicer {
        &self.loop_slicer
    }

    /// Shared with every clone of this session.
    pub fn registry(&self) -> &ArticulationRegistry {
        &self.registry
    }

    pub fn mask(&self) -> &RegionMask {
        &self.mask
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn find_loop(&self, buffer: &AudioBuffer) -> Result<LoopMatch> {
        Ok(self.analysis.find_loop(buffer)?)
    }

    pub fn detect_onsets(&self, buffer: &AudioBuffer) -> Result<Onsets> {
        Ok(self.analysis.detect_onsets(buffer)?)
    }

    pub fn estimate_root_note(&self, buffer: &AudioBuffer) -> Result<String> {
        Ok(self.analysis.estimate_root_note(buffer)?)
    }

    pub fn median_rms(&self, buffer: &AudioBuffer) -> Result<f64> {
        Ok(self.analysis.median_rms(buffer)?)
    }

    /// Search `item` for loop points, cut it into a crossfaded loop and
    /// create the loop region.
    ///
    /// A recording without a good enough loop fails with an error for which
    /// [`Error::is_loop_not_found`](crate::Error::is_loop_not_found) holds,
    /// and leaves the host untouched.
    pub fn make_loop(&self, host: &mut dyn RegionHost, item: ItemId) -> Result<TaggedRegion> {
        let audio = host.load_audio(item)?;
        let found = self.find_loop(&audio)?;
        tracing::info!(
            %item,
            start = found.start_seconds(),
            end = found.end_seconds(),
            join = found.join_seconds(),
            correlation = found.correlation(),
            "Loop found"
        );
        Ok(self.loop_slicer.cut_and_fade(host, item, &found)?)
    }

    /// Run `action` of the articulation registered as `name` on `items` and
    /// write the regions it produces.
    ///
    /// Returns the regions written; actions that only edit return none.
    pub fn run_articulation(
        &self,
        host: &mut dyn RegionHost,
        name: &str,
        params: &ArticulationParams,
        action: &str,
        items: Vec<ItemId>,
    ) -> Result<Vec<TaggedRegion>> {
        let articulation = self.registry.create(name, params)?;
        tracing::debug!(articulation = name, action, items = items.len(), "Running articulation");

        let contents = {
            let mut ctx = SliceContext::new(
                &mut *host,
                items,
                &self.mask,
                &self.instrument,
                &self.analysis,
            );
            articulation.read(&mut ctx, action)?
        };

        match contents {
            Some(contents) => Ok(write_regions(
                host,
                &self.mask,
                &self.instrument,
                articulation.name(),
                contents,
            )?),
            None => Ok(Vec::new()),
        }
    }
}

impl Default for AudioSession {
    fn default() -> Self {
        Self::from_parts(
            AnalysisHandle::default(),
            LoopSlicer::default(),
            ArticulationRegistry::with_builtins(),
            RegionMask::default(),
            String::new(),
        )
    }
}
