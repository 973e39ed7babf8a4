//! Analysis handle for convenient API access

use crate::loudness::{self, Crossing, CrossingQuery, LoudnessConfig};
use crate::loop_search::{self, LoopMatch, LoopSearchConfig};
use crate::onset::{self, OnsetConfig, Onsets};
use crate::pitch::{self, PitchConfig, PitchTrack};
use samplekit_core::{AudioBuffer, Result};

/// Handle bundling the analysis configs.
///
/// Every method borrows the buffer for the duration of the call only.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct AnalysisHandle {
    pub loudness: LoudnessConfig,
    pub loop_search: LoopSearchConfig,
    pub onset: OnsetConfig,
    pub pitch: PitchConfig,
}

impl AnalysisHandle {
    pub fn new(
        loudness: LoudnessConfig,
        loop_search: LoopSearchConfig,
        onset: OnsetConfig,
        pitch: PitchConfig,
    ) -> Self {
        Self {
            loudness,
            loop_search,
            onset,
            pitch,
        }
    }

    /// Validate every config.
    pub fn validate(&self) -> Result<()> {
        self.loudness.validate()?;
        self.loop_search.validate()?;
        self.onset.validate()?;
        self.pitch.validate()
    }

    /// RMS of the whole buffer.
    pub fn rms(&self, buffer: &AudioBuffer) -> Result<f64> {
        loudness::rms(buffer.samples())
    }

    /// Median of the framed RMS.
    pub fn median_rms(&self, buffer: &AudioBuffer) -> Result<f64> {
        loudness::median_rms(buffer.samples(), &self.loudness)
    }

    /// Median of the framed RMS with a custom hop.
    pub fn median_rms_with_hop(&self, buffer: &AudioBuffer, hop_length: usize) -> Result<f64> {
        let config = LoudnessConfig {
            hop_length,
            ..self.loudness
        };
        loudness::median_rms(buffer.samples(), &config)
    }

    pub fn first_crossing(&self, buffer: &AudioBuffer, query: &CrossingQuery) -> Result<Crossing> {
        loudness::first_crossing(buffer.samples(), query, &self.loudness)
    }

    pub fn find_loop(&self, buffer: &AudioBuffer) -> Result<LoopMatch> {
        loop_search::find_loop(buffer, &self.loop_search)
    }

    pub fn detect_onsets(&self, buffer: &AudioBuffer) -> Result<Onsets> {
        onset::detect_onsets(buffer, &self.onset)
    }

    pub fn track_pitch(&self, buffer: &AudioBuffer) -> Result<PitchTrack> {
        pitch::track_pitch(buffer, &self.pitch)
    }

    pub fn estimate_root_note(&self, buffer: &AudioBuffer) -> Result<String> {
        pitch::estimate_root_note(buffer, &self.pitch)
    }

    pub fn first_unvoiced_after(
        &self,
        buffer: &AudioBuffer,
        start: usize,
        end: Option<usize>,
        min_duration: usize,
    ) -> Result<usize> {
        pitch::first_unvoiced_after(buffer, start, end, min_duration, &self.pitch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use samplekit_core::Error;

    #[test]
    fn test_default_handle_is_valid() {
        assert!(AnalysisHandle::default().validate().is_ok());
    }

    #[test]
    fn test_handle_propagates_errors() {
        let handle = AnalysisHandle::default();
        let short = AudioBuffer::new(vec![0.1; 100], 44100).unwrap();
        assert_eq!(handle.median_rms(&short), Err(Error::EmptyBuffer));
        assert!(matches!(
            handle.find_loop(&short),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_custom_hop() {
        let handle = AnalysisHandle::default();
        let buffer = AudioBuffer::new(vec![0.25; 4096], 44100).unwrap();
        let value = handle.median_rms_with_hop(&buffer, 256).unwrap();
        assert!((value - 0.25).abs() < 1e-6);
    }
}
