//! Loop cutting
//!
//! Turns a [`LoopMatch`] into host edits: the material after the join
//! point (plus the crossfade) is cut away, a copy of the loop head is placed
//! at the join and both pieces are crossfaded. The join is the near edge of
//! the matched tail window, where the audio continues like the loop start. The loop region is then
//! shifted by the head copy's length so that it starts and ends on
//! identical material.

use crate::fade::{Fade, FadeShape};
use crate::host::{ItemId, RegionHost};
use crate::metadata::TaggedRegion;
use crate::{metadata, Result};
use samplekit_analysis::LoopMatch;
use samplekit_core::RegionBounds;

/// Positions closer than this are treated as equal.
const EPSILON: f64 = 1e-9;

/// Articulation tag of loop regions.
pub const LOOP_ARTICULATION: &str = "loop";

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct LoopSlicerSettings {
    /// Requested crossfade, seconds.
    pub crossfade_secs: f64,
    pub fade_shape: FadeShape,
    /// Extra head material kept after the crossfade, seconds.
    pub region_pad_secs: f64,
    pub region_name: String,
}

impl Default for LoopSlicerSettings {
    fn default() -> Self {
        Self {
            crossfade_secs: 0.08,
            fade_shape: FadeShape::SmoothUp,
            region_pad_secs: 0.1,
            region_name: "#".to_string(),
        }
    }
}

impl LoopSlicerSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.crossfade_secs >= 0.0) || !self.crossfade_secs.is_finite() {
            return Err(samplekit_core::Error::InvalidConfig(format!(
                "crossfade_secs must be non-negative, got {}",
                self.crossfade_secs
            ))
            .into());
        }
        if !(self.region_pad_secs >= 0.0) || !self.region_pad_secs.is_finite() {
            return Err(samplekit_core::Error::InvalidConfig(format!(
                "region_pad_secs must be non-negative, got {}",
                self.region_pad_secs
            ))
            .into());
        }
        Ok(())
    }
}

/// Applies loop cuts through a [`RegionHost`].
#[derive(Debug, Clone, Default)]
pub struct LoopSlicer {
    settings: LoopSlicerSettings,
}

impl LoopSlicer {
    pub fn new(settings: LoopSlicerSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &LoopSlicerSettings {
        &self.settings
    }

    /// Cut `item` into a seamless loop and create the loop region.
    ///
    /// `found` is relative to the start of the item's audio. The crossfade
    /// is clamped to the material after the join and to the loop length.
    pub fn cut_and_fade(
        &self,
        host: &mut dyn RegionHost,
        item: ItemId,
        found: &LoopMatch,
    ) -> Result<TaggedRegion> {
        let bounds = host.item_bounds(item)?;
        let start = bounds.start() + found.start_seconds();
        if bounds.start() + found.end_seconds() > bounds.end() + EPSILON {
            return Err(samplekit_core::Error::InvalidBounds {
                start,
                end: bounds.start() + found.end_seconds(),
            }
            .into());
        }
        let join = bounds.start() + found.join_seconds();
        if !(start < join) {
            return Err(samplekit_core::Error::InvalidBounds { start, end: join }.into());
        }

        let requested = self.settings.crossfade_secs;
        let crossfade = requested.min(bounds.end() - join).min(join - start).max(0.0);
        if crossfade < requested {
            tracing::warn!(
                requested,
                crossfade,
                "Loop crossfade clamped to the available margin"
            );
        }

        // Tail first: handles left of the cut stay valid.
        let main = if join + crossfade < bounds.end() - EPSILON {
            let (main, tail) = host.split(item, join + crossfade)?;
            host.delete(tail)?;
            main
        } else {
            item
        };

        let mut head = host.copy(main, bounds.start())?;
        if start > bounds.start() + EPSILON {
            let (before, rest) = host.split(head, start)?;
            host.delete(before)?;
            head = rest;
        }
        host.move_item(head, join)?;
        let head_length = (crossfade + self.settings.region_pad_secs).min(join + crossfade - start);
        host.set_length(head, head_length)?;

        if crossfade > 0.0 {
            host.set_fade(main, Fade::fade_out(crossfade, self.settings.fade_shape))?;
            host.set_fade(head, Fade::fade_in(crossfade, self.settings.fade_shape))?;
        }

        let loop_bounds = RegionBounds::new(start + head_length, join + head_length)?;
        let region = TaggedRegion::new(
            loop_bounds,
            self.settings.region_name.clone(),
            LOOP_ARTICULATION,
            metadata! {
                "correlation" => found.correlation(),
                "crossfade" => crossfade,
                "start_sample" => found.candidate.start_sample,
                "end_sample" => found.candidate.end_sample,
                "join_sample" => found.candidate.end_sample.saturating_sub(found.window),
            },
        );
        let id = host.create_region(&region)?;
        host.set_loop_points(loop_bounds)?;

        tracing::info!(
            %id,
            start = loop_bounds.start(),
            end = loop_bounds.end(),
            crossfade,
            "Loop region created"
        );
        Ok(region)
    }
}
