//! Sustained recordings (long notes, tremolo)
//!
//! A sustain take is marked as one region fingerprinted by its median RMS.
//! Its release, recorded separately, is later cut where the level last
//! reaches that median and where it first falls to silence, so sustain and
//! release can be mixed at matching loudness.

use super::{
    fade_items_within, get_param_or, tag_values, unknown_action, Articulation,
    ArticulationParams, RegionContents, SliceContext, EPSILON,
};
use crate::fade::{Fade, FadeShape};
use crate::host::{delete_all, split_all, trim_before, union_bounds, ItemId};
use crate::wildcard::WildcardValues;
use crate::{metadata, Error, Result};
use samplekit_analysis::{db_to_amplitude, CrossingQuery};
use samplekit_core::{Direction, Error as AnalysisError, RegionBounds};
use std::collections::BTreeMap;

const MARK_SUSTAIN: &str = "sus";
const CUT_RELEASE: &str = "release_cut";
const RELEASE_REGION: &str = "release_region";
const FADE_RELEASES: &str = "fade_releases";

/// Metadata key holding the sustain fingerprint.
const MEDIAN_KEY: &str = "median_rms";

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct SustainSettings {
    /// Value of `$articulation`.
    pub articulation: String,
    /// Value of `$dyn`.
    pub dynamic: Option<String>,
    /// Strategy-specific wildcards, e.g. `sul -> sulTop`.
    pub custom: BTreeMap<String, String>,
    /// Mark the first frame reaching the median level.
    pub marker_on_attack: bool,
    /// Cut everything before the sustain rises above `sus_silence_db`.
    pub cut_leading_silence: bool,
    pub sus_silence_db: f64,
    /// Release ends where the level first drops to this.
    pub silence_db: f64,
    pub release_fade_secs: f64,
    pub release_fade_shape: FadeShape,
    /// Cut the release before making its region.
    pub release_want_cut: bool,
}

impl Default for SustainSettings {
    fn default() -> Self {
        Self {
            articulation: "sustain".to_string(),
            dynamic: Some("ff".to_string()),
            custom: BTreeMap::new(),
            marker_on_attack: true,
            cut_leading_silence: true,
            sus_silence_db: -40.0,
            silence_db: -40.0,
            release_fade_secs: 0.2,
            release_fade_shape: FadeShape::SmoothUp,
            release_want_cut: true,
        }
    }
}

impl SustainSettings {
    pub fn from_params(params: &ArticulationParams) -> Result<Self> {
        let d = Self::default();
        let text = |v: &crate::MetaValue| v.as_str().map(str::to_string);
        let release_fade_shape = match params.get("release_fade_shape") {
            Some(v) => v
                .as_str()
                .ok_or_else(|| Error::Articulation("release_fade_shape must be text".into()))?
                .parse()?,
            None => d.release_fade_shape,
        };
        Ok(Self {
            articulation: get_param_or(params, "articulation", d.articulation, text)?,
            dynamic: get_param_or(params, "dyn", d.dynamic, |v| text(v).map(Some))?,
            custom: custom_wildcards(params),
            marker_on_attack: get_param_or(params, "marker_on_attack", d.marker_on_attack, |v| {
                v.as_bool()
            })?,
            cut_leading_silence: get_param_or(
                params,
                "cut_leading_silence",
                d.cut_leading_silence,
                |v| v.as_bool(),
            )?,
            sus_silence_db: get_param_or(params, "sus_silence_db", d.sus_silence_db, |v| v.as_f64())?,
            silence_db: get_param_or(params, "silence_db", d.silence_db, |v| v.as_f64())?,
            release_fade_secs: get_param_or(params, "release_fade_secs", d.release_fade_secs, |v| {
                v.as_f64()
            })?,
            release_fade_shape,
            release_want_cut: get_param_or(params, "release_want_cut", d.release_want_cut, |v| {
                v.as_bool()
            })?,
        })
    }

    fn release_fade(&self) -> Fade {
        Fade::fade_out(self.release_fade_secs, self.release_fade_shape)
    }
}

/// Parameters named `$tag` become custom wildcard values.
pub(super) fn custom_wildcards(params: &ArticulationParams) -> BTreeMap<String, String> {
    params
        .iter()
        .filter_map(|(key, value)| {
            let name = key.strip_prefix('$')?;
            Some((name.to_string(), value.as_str()?.to_string()))
        })
        .collect()
}

/// Sustain and release cutting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SustainArticulation {
    settings: SustainSettings,
}

impl SustainArticulation {
    pub const NAME: &'static str = "sustain";

    pub fn new(settings: SustainSettings) -> Self {
        Self { settings }
    }

    pub fn from_params(params: &ArticulationParams) -> Result<Self> {
        Ok(Self::new(SustainSettings::from_params(params)?))
    }

    pub fn settings(&self) -> &SustainSettings {
        &self.settings
    }

    fn tags(&self, ctx: &SliceContext<'_>, part: &str) -> WildcardValues {
        tag_values(
            ctx.mask,
            &self.settings.articulation,
            part,
            self.settings.dynamic.as_deref(),
            &self.settings.custom,
        )
    }

    fn mark_sustain(&self, ctx: &mut SliceContext<'_>) -> Result<RegionContents> {
        let bounds = ctx.bounds()?;
        let first = ctx.first_item()?;
        let first_start = ctx.host.item_bounds(first)?.start();
        let audio = ctx.host.load_audio(first)?;
        let median = ctx.analysis.median_rms(&audio)?;

        if self.settings.marker_on_attack {
            let attack = ctx
                .analysis
                .first_crossing(&audio, &CrossingQuery::above(median))?;
            ctx.host
                .add_marker(first_start + audio.samples_to_secs(attack.sample), "@sus_hard")?;
        }

        let mut start = bounds.start();
        let mut cut_sample = 0;
        if self.settings.cut_leading_silence {
            let level = db_to_amplitude(self.settings.sus_silence_db);
            let rise = ctx
                .analysis
                .first_crossing(&audio, &CrossingQuery::above(level))?;
            let position = first_start + audio.samples_to_secs(rise.sample);
            if position > start + EPSILON {
                // only items starting with the take are trimmed
                let mut leading = Vec::new();
                let mut others = Vec::new();
                for &item in &ctx.items {
                    if (ctx.host.item_bounds(item)?.start() - start).abs() < EPSILON {
                        leading.push(item);
                    } else {
                        others.push(item);
                    }
                }
                let (left, mut right) = split_all(&mut *ctx.host, &leading, position)?;
                delete_all(&mut *ctx.host, &left)?;
                right.extend(others);
                ctx.items = right;
                start = position;
                cut_sample = rise.sample;
            }
        }

        let sustain = audio.sub_buffer(cut_sample, audio.len())?;
        let mut wildcards = self.tags(ctx, "sus");
        wildcards.extend(WildcardValues::from_audio(ctx.mask, &sustain, ctx.analysis)?);
        let root = ctx.root(&wildcards, &sustain)?;

        tracing::info!(median, start, %root, "Sustain marked");
        Ok(RegionContents {
            wildcards,
            bounds: RegionBounds::new(start, bounds.end())?,
            label: "sustain region".into(),
            metadata: metadata! {
                MEDIAN_KEY => median,
                "part" => "sus",
                "root" => root,
            },
        })
    }

    /// Median RMS of the closest sustain region left of the targets.
    fn sustain_median(&self, ctx: &SliceContext<'_>) -> Result<f64> {
        let position = ctx.bounds()?.start();
        ctx.closest_region_left(Self::NAME, position, MEDIAN_KEY)?
            .and_then(|region| region.number(MEDIAN_KEY))
            .ok_or_else(|| {
                Error::MissingMetadata(format!(
                    "no {} region with '{}' before {:.3}s",
                    Self::NAME,
                    MEDIAN_KEY,
                    position
                ))
            })
    }

    fn cut_release(&self, ctx: &mut SliceContext<'_>) -> Result<(Vec<ItemId>, f64)> {
        let median = self.sustain_median(ctx)?;
        let first = ctx.first_item()?;
        let first_start = ctx.host.item_bounds(first)?.start();
        let audio = ctx.host.load_audio(first)?;

        let last_loud = ctx.analysis.first_crossing(
            &audio,
            &CrossingQuery::above(median).direction(Direction::Left),
        )?;
        let silent = match ctx.analysis.first_crossing(
            &audio,
            &CrossingQuery::below(db_to_amplitude(self.settings.silence_db))
                .range(Some(last_loud.sample), None),
        ) {
            Ok(crossing) => crossing.sample,
            Err(
                e @ (AnalysisError::NoCrossing { .. }
                | AnalysisError::EmptyBuffer
                | AnalysisError::InvalidBounds { .. }),
            ) => {
                tracing::warn!(error = %e, "Release never falls silent, keeping it to the item end");
                audio.len()
            }
            Err(e) => return Err(e.into()),
        };

        let cut_start = first_start + audio.samples_to_secs(last_loud.sample);
        let cut_end = first_start + audio.samples_to_secs(silent);
        let items = ctx.items.clone();
        let rest = trim_before(&mut *ctx.host, &items, cut_start)?;
        let (release, after) = split_all(&mut *ctx.host, &rest, cut_end)?;
        delete_all(&mut *ctx.host, &after)?;

        for &item in &release {
            let length = ctx.host.item_bounds(item)?.duration();
            let fade = self.settings.release_fade();
            ctx.host.set_fade(
                item,
                Fade {
                    length: fade.length.min(length),
                    ..fade
                },
            )?;
        }

        tracing::info!(median, cut_start, cut_end, "Release cut");
        ctx.items = release.clone();
        Ok((release, median))
    }

    fn release_region(&self, ctx: &mut SliceContext<'_>) -> Result<RegionContents> {
        let (items, median) = if self.settings.release_want_cut {
            self.cut_release(ctx)?
        } else {
            (ctx.items.clone(), self.sustain_median(ctx)?)
        };
        let first = items
            .first()
            .copied()
            .ok_or_else(|| Error::Articulation("release cut left no items".into()))?;
        let audio = ctx.host.load_audio(first)?;

        let mut wildcards = self.tags(ctx, "rls");
        wildcards.extend(WildcardValues::from_audio(ctx.mask, &audio, ctx.analysis)?);
        let root = ctx.root(&wildcards, &audio)?;

        Ok(RegionContents {
            wildcards,
            bounds: union_bounds(&*ctx.host, &items)?,
            label: "release region".into(),
            metadata: metadata! {
                "part" => "release",
                "root" => root,
                MEDIAN_KEY => median,
            },
        })
    }
}

impl Articulation for SustainArticulation {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn actions(&self) -> &'static [&'static str] {
        &[MARK_SUSTAIN, CUT_RELEASE, RELEASE_REGION, FADE_RELEASES]
    }

    fn read(&self, ctx: &mut SliceContext<'_>, action: &str) -> Result<Option<Vec<RegionContents>>> {
        match action {
            MARK_SUSTAIN => Ok(Some(vec![self.mark_sustain(ctx)?])),
            CUT_RELEASE => {
                self.cut_release(ctx)?;
                Ok(None)
            }
            RELEASE_REGION => Ok(Some(vec![self.release_region(ctx)?])),
            FADE_RELEASES => {
                let releases: Vec<_> = ctx
                    .regions_of(Self::NAME)?
                    .into_iter()
                    .filter(|r| r.text("part") == Some("release"))
                    .collect();
                fade_items_within(&mut *ctx.host, &releases, self.settings.release_fade())?;
                Ok(None)
            }
            other => Err(unknown_action(Self::NAME, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::articulation::write_regions;
    use crate::host::RegionHost;
    use crate::memory_host::MemoryHost;
    use crate::wildcard::RegionMask;
    use approx::assert_abs_diff_eq;
    use samplekit_analysis::AnalysisHandle;
    use samplekit_core::AudioBuffer;

    const SR: u32 = 8000;

    /// Silence, a steady sustain, a louder release swell, then silence.
    fn take() -> Vec<f32> {
        let mut samples = vec![0.0f32; SR as usize / 2];
        samples.extend((0..SR as usize).map(|i| {
            0.3 * (2.0 * std::f32::consts::PI * 220.0 * i as f32 / SR as f32).sin()
        }));
        samples.extend(vec![0.0f32; SR as usize / 2]);
        samples
    }

    fn settings() -> SustainSettings {
        SustainSettings {
            marker_on_attack: false,
            ..SustainSettings::default()
        }
    }

    #[test]
    fn test_mark_sustain_cuts_leading_silence() {
        let mut host = MemoryHost::new(AudioBuffer::new(take(), SR).unwrap());
        let mask = RegionMask::new("$articulation,$part,$dyn", "_");
        let analysis = AnalysisHandle::default();
        let items = host.items();
        let art = SustainArticulation::new(settings());

        let contents = {
            let mut ctx = SliceContext::new(&mut host, items, &mask, "cello", &analysis);
            art.read(&mut ctx, "sus").unwrap().unwrap()
        };
        let region = &contents[0];
        // cut at the leading edge of the first frame reaching the tone
        assert!(region.bounds.start() > 0.2 && region.bounds.start() <= 0.5);
        assert_abs_diff_eq!(region.bounds.end(), 2.0, epsilon = 1e-9);
        assert_eq!(region.metadata["part"].as_str(), Some("sus"));
        assert!(region.metadata[MEDIAN_KEY].as_f64().unwrap() > 0.1);

        let written = write_regions(&mut host, &mask, "cello", art.name(), contents).unwrap();
        assert_eq!(written[0].name, "sustain_sus_ff");
        assert_eq!(host.items().len(), 1);
    }

    #[test]
    fn test_release_requires_sustain_region() {
        let mut host = MemoryHost::new(AudioBuffer::new(take(), SR).unwrap());
        let mask = RegionMask::default();
        let analysis = AnalysisHandle::default();
        let items = host.items();
        let mut ctx = SliceContext::new(&mut host, items, &mask, "", &analysis);
        let result = SustainArticulation::default().read(&mut ctx, "release_cut");
        assert!(matches!(result, Err(Error::MissingMetadata(_))));
    }

    #[test]
    fn test_release_cut_uses_sustain_median() {
        let mut samples = take();
        // release take placed after the sustain: decaying tone
        samples.extend((0..SR as usize).map(|i| {
            let decay = 1.0 - i as f32 / SR as f32;
            0.4 * decay * (2.0 * std::f32::consts::PI * 220.0 * i as f32 / SR as f32).sin()
        }));
        samples.extend(vec![0.0f32; SR as usize / 2]);
        let mut host = MemoryHost::empty(AudioBuffer::new(samples, SR).unwrap());
        let sustain = host.insert_item(0.0, 0.0, 2.0).unwrap();
        let release = host.insert_item(2.0, 2.0, 1.5).unwrap();

        let mask = RegionMask::new("$part", "_");
        let analysis = AnalysisHandle::default();
        let art = SustainArticulation::new(settings());
        let contents = {
            let mut ctx = SliceContext::new(&mut host, vec![sustain], &mask, "", &analysis);
            art.read(&mut ctx, "sus").unwrap().unwrap()
        };
        write_regions(&mut host, &mask, "", art.name(), contents).unwrap();

        let contents = {
            let mut ctx = SliceContext::new(&mut host, vec![release], &mask, "", &analysis);
            art.read(&mut ctx, "release_region").unwrap().unwrap()
        };
        let region = &contents[0];
        assert_eq!(region.metadata["part"].as_str(), Some("release"));
        assert_eq!(mask.render(&region.wildcards), "rls");
        // the swell passes the sustain median somewhere in its first half
        assert!(region.bounds.start() > 2.0 && region.bounds.start() < 2.75);
        assert!(region.bounds.end() <= 3.5 + 1e-9);

        let faded = host
            .log()
            .iter()
            .filter(|op| matches!(op, crate::memory_host::HostOp::SetFade { .. }))
            .count();
        assert_eq!(faded, 1);
    }

    #[test]
    fn test_unknown_action() {
        let mut host = MemoryHost::new(AudioBuffer::new(take(), SR).unwrap());
        let mask = RegionMask::default();
        let analysis = AnalysisHandle::default();
        let items = host.items();
        let mut ctx = SliceContext::new(&mut host, items, &mask, "", &analysis);
        assert!(matches!(
            SustainArticulation::default().read(&mut ctx, "legato"),
            Err(Error::Articulation(_))
        ));
    }

    #[test]
    fn test_settings_from_params() {
        let params = metadata! {
            "articulation" => "trem",
            "silence_db" => -50.0,
            "release_fade_shape" => "hard down",
            "$sul" => "sulTop",
        };
        let settings = SustainSettings::from_params(&params).unwrap();
        assert_eq!(settings.articulation, "trem");
        assert_eq!(settings.silence_db, -50.0);
        assert_eq!(settings.release_fade_shape, FadeShape::HardDown);
        assert_eq!(settings.custom.get("sul").map(String::as_str), Some("sulTop"));
        assert_eq!(settings.dynamic.as_deref(), Some("ff"));
    }
}
