//! Short articulations (pizzicato, staccato, picked notes)
//!
//! A take holds many short hits. Cutting finds every onset, walks back from
//! it to the last quiet frame and forward to where the pitch dies away, and
//! keeps only those samples. Regions are then numbered as round robins per
//! root note.

use super::sustain::custom_wildcards;
use super::{
    fade_items_within, get_param_or, tag_values, unknown_action, Articulation,
    ArticulationParams, RegionContents, SliceContext, EPSILON,
};
use crate::fade::{Fade, FadeShape};
use crate::host::{ItemId, RegionHost};
use crate::wildcard::{Wildcard, WildcardValues};
use crate::{metadata, Error, Result};
use samplekit_analysis::{db_to_amplitude, loudness, AnalysisHandle, CrossingQuery, LoudnessConfig, OnsetConfig};
use samplekit_core::{AudioBuffer, Direction, Error as AnalysisError};
use std::collections::BTreeMap;

const CUT: &str = "cut";
const REGIONS: &str = "regions";
const FADE: &str = "fade";

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct ShortsSettings {
    /// Value of `$articulation`, e.g. `pick` or `pizz`.
    pub articulation: String,
    /// Value of `$part`, e.g. `sus` or `stacc`.
    pub part: String,
    pub dynamic: Option<String>,
    pub custom: BTreeMap<String, String>,
    /// Level a sample start must fall to before its onset.
    pub pre_silence_db: f64,
    /// How far before an onset the attack may begin, seconds.
    pub pre_onset_secs: f64,
    /// Hop of the quiet-frame search before each onset.
    pub crossing_hop: usize,
    pub onset: OnsetConfig,
    pub onset_markers: bool,
    pub fade_out_secs: f64,
    pub fade_shape: FadeShape,
}

impl Default for ShortsSettings {
    fn default() -> Self {
        Self {
            articulation: "pick".to_string(),
            part: "sus".to_string(),
            dynamic: Some("ff".to_string()),
            custom: BTreeMap::new(),
            pre_silence_db: -30.0,
            pre_onset_secs: 0.15,
            crossing_hop: 256,
            onset: OnsetConfig::default(),
            onset_markers: true,
            fade_out_secs: 0.2,
            fade_shape: FadeShape::SmoothUp,
        }
    }
}

impl ShortsSettings {
    pub fn from_params(params: &ArticulationParams) -> Result<Self> {
        let d = Self::default();
        let text = |v: &crate::MetaValue| v.as_str().map(str::to_string);
        let number = |v: &crate::MetaValue| v.as_f64();
        let optional = |v: &crate::MetaValue| v.as_f64().map(Some);
        let fade_shape = match params.get("fade_shape") {
            Some(v) => v
                .as_str()
                .ok_or_else(|| Error::Articulation("fade_shape must be text".into()))?
                .parse()?,
            None => d.fade_shape,
        };
        let onset = OnsetConfig {
            pre_max: get_param_or(params, "pre_max", d.onset.pre_max, number)?,
            wait: get_param_or(params, "wait", d.onset.wait, number)?,
            delta: get_param_or(params, "delta", d.onset.delta, number)?,
            // zero disables the high-pass
            fmin: get_param_or(params, "fmin", d.onset.fmin, optional)?.filter(|f| *f > 0.0),
            pre_avg: get_param_or(params, "pre_avg", d.onset.pre_avg, optional)?,
            post_max: get_param_or(params, "post_max", d.onset.post_max, optional)?,
            post_avg: get_param_or(params, "post_avg", d.onset.post_avg, optional)?,
            ..d.onset
        };
        onset.validate()?;

        Ok(Self {
            articulation: get_param_or(params, "articulation", d.articulation, text)?,
            part: get_param_or(params, "part", d.part, text)?,
            dynamic: get_param_or(params, "dyn", d.dynamic, |v| text(v).map(Some))?,
            custom: custom_wildcards(params),
            pre_silence_db: get_param_or(params, "pre_silence_db", d.pre_silence_db, number)?,
            pre_onset_secs: get_param_or(params, "pre_onset_secs", d.pre_onset_secs, number)?,
            crossing_hop: d.crossing_hop,
            onset,
            onset_markers: get_param_or(params, "onset_markers", d.onset_markers, |v| v.as_bool())?,
            fade_out_secs: get_param_or(params, "fade_out_secs", d.fade_out_secs, number)?,
            fade_shape,
        })
    }

    /// Metadata tag tying regions to this articulation and part.
    pub fn metadata_key(&self) -> String {
        format!("{}{}", self.articulation, self.part)
    }

    fn fade(&self) -> Fade {
        Fade::fade_out(self.fade_out_secs, self.fade_shape)
    }
}

/// Onset-based cutting of short hits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShortsArticulation {
    settings: ShortsSettings,
}

impl ShortsArticulation {
    pub const NAME: &'static str = "shorts";

    pub fn new(settings: ShortsSettings) -> Self {
        Self { settings }
    }

    pub fn from_params(params: &ArticulationParams) -> Result<Self> {
        Ok(Self::new(ShortsSettings::from_params(params)?))
    }

    pub fn settings(&self) -> &ShortsSettings {
        &self.settings
    }

    /// Sample bounds `[start, end)` of every hit in `audio`.
    pub fn sample_bounds(&self, audio: &AudioBuffer, analysis: &AnalysisHandle) -> Result<Vec<(usize, usize)>> {
        let onsets = samplekit_analysis::detect_onsets(audio, &self.settings.onset)?;
        let crossing_config = LoudnessConfig {
            hop_length: self.settings.crossing_hop,
            ..analysis.loudness
        };
        let pre_silence = db_to_amplitude(self.settings.pre_silence_db);
        let pre_onset = audio.secs_to_samples(self.settings.pre_onset_secs);
        let wait = audio.secs_to_samples(self.settings.onset.wait);

        let mut bounds = Vec::with_capacity(onsets.len());
        for (i, event) in onsets.events.iter().enumerate() {
            let onset = event.onset_sample;
            let search_from = onset.saturating_sub(pre_onset);
            let query = CrossingQuery::below(pre_silence)
                .direction(Direction::Left)
                .with_trend(true)
                .range(Some(search_from), Some(onset));
            let start = if search_from < onset {
                match loudness::first_crossing(audio.samples(), &query, &crossing_config) {
                    Ok(crossing) => crossing.sample,
                    Err(AnalysisError::NoCrossing { .. } | AnalysisError::EmptyBuffer) => {
                        tracing::debug!(onset, "No quiet frame before onset, using backtrack");
                        event.backtrack_sample
                    }
                    Err(e) => return Err(e.into()),
                }
            } else {
                onset
            };

            let next = onsets
                .events
                .get(i + 1)
                .map_or(audio.len(), |e| e.onset_sample);
            let end = match analysis.first_unvoiced_after(audio, onset, Some(next), wait) {
                Ok(sample) => sample,
                Err(e @ (AnalysisError::PitchTracking(_) | AnalysisError::EmptyBuffer)) => {
                    tracing::warn!(onset, error = %e, "No pitch boundary, cutting at the next onset");
                    next
                }
                Err(e) => return Err(e.into()),
            };
            bounds.push((start, end));
        }

        // a sample ends before the next one starts
        for i in 1..bounds.len() {
            let next_start = bounds[i].0;
            let current = &mut bounds[i - 1];
            current.1 = current.1.min(next_start);
        }
        bounds.retain(|(start, end)| start < end);
        Ok(bounds)
    }

    /// Cut one item into its hits. Returns the kept samples, left to right.
    fn cut_item(&self, ctx: &mut SliceContext<'_>, item: ItemId) -> Result<Vec<ItemId>> {
        let audio = ctx.host.load_audio(item)?;
        let item_bounds = ctx.host.item_bounds(item)?;
        let origin = item_bounds.start();

        let bounds = self.sample_bounds(&audio, ctx.analysis)?;
        if bounds.is_empty() {
            tracing::warn!(%item, "No onsets found, item left untouched");
            return Ok(vec![item]);
        }
        if self.settings.onset_markers {
            for &(start, _) in &bounds {
                ctx.host.add_marker(origin + audio.samples_to_secs(start), "@onset")?;
            }
        }

        let host: &mut dyn RegionHost = &mut *ctx.host;
        let mut kept = Vec::with_capacity(bounds.len());
        let mut current = Some(item);
        let mut current_end = item_bounds.end();

        // Last to first: the handle of everything left of a cut stays valid.
        for &(start, end) in bounds.iter().rev() {
            let Some(piece) = current else { break };
            let start = origin + audio.samples_to_secs(start);
            let end = origin + audio.samples_to_secs(end);

            if end < current_end - EPSILON {
                let (_, gap) = host.split(piece, end)?;
                host.delete(gap)?;
            }
            let sample = if start > origin + EPSILON {
                let (left, sample) = host.split(piece, start)?;
                current = Some(left);
                current_end = start;
                sample
            } else {
                current = None;
                piece
            };

            let length = host.item_bounds(sample)?.duration();
            let fade = self.settings.fade();
            host.set_fade(
                sample,
                Fade {
                    length: fade.length.min(length),
                    ..fade
                },
            )?;
            kept.push(sample);
        }
        if let Some(leading) = current {
            host.delete(leading)?;
        }

        kept.reverse();
        tracing::info!(%item, samples = kept.len(), "Item cut into samples");
        Ok(kept)
    }

    fn cut(&self, ctx: &mut SliceContext<'_>) -> Result<()> {
        let mut kept = Vec::new();
        for item in ctx.items.clone() {
            kept.extend(self.cut_item(ctx, item)?);
        }
        ctx.items = kept;
        Ok(())
    }

    fn regions(&self, ctx: &mut SliceContext<'_>) -> Result<Vec<RegionContents>> {
        let key = self.settings.metadata_key();
        let mut round_robins: BTreeMap<String, usize> = BTreeMap::new();
        for region in ctx.regions_of(Self::NAME)? {
            if region.text("part") != Some(key.as_str()) {
                continue;
            }
            if let Some(root) = region.text("root") {
                *round_robins.entry(root.to_string()).or_default() += 1;
            }
        }

        let mut contents = Vec::with_capacity(ctx.items.len());
        for &item in &ctx.items {
            let audio = ctx.host.load_audio(item)?;
            let mut wildcards = tag_values(
                ctx.mask,
                &self.settings.articulation,
                &self.settings.part,
                self.settings.dynamic.as_deref(),
                &self.settings.custom,
            );
            wildcards.extend(WildcardValues::from_audio(ctx.mask, &audio, ctx.analysis)?);
            let root = ctx.root(&wildcards, &audio)?;

            let count = round_robins.entry(root.clone()).or_default();
            *count += 1;
            let rr = *count;
            wildcards.set_if_used(ctx.mask, Wildcard::Rr, rr);

            contents.push(RegionContents {
                wildcards,
                bounds: ctx.host.item_bounds(item)?,
                label: "shorts region".into(),
                metadata: metadata! {
                    "root" => root,
                    "part" => key.clone(),
                    "rr" => rr,
                },
            });
        }
        Ok(contents)
    }
}

impl Articulation for ShortsArticulation {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn actions(&self) -> &'static [&'static str] {
        &[CUT, REGIONS, FADE]
    }

    fn read(&self, ctx: &mut SliceContext<'_>, action: &str) -> Result<Option<Vec<RegionContents>>> {
        match action {
            CUT => {
                self.cut(ctx)?;
                Ok(None)
            }
            REGIONS => Ok(Some(self.regions(ctx)?)),
            FADE => {
                let key = self.settings.metadata_key();
                let regions: Vec<_> = ctx
                    .regions_of(Self::NAME)?
                    .into_iter()
                    .filter(|r| r.text("part") == Some(key.as_str()))
                    .collect();
                fade_items_within(&mut *ctx.host, &regions, self.settings.fade())?;
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
    use crate::memory_host::{HostOp, MemoryHost};
    use crate::wildcard::RegionMask;

    const SR: u32 = 22050;
    const HITS: [f64; 3] = [0.5, 1.5, 2.5];

    /// Three decaying 440 Hz plucks on silence.
    fn plucks() -> AudioBuffer {
        let len = (3.5 * SR as f64) as usize;
        let mut samples = vec![0.0f32; len];
        for &hit in &HITS {
            let start = (hit * SR as f64) as usize;
            for i in 0..(0.4 * SR as f64) as usize {
                let t = i as f64 / SR as f64;
                let value = 0.8 * (-12.0 * t).exp() * (2.0 * std::f64::consts::PI * 440.0 * t).sin();
                samples[start + i] = value as f32;
            }
        }
        AudioBuffer::new(samples, SR).unwrap()
    }

    fn settings() -> ShortsSettings {
        ShortsSettings {
            onset: OnsetConfig {
                pre_max: 0.1,
                wait: 0.5,
                ..OnsetConfig::default()
            },
            ..ShortsSettings::default()
        }
    }

    #[test]
    fn test_sample_bounds_bracket_each_hit() {
        let art = ShortsArticulation::new(settings());
        let bounds = art.sample_bounds(&plucks(), &AnalysisHandle::default()).unwrap();
        assert_eq!(bounds.len(), 3);
        for (&(start, end), &hit) in bounds.iter().zip(&HITS) {
            let start = start as f64 / SR as f64;
            let end = end as f64 / SR as f64;
            assert!(start > hit - 0.25 && start < hit + 0.05, "start {} for hit {}", start, hit);
            assert!(end > hit + 0.3 && end < hit + 0.7, "end {} for hit {}", end, hit);
        }
    }

    #[test]
    fn test_cut_runs_right_to_left() {
        let mut host = MemoryHost::new(plucks());
        let mask = RegionMask::default();
        let analysis = AnalysisHandle::default();
        let items = host.items();
        let art = ShortsArticulation::new(settings());
        let kept = {
            let mut ctx = SliceContext::new(&mut host, items, &mask, "", &analysis);
            assert!(art.read(&mut ctx, "cut").unwrap().is_none());
            ctx.items.clone()
        };
        assert_eq!(kept.len(), 3);
        assert_eq!(host.items().len(), 3);
        assert_eq!(host.markers().len(), 3);

        let splits: Vec<f64> = host
            .log()
            .iter()
            .filter_map(|op| match op {
                HostOp::Split { position, .. } => Some(*position),
                _ => None,
            })
            .collect();
        assert!(!splits.is_empty());
        assert!(splits.windows(2).all(|w| w[0] > w[1]));

        let starts: Vec<f64> = kept
            .iter()
            .map(|&item| host.item_bounds(item).unwrap().start())
            .collect();
        assert!(starts.windows(2).all(|w| w[0] < w[1]));
        for &item in &kept {
            assert!(host.item(item).unwrap().fade_out.is_some());
        }
    }

    #[test]
    fn test_regions_count_round_robins() {
        let mut host = MemoryHost::new(plucks());
        let mask = RegionMask::new("$articulation,$rr,$root", "_");
        let analysis = AnalysisHandle::default();
        let items = host.items();
        let art = ShortsArticulation::new(settings());

        let (contents, kept) = {
            let mut ctx = SliceContext::new(&mut host, items, &mask, "", &analysis);
            art.read(&mut ctx, "cut").unwrap();
            (art.read(&mut ctx, "regions").unwrap().unwrap(), ctx.items.clone())
        };
        let names: Vec<String> = write_regions(&mut host, &mask, "", art.name(), contents)
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["pick_1_A4", "pick_2_A4", "pick_3_A4"]);

        // a second pass continues the numbering
        let again = {
            let mut ctx = SliceContext::new(&mut host, kept[..1].to_vec(), &mask, "", &analysis);
            art.read(&mut ctx, "regions").unwrap().unwrap()
        };
        assert_eq!(again[0].metadata["rr"].as_i64(), Some(4));
        assert_eq!(again[0].metadata["part"].as_str(), Some("picksus"));
    }

    #[test]
    fn test_silent_item_is_left_untouched() {
        let mut host = MemoryHost::new(AudioBuffer::new(vec![0.0; SR as usize], SR).unwrap());
        let mask = RegionMask::default();
        let analysis = AnalysisHandle::default();
        let items = host.items();
        let mut ctx = SliceContext::new(&mut host, items.clone(), &mask, "", &analysis);
        ShortsArticulation::new(settings()).read(&mut ctx, "cut").unwrap();
        assert_eq!(ctx.items, items);
    }

    #[test]
    fn test_settings_from_params() {
        let params = metadata! {
            "articulation" => "pizz",
            "part" => "stacc",
            "wait" => 1.0,
            "fmin" => 0.0,
            "fade_shape" => "flat",
        };
        let settings = ShortsSettings::from_params(&params).unwrap();
        assert_eq!(settings.metadata_key(), "pizzstacc");
        assert_eq!(settings.onset.wait, 1.0);
        assert_eq!(settings.onset.fmin, None);
        assert_eq!(settings.fade_shape, FadeShape::Linear);

        let bad = metadata! { "wait" => -1.0 };
        assert!(ShortsSettings::from_params(&bad).is_err());
    }
}
