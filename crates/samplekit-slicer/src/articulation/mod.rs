//! Articulation strategies
//!
//! An articulation knows how to cut one kind of recording (sustained notes,
//! short round-robin hits, ...) and which regions to make from the result.
//! Strategies are created by name from an [`ArticulationRegistry`] and driven
//! through [`Articulation::read`] with a named action.

mod registry;
mod shorts;
mod sustain;

pub use registry::{
    get_param, get_param_or, ArticulationConstructor, ArticulationParams, ArticulationRegistry,
};
pub use shorts::{ShortsArticulation, ShortsSettings};
pub use sustain::{SustainArticulation, SustainSettings};

use crate::fade::Fade;
use crate::host::{union_bounds, ItemId, RegionHost};
use crate::metadata::{RegionMetadata, TaggedRegion};
use crate::wildcard::{RegionMask, Wildcard, WildcardValues};
use crate::{Error, Result};
use samplekit_analysis::AnalysisHandle;
use samplekit_core::{AudioBuffer, RegionBounds};
use std::collections::BTreeMap;

/// Positions closer than this are treated as equal.
pub(crate) const EPSILON: f64 = 1e-9;

/// A region an articulation wants created, before its name is rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionContents {
    pub wildcards: WildcardValues,
    pub bounds: RegionBounds,
    /// Short description of the edit, e.g. for an undo history.
    pub label: String,
    pub metadata: RegionMetadata,
}

/// Everything an articulation works on during one action.
pub struct SliceContext<'a> {
    pub host: &'a mut dyn RegionHost,
    /// Target items. Actions that cut replace them with the pieces kept.
    pub items: Vec<ItemId>,
    pub mask: &'a RegionMask,
    pub instrument: &'a str,
    pub analysis: &'a AnalysisHandle,
}

impl<'a> SliceContext<'a> {
    pub fn new(
        host: &'a mut dyn RegionHost,
        items: Vec<ItemId>,
        mask: &'a RegionMask,
        instrument: &'a str,
        analysis: &'a AnalysisHandle,
    ) -> Self {
        Self {
            host,
            items,
            mask,
            instrument,
            analysis,
        }
    }

    /// Bounds covering every target item.
    pub fn bounds(&self) -> Result<RegionBounds> {
        union_bounds(&*self.host, &self.items)
    }

    /// First target item; its audio drives the analysis of multi-item takes.
    pub fn first_item(&self) -> Result<ItemId> {
        self.items
            .first()
            .copied()
            .ok_or_else(|| Error::Articulation("no items to work on".into()))
    }

    /// Root note from `values`, estimated from `audio` when not resolved yet.
    pub fn root(&self, values: &WildcardValues, audio: &AudioBuffer) -> Result<String> {
        match values.get(&Wildcard::Root) {
            Some(root) => Ok(root.to_string()),
            None => Ok(self.analysis.estimate_root_note(audio)?),
        }
    }

    /// Regions created earlier by `articulation`.
    pub fn regions_of(&self, articulation: &str) -> Result<Vec<TaggedRegion>> {
        Ok(self
            .host
            .regions()?
            .into_iter()
            .map(|(_, region)| region)
            .filter(|region| region.articulation == articulation)
            .collect())
    }

    /// Region of `articulation` carrying `key` that starts closest before
    /// `position`.
    pub fn closest_region_left(
        &self,
        articulation: &str,
        position: f64,
        key: &str,
    ) -> Result<Option<TaggedRegion>> {
        Ok(self
            .regions_of(articulation)?
            .into_iter()
            .filter(|r| r.metadata.contains_key(key) && r.bounds.start() <= position + EPSILON)
            .max_by(|a, b| a.bounds.start().total_cmp(&b.bounds.start())))
    }
}

/// A strategy for cutting one kind of recording.
pub trait Articulation {
    fn name(&self) -> &str;

    /// Action names accepted by [`read`](Articulation::read).
    fn actions(&self) -> &'static [&'static str];

    /// Run `action`. Returns the regions to create, if the action makes any.
    fn read(&self, ctx: &mut SliceContext<'_>, action: &str) -> Result<Option<Vec<RegionContents>>>;
}

/// Render names for `contents` and create the regions through `host`.
pub fn write_regions(
    host: &mut dyn RegionHost,
    mask: &RegionMask,
    instrument: &str,
    articulation: &str,
    contents: Vec<RegionContents>,
) -> Result<Vec<TaggedRegion>> {
    let mut written = Vec::with_capacity(contents.len());
    for content in contents {
        let mut values = content.wildcards;
        values.set_if_used(mask, Wildcard::Instrument, instrument);
        let name = mask.render(&values);
        let region = TaggedRegion::new(content.bounds, name, articulation, content.metadata);
        let id = host.create_region(&region)?;
        tracing::info!(
            %id,
            name = %region.name,
            start = region.bounds.start(),
            end = region.bounds.end(),
            label = %content.label,
            "Region created"
        );
        written.push(region);
    }
    Ok(written)
}

/// Wildcards every strategy fills from its settings.
pub(crate) fn tag_values(
    mask: &RegionMask,
    articulation: &str,
    part: &str,
    dynamic: Option<&str>,
    custom: &BTreeMap<String, String>,
) -> WildcardValues {
    let mut values = WildcardValues::new();
    values
        .set_if_used(mask, Wildcard::Articulation, articulation)
        .set_if_used(mask, Wildcard::Part, part);
    if let Some(dynamic) = dynamic {
        values.set_if_used(mask, Wildcard::Dyn, dynamic);
    }
    for (name, value) in custom {
        values.set_if_used(mask, Wildcard::Custom(name.clone()), value);
    }
    values
}

/// Apply `fade` to every item lying entirely inside one of `regions`.
pub(crate) fn fade_items_within(
    host: &mut dyn RegionHost,
    regions: &[TaggedRegion],
    fade: Fade,
) -> Result<usize> {
    let mut faded = 0;
    for item in host.items() {
        let bounds = host.item_bounds(item)?;
        let inside = regions.iter().any(|r| {
            bounds.start() >= r.bounds.start() - EPSILON && bounds.end() <= r.bounds.end() + EPSILON
        });
        if inside {
            let length = fade.length.min(bounds.duration());
            host.set_fade(item, Fade { length, ..fade })?;
            faded += 1;
        }
    }
    tracing::info!(faded, "Fades applied");
    Ok(faded)
}

pub(crate) fn unknown_action(articulation: &str, action: &str) -> Error {
    Error::Articulation(format!(
        "'{}' has no action '{}'",
        articulation, action
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_host::MemoryHost;
    use crate::metadata;

    #[test]
    fn test_write_regions_renders_names() {
        let mut host = MemoryHost::new(AudioBuffer::new(vec![0.0; 100], 100).unwrap());
        let mask = RegionMask::new("$instrument,$part,$rr", "_");
        let mut wildcards = WildcardValues::new();
        wildcards.set(Wildcard::Part, "sus");
        let contents = vec![RegionContents {
            wildcards,
            bounds: RegionBounds::new(0.0, 0.5).unwrap(),
            label: "test".into(),
            metadata: metadata! { "part" => "sus" },
        }];
        let written = write_regions(&mut host, &mask, "cello", "sustain", contents).unwrap();
        assert_eq!(written[0].name, "cello_sus");
        assert_eq!(host.regions().unwrap()[0].1.articulation, "sustain");
    }

    #[test]
    fn test_closest_region_left() {
        let mut host = MemoryHost::new(AudioBuffer::new(vec![0.0; 1000], 100).unwrap());
        for (start, key) in [(0.0, "median_rms"), (2.0, "median_rms"), (3.0, "other"), (6.0, "median_rms")] {
            let region = TaggedRegion::new(
                RegionBounds::new(start, start + 1.0).unwrap(),
                "r",
                "sustain",
                metadata! { key => 0.1 },
            );
            host.create_region(&region).unwrap();
        }
        let mask = RegionMask::default();
        let analysis = AnalysisHandle::default();
        let items = host.items();
        let ctx = SliceContext::new(&mut host, items, &mask, "", &analysis);
        let found = ctx.closest_region_left("sustain", 5.0, "median_rms").unwrap().unwrap();
        assert_eq!(found.bounds.start(), 2.0);
        assert!(ctx.closest_region_left("shorts", 5.0, "median_rms").unwrap().is_none());
    }

    #[test]
    fn test_tag_values_only_for_used_wildcards() {
        let mask = RegionMask::new("$articulation,$sul", "_");
        let mut custom = BTreeMap::new();
        custom.insert("sul".to_string(), "sulTop".to_string());
        let values = tag_values(&mask, "trem", "sus", Some("ff"), &custom);
        assert_eq!(mask.render(&values), "trem_sulTop");
        assert!(!values.contains(&Wildcard::Dyn));
    }
}
