//! Host editing capability
//!
//! The slicer never touches a project directly. Everything it needs from the
//! DAW (reading an item's audio, cutting, moving, fading, writing regions)
//! goes through [`RegionHost`]. Positions and lengths are in seconds on the
//! host timeline.

use crate::fade::Fade;
use crate::metadata::TaggedRegion;
use crate::Result;
use core::fmt;
use samplekit_core::{AudioBuffer, RegionBounds};

/// Handle of an item on the host timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item#{}", self.0)
    }
}

/// Handle of a region created through the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct RegionId(pub u64);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region#{}", self.0)
    }
}

/// Editing primitives of a host project.
///
/// `split` keeps the original handle for the left piece and returns a new
/// handle for the right piece, so handles of material left of a cut stay
/// valid while cuts proceed right to left.
pub trait RegionHost {
    /// Timeline bounds of `item`.
    fn item_bounds(&self, item: ItemId) -> Result<RegionBounds>;

    /// Mono audio of the visible part of `item`, fades not applied.
    fn load_audio(&self, item: ItemId) -> Result<AudioBuffer>;

    /// Every item currently on the timeline.
    fn items(&self) -> Vec<ItemId>;

    /// Split `item` at `position`, which must lie strictly inside it.
    fn split(&mut self, item: ItemId, position: f64) -> Result<(ItemId, ItemId)>;

    /// Duplicate `item` at `position`.
    fn copy(&mut self, item: ItemId, position: f64) -> Result<ItemId>;

    fn move_item(&mut self, item: ItemId, position: f64) -> Result<()>;

    /// Change the length of `item`, keeping its position and source offset.
    fn set_length(&mut self, item: ItemId, length: f64) -> Result<()>;

    fn delete(&mut self, item: ItemId) -> Result<()>;

    fn set_fade(&mut self, item: ItemId, fade: Fade) -> Result<()>;

    fn add_marker(&mut self, position: f64, name: &str) -> Result<()>;

    fn create_region(&mut self, region: &TaggedRegion) -> Result<RegionId>;

    /// Regions created so far, with their metadata.
    fn regions(&self) -> Result<Vec<(RegionId, TaggedRegion)>>;

    fn set_loop_points(&mut self, bounds: RegionBounds) -> Result<()>;
}

/// Bounds covering every item in `items`.
pub fn union_bounds(host: &dyn RegionHost, items: &[ItemId]) -> Result<RegionBounds> {
    let mut start = f64::INFINITY;
    let mut end = f64::NEG_INFINITY;
    for &item in items {
        let bounds = host.item_bounds(item)?;
        start = start.min(bounds.start());
        end = end.max(bounds.end());
    }
    Ok(RegionBounds::new(start, end)?)
}

/// Split every item of `items` that straddles `position`.
///
/// Returns the pieces left and right of the cut. Items entirely on one side
/// are passed through unchanged.
pub fn split_all(
    host: &mut dyn RegionHost,
    items: &[ItemId],
    position: f64,
) -> Result<(Vec<ItemId>, Vec<ItemId>)> {
    let mut left = Vec::new();
    let mut right = Vec::new();
    for &item in items {
        let bounds = host.item_bounds(item)?;
        if position <= bounds.start() {
            right.push(item);
        } else if position >= bounds.end() {
            left.push(item);
        } else {
            let (l, r) = host.split(item, position)?;
            left.push(l);
            right.push(r);
        }
    }
    Ok((left, right))
}

/// Delete every item of `items`.
pub fn delete_all(host: &mut dyn RegionHost, items: &[ItemId]) -> Result<()> {
    for &item in items {
        host.delete(item)?;
    }
    Ok(())
}

/// Delete everything left of `position` and return the items right of it.
///
/// Fails without touching the host when nothing extends past `position`.
pub fn trim_before(host: &mut dyn RegionHost, items: &[ItemId], position: f64) -> Result<Vec<ItemId>> {
    let end = union_bounds(&*host, items)?.end();
    if position >= end {
        return Err(samplekit_core::Error::InvalidBounds { start: position, end }.into());
    }
    let (before, rest) = split_all(host, items, position)?;
    delete_all(host, &before)?;
    Ok(rest)
}
