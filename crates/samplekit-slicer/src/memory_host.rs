//! In-memory [`RegionHost`]
//!
//! Items are windows onto one source recording. Every mutating call is
//! appended to an operation log so the order of edits can be inspected.

use crate::fade::{Fade, FadeDirection};
use crate::host::{ItemId, RegionHost, RegionId};
use crate::metadata::TaggedRegion;
use crate::{Error, Result};
use samplekit_core::{AudioBuffer, RegionBounds};
use std::collections::BTreeMap;

/// Positions closer than this are treated as equal.
const EPSILON: f64 = 1e-9;

/// One item: a window of the source placed on the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryItem {
    pub position: f64,
    /// Offset into the source, seconds.
    pub source_offset: f64,
    pub length: f64,
    pub fade_in: Option<Fade>,
    pub fade_out: Option<Fade>,
}

impl MemoryItem {
    pub fn end(&self) -> f64 {
        self.position + self.length
    }
}

/// Recorded host operation.
#[derive(Debug, Clone, PartialEq)]
pub enum HostOp {
    Split {
        item: ItemId,
        position: f64,
        right: ItemId,
    },
    Copy {
        from: ItemId,
        to: ItemId,
        position: f64,
    },
    Move {
        item: ItemId,
        position: f64,
    },
    SetLength {
        item: ItemId,
        length: f64,
    },
    Delete {
        item: ItemId,
    },
    SetFade {
        item: ItemId,
        fade: Fade,
    },
    AddMarker {
        position: f64,
        name: String,
    },
    CreateRegion {
        region: RegionId,
        bounds: RegionBounds,
        name: String,
    },
    SetLoopPoints {
        bounds: RegionBounds,
    },
}

/// Host project held in memory, backed by a single source buffer.
#[derive(Debug, Clone)]
pub struct MemoryHost {
    source: AudioBuffer,
    items: BTreeMap<ItemId, MemoryItem>,
    regions: Vec<(RegionId, TaggedRegion)>,
    markers: Vec<(f64, String)>,
    loop_points: Option<RegionBounds>,
    log: Vec<HostOp>,
    next_item: u64,
    next_region: u64,
}

impl MemoryHost {
    /// Empty project over `source`.
    pub fn empty(source: AudioBuffer) -> Self {
        Self {
            source,
            items: BTreeMap::new(),
            regions: Vec::new(),
            markers: Vec::new(),
            loop_points: None,
            log: Vec::new(),
            next_item: 0,
            next_region: 0,
        }
    }

    /// Project with one item at position 0 spanning the whole source.
    pub fn new(source: AudioBuffer) -> Self {
        let length = source.duration_secs();
        let mut host = Self::empty(source);
        host.place(MemoryItem {
            position: 0.0,
            source_offset: 0.0,
            length,
            fade_in: None,
            fade_out: None,
        });
        host
    }

    /// Place a new item showing `[source_offset, source_offset + length)`.
    pub fn insert_item(&mut self, position: f64, source_offset: f64, length: f64) -> Result<ItemId> {
        self.check_window(source_offset, length)?;
        Ok(self.place(MemoryItem {
            position,
            source_offset,
            length,
            fade_in: None,
            fade_out: None,
        }))
    }

    pub fn item(&self, id: ItemId) -> Option<&MemoryItem> {
        self.items.get(&id)
    }

    pub fn source(&self) -> &AudioBuffer {
        &self.source
    }

    pub fn markers(&self) -> &[(f64, String)] {
        &self.markers
    }

    pub fn loop_points(&self) -> Option<RegionBounds> {
        self.loop_points
    }

    pub fn log(&self) -> &[HostOp] {
        &self.log
    }

    /// Mix every item, with fades, into one buffer starting at time 0.
    pub fn render(&self) -> Result<AudioBuffer> {
        let sr = self.source.sample_rate();
        let end = self.items.values().map(MemoryItem::end).fold(0.0, f64::max);
        let mut out = vec![0.0f32; to_sample(end, sr)];
        let source = self.source.samples();

        for item in self.items.values() {
            let dst = to_sample(item.position, sr);
            let src = to_sample(item.source_offset, sr);
            let len = to_sample(item.length, sr)
                .min(source.len().saturating_sub(src))
                .min(out.len().saturating_sub(dst));
            for i in 0..len {
                let t = i as f64 / sr as f64;
                let mut gain = 1.0;
                if let Some(fade) = &item.fade_in {
                    gain *= fade.gain_at(t, item.length);
                }
                if let Some(fade) = &item.fade_out {
                    gain *= fade.gain_at(t, item.length);
                }
                out[dst + i] += source[src + i] * gain as f32;
            }
        }
        Ok(AudioBuffer::new(out, sr)?)
    }

    fn place(&mut self, item: MemoryItem) -> ItemId {
        let id = ItemId(self.next_item);
        self.next_item += 1;
        self.items.insert(id, item);
        id
    }

    fn get(&self, id: ItemId) -> Result<&MemoryItem> {
        self.items
            .get(&id)
            .ok_or_else(|| Error::Host(format!("{} does not exist", id)))
    }

    fn get_mut(&mut self, id: ItemId) -> Result<&mut MemoryItem> {
        self.items
            .get_mut(&id)
            .ok_or_else(|| Error::Host(format!("{} does not exist", id)))
    }

    fn check_window(&self, source_offset: f64, length: f64) -> Result<()> {
        let available = self.source.duration_secs() - source_offset;
        if source_offset < -EPSILON || length <= 0.0 || length > available + EPSILON {
            return Err(Error::Host(format!(
                "window [{}, {}) lies outside the {:.3}s source",
                source_offset,
                source_offset + length,
                self.source.duration_secs()
            )));
        }
        Ok(())
    }
}

#[inline]
fn to_sample(secs: f64, sample_rate: u32) -> usize {
    (secs * sample_rate as f64).round().max(0.0) as usize
}

impl RegionHost for MemoryHost {
    fn item_bounds(&self, item: ItemId) -> Result<RegionBounds> {
        let item = self.get(item)?;
        Ok(RegionBounds::new(item.position, item.end())?)
    }

    fn load_audio(&self, item: ItemId) -> Result<AudioBuffer> {
        let item = self.get(item)?;
        let sr = self.source.sample_rate();
        let start = to_sample(item.source_offset, sr).min(self.source.len());
        let end = (start + to_sample(item.length, sr)).min(self.source.len());
        Ok(self.source.sub_buffer(start, end)?)
    }

    fn items(&self) -> Vec<ItemId> {
        self.items.keys().copied().collect()
    }

    fn split(&mut self, item: ItemId, position: f64) -> Result<(ItemId, ItemId)> {
        let original = self.get(item)?.clone();
        if position <= original.position + EPSILON || position >= original.end() - EPSILON {
            return Err(Error::Host(format!(
                "split position {} is outside {} [{}, {})",
                position,
                item,
                original.position,
                original.end()
            )));
        }

        let left_len = position - original.position;
        let right = self.place(MemoryItem {
            position,
            source_offset: original.source_offset + left_len,
            length: original.length - left_len,
            fade_in: None,
            fade_out: original.fade_out,
        });
        let left = self.get_mut(item)?;
        left.length = left_len;
        left.fade_out = None;

        self.log.push(HostOp::Split {
            item,
            position,
            right,
        });
        Ok((item, right))
    }

    fn copy(&mut self, item: ItemId, position: f64) -> Result<ItemId> {
        let mut copy = self.get(item)?.clone();
        copy.position = position;
        let to = self.place(copy);
        self.log.push(HostOp::Copy {
            from: item,
            to,
            position,
        });
        Ok(to)
    }

    fn move_item(&mut self, item: ItemId, position: f64) -> Result<()> {
        self.get_mut(item)?.position = position;
        self.log.push(HostOp::Move { item, position });
        Ok(())
    }

    fn set_length(&mut self, item: ItemId, length: f64) -> Result<()> {
        let offset = self.get(item)?.source_offset;
        self.check_window(offset, length)?;
        self.get_mut(item)?.length = length;
        self.log.push(HostOp::SetLength { item, length });
        Ok(())
    }

    fn delete(&mut self, item: ItemId) -> Result<()> {
        self.items
            .remove(&item)
            .ok_or_else(|| Error::Host(format!("{} does not exist", item)))?;
        self.log.push(HostOp::Delete { item });
        Ok(())
    }

    fn set_fade(&mut self, item: ItemId, fade: Fade) -> Result<()> {
        let target = self.get_mut(item)?;
        match fade.direction {
            FadeDirection::In => target.fade_in = Some(fade),
            FadeDirection::Out => target.fade_out = Some(fade),
        }
        self.log.push(HostOp::SetFade { item, fade });
        Ok(())
    }

    fn add_marker(&mut self, position: f64, name: &str) -> Result<()> {
        self.markers.push((position, name.to_string()));
        self.log.push(HostOp::AddMarker {
            position,
            name: name.to_string(),
        });
        Ok(())
    }

    fn create_region(&mut self, region: &TaggedRegion) -> Result<RegionId> {
        let id = RegionId(self.next_region);
        self.next_region += 1;
        self.regions.push((id, region.clone()));
        self.log.push(HostOp::CreateRegion {
            region: id,
            bounds: region.bounds,
            name: region.name.clone(),
        });
        Ok(id)
    }

    fn regions(&self) -> Result<Vec<(RegionId, TaggedRegion)>> {
        Ok(self.regions.clone())
    }

    fn set_loop_points(&mut self, bounds: RegionBounds) -> Result<()> {
        self.loop_points = Some(bounds);
        self.log.push(HostOp::SetLoopPoints { bounds });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fade::FadeShape;
    use crate::host::split_all;
    use approx::assert_abs_diff_eq;

    fn ramp_host() -> MemoryHost {
        let samples: Vec<f32> = (0..1000).map(|i| i as f32 / 1000.0).collect();
        MemoryHost::new(AudioBuffer::new(samples, 1000).unwrap())
    }

    #[test]
    fn test_split_keeps_left_handle() {
        let mut host = ramp_host();
        let item = host.items()[0];
        let (left, right) = host.split(item, 0.25).unwrap();
        assert_eq!(left, item);
        assert_ne!(right, item);

        let audio = host.load_audio(right).unwrap();
        assert_eq!(audio.len(), 750);
        assert_abs_diff_eq!(audio.samples()[0], 0.25);
        assert_abs_diff_eq!(host.item_bounds(left).unwrap().end(), 0.25);
    }

    #[test]
    fn test_split_outside_item_fails() {
        let mut host = ramp_host();
        let item = host.items()[0];
        assert!(matches!(host.split(item, 0.0), Err(Error::Host(_))));
        assert!(matches!(host.split(item, 1.5), Err(Error::Host(_))));
        assert!(host.log().is_empty());
    }

    #[test]
    fn test_copy_move_and_length() {
        let mut host = ramp_host();
        let item = host.items()[0];
        let copy = host.copy(item, 0.0).unwrap();
        host.move_item(copy, 2.0).unwrap();
        host.set_length(copy, 0.1).unwrap();
        let bounds = host.item_bounds(copy).unwrap();
        assert_abs_diff_eq!(bounds.start(), 2.0);
        assert_abs_diff_eq!(bounds.end(), 2.1, epsilon = 1e-12);
        assert!(host.set_length(copy, 5.0).is_err());
    }

    #[test]
    fn test_delete_and_unknown_item() {
        let mut host = ramp_host();
        let item = host.items()[0];
        host.delete(item).unwrap();
        assert!(host.items().is_empty());
        assert!(host.delete(item).is_err());
        assert!(host.load_audio(item).is_err());
    }

    #[test]
    fn test_render_applies_fades() {
        let buffer = AudioBuffer::new(vec![1.0; 1000], 1000).unwrap();
        let mut host = MemoryHost::new(buffer);
        let item = host.items()[0];
        host.set_fade(item, Fade::fade_in(0.1, FadeShape::Linear)).unwrap();
        host.set_fade(item, Fade::fade_out(0.1, FadeShape::Linear)).unwrap();
        let out = host.render().unwrap();
        assert_eq!(out.len(), 1000);
        assert_abs_diff_eq!(out.samples()[0], 0.0);
        assert_abs_diff_eq!(out.samples()[50], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(out.samples()[500], 1.0);
        assert!(out.samples()[999] < 0.02);
    }

    #[test]
    fn test_split_all_passes_through_items_outside_cut() {
        let buffer = AudioBuffer::new(vec![0.5; 1000], 1000).unwrap();
        let mut host = MemoryHost::empty(buffer);
        let a = host.insert_item(0.0, 0.0, 0.4).unwrap();
        let b = host.insert_item(0.5, 0.5, 0.5).unwrap();
        let (left, right) = split_all(&mut host, &[a, b], 0.7).unwrap();
        assert_eq!(left, vec![a, b]);
        assert_eq!(right.len(), 1);
        assert_abs_diff_eq!(host.item_bounds(right[0]).unwrap().start(), 0.7);
    }
}
