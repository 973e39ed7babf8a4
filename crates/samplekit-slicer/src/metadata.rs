//! Region metadata
//!
//! Articulation strategies attach a small string-keyed map to every region
//! they create (part, root note, median RMS, round-robin index) and read it
//! back later to relate new cuts to earlier ones.

use samplekit_core::RegionBounds;
use std::collections::BTreeMap;

/// Create a [`RegionMetadata`] map with key-value pairs.
///
/// # Example
/// ```
/// use samplekit_slicer::metadata;
///
/// let meta = metadata! {
///     "part" => "sus",
///     "median_rms" => 0.12,
/// };
/// assert_eq!(meta["part"].as_str(), Some("sus"));
/// ```
#[macro_export]
macro_rules! metadata {
    ($($key:expr => $value:expr),* $(,)?) => {{
        let mut map = $crate::RegionMetadata::new();
        $(
            map.insert($key.to_string(), $crate::MetaValue::from($value));
        )*
        map
    }};
}

/// Metadata map stored alongside a region.
pub type RegionMetadata = BTreeMap<String, MetaValue>;

/// Scalar metadata value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum MetaValue {
    Text(String),
    Float(f64),
    Int(i64),
    Bool(bool),
}

impl MetaValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl From<f64> for MetaValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<f32> for MetaValue {
    fn from(f: f32) -> Self {
        Self::Float(f as f64)
    }
}

impl From<i64> for MetaValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for MetaValue {
    fn from(i: i32) -> Self {
        Self::Int(i as i64)
    }
}

impl From<usize> for MetaValue {
    fn from(i: usize) -> Self {
        Self::Int(i as i64)
    }
}

impl From<bool> for MetaValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// A region ready for the host: bounds, rendered name, the articulation that
/// produced it and its metadata.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct TaggedRegion {
    pub bounds: RegionBounds,
    pub name: String,
    pub articulation: String,
    pub metadata: RegionMetadata,
}

impl TaggedRegion {
    pub fn new(
        bounds: RegionBounds,
        name: impl Into<String>,
        articulation: impl Into<String>,
        metadata: RegionMetadata,
    ) -> Self {
        Self {
            bounds,
            name: name.into(),
            articulation: articulation.into(),
            metadata,
        }
    }

    /// Text value of `key`, if present.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(MetaValue::as_str)
    }

    /// Numeric value of `key`, if present.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.metadata.get(key).and_then(MetaValue::as_f64)
    }
}
