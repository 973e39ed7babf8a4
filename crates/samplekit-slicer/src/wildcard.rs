//! Region name masks
//!
//! A mask is a comma-separated list of tokens such as
//! `$instrument,$articulation,$dyn,$root`. Each token is rendered by
//! replacing the wildcards it contains; a token that still holds an
//! unresolved `$` afterwards is dropped, and the rest are joined with the
//! separator.

use crate::Result;
use core::fmt;
use core::str::FromStr;
use samplekit_analysis::{amplitude_to_db, AnalysisHandle};
use samplekit_core::AudioBuffer;
use std::collections::BTreeMap;

/// Region name wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum Wildcard {
    Root,
    Peak,
    Rms,
    Median,
    Instrument,
    Articulation,
    Part,
    Dyn,
    Rr,
    /// Strategy-specific tag, written without the `$`.
    Custom(String),
}

impl Wildcard {
    pub const BUILTIN: [Wildcard; 9] = [
        Wildcard::Root,
        Wildcard::Peak,
        Wildcard::Rms,
        Wildcard::Median,
        Wildcard::Instrument,
        Wildcard::Articulation,
        Wildcard::Part,
        Wildcard::Dyn,
        Wildcard::Rr,
    ];

    /// Token as it appears in a mask, e.g. `$root`.
    pub fn token(&self) -> String {
        match self {
            Wildcard::Root => "$root".into(),
            Wildcard::Peak => "$peak".into(),
            Wildcard::Rms => "$rms".into(),
            Wildcard::Median => "$median".into(),
            Wildcard::Instrument => "$instrument".into(),
            Wildcard::Articulation => "$articulation".into(),
            Wildcard::Part => "$part".into(),
            Wildcard::Dyn => "$dyn".into(),
            Wildcard::Rr => "$rr".into(),
            Wildcard::Custom(name) => format!("${}", name),
        }
    }

    /// Audio-derived wildcards are computed from the item's samples.
    pub fn is_audio_derived(&self) -> bool {
        matches!(
            self,
            Wildcard::Root | Wildcard::Peak | Wildcard::Rms | Wildcard::Median
        )
    }
}

impl fmt::Display for Wildcard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

impl FromStr for Wildcard {
    type Err = core::convert::Infallible;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        let name = s.trim().trim_start_matches('$');
        Ok(Self::BUILTIN
            .iter()
            .find(|w| w.token()[1..] == *name)
            .cloned()
            .unwrap_or_else(|| Wildcard::Custom(name.to_string())))
    }
}

/// Resolved wildcard values for one region.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WildcardValues {
    values: BTreeMap<Wildcard, String>,
}

impl WildcardValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, wildcard: Wildcard, value: impl ToString) -> &mut Self {
        self.values.insert(wildcard, value.to_string());
        self
    }

    /// Set `wildcard` only when `mask` uses it.
    pub fn set_if_used(
        &mut self,
        mask: &RegionMask,
        wildcard: Wildcard,
        value: impl ToString,
    ) -> &mut Self {
        if mask.contains(&wildcard) {
            self.set(wildcard, value);
        }
        self
    }

    pub fn get(&self, wildcard: &Wildcard) -> Option<&str> {
        self.values.get(wildcard).map(String::as_str)
    }

    pub fn contains(&self, wildcard: &Wildcard) -> bool {
        self.values.contains_key(wildcard)
    }

    /// Merge `other` in, overwriting existing entries.
    pub fn extend(&mut self, other: WildcardValues) {
        self.values.extend(other.values);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Compute the audio-derived wildcards `mask` asks for.
    ///
    /// Levels are in dB, formatted `{:5.2}`. Nothing is computed for
    /// wildcards the mask doesn't use.
    pub fn from_audio(
        mask: &RegionMask,
        buffer: &AudioBuffer,
        analysis: &AnalysisHandle,
    ) -> Result<Self> {
        let mut values = Self::new();
        if mask.contains(&Wildcard::Root) {
            values.set(Wildcard::Root, analysis.estimate_root_note(buffer)?);
        }
        if mask.contains(&Wildcard::Peak) {
            let peak = amplitude_to_db(buffer.peak() as f64)?;
            values.set(Wildcard::Peak, format!("{:5.2}", peak));
        }
        if mask.contains(&Wildcard::Rms) {
            let rms = amplitude_to_db(analysis.rms(buffer)?)?;
            values.set(Wildcard::Rms, format!("{:5.2}", rms));
        }
        if mask.contains(&Wildcard::Median) {
            let median = amplitude_to_db(analysis.median_rms(buffer)?)?;
            values.set(Wildcard::Median, format!("{:5.2}", median));
        }
        Ok(values)
    }

    /// Replace every known wildcard in `token`, longest tokens first.
    fn substitute(&self, token: &str) -> String {
        let mut ordered: Vec<(String, &str)> = self
            .values
            .iter()
            .map(|(w, v)| (w.token(), v.as_str()))
            .collect();
        ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let mut out = token.to_string();
        for (pattern, value) in ordered {
            if out.contains(&pattern) {
                out = out.replace(&pattern, value);
            }
        }
        out
    }
}

/// Comma-separated region name mask with its separator.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct RegionMask {
    tokens: Vec<String>,
    separator: String,
}

impl Default for RegionMask {
    fn default() -> Self {
        Self::new("$instrument,$articulation,$part,$dyn,$rr,$root", "_")
    }
}

impl RegionMask {
    pub fn new(mask: &str, separator: impl Into<String>) -> Self {
        Self {
            tokens: mask.split(',').map(str::to_string).collect(),
            separator: separator.into(),
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Whether any token uses `wildcard`.
    pub fn contains(&self, wildcard: &Wildcard) -> bool {
        let pattern = wildcard.token();
        self.tokens.iter().any(|t| t.contains(&pattern))
    }

    /// Render the region name from `values`.
    pub fn render(&self, values: &WildcardValues) -> String {
        self.tokens
            .iter()
            .map(|token| values.substitute(token))
            .filter(|token| !token.is_empty() && !token.contains('$'))
            .collect::<Vec<_>>()
            .join(&self.separator)
    }
}

impl fmt::Display for RegionMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens.join(","))
    }
}
