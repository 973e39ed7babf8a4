//! Loop-point search
//!
//! Finds a start offset near the head of a buffer and an end offset near
//! its tail whose surrounding windows correlate best, so that cutting at
//! both points and crossfading yields a seamless loop.
//!
//! ## Algorithm
//!
//! With `W` the correlation window and `S` the slide range (both in samples):
//!
//! 1. **Initial search** - for `i in 0..S` correlate the head window
//!    `[i, i + W)` with the tail window `[len - W - i, len - i)`.
//! 2. **Refinement** - alternately fix the start and slide the tail window,
//!    then fix the tail and slide the head window, until the pair stops
//!    changing or the correlation reaches `corr_threshold`.
//! 3. **Acceptance** - the final correlation must reach `corr_min_threshold`.
//!
//! Every scan stops early at the first offset reaching `corr_threshold`, and
//! ties resolve to the smallest offset. Zero-variance windows score -1.

use crate::correlation::correlation_score;
use samplekit_core::{AudioBuffer, Error, LoopCandidate, Result, TimeUnit};

/// Loop search parameters, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct LoopSearchConfig {
    /// Length of the compared windows.
    pub corr_window_secs: f64,
    /// How far each window may slide.
    pub slide_window_secs: f64,
    /// Correlation that ends a scan immediately.
    pub corr_threshold: f64,
    /// Lowest acceptable final correlation.
    pub corr_min_threshold: f64,
    /// Cap on refinement rounds.
    pub max_iterations: usize,
}

impl Default for LoopSearchConfig {
    fn default() -> Self {
        Self {
            corr_window_secs: 0.35,
            slide_window_secs: 0.7,
            corr_threshold: 0.985,
            corr_min_threshold: 0.9,
            max_iterations: 20,
        }
    }
}

impl LoopSearchConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.corr_window_secs > 0.0) || !self.corr_window_secs.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "corr_window_secs must be positive and finite, got {}",
                self.corr_window_secs
            )));
        }
        if !(self.slide_window_secs > 0.0) || !self.slide_window_secs.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "slide_window_secs must be positive and finite, got {}",
                self.slide_window_secs
            )));
        }
        if !(-1.0..=1.0).contains(&self.corr_threshold)
            || !(-1.0..=1.0).contains(&self.corr_min_threshold)
        {
            return Err(Error::InvalidConfig(
                "correlation thresholds must be within [-1, 1]".into(),
            ));
        }
        if self.corr_min_threshold > self.corr_threshold {
            return Err(Error::InvalidConfig(format!(
                "corr_min_threshold ({}) exceeds corr_threshold ({})",
                self.corr_min_threshold, self.corr_threshold
            )));
        }
        if self.max_iterations == 0 {
            return Err(Error::InvalidConfig("max_iterations must be at least 1".into()));
        }
        Ok(())
    }

    /// Window and slide lengths in samples at `sample_rate`.
    pub fn window_samples(&self, sample_rate: u32) -> Result<(usize, usize)> {
        let window = TimeUnit::Seconds.to_samples(self.corr_window_secs, sample_rate, 0)?;
        let slide = TimeUnit::Seconds.to_samples(self.slide_window_secs, sample_rate, 0)?;
        Ok((window, slide))
    }
}

/// Accepted loop points.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct LoopMatch {
    /// `end_sample` is the far edge of the matched tail window.
    pub candidate: LoopCandidate,
    /// Correlation window length in samples.
    pub window: usize,
    /// Distance from the buffer end to `candidate.end_sample`.
    pub tail_offset: usize,
    /// Refinement rounds performed.
    pub iterations: usize,
    pub sample_rate: u32,
}

impl LoopMatch {
    pub fn start_seconds(&self) -> f64 {
        self.candidate.start_sample as f64 / self.sample_rate as f64
    }

    pub fn end_seconds(&self) -> f64 {
        self.candidate.end_sample as f64 / self.sample_rate as f64
    }

    /// Near edge of the matched tail window. The material from here on
    /// continues like the material from `start_seconds`.
    pub fn join_seconds(&self) -> f64 {
        self.candidate.end_sample.saturating_sub(self.window) as f64 / self.sample_rate as f64
    }

    pub fn correlation(&self) -> f64 {
        self.candidate.correlation
    }

    /// `(start_seconds, end_seconds)`.
    pub fn as_seconds(&self) -> (f64, f64) {
        (self.start_seconds(), self.end_seconds())
    }
}

/// Sliding-window scanner over one buffer.
struct WindowScan<'a> {
    samples: &'a [f32],
    window: usize,
    slide: usize,
    threshold: f64,
}

impl<'a> WindowScan<'a> {
    #[inline]
    fn head(&self, offset: usize) -> &'a [f32] {
        &self.samples[offset..offset + self.window]
    }

    /// Tail window ending `offset` samples before the buffer end.
    #[inline]
    fn tail(&self, offset: usize) -> &'a [f32] {
        let end = self.samples.len() - offset;
        &self.samples[end - self.window..end]
    }

    /// Score offsets `0..slide` until one reaches the threshold; return the
    /// best score and the first offset achieving it.
    fn scan(&self, score: impl Fn(usize) -> f64) -> (f64, usize) {
        let mut best = (f64::NEG_INFINITY, 0usize);
        for offset in 0..self.slide {
            let value = score(offset);
            if value > best.0 {
                best = (value, offset);
            }
            if value >= self.threshold {
                break;
            }
        }
        best
    }

    fn initial(&self) -> (f64, usize) {
        self.scan(|i| correlation_score(self.head(i), self.tail(i)))
    }

    fn best_tail(&self, start: usize) -> (f64, usize) {
        let head = self.head(start);
        self.scan(|i| correlation_score(head, self.tail(i)))
    }

    fn best_start(&self, tail_offset: usize) -> (f64, usize) {
        let tail = self.tail(tail_offset);
        self.scan(|i| correlation_score(self.head(i), tail))
    }
}

/// Search `buffer` for loop points.
///
/// Fails with [`Error::LoopNotFound`] when the best correlation found stays
/// below `corr_min_threshold`, and with [`Error::InvalidConfig`] when the
/// windows do not fit the buffer.
pub fn find_loop(buffer: &AudioBuffer, config: &LoopSearchConfig) -> Result<LoopMatch> {
    config.validate()?;
    if buffer.is_empty() {
        return Err(Error::EmptyBuffer);
    }

    let (window, slide) = config.window_samples(buffer.sample_rate())?;
    if window < 2 || slide < 1 {
        return Err(Error::InvalidConfig(format!(
            "windows too short at {} Hz: window={} slide={} samples",
            buffer.sample_rate(),
            window,
            slide
        )));
    }
    let len = buffer.len();
    let needed = slide.checked_mul(2).and_then(|s| s.checked_add(window));
    if needed.map_or(true, |needed| len < needed) {
        return Err(Error::InvalidConfig(format!(
            "buffer of {} samples is too short for window={} and slide={}",
            len, window, slide
        )));
    }

    let scan = WindowScan {
        samples: buffer.samples(),
        window,
        slide,
        threshold: config.corr_threshold,
    };

    let (initial_corr, mut start) = scan.initial();
    tracing::debug!(window, slide, start, correlation = initial_corr, "Loop search initial offset");

    let mut tail_offset = 0usize;
    let mut correlation = initial_corr;
    let mut last = (0usize, 0usize);
    let mut iterations = 0usize;

    for round in 0..config.max_iterations {
        iterations = round + 1;
        let (tail_corr, tail) = scan.best_tail(start);
        let (start_corr, new_start) = scan.best_start(tail);
        tracing::debug!(
            round,
            tail_offset = tail,
            tail_corr,
            start = new_start,
            start_corr,
            "Loop search refinement"
        );

        start = new_start;
        tail_offset = tail;
        correlation = start_corr;

        if (start, tail_offset) == last || correlation >= config.corr_threshold {
            break;
        }
        last = (start, tail_offset);
    }

    if correlation < config.corr_min_threshold {
        return Err(Error::LoopNotFound {
            achieved: correlation,
            required: config.corr_min_threshold,
        });
    }

    let candidate = LoopCandidate::new(start, len - tail_offset, correlation);
    candidate.validate(len)?;

    tracing::debug!(
        start = candidate.start_sample,
        end = candidate.end_sample,
        correlation,
        iterations,
        "Loop found"
    );

    Ok(LoopMatch {
        candidate,
        window,
        tail_offset,
        iterations,
        sample_rate: buffer.sample_rate(),
    })
}
