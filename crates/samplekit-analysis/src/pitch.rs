//! Pitch tracking with probabilistic YIN
//!
//! Tracks f0 and voicing over a whole buffer, for root-note estimation and
//! for finding where a sustained note stops sounding.
//!
//! ## Algorithm
//!
//! Per centered frame:
//!
//! 1. **Difference function** - d(τ) = Σ(x[j] - x[j+τ])² over `win_length`
//!    samples, via FFT cross-correlation: d(τ) = e(0) + e(τ) - 2·r(τ)
//! 2. **Cumulative mean normalized difference** - d'(τ)
//! 3. **Voicing probability** - thresholds 0.01..=1.00 weighted by a
//!    Beta(2, 18) prior; thresholds above the lowest trough of d' count
//!    fully, the others with `no_trough_prob`
//! 4. **Period** - first trough below 0.1 (else the global minimum),
//!    refined by parabolic interpolation
//!
//! Voicing flags over the whole track come from a two-state Viterbi decode
//! with switching probability `switch_prob`.

use crate::loudness::median;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use samplekit_core::{hz_to_note, note_to_hz, AudioBuffer, Error, Result};
use std::sync::Arc;

/// Number of YIN thresholds in the prior.
const N_THRESHOLDS: usize = 100;

/// Absolute threshold for choosing the period trough.
const YIN_THRESHOLD: f64 = 0.1;

/// Lowest probability used in log space.
const MIN_PROB: f64 = 1e-12;

/// Pitch tracking parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct PitchConfig {
    /// Lowest tracked note, e.g. `"C1"`.
    pub min_note: String,
    /// Highest tracked note, e.g. `"C7"`.
    pub max_note: String,
    pub frame_length: usize,
    /// Difference window, defaults to `frame_length / 2`.
    pub win_length: Option<usize>,
    /// Frame stride, defaults to `frame_length / 4`.
    pub hop_length: Option<usize>,
    pub switch_prob: f64,
    pub no_trough_prob: f64,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            min_note: "C1".to_string(),
            max_note: "C7".to_string(),
            frame_length: 2048,
            win_length: None,
            hop_length: None,
            switch_prob: 0.01,
            no_trough_prob: 0.01,
        }
    }
}

impl PitchConfig {
    pub fn win_length(&self) -> usize {
        self.win_length.unwrap_or(self.frame_length / 2)
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length.unwrap_or(self.frame_length / 4)
    }

    /// `(fmin, fmax)` in Hz.
    pub fn frequency_range(&self) -> Result<(f64, f64)> {
        Ok((note_to_hz(&self.min_note)?, note_to_hz(&self.max_note)?))
    }

    pub fn validate(&self) -> Result<()> {
        let (fmin, fmax) = self.frequency_range()?;
        if fmin >= fmax {
            return Err(Error::InvalidConfig(format!(
                "min_note {} must be below max_note {}",
                self.min_note, self.max_note
            )));
        }
        if self.frame_length < 4 {
            return Err(Error::InvalidConfig("frame_length must be at least 4".into()));
        }
        let win = self.win_length();
        if win == 0 || win >= self.frame_length {
            return Err(Error::InvalidConfig(format!(
                "win_length {} must be within (0, frame_length={})",
                win, self.frame_length
            )));
        }
        if self.hop_length() == 0 {
            return Err(Error::InvalidConfig("hop_length must be positive".into()));
        }
        for (name, p) in [
            ("switch_prob", self.switch_prob),
            ("no_trough_prob", self.no_trough_prob),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::InvalidConfig(format!(
                    "{} must be within [0, 1], got {}",
                    name, p
                )));
            }
        }
        Ok(())
    }
}

/// Analysis of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct PitchFrame {
    /// Estimated fundamental, `None` when unvoiced.
    pub f0: Option<f64>,
    pub voiced_prob: f64,
    pub voiced: bool,
}

/// Frame-by-frame pitch track. Frame `f` is centered on sample `f * hop_length`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct PitchTrack {
    pub frames: Vec<PitchFrame>,
    pub hop_length: usize,
    pub sample_rate: u32,
}

impl PitchTrack {
    pub fn voiced_flags(&self) -> Vec<bool> {
        self.frames.iter().map(|f| f.voiced).collect()
    }

    pub fn voiced_f0s(&self) -> Vec<f64> {
        self.frames
            .iter()
            .filter(|f| f.voiced)
            .filter_map(|f| f.f0)
            .collect()
    }

    /// Median of the voiced f0 values.
    pub fn median_f0(&self) -> Option<f64> {
        median(&mut self.voiced_f0s())
    }
}

/// Beta(2, 18) cumulative distribution.
fn beta_2_18_cdf(x: f64) -> f64 {
    let x = x.clamp(0.0, 1.0);
    let q = 1.0 - x;
    1.0 - q.powi(19) - 19.0 * x * q.powi(18)
}

/// Probabilistic YIN pitch tracker for one sample rate.
pub struct PitchTracker {
    sample_rate: u32,
    frame_length: usize,
    win_length: usize,
    hop_length: usize,
    min_period: usize,
    max_period: usize,
    switch_prob: f64,
    no_trough_prob: f64,
    beta_probs: Vec<f64>,

    fft_len: usize,
    fft: Arc<dyn Fft<f64>>,
    ifft: Arc<dyn Fft<f64>>,

    // Pre-allocated buffers
    frame_spectrum: Vec<Complex<f64>>,
    window_spectrum: Vec<Complex<f64>>,
    difference: Vec<f64>,
    cumulative_mean: Vec<f64>,
}

impl PitchTracker {
    pub fn new(config: &PitchConfig, sample_rate: u32) -> Result<Self> {
        config.validate()?;
        if sample_rate == 0 {
            return Err(Error::InvalidConfig("sample_rate must be positive".into()));
        }
        let (fmin, fmax) = config.frequency_range()?;
        let sr = sample_rate as f64;
        let frame_length = config.frame_length;
        let win_length = config.win_length();

        let min_period = ((sr / fmax).floor() as usize).max(1);
        let max_period = ((sr / fmin).ceil() as usize).min(frame_length - win_length - 1);
        if max_period <= min_period {
            return Err(Error::InvalidConfig(format!(
                "no lag range left: min_period={} max_period={} (frame_length={}, win_length={})",
                min_period, max_period, frame_length, win_length
            )));
        }

        let beta_probs = (1..=N_THRESHOLDS)
            .map(|k| {
                let hi = k as f64 / N_THRESHOLDS as f64;
                let lo = (k - 1) as f64 / N_THRESHOLDS as f64;
                beta_2_18_cdf(hi) - beta_2_18_cdf(lo)
            })
            .collect();

        let fft_len = frame_length.next_power_of_two();
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(fft_len);
        let ifft = planner.plan_fft_inverse(fft_len);

        Ok(Self {
            sample_rate,
            frame_length,
            win_length,
            hop_length: config.hop_length(),
            min_period,
            max_period,
            switch_prob: config.switch_prob,
            no_trough_prob: config.no_trough_prob,
            beta_probs,
            fft_len,
            fft,
            ifft,
            frame_spectrum: vec![Complex::new(0.0, 0.0); fft_len],
            window_spectrum: vec![Complex::new(0.0, 0.0); fft_len],
            difference: vec![0.0; max_period + 1],
            cumulative_mean: vec![0.0; max_period + 1],
        })
    }

    #[inline]
    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    /// Track pitch over all of `samples`.
    pub fn track(&mut self, samples: &[f32]) -> Result<PitchTrack> {
        if samples.is_empty() {
            return Err(Error::EmptyBuffer);
        }

        let pad = self.frame_length / 2;
        let mut padded = vec![0.0f32; samples.len() + 2 * pad];
        padded[pad..pad + samples.len()].copy_from_slice(samples);
        let num_frames = 1 + samples.len() / self.hop_length;

        let mut frames = Vec::with_capacity(num_frames);
        for f in 0..num_frames {
            let start = f * self.hop_length;
            let frame = &padded[start..start + self.frame_length];
            frames.push(self.analyze_frame(frame));
        }

        let flags = self.viterbi_voicing(&frames);
        for (frame, voiced) in frames.iter_mut().zip(flags) {
            frame.voiced = voiced && frame.f0.is_some();
            if !frame.voiced {
                frame.f0 = None;
            }
        }

        let voiced = frames.iter().filter(|f| f.voiced).count();
        tracing::debug!(frames = frames.len(), voiced, "Pitch track computed");

        Ok(PitchTrack {
            frames,
            hop_length: self.hop_length,
            sample_rate: self.sample_rate,
        })
    }

    fn analyze_frame(&mut self, frame: &[f32]) -> PitchFrame {
        self.compute_difference(frame);
        self.compute_cumulative_mean();

        let troughs = self.find_troughs();
        if troughs.is_empty() {
            return PitchFrame::default();
        }

        let global_min = troughs
            .iter()
            .map(|&tau| self.cumulative_mean[tau])
            .fold(f64::INFINITY, f64::min);
        let voiced_prob = self.voicing_probability(global_min);

        let period = self.find_best_period(&troughs);
        let refined = self.parabolic_interpolation(period);
        PitchFrame {
            f0: Some(self.sample_rate as f64 / refined),
            voiced_prob,
            voiced: false,
        }
    }

    /// d(τ) = e(0) + e(τ) - 2·r(τ) for τ in 0..=max_period.
    fn compute_difference(&mut self, frame: &[f32]) {
        let win = self.win_length;

        for (i, slot) in self.frame_spectrum.iter_mut().enumerate() {
            let s = frame.get(i).copied().unwrap_or(0.0) as f64;
            *slot = Complex::new(s, 0.0);
        }
        for (i, slot) in self.window_spectrum.iter_mut().enumerate() {
            let s = if i < win { frame[i] as f64 } else { 0.0 };
            *slot = Complex::new(s, 0.0);
        }
        self.fft.process(&mut self.frame_spectrum);
        self.fft.process(&mut self.window_spectrum);

        // r(τ) = Σ x[j + τ]·x[j] over j < win
        for (a, b) in self.frame_spectrum.iter_mut().zip(&self.window_spectrum) {
            *a *= b.conj();
        }
        self.ifft.process(&mut self.frame_spectrum);
        let norm = 1.0 / self.fft_len as f64;

        let mut cum_sq = Vec::with_capacity(frame.len() + 1);
        cum_sq.push(0.0f64);
        let mut acc = 0.0f64;
        for &s in frame {
            acc += (s as f64) * (s as f64);
            cum_sq.push(acc);
        }
        let energy = |start: usize| cum_sq[start + win] - cum_sq[start];

        let e0 = energy(0);
        self.difference[0] = 0.0;
        for tau in 1..=self.max_period {
            let r = self.frame_spectrum[tau].re * norm;
            self.difference[tau] = (e0 + energy(tau) - 2.0 * r).max(0.0);
        }
    }

    /// d'(τ) = d(τ) / ((1/τ) Σ d(j)) for j in 1..=τ, d'(0) = 1.
    fn compute_cumulative_mean(&mut self) {
        self.cumulative_mean[0] = 1.0;
        let mut running_sum = 0.0f64;
        for tau in 1..=self.max_period {
            running_sum += self.difference[tau];
            self.cumulative_mean[tau] = if running_sum > 1e-10 {
                self.difference[tau] * tau as f64 / running_sum
            } else {
                1.0
            };
        }
    }

    /// Local minima of d' within `min_period..max_period`.
    fn find_troughs(&self) -> Vec<usize> {
        let d = &self.cumulative_mean;
        let lo = self.min_period;
        let hi = self.max_period;
        let mut troughs = Vec::new();
        if d[lo] < d[lo + 1] {
            troughs.push(lo);
        }
        for tau in lo + 1..hi {
            if d[tau] < d[tau - 1] && d[tau] <= d[tau + 1] {
                troughs.push(tau);
            }
        }
        troughs
    }

    /// Prior mass of thresholds above `min_height`, plus `no_trough_prob`
    /// times the mass below it.
    fn voicing_probability(&self, min_height: f64) -> f64 {
        let mut above = 0.0;
        let mut below = 0.0;
        for (k, &p) in self.beta_probs.iter().enumerate() {
            let threshold = (k + 1) as f64 / N_THRESHOLDS as f64;
            if min_height < threshold {
                above += p;
            } else {
                below += p;
            }
        }
        (above + self.no_trough_prob * below).clamp(0.0, 1.0)
    }

    /// First trough below the absolute threshold, else the deepest trough.
    fn find_best_period(&self, troughs: &[usize]) -> usize {
        if let Some(&tau) = troughs
            .iter()
            .find(|&&tau| self.cumulative_mean[tau] < YIN_THRESHOLD)
        {
            return tau;
        }
        troughs
            .iter()
            .copied()
            .min_by(|&a, &b| self.cumulative_mean[a].total_cmp(&self.cumulative_mean[b]))
            .unwrap_or(self.min_period)
    }

    /// Vertex of the parabola through (τ-1, τ, τ+1).
    fn parabolic_interpolation(&self, tau: usize) -> f64 {
        if tau < 1 || tau >= self.max_period {
            return tau as f64;
        }
        let s0 = self.cumulative_mean[tau - 1];
        let s1 = self.cumulative_mean[tau];
        let s2 = self.cumulative_mean[tau + 1];

        let denominator = 2.0 * (2.0 * s1 - s2 - s0);
        if denominator.abs() > 1e-10 {
            let adjustment = (s2 - s0) / denominator;
            tau as f64 + adjustment.clamp(-1.0, 1.0)
        } else {
            tau as f64
        }
    }

    /// Most likely voiced/unvoiced sequence.
    fn viterbi_voicing(&self, frames: &[PitchFrame]) -> Vec<bool> {
        if frames.is_empty() {
            return Vec::new();
        }
        let stay = (1.0 - self.switch_prob).max(MIN_PROB).ln();
        let switch = self.switch_prob.max(MIN_PROB).ln();
        let emit = |frame: &PitchFrame, voiced: bool| -> f64 {
            let p = if voiced {
                frame.voiced_prob
            } else {
                1.0 - frame.voiced_prob
            };
            p.max(MIN_PROB).ln()
        };

        // state 0 = unvoiced, 1 = voiced
        let half = 0.5f64.ln();
        let mut score = [half + emit(&frames[0], false), half + emit(&frames[0], true)];
        let mut back: Vec<[usize; 2]> = Vec::with_capacity(frames.len());
        back.push([0, 1]);

        for frame in &frames[1..] {
            let mut next = [0.0f64; 2];
            let mut from = [0usize; 2];
            for state in 0..2 {
                let via_same = score[state] + stay;
                let via_other = score[1 - state] + switch;
                let (best, prev) = if via_same >= via_other {
                    (via_same, state)
                } else {
                    (via_other, 1 - state)
                };
                next[state] = best + emit(frame, state == 1);
                from[state] = prev;
            }
            score = next;
            back.push(from);
        }

        let mut state = if score[1] > score[0] { 1 } else { 0 };
        let mut path = vec![false; frames.len()];
        for t in (0..frames.len()).rev() {
            path[t] = state == 1;
            state = back[t][state];
        }
        path
    }
}

/// Track pitch over `buffer`.
pub fn track_pitch(buffer: &AudioBuffer, config: &PitchConfig) -> Result<PitchTrack> {
    let mut tracker = PitchTracker::new(config, buffer.sample_rate())?;
    tracker.track(buffer.samples())
}

/// Note name nearest the median voiced f0, e.g. `"A3"`.
///
/// Fails with [`Error::PitchTracking`] when no frame is voiced.
pub fn estimate_root_note(buffer: &AudioBuffer, config: &PitchConfig) -> Result<String> {
    let track = track_pitch(buffer, config)?;
    let f0 = track
        .median_f0()
        .ok_or_else(|| Error::PitchTracking("no voiced frames".into()))?;
    let note = hz_to_note(f0)?;
    tracing::debug!(median_f0 = f0, %note, "Root note estimated");
    Ok(note)
}

/// Earliest frames accepted as an unvoiced boundary.
const MIN_BOUNDARY_FRAME: usize = 5;

/// First sustained drop-out of pitch at least `min_duration` samples after
/// `start`, as an absolute sample index.
///
/// Only `[start, end)` is tracked. An unvoiced frame counts only when the
/// following frame is unvoiced as well.
pub fn first_unvoiced_after(
    buffer: &AudioBuffer,
    start: usize,
    end: Option<usize>,
    min_duration: usize,
    config: &PitchConfig,
) -> Result<usize> {
    let end = end.unwrap_or(buffer.len());
    let samples = buffer.slice(start, end)?;
    if samples.is_empty() {
        return Err(Error::EmptyBuffer);
    }

    let mut tracker = PitchTracker::new(config, buffer.sample_rate())?;
    let track = tracker.track(samples)?;
    let hop = tracker.hop_length();
    let min_frames = min_duration / hop;
    let flags = track.voiced_flags();

    let found = (min_frames..flags.len())
        .find(|&f| !flags[f] && !flags.get(f + 1).copied().unwrap_or(false));

    match found {
        Some(frame) if frame >= MIN_BOUNDARY_FRAME => {
            let sample = start + frame * hop;
            tracing::debug!(frame, sample, "First unvoiced frame");
            Ok(sample)
        }
        Some(frame) => Err(Error::PitchTracking(format!(
            "unvoiced boundary at frame {} is earlier than frame {}",
            frame, MIN_BOUNDARY_FRAME
        ))),
        None => Err(Error::PitchTracking(format!(
            "no unvoiced frame after {} frames",
            min_frames
        ))),
    }
}
