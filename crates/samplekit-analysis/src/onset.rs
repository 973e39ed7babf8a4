//! Onset detection
//!
//! Spectral-flux onset strength with windowed peak picking and
//! backtracking to the preceding energy minimum.
//!
//! ## Pipeline
//!
//! 1. Centered Hann STFT, power in dB floored at `max - 80 dB`
//! 2. Positive first difference across frames, averaged over bins at or
//!    above `fmin` (the envelope is left unnormalized, so `delta` is in dB)
//! 3. Peak picking: `x[n]` is the maximum of `[n - pre_max, n + post_max)`,
//!    exceeds the mean of `[n - pre_avg, n + post_avg)` by `delta`, and lies
//!    more than `wait` frames after the previous onset
//! 4. Each onset is moved back to the latest local minimum of the envelope

use crate::spectrum::Spectrogram;
use samplekit_core::{AudioBuffer, Error, OnsetEvent, Result, TimeUnit};

const TOP_DB: f32 = 80.0;

/// Onset detection parameters. Times are in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct OnsetConfig {
    pub n_fft: usize,
    pub hop_length: usize,
    /// Look-back for the peak maximum.
    pub pre_max: f64,
    /// Look-ahead for the peak maximum, defaults to `wait`.
    pub post_max: Option<f64>,
    /// Look-back for the mean threshold, defaults to `pre_max`.
    pub pre_avg: Option<f64>,
    /// Look-ahead for the mean threshold, defaults to `wait`.
    pub post_avg: Option<f64>,
    /// Required margin above the local mean.
    pub delta: f64,
    /// Minimum distance between accepted onsets.
    pub wait: f64,
    /// Ignore spectral bins below this frequency.
    pub fmin: Option<f64>,
}

impl Default for OnsetConfig {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 512,
            pre_max: 0.4,
            post_max: None,
            pre_avg: None,
            post_avg: None,
            delta: 1.0,
            wait: 2.5,
            fmin: Some(150.0),
        }
    }
}

impl OnsetConfig {
    pub fn new(pre_max: f64, wait: f64) -> Self {
        Self {
            pre_max,
            wait,
            fmin: None,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_fft < 2 || self.hop_length == 0 {
            return Err(Error::InvalidConfig(format!(
                "n_fft ({}) must be at least 2 and hop_length ({}) positive",
                self.n_fft, self.hop_length
            )));
        }
        let times = [
            ("pre_max", Some(self.pre_max)),
            ("post_max", self.post_max),
            ("pre_avg", self.pre_avg),
            ("post_avg", self.post_avg),
            ("wait", Some(self.wait)),
            ("fmin", self.fmin),
        ];
        for (name, value) in times {
            if let Some(v) = value {
                if !(v >= 0.0) || !v.is_finite() {
                    return Err(Error::InvalidConfig(format!(
                        "{} must be a non-negative number, got {}",
                        name, v
                    )));
                }
            }
        }
        if !self.delta.is_finite() {
            return Err(Error::InvalidConfig("delta must be finite".into()));
        }
        Ok(())
    }

    /// Peak-picking windows in frames, with the defaulting rules applied.
    pub fn peak_params(&self, sample_rate: u32) -> Result<PeakPickParams> {
        let frames = |secs: f64| TimeUnit::Seconds.to_frames(secs, sample_rate, self.hop_length);
        let wait = frames(self.wait)?;
        let pre_max = frames(self.pre_max)?;
        Ok(PeakPickParams {
            pre_max,
            post_max: frames(self.post_max.unwrap_or(self.wait))?.max(1),
            pre_avg: frames(self.pre_avg.unwrap_or(self.pre_max))?,
            post_avg: frames(self.post_avg.unwrap_or(self.wait))?.max(1),
            delta: self.delta,
            wait,
        })
    }
}

/// Peak-picking windows in frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakPickParams {
    pub pre_max: usize,
    pub post_max: usize,
    pub pre_avg: usize,
    pub post_avg: usize,
    pub delta: f64,
    pub wait: usize,
}

/// Detected onsets of one buffer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct Onsets {
    pub events: Vec<OnsetEvent>,
    pub sample_rate: u32,
    pub hop_length: usize,
}

impl Onsets {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Onset positions in `unit`.
    pub fn onset_times(&self, unit: TimeUnit) -> Result<Vec<f64>> {
        self.convert_all(unit, |e| e.onset_sample)
    }

    /// Backtracked positions in `unit`, same length as [`Onsets::onset_times`].
    pub fn backtrack_times(&self, unit: TimeUnit) -> Result<Vec<f64>> {
        self.convert_all(unit, |e| e.backtrack_sample)
    }

    fn convert_all(&self, unit: TimeUnit, pick: impl Fn(&OnsetEvent) -> usize) -> Result<Vec<f64>> {
        self.events
            .iter()
            .map(|e| {
                TimeUnit::convert(
                    pick(e) as f64,
                    TimeUnit::Samples,
                    unit,
                    self.sample_rate,
                    self.hop_length,
                )
            })
            .collect()
    }
}

/// Spectral-flux onset strength, one value per STFT frame.
pub fn onset_strength(samples: &[f32], sample_rate: u32, config: &OnsetConfig) -> Result<Vec<f32>> {
    config.validate()?;
    let mut spec = Spectrogram::power(samples, config.n_fft, config.hop_length)?;
    spec.to_db(TOP_DB);

    let bins = config.n_fft / 2 + 1;
    let first_bin = match config.fmin {
        Some(fmin) => (0..bins)
            .find(|&k| spec.bin_frequency(k, sample_rate) >= fmin)
            .ok_or_else(|| {
                Error::InvalidConfig(format!("fmin {} Hz is above the Nyquist frequency", fmin))
            })?,
        None => 0,
    };
    let used = (bins - first_bin) as f32;

    let frames = spec.frames();
    let mut envelope = Vec::with_capacity(frames.len());
    envelope.push(0.0f32);
    for pair in frames.windows(2) {
        let flux: f32 = pair[1][first_bin..]
            .iter()
            .zip(&pair[0][first_bin..])
            .map(|(cur, prev)| (cur - prev).max(0.0))
            .sum();
        envelope.push(flux / used);
    }
    Ok(envelope)
}

/// Pick onset frames from an envelope.
pub fn peak_pick(envelope: &[f32], params: &PeakPickParams) -> Vec<usize> {
    let len = envelope.len();
    let mut peaks = Vec::new();
    let mut last: Option<usize> = None;

    for n in 0..len {
        let value = envelope[n];
        if value <= 0.0 {
            continue;
        }

        let max_lo = n.saturating_sub(params.pre_max);
        let max_hi = (n + params.post_max).min(len);
        let local_max = envelope[max_lo..max_hi]
            .iter()
            .fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        if value != local_max {
            continue;
        }

        let avg_lo = n.saturating_sub(params.pre_avg);
        let avg_hi = (n + params.post_avg).min(len);
        let window = &envelope[avg_lo..avg_hi];
        let mean = window.iter().map(|&v| v as f64).sum::<f64>() / window.len() as f64;
        if (value as f64) < mean + params.delta {
            continue;
        }

        if let Some(prev) = last {
            if n <= prev + params.wait {
                continue;
            }
        }
        peaks.push(n);
        last = Some(n);
    }
    peaks
}

/// Move each onset frame back to the latest envelope minimum at or before it.
///
/// Frame 0 always counts as a minimum.
pub fn backtrack(onsets: &[usize], envelope: &[f32]) -> Vec<usize> {
    let mut minima = vec![0usize];
    for i in 1..envelope.len().saturating_sub(1) {
        if envelope[i] <= envelope[i - 1] && envelope[i] < envelope[i + 1] {
            minima.push(i);
        }
    }

    onsets
        .iter()
        .map(|&onset| {
            let idx = minima.partition_point(|&m| m <= onset);
            minima[idx.saturating_sub(1)]
        })
        .collect()
}

/// Detect onsets in `buffer`.
pub fn detect_onsets(buffer: &AudioBuffer, config: &OnsetConfig) -> Result<Onsets> {
    let envelope = onset_strength(buffer.samples(), buffer.sample_rate(), config)?;
    let params = config.peak_params(buffer.sample_rate())?;
    let peaks = peak_pick(&envelope, &params);
    let starts = backtrack(&peaks, &envelope);

    let hop = config.hop_length;
    let last_sample = buffer.len().saturating_sub(1);
    let events: Vec<OnsetEvent> = peaks
        .iter()
        .zip(&starts)
        .map(|(&onset, &start)| {
            OnsetEvent::new((onset * hop).min(last_sample), (start * hop).min(last_sample))
        })
        .collect();

    tracing::debug!(
        frames = envelope.len(),
        onsets = events.len(),
        ?params,
        "Onset detection finished"
    );

    Ok(Onsets {
        events,
        sample_rate: buffer.sample_rate(),
        hop_length: hop,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clicks(len: usize, positions: &[usize]) -> Vec<f32> {
        let mut samples = vec![0.0f32; len];
        for &p in positions {
            samples[p] = 1.0;
        }
        samples
    }

    fn params(pre_max: usize, post_max: usize, wait: usize, delta: f64) -> PeakPickParams {
        PeakPickParams {
            pre_max,
            post_max,
            pre_avg: pre_max,
            post_avg: post_max,
            delta,
            wait,
        }
    }

    #[test]
    fn test_defaulting_rules() {
        let config = OnsetConfig {
            hop_length: 441,
            ..OnsetConfig::new(0.03, 0.1)
        };
        let p = config.peak_params(44100).unwrap();
        assert_eq!(p.pre_max, 3);
        assert_eq!(p.wait, 10);
        assert_eq!(p.post_max, 10);
        assert_eq!(p.pre_avg, 3);
        assert_eq!(p.post_avg, 10);

        let config = OnsetConfig {
            post_max: Some(0.0),
            pre_avg: Some(0.05),
            ..config
        };
        let p = config.peak_params(44100).unwrap();
        assert_eq!(p.post_max, 1);
        assert_eq!(p.pre_avg, 5);
    }

    #[test]
    fn test_peak_pick_threshold_and_wait() {
        let env = [0.0, 5.0, 0.0, 0.0, 4.0, 0.0, 0.0, 0.0, 6.0, 0.0];
        assert_eq!(peak_pick(&env, &params(1, 1, 0, 1.0)), vec![1, 4, 8]);
        // wait suppresses the peak at 4
        assert_eq!(peak_pick(&env, &params(1, 1, 3, 1.0)), vec![1, 8]);
        // a large delta rejects everything
        assert!(peak_pick(&env, &params(1, 1, 0, 10.0)).is_empty());
    }

    #[test]
    fn test_peak_pick_requires_window_maximum() {
        let env = [0.0, 3.0, 5.0, 0.0];
        assert_eq!(peak_pick(&env, &params(2, 2, 0, 0.5)), vec![2]);
    }

    #[test]
    fn test_backtrack_to_previous_minimum() {
        let env = [0.0, 2.0, 1.0, 0.5, 3.0, 6.0, 1.0];
        assert_eq!(backtrack(&[5], &env), vec![3]);
        assert_eq!(backtrack(&[1], &env), vec![0]);
        assert_eq!(backtrack(&[3], &env), vec![3]);
    }

    #[test]
    fn test_two_clicks() {
        let sr = 44100;
        let buffer = AudioBuffer::new(clicks(22050, &[1000, 9000]), sr).unwrap();
        let onsets = detect_onsets(&buffer, &OnsetConfig::new(0.03, 0.1)).unwrap();

        assert_eq!(onsets.len(), 2);
        for (event, expected) in onsets.events.iter().zip([1000usize, 9000]) {
            assert!(
                (event.onset_sample as i64 - expected as i64).abs() <= 2048,
                "onset {} too far from {}",
                event.onset_sample,
                expected
            );
            assert!(event.backtrack_sample <= event.onset_sample);
        }

        let times = onsets.onset_times(TimeUnit::Seconds).unwrap();
        let backs = onsets.backtrack_times(TimeUnit::Seconds).unwrap();
        assert_eq!(times.len(), backs.len());
        assert!(times[0] < times[1]);
    }

    #[test]
    fn test_silence_has_no_onsets() {
        let buffer = AudioBuffer::new(vec![0.0; 8192], 44100).unwrap();
        let onsets = detect_onsets(&buffer, &OnsetConfig::new(0.03, 0.1)).unwrap();
        assert!(onsets.is_empty());
    }

    #[test]
    fn test_fmin_above_nyquist_fails() {
        let config = OnsetConfig {
            fmin: Some(30000.0),
            ..OnsetConfig::new(0.03, 0.1)
        };
        let buffer = AudioBuffer::new(clicks(8192, &[100]), 44100).unwrap();
        assert!(matches!(
            detect_onsets(&buffer, &config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_negative_time_rejected() {
        let config = OnsetConfig::new(-0.1, 0.1);
        assert!(config.validate().is_err());
    }
}
