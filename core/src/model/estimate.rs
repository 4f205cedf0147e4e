use crate::prelude::{ArrayError, ArrayResult, SkipReason};
use crate::telemetry::WindowMetrics;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Frequency interval processed as one unit, in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    pub lower: f64,
    pub upper: f64,
}

impl FrequencyBand {
    pub fn new(lower: f64, upper: f64) -> ArrayResult<Self> {
        if !(lower.is_finite() && upper.is_finite() && lower > 0.0 && upper > lower) {
            return Err(ArrayError::InvalidBandConfig(format!(
                "band edges must satisfy 0 < lower < upper, got {}-{}",
                lower, upper
            )));
        }
        Ok(Self { lower, upper })
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn center(&self) -> f64 {
        self.lower + self.width() / 2.0
    }
}

/// Window length and overlap used to sweep one band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowSchedule {
    pub length_seconds: f64,
    pub overlap: f64,
}

impl WindowSchedule {
    pub fn new(length_seconds: f64, overlap: f64) -> ArrayResult<Self> {
        if !(length_seconds.is_finite() && length_seconds > 0.0) {
            return Err(ArrayError::InvalidBandConfig(format!(
                "window length must be positive, got {}",
                length_seconds
            )));
        }
        if !(0.0..1.0).contains(&overlap) {
            return Err(ArrayError::InvalidBandConfig(format!(
                "window overlap must be in [0, 1), got {}",
                overlap
            )));
        }
        Ok(Self {
            length_seconds,
            overlap,
        })
    }

    pub fn step_seconds(&self) -> f64 {
        self.length_seconds * (1.0 - self.overlap)
    }

    pub fn window_samples(&self, sample_rate: f64) -> usize {
        (self.length_seconds * sample_rate).round() as usize
    }

    /// Hop between consecutive window starts, never below one sample.
    pub fn step_samples(&self, sample_rate: f64) -> usize {
        (((1.0 - self.overlap) * self.window_samples(sample_rate) as f64) as usize).max(1)
    }

    /// Number of complete windows that fit in `sample_count` samples.
    pub fn window_count(&self, sample_count: usize, sample_rate: f64) -> usize {
        let window = self.window_samples(sample_rate);
        if window == 0 || sample_count < window {
            return 0;
        }
        (sample_count - window) / self.step_samples(sample_rate) + 1
    }
}

/// Identifies a band task: one of the narrow bands or the broadband run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandId {
    Narrow(usize),
    Broadband,
}

/// Plane-wave parameters recovered from one analysis window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlownessEstimate {
    pub window_index: usize,
    pub start_time: f64,
    /// Centre of the window.
    pub time: f64,
    /// Propagation slowness (east, north) in s/km.
    pub slowness: [f64; 2],
    /// Degrees clockwise from north, in [0, 360).
    pub back_azimuth: f64,
    /// km/s
    pub trace_velocity: f64,
    /// Median of the peak normalized cross-correlations, in [0, 1].
    pub coherence: f64,
    /// Spread of the retained delay residuals, seconds.
    pub sigma_tau: f64,
    pub retained_pairs: usize,
}

/// Estimates of one band in window order, with the windows that were skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandResult {
    pub id: BandId,
    pub band: FrequencyBand,
    pub schedule: WindowSchedule,
    /// Hz of the signal the band was swept over.
    pub sample_rate: f64,
    pub estimates: Vec<SlownessEstimate>,
    pub metrics: WindowMetrics,
}

impl BandResult {
    /// Actual hop between window starts, after rounding to whole samples.
    pub fn step_seconds(&self) -> f64 {
        self.schedule.step_samples(self.sample_rate) as f64 / self.sample_rate
    }

    pub fn skipped_windows(&self) -> usize {
        self.metrics.skipped_total()
    }

    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.metrics.skipped(reason)
    }
}

/// Terminal artifact of a run, read-only for renderers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    /// Narrow-band results keyed by band index.
    pub bands: BTreeMap<usize, BandResult>,
    pub broadband: Option<BandResult>,
    /// Edges of the narrow bands, `nbands + 1` values.
    pub edges: Vec<f64>,
    /// Tasks dropped by cancellation.
    pub cancelled: Vec<BandId>,
    /// Tasks whose band cannot be filtered at the signal's sample rate.
    pub rejected: Vec<(BandId, ArrayError)>,
}

impl AggregatedResult {
    pub fn band(&self, index: usize) -> Option<&BandResult> {
        self.bands.get(&index)
    }

    /// Skipped-window counts per narrow band.
    pub fn skipped_per_band(&self) -> BTreeMap<usize, usize> {
        self.bands
            .iter()
            .map(|(index, result)| (*index, result.skipped_windows()))
            .collect()
    }

    /// True when every planned task produced a table.
    pub fn is_complete(&self) -> bool {
        self.cancelled.is_empty() && self.rejected.is_empty()
    }

    /// Narrow bands followed by the broadband result.
    pub fn iter(&self) -> impl Iterator<Item = &BandResult> {
        self.bands.values().chain(self.broadband.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_rejects_non_positive_lower_edge() {
        assert!(FrequencyBand::new(0.0, 1.0).is_err());
        assert!(FrequencyBand::new(2.0, 1.0).is_err());
        let band = FrequencyBand::new(1.0, 3.0).unwrap();
        assert_eq!(band.center(), 2.0);
    }

    #[test]
    fn schedule_counts_overlapping_windows() {
        let schedule = WindowSchedule::new(50.0, 0.5).unwrap();
        assert_eq!(schedule.window_samples(50.0), 2500);
        assert_eq!(schedule.step_samples(50.0), 1250);
        // one hour at 50 Hz
        assert_eq!(schedule.window_count(180_000, 50.0), 143);
        assert_eq!(schedule.window_count(2499, 50.0), 0);
    }

    #[test]
    fn band_step_is_quantized_to_samples() {
        let result = BandResult {
            id: BandId::Narrow(0),
            band: FrequencyBand::new(1.0, 2.0).unwrap(),
            schedule: WindowSchedule::new(1.05, 0.5).unwrap(),
            sample_rate: 10.0,
            estimates: Vec::new(),
            metrics: WindowMetrics::default(),
        };
        // 11 samples per window, hop floors to 5
        assert!((result.step_seconds() - 0.5).abs() < 1e-12);
        assert!((result.schedule.step_seconds() - 0.525).abs() < 1e-12);
    }
}
