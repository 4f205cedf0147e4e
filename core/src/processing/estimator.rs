//! Windowed plane-wave slowness estimation.
//!
//! Every window is handled independently: pairwise delays are measured by
//! normalized cross-correlation, the delays are regressed on the sensor
//! baselines to obtain a slowness vector (optionally with a trimmed fit that
//! discards the worst-fitting pairs), and the fit is summarized as
//! back-azimuth, trace velocity, coherence and delay uncertainty.
//!
//! Model: a plane wave with propagation slowness `p` (s/km) reaches the sensor
//! at `r` at time `t0 + p . r`, so the delay of sensor `j` relative to sensor
//! `i` is `p . (r_j - r_i)`.

use crate::math::fft::{lag_value, FftHelper};
use crate::math::{MatrixHelper, StatsHelper};
use crate::model::{MultichannelSignal, RelativeGeometry, SlownessEstimate, WindowSchedule};
use crate::prelude::{ArrayError, ArrayResult, ProcessingConfig, WindowError, WindowResult};
use crate::telemetry::{LogManager, WindowMetrics};
use ndarray::{Array1, Array2};
use std::sync::atomic::{AtomicBool, Ordering};

/// Fewest samples a window may hold regardless of band.
pub const MIN_WINDOW_SAMPLES: usize = 16;

/// Estimator options derived from [`ProcessingConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorConfig {
    pub alpha: f64,
    pub max_trim_iterations: usize,
    pub min_trace_velocity: Option<f64>,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            max_trim_iterations: 20,
            min_trace_velocity: None,
        }
    }
}

impl From<&ProcessingConfig> for EstimatorConfig {
    fn from(config: &ProcessingConfig) -> Self {
        Self {
            alpha: config.alpha,
            max_trim_iterations: config.max_trim_iterations,
            min_trace_velocity: config.min_trace_velocity,
        }
    }
}

/// Delay measured between two sensors in one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayObservation {
    pub from: usize,
    pub to: usize,
    /// `r_to - r_from`, km.
    pub baseline: [f64; 2],
    /// Arrival at `to` minus arrival at `from`, seconds.
    pub delay: f64,
    /// Peak normalized cross-correlation.
    pub correlation: f64,
}

/// Outcome of the (possibly trimmed) least-squares fit.
#[derive(Debug, Clone, PartialEq)]
pub struct TrimmedFit {
    pub slowness: [f64; 2],
    /// Indices of the observations used by the final fit, ascending.
    pub retained: Vec<usize>,
    /// Residual of every observation against the final fit.
    pub residuals: Vec<f64>,
    /// Refits on a trimmed subset; zero for an ordinary fit.
    pub iterations: usize,
}

impl TrimmedFit {
    /// Residual standard deviation over the retained pairs, seconds.
    pub fn sigma_tau(&self) -> f64 {
        let dof = self.retained.len().saturating_sub(2).max(1) as f64;
        let sum_sq: f64 = self
            .retained
            .iter()
            .map(|&index| self.residuals[index] * self.residuals[index])
            .sum();
        (sum_sq / dof).sqrt()
    }
}

/// Fits `baseline . p ~= delay`, keeping `ceil(alpha * n)` observations.
///
/// With `alpha < 1` the fit starts from all observations and repeatedly keeps
/// the pairs with the smallest absolute residuals, refitting until the kept
/// set repeats. Fails when the set is still changing after `max_iterations`
/// refits.
pub fn solve_trimmed(
    observations: &[DelayObservation],
    alpha: f64,
    max_iterations: usize,
) -> WindowResult<TrimmedFit> {
    let total = observations.len();
    if total < 3 {
        return Err(WindowError::SingularSystem { retained: total });
    }
    let keep = ((alpha * total as f64).ceil() as usize).min(total);
    if keep < 3 {
        return Err(WindowError::SingularSystem { retained: keep });
    }

    let design = Array2::from_shape_fn((total, 2), |(row, col)| observations[row].baseline[col]);
    let delays = Array1::from_shape_fn(total, |row| observations[row].delay);

    let full: Vec<usize> = (0..total).collect();
    let mut slowness = fit_subset(observations, &full)?;
    if keep == total {
        let residuals = MatrixHelper::residuals(design.view(), delays.view(), slowness);
        return Ok(TrimmedFit {
            slowness,
            retained: full,
            residuals: residuals.to_vec(),
            iterations: 0,
        });
    }

    let residuals = MatrixHelper::residuals(design.view(), delays.view(), slowness);
    let mut retained = best_fitting(&residuals.to_vec(), keep);
    let mut refits = 0;
    loop {
        slowness = fit_subset(observations, &retained)?;
        refits += 1;
        let residuals = MatrixHelper::residuals(design.view(), delays.view(), slowness);
        let candidate = best_fitting(&residuals.to_vec(), keep);
        if candidate == retained {
            return Ok(TrimmedFit {
                slowness,
                retained,
                residuals: residuals.to_vec(),
                iterations: refits,
            });
        }
        if refits >= max_iterations {
            return Err(WindowError::TrimmingDidNotConverge {
                iterations: max_iterations,
            });
        }
        retained = candidate;
    }
}

/// Indices of the `keep` smallest absolute residuals, ascending; ties go to
/// the lower index.
fn best_fitting(residuals: &[f64], keep: usize) -> Vec<usize> {
    let mut ranked: Vec<usize> = (0..residuals.len()).collect();
    ranked.sort_by(|&a, &b| {
        residuals[a]
            .abs()
            .total_cmp(&residuals[b].abs())
            .then(a.cmp(&b))
    });
    ranked.truncate(keep);
    ranked.sort_unstable();
    ranked
}

fn fit_subset(observations: &[DelayObservation], subset: &[usize]) -> WindowResult<[f64; 2]> {
    let design = Array2::from_shape_fn((subset.len(), 2), |(row, col)| {
        observations[subset[row]].baseline[col]
    });
    let delays = Array1::from_shape_fn(subset.len(), |row| observations[subset[row]].delay);
    MatrixHelper::least_squares_2(design.view(), delays.view()).ok_or(
        WindowError::SingularSystem {
            retained: subset.len(),
        },
    )
}

/// Degrees clockwise from north of the direction the wave arrives from.
pub fn back_azimuth_degrees(slowness: [f64; 2]) -> f64 {
    let degrees = (-slowness[0]).atan2(-slowness[1]).to_degrees().rem_euclid(360.0);
    if degrees >= 360.0 {
        0.0
    } else {
        degrees
    }
}

/// Propagation slowness of a wave arriving from `back_azimuth` (degrees) at
/// `trace_velocity` (km/s).
pub fn plane_wave_slowness(back_azimuth: f64, trace_velocity: f64) -> [f64; 2] {
    let theta = back_azimuth.to_radians();
    [
        -theta.sin() / trace_velocity,
        -theta.cos() / trace_velocity,
    ]
}

/// Estimates of one sweep plus the tally of skipped windows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowSweep {
    pub estimates: Vec<SlownessEstimate>,
    pub metrics: WindowMetrics,
}

/// Slides a window over a filtered signal and fits a plane wave per window.
pub struct SlownessEstimator<'g> {
    geometry: &'g RelativeGeometry,
    config: EstimatorConfig,
    logger: LogManager,
}

impl<'g> SlownessEstimator<'g> {
    pub fn new(geometry: &'g RelativeGeometry, config: EstimatorConfig) -> ArrayResult<Self> {
        if !(config.alpha > 0.0 && config.alpha <= 1.0) {
            return Err(ArrayError::InvalidBandConfig(format!(
                "alpha must be in (0, 1], got {}",
                config.alpha
            )));
        }
        if config.max_trim_iterations == 0 {
            return Err(ArrayError::InvalidBandConfig(
                "max_trim_iterations must be at least 1".into(),
            ));
        }
        Ok(Self {
            geometry,
            config,
            logger: LogManager::new("estimator"),
        })
    }

    /// Tags log output with the band being swept.
    pub fn scoped(mut self, scope: impl Into<String>) -> Self {
        self.logger = LogManager::new(scope);
        self
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Sweeps every complete window; failing windows are counted, not fatal.
    ///
    /// `lowest_frequency` is the lower edge of the band the signal was
    /// filtered to; a window shorter than one period of it is skipped.
    pub fn sweep(
        &self,
        signal: &MultichannelSignal,
        schedule: &WindowSchedule,
        lowest_frequency: f64,
    ) -> ArrayResult<WindowSweep> {
        let never = AtomicBool::new(false);
        Ok(self
            .sweep_until(signal, schedule, lowest_frequency, &never)?
            .unwrap_or_default())
    }

    /// Like [`sweep`](Self::sweep) but returns `None` once `cancel` is set.
    pub fn sweep_until(
        &self,
        signal: &MultichannelSignal,
        schedule: &WindowSchedule,
        lowest_frequency: f64,
        cancel: &AtomicBool,
    ) -> ArrayResult<Option<WindowSweep>> {
        if signal.channel_count() != self.geometry.len() {
            return Err(ArrayError::InvalidSignal(format!(
                "{} channels for {} sensors",
                signal.channel_count(),
                self.geometry.len()
            )));
        }

        let sample_rate = signal.sample_rate();
        let window = schedule.window_samples(sample_rate);
        let step = schedule.step_samples(sample_rate);
        let count = schedule.window_count(signal.sample_count(), sample_rate);
        let required = required_samples(sample_rate, lowest_frequency);
        let fft = FftHelper::for_correlation(window.max(1));

        let mut sweep = WindowSweep::default();
        for index in 0..count {
            if cancel.load(Ordering::Relaxed) {
                return Ok(None);
            }
            match self.estimate_window(signal, index * step, window, index, required, &fft) {
                Ok(estimate) => {
                    sweep.metrics.record_estimate();
                    sweep.estimates.push(estimate);
                }
                Err(error) => {
                    self.logger
                        .detail(&format!("window {} skipped: {}", index, error));
                    sweep.metrics.record_skip(&error);
                }
            }
        }
        Ok(Some(sweep))
    }

    /// Estimates the window of `length` samples starting at sample `start`.
    pub fn estimate_window(
        &self,
        signal: &MultichannelSignal,
        start: usize,
        length: usize,
        index: usize,
        required: usize,
        fft: &FftHelper,
    ) -> WindowResult<SlownessEstimate> {
        let available = length.min(signal.sample_count().saturating_sub(start));
        if available < required || available < length {
            return Err(WindowError::InsufficientData {
                available,
                required: required.max(length),
            });
        }

        let sample_rate = signal.sample_rate();
        let slices: Vec<&[f64]> = (0..signal.channel_count())
            .map(|channel| &signal.channel(channel)[start..start + length])
            .collect();
        let observations = self.measure_delays(&slices, sample_rate, fft)?;
        let fit = solve_trimmed(
            &observations,
            self.config.alpha,
            self.config.max_trim_iterations,
        )?;

        let magnitude = fit.slowness[0].hypot(fit.slowness[1]);
        let trace_velocity = 1.0 / magnitude;
        if !(magnitude > 0.0 && trace_velocity.is_finite()) {
            return Err(WindowError::ZeroSlowness);
        }

        let correlations: Vec<f64> = observations.iter().map(|o| o.correlation).collect();
        let coherence = StatsHelper::median(&correlations)
            .ok_or(WindowError::SingularSystem { retained: 0 })?
            .clamp(0.0, 1.0);

        let start_time = signal.time_at(start);
        Ok(SlownessEstimate {
            window_index: index,
            start_time,
            time: start_time + length as f64 / (2.0 * sample_rate),
            slowness: fit.slowness,
            back_azimuth: back_azimuth_degrees(fit.slowness),
            trace_velocity,
            coherence,
            sigma_tau: fit.sigma_tau(),
            retained_pairs: fit.retained.len(),
        })
    }

    /// Pairwise delays of one window, every sensor pair `(i, j)` with `i < j`.
    pub fn measure_delays(
        &self,
        window: &[&[f64]],
        sample_rate: f64,
        fft: &FftHelper,
    ) -> WindowResult<Vec<DelayObservation>> {
        let length = window.first().map_or(0, |samples| samples.len());
        let max_lag = self.max_lag_samples(length, sample_rate);

        let mut spectra = Vec::with_capacity(window.len());
        let mut energies = Vec::with_capacity(window.len());
        for (channel, samples) in window.iter().enumerate() {
            let energy = StatsHelper::energy(samples);
            if !(energy > f64::MIN_POSITIVE) {
                return Err(WindowError::DeadChannel { channel });
            }
            spectra.push(fft.forward(samples));
            energies.push(energy);
        }

        let count = window.len();
        let mut observations = Vec::with_capacity(count * count.saturating_sub(1) / 2);
        for from in 0..count {
            for to in (from + 1)..count {
                let correlation = fft.cross_correlation(&spectra[from], &spectra[to]);
                let norm = (energies[from] * energies[to]).sqrt();
                let (lag, peak) = peak_lag(&correlation, max_lag);
                observations.push(DelayObservation {
                    from,
                    to,
                    baseline: self.geometry.baseline(from, to),
                    delay: lag / sample_rate,
                    correlation: peak / norm,
                });
            }
        }
        Ok(observations)
    }

    /// Lag search half-width: the array transit time at the slowest plausible
    /// velocity, never more than half the window.
    fn max_lag_samples(&self, length: usize, sample_rate: f64) -> usize {
        let half = (length / 2).max(1);
        match self.config.min_trace_velocity {
            Some(velocity) => {
                let transit = self.geometry.aperture() / velocity * sample_rate;
                ((transit.ceil() as usize) + 1).min(half)
            }
            None => half,
        }
    }
}

/// One period of the lowest in-band frequency, and never fewer than
/// [`MIN_WINDOW_SAMPLES`].
pub fn required_samples(sample_rate: f64, lowest_frequency: f64) -> usize {
    if lowest_frequency > 0.0 && lowest_frequency.is_finite() {
        ((sample_rate / lowest_frequency).ceil() as usize).max(MIN_WINDOW_SAMPLES)
    } else {
        MIN_WINDOW_SAMPLES
    }
}

/// Fractional lag of the correlation maximum within `+-max_lag`, refined by a
/// parabola through the peak and its neighbours, with the interpolated peak.
fn peak_lag(correlation: &[f64], max_lag: usize) -> (f64, f64) {
    let max_lag = max_lag as isize;
    let mut best = 0isize;
    let mut best_value = f64::NEG_INFINITY;
    for lag in -max_lag..=max_lag {
        let value = lag_value(correlation, lag);
        if value > best_value {
            best = lag;
            best_value = value;
        }
    }

    if best > -max_lag && best < max_lag {
        let before = lag_value(correlation, best - 1);
        let after = lag_value(correlation, best + 1);
        let curvature = before - 2.0 * best_value + after;
        if curvature < 0.0 {
            let offset = 0.5 * (before - after) / curvature;
            let peak = best_value - 0.25 * (before - after) * offset;
            return (best as f64 + offset, peak);
        }
    }
    (best as f64, best_value)
}
