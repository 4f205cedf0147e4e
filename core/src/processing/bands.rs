use crate::model::{BandId, FrequencyBand, WindowSchedule};
use crate::prelude::{ArrayError, ArrayResult, BandSpacing, ProcessingConfig, WindowMode};

/// Assigns a window length to each narrow band.
///
/// Implementations only decide the length; the estimator consumes the
/// resulting [`WindowSchedule`] whatever rule produced it.
pub trait WindowLengthRule: Send + Sync {
    fn window_seconds(&self, index: usize, bands: &[FrequencyBand]) -> f64;
}

/// Same window length for every band.
#[derive(Debug, Clone, Copy)]
pub struct ConstantWindow {
    pub seconds: f64,
}

impl WindowLengthRule for ConstantWindow {
    fn window_seconds(&self, _index: usize, _bands: &[FrequencyBand]) -> f64 {
        self.seconds
    }
}

/// Longer windows for lower bands.
///
/// The first band gets `lowest_band_seconds`, the last `highest_band_seconds`;
/// in between the length follows a power law in band-centre frequency, which
/// is a pure `1/f` law when the end points are in the ratio of the centres.
#[derive(Debug, Clone, Copy)]
pub struct InverseFrequencyWindow {
    pub lowest_band_seconds: f64,
    pub highest_band_seconds: f64,
}

impl WindowLengthRule for InverseFrequencyWindow {
    fn window_seconds(&self, index: usize, bands: &[FrequencyBand]) -> f64 {
        let (Some(first), Some(last)) = (bands.first(), bands.last()) else {
            return self.lowest_band_seconds;
        };
        if bands.len() == 1 {
            return self.lowest_band_seconds;
        }
        let span = (last.center() / first.center()).ln();
        let position = (bands[index].center() / first.center()).ln() / span;
        let exponent = (self.highest_band_seconds / self.lowest_band_seconds).ln();
        self.lowest_band_seconds * (exponent * position).exp()
    }
}

/// One scheduled band task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedBand {
    pub id: BandId,
    pub band: FrequencyBand,
    pub schedule: WindowSchedule,
}

/// Band edges plus the window schedule of every narrow band and of the broadband run.
#[derive(Debug, Clone, PartialEq)]
pub struct BandPlan {
    pub edges: Vec<f64>,
    pub bands: Vec<PlannedBand>,
    pub broadband: PlannedBand,
}

impl BandPlan {
    /// `(lower edge, band height, window seconds)` per narrow band, the data
    /// behind a window-length-versus-frequency bar chart.
    pub fn window_length_profile(&self) -> Vec<(f64, f64, f64)> {
        self.bands
            .iter()
            .map(|planned| {
                (
                    planned.band.lower,
                    planned.band.width(),
                    planned.schedule.length_seconds,
                )
            })
            .collect()
    }

    /// Narrow bands followed by the broadband task.
    pub fn tasks(&self) -> Vec<PlannedBand> {
        let mut tasks = self.bands.clone();
        tasks.push(self.broadband);
        tasks
    }
}

pub struct BandPlanner;

impl BandPlanner {
    /// `nbands + 1` strictly increasing edges from `fmin` to `fmax`.
    pub fn edges(fmin: f64, fmax: f64, nbands: usize, spacing: BandSpacing) -> ArrayResult<Vec<f64>> {
        if !(fmin.is_finite() && fmin > 0.0 && fmax.is_finite() && fmax > fmin) {
            return Err(ArrayError::InvalidBandConfig(format!(
                "frequency range must satisfy 0 < fmin < fmax, got {}-{}",
                fmin, fmax
            )));
        }
        if nbands == 0 {
            return Err(ArrayError::InvalidBandConfig(
                "nbands must be at least 1".into(),
            ));
        }

        let steps = nbands as f64;
        let mut edges: Vec<f64> = match spacing {
            BandSpacing::Linear => {
                let interval = (fmax - fmin) / steps;
                (0..=nbands).map(|i| fmin + interval * i as f64).collect()
            }
            BandSpacing::Log => {
                let (low, high) = (fmin.log10(), fmax.log10());
                let interval = (high - low) / steps;
                (0..=nbands)
                    .map(|i| 10f64.powf(low + interval * i as f64))
                    .collect()
            }
        };
        edges[0] = fmin;
        edges[nbands] = fmax;

        if edges.windows(2).any(|pair| !(pair[1] > pair[0])) {
            return Err(ArrayError::InvalidBandConfig(format!(
                "{} bands between {} and {} Hz are too narrow to separate",
                nbands, fmin, fmax
            )));
        }
        Ok(edges)
    }

    /// Plans bands and windows using the rule selected by `config.window_mode`.
    pub fn plan(config: &ProcessingConfig) -> ArrayResult<BandPlan> {
        match config.window_mode {
            WindowMode::Constant => Self::plan_with_rule(
                config,
                &ConstantWindow {
                    seconds: config.window_length_seconds,
                },
            ),
            WindowMode::InverseFrequency {
                lowest_band_seconds,
                highest_band_seconds,
            } => Self::plan_with_rule(
                config,
                &InverseFrequencyWindow {
                    lowest_band_seconds,
                    highest_band_seconds,
                },
            ),
        }
    }

    pub fn plan_with_rule(
        config: &ProcessingConfig,
        rule: &dyn WindowLengthRule,
    ) -> ArrayResult<BandPlan> {
        config.validate()?;
        let edges = Self::edges(config.fmin, config.fmax, config.nbands, config.band_spacing)?;
        let frequency_bands = edges
            .windows(2)
            .map(|pair| FrequencyBand::new(pair[0], pair[1]))
            .collect::<ArrayResult<Vec<_>>>()?;

        let bands = frequency_bands
            .iter()
            .enumerate()
            .map(|(index, band)| {
                let seconds = rule.window_seconds(index, &frequency_bands);
                Ok(PlannedBand {
                    id: BandId::Narrow(index),
                    band: *band,
                    schedule: WindowSchedule::new(seconds, config.window_overlap_fraction)?,
                })
            })
            .collect::<ArrayResult<Vec<_>>>()?;

        let broadband = PlannedBand {
            id: BandId::Broadband,
            band: FrequencyBand::new(config.fmin, config.fmax)?,
            schedule: WindowSchedule::new(
                config.window_length_seconds,
                config.window_overlap_fraction,
            )?,
        };

        Ok(BandPlan {
            edges,
            bands,
            broadband,
        })
    }
}
