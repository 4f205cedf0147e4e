use serde::{Deserialize, Serialize};

/// Spacing of the sub-band edges between `fmin` and `fmax`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandSpacing {
    Linear,
    Log,
}

/// Band-pass filter family used for every sub-band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterFamily {
    Butterworth,
    Chebyshev1,
}

/// How window lengths are assigned to the narrow bands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum WindowMode {
    /// Every band uses `window_length_seconds`.
    Constant,
    /// Lowest band gets the longest window, highest band the shortest.
    InverseFrequency {
        lowest_band_seconds: f64,
        highest_band_seconds: f64,
    },
}

/// Immutable configuration shared by every component of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub fmin: f64,
    pub fmax: f64,
    pub nbands: usize,
    pub band_spacing: BandSpacing,
    pub filter_family: FilterFamily,
    /// Prototype order of the band-pass design (corners per edge).
    pub filter_corners: usize,
    pub chebyshev_ripple_db: f64,
    /// Window length of constant mode and of the broadband run.
    pub window_length_seconds: f64,
    pub window_mode: WindowMode,
    pub window_overlap_fraction: f64,
    /// Fraction of sensor pairs retained by the trimmed fit; 1.0 is ordinary least squares.
    pub alpha: f64,
    /// Fraction of the record tapered at each end after filtering.
    pub taper_fraction: f64,
    /// Slowest plausible trace velocity in km/s; bounds the correlation lag search.
    pub min_trace_velocity: Option<f64>,
    pub max_trim_iterations: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            fmin: 0.1,
            fmax: 10.0,
            nbands: 10,
            band_spacing: BandSpacing::Log,
            filter_family: FilterFamily::Butterworth,
            filter_corners: 2,
            chebyshev_ripple_db: 0.01,
            window_length_seconds: 50.0,
            window_mode: WindowMode::Constant,
            window_overlap_fraction: 0.5,
            alpha: 1.0,
            taper_fraction: 0.01,
            min_trace_velocity: None,
            max_trim_iterations: 20,
        }
    }
}

impl ProcessingConfig {
    /// Checks every option against its documented range.
    pub fn validate(&self) -> ArrayResult<()> {
        if !(self.fmin.is_finite() && self.fmin > 0.0) {
            return Err(ArrayError::InvalidBandConfig(format!(
                "fmin must be positive, got {}",
                self.fmin
            )));
        }
        if !(self.fmax.is_finite() && self.fmax > self.fmin) {
            return Err(ArrayError::InvalidBandConfig(format!(
                "fmax must exceed fmin, got fmin={} fmax={}",
                self.fmin, self.fmax
            )));
        }
        if self.nbands == 0 {
            return Err(ArrayError::InvalidBandConfig(
                "nbands must be at least 1".into(),
            ));
        }
        if !(1..=10).contains(&self.filter_corners) {
            return Err(ArrayError::InvalidBandConfig(format!(
                "filter_corners must be in 1..=10, got {}",
                self.filter_corners
            )));
        }
        if self.filter_family == FilterFamily::Chebyshev1
            && !(self.chebyshev_ripple_db.is_finite() && self.chebyshev_ripple_db > 0.0)
        {
            return Err(ArrayError::InvalidBandConfig(format!(
                "chebyshev_ripple_db must be positive, got {}",
                self.chebyshev_ripple_db
            )));
        }
        check_window_seconds("window_length_seconds", self.window_length_seconds)?;
        if let WindowMode::InverseFrequency {
            lowest_band_seconds,
            highest_band_seconds,
        } = self.window_mode
        {
            check_window_seconds("lowest_band_seconds", lowest_band_seconds)?;
            check_window_seconds("highest_band_seconds", highest_band_seconds)?;
        }
        if !(0.0..1.0).contains(&self.window_overlap_fraction) {
            return Err(ArrayError::InvalidBandConfig(format!(
                "window_overlap_fraction must be in [0, 1), got {}",
                self.window_overlap_fraction
            )));
        }
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(ArrayError::InvalidBandConfig(format!(
                "alpha must be in (0, 1], got {}",
                self.alpha
            )));
        }
        if !(0.0..=0.5).contains(&self.taper_fraction) {
            return Err(ArrayError::InvalidBandConfig(format!(
                "taper_fraction must be in [0, 0.5], got {}",
                self.taper_fraction
            )));
        }
        if let Some(velocity) = self.min_trace_velocity {
            if !(velocity.is_finite() && velocity > 0.0) {
                return Err(ArrayError::InvalidBandConfig(format!(
                    "min_trace_velocity must be positive, got {}",
                    velocity
                )));
            }
        }
        if self.max_trim_iterations == 0 {
            return Err(ArrayError::InvalidBandConfig(
                "max_trim_iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn check_window_seconds(name: &str, seconds: f64) -> ArrayResult<()> {
    if seconds.is_finite() && seconds > 0.0 {
        Ok(())
    } else {
        Err(ArrayError::InvalidBandConfig(format!(
            "{} must be positive, got {}",
            name, seconds
        )))
    }
}

/// Run-level failures. A band that cannot be filtered is recorded against
/// that band; anything else aborts the aggregation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayError {
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("invalid band configuration: {0}")]
    InvalidBandConfig(String),
    #[error("filter design failed for band {lower}-{upper} Hz (Nyquist {nyquist} Hz)")]
    FilterDesign { lower: f64, upper: f64, nyquist: f64 },
    #[error("invalid signal: {0}")]
    InvalidSignal(String),
}

pub type ArrayResult<T> = Result<T, ArrayError>;

/// Window-level failures; the window is skipped and counted.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum WindowError {
    #[error("window holds {available} samples, {required} required")]
    InsufficientData { available: usize, required: usize },
    #[error("channel {channel} carries no energy in this window")]
    DeadChannel { channel: usize },
    #[error("least-squares system is singular with {retained} retained pairs")]
    SingularSystem { retained: usize },
    #[error("fitted slowness vector has zero magnitude")]
    ZeroSlowness,
    #[error("trimmed fit still changing after {iterations} refits")]
    TrimmingDidNotConverge { iterations: usize },
}

pub type WindowResult<T> = Result<T, WindowError>;

/// Reason key under which a skipped window is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    InsufficientData,
    SingularSystem,
    TrimmingDidNotConverge,
}

impl WindowError {
    pub fn reason(&self) -> SkipReason {
        match self {
            WindowError::InsufficientData { .. } | WindowError::DeadChannel { .. } => {
                SkipReason::InsufficientData
            }
            WindowError::SingularSystem { .. } | WindowError::ZeroSlowness => {
                SkipReason::SingularSystem
            }
            WindowError::TrimmingDidNotConverge { .. } => SkipReason::TrimmingDidNotConverge,
        }
    }
}
