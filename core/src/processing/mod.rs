pub mod aggregator;
pub mod bands;
pub mod estimator;
pub mod filter;
pub mod geometry;

pub use aggregator::BandAggregator;
pub use bands::{
    BandPlan, BandPlanner, ConstantWindow, InverseFrequencyWindow, PlannedBand, WindowLengthRule,
};
pub use estimator::{
    back_azimuth_degrees, plane_wave_slowness, solve_trimmed, DelayObservation, EstimatorConfig,
    SlownessEstimator, TrimmedFit, WindowSweep,
};
pub use filter::{hann_taper, BandFilter, Biquad, SosCascade};
pub use geometry::{GeometryResolver, EARTH_RADIUS_KM};
