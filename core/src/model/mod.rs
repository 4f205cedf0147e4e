pub mod estimate;
pub mod sensor;
pub mod signal;

pub use estimate::{
    AggregatedResult, BandId, BandResult, FrequencyBand, SlownessEstimate, WindowSchedule,
};
pub use sensor::{RelativeGeometry, Sensor};
pub use signal::MultichannelSignal;
