//! Narrow-band least-squares array processing core.
//!
//! The modules follow the processing chain of a small-aperture array: sensor
//! coordinates are resolved into a planar geometry, the frequency range is
//! split into sub-bands, every band is filtered independently and swept with a
//! windowed plane-wave slowness estimator, and the per-band tables are merged
//! into a single result handed to external renderers.

pub mod export;
pub mod math;
pub mod model;
pub mod prelude;
pub mod processing;
pub mod telemetry;

pub use export::{ExportRow, ExportTable, ResultExporter};
pub use model::{AggregatedResult, BandResult, MultichannelSignal, RelativeGeometry, Sensor};
pub use prelude::{ArrayError, ArrayResult, ProcessingConfig, WindowError};
pub use processing::{BandAggregator, BandFilter, BandPlanner, GeometryResolver, SlownessEstimator};
