use crate::generator::profile::{build_recording, GeneratorConfig};
use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use log::{info, warn};
use nblscore::export::ExportTable;
use nblscore::{
    AggregatedResult, BandAggregator, GeometryResolver, MultichannelSignal, ResultExporter,
};

pub struct WorkflowResult {
    pub result: AggregatedResult,
    pub table: ExportTable,
    /// `(lower edge, band height, window seconds)` per narrow band.
    pub window_profile: Vec<(f64, f64, f64)>,
    pub skip_summary: Vec<String>,
}

impl WorkflowResult {
    pub fn estimate_count(&self) -> usize {
        self.table.rows.len()
    }
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Calibrates, trims and processes a raw-count recording of the array.
    pub fn execute(&self, raw: &MultichannelSignal) -> anyhow::Result<WorkflowResult> {
        let sensors = &self.config.array.sensors;
        let geometry =
            GeometryResolver::resolve_sensors(sensors).context("resolving array geometry")?;

        let mut signal = raw
            .calibrated(sensors)
            .context("applying sensor calibration")?;
        if self.config.start.is_some() || self.config.end.is_some() {
            let start = self.config.start.unwrap_or(signal.start_time());
            let end = self
                .config
                .end
                .unwrap_or(signal.start_time() + signal.duration());
            signal = signal
                .trim(start, end)
                .with_context(|| format!("trimming record to [{}, {}]", start, end))?;
        }

        let aggregator = BandAggregator::new(self.config.processing.clone(), geometry)
            .context("configuring band aggregator")?;
        let window_profile = aggregator
            .plan()
            .context("planning bands")?
            .window_length_profile();
        let result = aggregator.run(&signal).context("running band aggregation")?;

        let exporter = ResultExporter::new(&result);
        let table = exporter.table();
        let skip_summary = exporter.skip_summary();
        info!(
            "workflow finished: {} estimates over {} bands",
            table.rows.len(),
            result.bands.len()
        );
        for (id, error) in &result.rejected {
            warn!("{:?} not processed: {}", id, error);
        }

        Ok(WorkflowResult {
            table,
            window_profile,
            skip_summary,
            result,
        })
    }

    /// Synthesizes the scenario on the configured array and processes it.
    pub fn execute_scenario(&self, scenario: &GeneratorConfig) -> anyhow::Result<WorkflowResult> {
        let sensors = &self.config.array.sensors;
        let geometry =
            GeometryResolver::resolve_sensors(sensors).context("resolving array geometry")?;
        let raw = build_recording(scenario, sensors, &geometry)
            .context("synthesizing scenario recording")?;
        self.execute(&raw)
    }
}
