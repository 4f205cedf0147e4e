use crate::model::{AggregatedResult, BandId, BandResult, MultichannelSignal, RelativeGeometry};
use crate::prelude::{ArrayError, ArrayResult, ProcessingConfig};
use crate::processing::bands::{BandPlan, BandPlanner, PlannedBand, WindowLengthRule};
use crate::processing::estimator::{EstimatorConfig, SlownessEstimator};
use crate::processing::filter::BandFilter;
use crate::telemetry::LogManager;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

/// Runs every band task of a plan and merges the per-band tables.
///
/// Band tasks share nothing mutable: each filters its own copy of the signal
/// and owns its estimator, so the tasks fan out over the rayon pool and the
/// merge happens once, on the calling thread, in band order.
pub struct BandAggregator {
    config: ProcessingConfig,
    geometry: RelativeGeometry,
    filter: BandFilter,
    rule: Option<Box<dyn WindowLengthRule>>,
    logger: LogManager,
}

impl BandAggregator {
    pub fn new(config: ProcessingConfig, geometry: RelativeGeometry) -> ArrayResult<Self> {
        config.validate()?;
        Ok(Self {
            filter: BandFilter::from_config(&config),
            config,
            geometry,
            rule: None,
            logger: LogManager::new("aggregator"),
        })
    }

    /// Replaces the window length rule selected by `config.window_mode`.
    pub fn with_window_rule(mut self, rule: impl WindowLengthRule + 'static) -> Self {
        self.rule = Some(Box::new(rule));
        self
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    pub fn geometry(&self) -> &RelativeGeometry {
        &self.geometry
    }

    pub fn plan(&self) -> ArrayResult<BandPlan> {
        match &self.rule {
            Some(rule) => BandPlanner::plan_with_rule(&self.config, rule.as_ref()),
            None => BandPlanner::plan(&self.config),
        }
    }

    pub fn run(&self, signal: &MultichannelSignal) -> ArrayResult<AggregatedResult> {
        self.run_with_cancel(signal, &AtomicBool::new(false))
    }

    /// Runs all band tasks; tasks that observe `cancel` are listed in
    /// [`AggregatedResult::cancelled`] instead of carrying partial tables.
    ///
    /// Bands that cannot be filtered at the signal's sample rate (an edge at
    /// or above Nyquist) are listed in [`AggregatedResult::rejected`] and the
    /// remaining bands still run.
    pub fn run_with_cancel(
        &self,
        signal: &MultichannelSignal,
        cancel: &AtomicBool,
    ) -> ArrayResult<AggregatedResult> {
        if signal.channel_count() != self.geometry.len() {
            return Err(ArrayError::InvalidSignal(format!(
                "{} channels for {} sensors",
                signal.channel_count(),
                self.geometry.len()
            )));
        }
        let plan = self.plan()?;
        let tasks = plan.tasks();
        self.logger.record(&format!(
            "running {} band tasks over {:.1} s of data at {} Hz",
            tasks.len(),
            signal.duration(),
            signal.sample_rate()
        ));

        let mut result = AggregatedResult {
            edges: plan.edges.clone(),
            ..Default::default()
        };
        let mut runnable = Vec::with_capacity(tasks.len());
        for task in tasks {
            match self.filter.design(&task.band, signal.sample_rate()) {
                Ok(_) => runnable.push(task),
                Err(error @ ArrayError::FilterDesign { .. }) => {
                    self.logger
                        .caution(&format!("{:?} rejected: {}", task.id, error));
                    result.rejected.push((task.id, error));
                }
                Err(error) => return Err(error),
            }
        }

        let outcomes: Vec<ArrayResult<Option<BandResult>>> = runnable
            .par_iter()
            .map(|task| self.run_task(task, signal, cancel))
            .collect();

        for (task, outcome) in runnable.iter().zip(outcomes) {
            match (task.id, outcome?) {
                (id, None) => result.cancelled.push(id),
                (BandId::Narrow(index), Some(band_result)) => {
                    result.bands.insert(index, band_result);
                }
                (BandId::Broadband, Some(band_result)) => result.broadband = Some(band_result),
            }
        }

        self.logger.record(&format!(
            "merged {} bands, {} skipped windows",
            result.bands.len(),
            result.skipped_per_band().values().sum::<usize>()
        ));
        if !result.cancelled.is_empty() {
            self.logger
                .caution(&format!("cancelled tasks: {:?}", result.cancelled));
        }
        Ok(result)
    }

    fn run_task(
        &self,
        task: &PlannedBand,
        signal: &MultichannelSignal,
        cancel: &AtomicBool,
    ) -> ArrayResult<Option<BandResult>> {
        if cancel.load(Ordering::Relaxed) {
            return Ok(None);
        }
        let scope = match task.id {
            BandId::Narrow(index) => format!("band {}", index),
            BandId::Broadband => "broadband".to_string(),
        };
        let logger = LogManager::new(scope.clone());

        let filtered = self.filter.apply(signal, &task.band)?;
        let estimator =
            SlownessEstimator::new(&self.geometry, EstimatorConfig::from(&self.config))?
                .scoped(scope);
        let Some(sweep) =
            estimator.sweep_until(&filtered, &task.schedule, task.band.lower, cancel)?
        else {
            return Ok(None);
        };

        if sweep.estimates.is_empty() {
            logger.caution(&format!(
                "no estimates from {} windows",
                sweep.metrics.attempted()
            ));
        }
        logger.record(&format!(
            "{:.3}-{:.3} Hz: {} estimates, {} skipped",
            task.band.lower,
            task.band.upper,
            sweep.estimates.len(),
            sweep.metrics.skipped_total()
        ));
        Ok(Some(BandResult {
            id: task.id,
            band: task.band,
            schedule: task.schedule,
            sample_rate: signal.sample_rate(),
            estimates: sweep.estimates,
            metrics: sweep.metrics,
        }))
    }
}
