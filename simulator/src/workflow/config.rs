use crate::generator::profile::GeneratorConfig;
use anyhow::Context;
use nblscore::export::DEFAULT_COHERENCE_THRESHOLD;
use nblscore::{ProcessingConfig, Sensor};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Calibration of the default array, Pa per count.
const DEFAULT_CALIBRATION: f64 = -0.000113;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArrayLayout {
    pub sensors: Vec<Sensor>,
}

impl Default for ArrayLayout {
    fn default() -> Self {
        let sensors = [
            ("BB1", -1.74812, -78.62735),
            ("BB2", -1.74749, -78.62708),
            ("BB3", -1.74906, -78.62742),
            ("BB4", -1.74805, -78.62820),
        ]
        .into_iter()
        .map(|(id, lat, lon)| Sensor::new(id, lat, lon, DEFAULT_CALIBRATION))
        .collect();
        Self { sensors }
    }
}

/// Everything one offline run needs: processing options, array metadata and
/// the synthetic scenario to feed through the core.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub processing: ProcessingConfig,
    pub array: ArrayLayout,
    pub scenario: GeneratorConfig,
    /// Analysis interval in record seconds; the whole record when unset.
    pub start: Option<f64>,
    pub end: Option<f64>,
    /// Windows below this coherence are hidden from renderers.
    pub coherence_threshold: f64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            processing: ProcessingConfig::default(),
            array: ArrayLayout::default(),
            scenario: GeneratorConfig::default(),
            start: None,
            end: None,
            coherence_threshold: DEFAULT_COHERENCE_THRESHOLD,
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        config
            .processing
            .validate()
            .with_context(|| format!("validating workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    /// Applies command-line overrides on top of the loaded values.
    pub fn with_overrides(
        mut self,
        nbands: Option<usize>,
        fmin: Option<f64>,
        fmax: Option<f64>,
        alpha: Option<f64>,
    ) -> Self {
        if let Some(nbands) = nbands {
            self.processing.nbands = nbands;
        }
        if let Some(fmin) = fmin {
            self.processing.fmin = fmin;
        }
        if let Some(fmax) = fmax {
            self.processing.fmax = fmax;
        }
        if let Some(alpha) = alpha {
            self.processing.alpha = alpha;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nblscore::prelude::BandSpacing;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_layout_has_four_calibrated_sensors() {
        let cfg = WorkflowConfig::default();
        assert_eq!(cfg.array.sensors.len(), 4);
        assert!(cfg
            .array
            .sensors
            .iter()
            .all(|s| s.calibration == DEFAULT_CALIBRATION));
    }

    #[test]
    fn overrides_replace_band_settings() {
        let cfg = WorkflowConfig::default().with_overrides(Some(6), None, Some(8.0), Some(0.75));
        assert_eq!(cfg.processing.nbands, 6);
        assert_eq!(cfg.processing.fmin, 0.1);
        assert_eq!(cfg.processing.fmax, 8.0);
        assert_eq!(cfg.processing.alpha, 0.75);
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"processing:\n  nbands: 4\n  band_spacing: linear\n  window_mode:\n    mode: inverse_frequency\n    lowest_band_seconds: 120.0\n    highest_band_seconds: 20.0\nscenario:\n  duration_seconds: 300.0\nstart: 10.0\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.processing.nbands, 4);
        assert_eq!(cfg.processing.band_spacing, BandSpacing::Linear);
        assert_eq!(cfg.scenario.duration_seconds, 300.0);
        assert_eq!(cfg.start, Some(10.0));
        assert_eq!(cfg.array, ArrayLayout::default());
    }

    #[test]
    fn config_load_rejects_invalid_processing() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"processing:\n  fmin: 5.0\n  fmax: 1.0\n")
            .unwrap();
        let path = temp.into_temp_path();
        assert!(WorkflowConfig::load(&path).is_err());
    }
}
