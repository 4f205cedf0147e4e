//! Flat, renderer-facing views of an [`AggregatedResult`].

use crate::model::{AggregatedResult, BandId, BandResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;

/// Default coherence threshold below which renderers hide a window.
pub const DEFAULT_COHERENCE_THRESHOLD: f64 = 0.6;

/// One estimate, flattened with its band for mosaic plotting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    /// `None` for the broadband run.
    pub band: Option<usize>,
    pub freq_min: f64,
    pub freq_max: f64,
    pub freq_center: f64,
    /// Window centre, seconds.
    pub time: f64,
    /// Distance to the next window start, seconds, as actually swept.
    pub width: f64,
    pub back_azimuth: f64,
    pub trace_velocity: f64,
    pub coherence: f64,
    pub sigma_tau: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportTable {
    pub edges: Vec<f64>,
    pub rows: Vec<ExportRow>,
    pub skipped_per_band: BTreeMap<usize, usize>,
    pub cancelled: Vec<BandId>,
    pub rejected: Vec<BandId>,
}

const CSV_HEADER: &str = "band,freq_min,freq_max,freq_center,time,width,back_azimuth,trace_velocity,coherence,sigma_tau";

pub struct ResultExporter<'a> {
    result: &'a AggregatedResult,
}

impl<'a> ResultExporter<'a> {
    pub fn new(result: &'a AggregatedResult) -> Self {
        Self { result }
    }

    /// Every estimate, narrow bands in order then broadband.
    pub fn rows(&self) -> Vec<ExportRow> {
        self.result.iter().flat_map(band_rows).collect()
    }

    /// Rows whose coherence reaches `threshold`.
    pub fn rows_above(&self, threshold: f64) -> Vec<ExportRow> {
        self.rows()
            .into_iter()
            .filter(|row| row.coherence >= threshold)
            .collect()
    }

    pub fn table(&self) -> ExportTable {
        ExportTable {
            edges: self.result.edges.clone(),
            rows: self.rows(),
            skipped_per_band: self.result.skipped_per_band(),
            cancelled: self.result.cancelled.clone(),
            rejected: self.result.rejected.iter().map(|(id, _)| *id).collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.table())
    }

    pub fn write_csv<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        writeln!(writer, "{}", CSV_HEADER)?;
        for row in self.rows() {
            let band = row
                .band
                .map_or_else(|| "broadband".to_string(), |index| index.to_string());
            writeln!(
                writer,
                "{},{},{},{},{},{},{},{},{},{}",
                band,
                row.freq_min,
                row.freq_max,
                row.freq_center,
                row.time,
                row.width,
                row.back_azimuth,
                row.trace_velocity,
                row.coherence,
                row.sigma_tau
            )?;
        }
        writer.flush()
    }

    /// Skipped-window counts by reason, one line per band.
    pub fn skip_summary(&self) -> Vec<String> {
        self.result
            .iter()
            .map(|band| {
                let label = match band.id {
                    BandId::Narrow(index) => format!("band {}", index),
                    BandId::Broadband => "broadband".to_string(),
                };
                let reasons: Vec<String> = band
                    .metrics
                    .skip_reasons()
                    .iter()
                    .map(|(reason, count)| format!("{:?}={}", reason, count))
                    .collect();
                format!(
                    "{}: {} estimated, {} skipped [{}]",
                    label,
                    band.metrics.processed(),
                    band.skipped_windows(),
                    reasons.join(", ")
                )
            })
            .collect()
    }
}

fn band_rows(band: &BandResult) -> Vec<ExportRow> {
    let index = match band.id {
        BandId::Narrow(index) => Some(index),
        BandId::Broadband => None,
    };
    let width = band.step_seconds();
    band.estimates
        .iter()
        .map(|estimate| ExportRow {
            band: index,
            freq_min: band.band.lower,
            freq_max: band.band.upper,
            freq_center: band.band.center(),
            time: estimate.time,
            width,
            back_azimuth: estimate.back_azimuth,
            trace_velocity: estimate.trace_velocity,
            coherence: estimate.coherence,
            sigma_tau: estimate.sigma_tau,
        })
        .collect()
}
