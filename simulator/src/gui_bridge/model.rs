use crate::workflow::runner::WorkflowResult;
use nblscore::export::{ExportRow, ExportTable};
use serde::{Deserialize, Serialize};

/// One bar of the window-length-versus-frequency chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowBar {
    pub lower_hz: f64,
    pub height_hz: f64,
    pub window_seconds: f64,
}

/// Snapshot served to external renderers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualizationModel {
    pub table: ExportTable,
    /// Rows that pass the coherence threshold, ready for mosaic plots.
    pub coherent_rows: Vec<ExportRow>,
    pub coherence_threshold: f64,
    pub window_profile: Vec<WindowBar>,
    pub skip_summary: Vec<String>,
    pub scenario: Option<String>,
}

impl VisualizationModel {
    pub fn from_result(
        result: &WorkflowResult,
        coherence_threshold: f64,
        scenario: Option<String>,
    ) -> Self {
        let coherent_rows = result
            .table
            .rows
            .iter()
            .filter(|row| row.coherence >= coherence_threshold)
            .cloned()
            .collect();
        let window_profile = result
            .window_profile
            .iter()
            .map(|&(lower_hz, height_hz, window_seconds)| WindowBar {
                lower_hz,
                height_hz,
                window_seconds,
            })
            .collect();
        Self {
            table: result.table.clone(),
            coherent_rows,
            coherence_threshold,
            window_profile,
            skip_summary: result.skip_summary.clone(),
            scenario,
        }
    }
}
