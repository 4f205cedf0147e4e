use crate::prelude::{SkipReason, WindowError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-band tally of estimated and skipped windows.
///
/// Each band task owns its own tally; tallies are only read after the
/// aggregator's join.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowMetrics {
    processed: usize,
    skipped: BTreeMap<SkipReason, usize>,
}

impl WindowMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_estimate(&mut self) {
        self.processed += 1;
    }

    pub fn record_skip(&mut self, error: &WindowError) {
        *self.skipped.entry(error.reason()).or_insert(0) += 1;
    }

    /// Windows that produced an estimate.
    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn skipped(&self, reason: SkipReason) -> usize {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }

    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }

    pub fn attempted(&self) -> usize {
        self.processed + self.skipped_total()
    }

    pub fn skip_reasons(&self) -> &BTreeMap<SkipReason, usize> {
        &self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_count_skips_by_reason() {
        let mut metrics = WindowMetrics::new();
        metrics.record_estimate();
        metrics.record_skip(&WindowError::SingularSystem { retained: 2 });
        metrics.record_skip(&WindowError::ZeroSlowness);
        metrics.record_skip(&WindowError::InsufficientData {
            available: 4,
            required: 16,
        });

        assert_eq!(metrics.processed(), 1);
        assert_eq!(metrics.skipped(SkipReason::SingularSystem), 2);
        assert_eq!(metrics.skipped(SkipReason::InsufficientData), 1);
        assert_eq!(metrics.skipped(SkipReason::TrimmingDidNotConverge), 0);
        assert_eq!(metrics.attempted(), 4);
    }
}
