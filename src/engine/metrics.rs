//! Analysis run metrics.
//!
//! Timings and output counts for each stage of [`crate::analyze`]. Cheap to
//! collect, so they are always filled in; the CLI prints them as a footer.

use std::time::Duration;

// --- Metrics -----------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunMetrics {
    /// Wall time for the whole analysis.
    pub total: Duration,
    /// Turning outfit-rule lines into entries.
    pub extraction: StageMetrics,
    /// Pairwise conflict detection.
    pub conflicts: StageMetrics,
    /// Per-character resolution.
    pub resolve: StageMetrics,
}

/// Timing and output count for a single stage.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StageMetrics {
    pub duration: Duration,
    /// Entries, conflict pairs or resolutions produced by the stage.
    pub produced: usize,
}

impl RunMetrics {
    pub fn stages(&self) -> [(&'static str, StageMetrics); 3] {
        [("extraction", self.extraction), ("conflicts", self.conflicts), ("resolve", self.resolve)]
    }
}
