use serde::Serialize;
use std::collections::BTreeSet;

use crate::filter::DropReason;

/// Per-call diagnostics: how many rows came in and why the rest were lost.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct DebugStats {
    pub total_rows: usize,

    // filter drops, in filter order
    pub dropped_uniqueness: usize,
    pub dropped_time_range: usize,
    pub dropped_date_range: usize,
    pub dropped_invalid_coordinate: usize,

    // aggregation skips
    pub skipped_cell_index: usize,
    pub excluded_pending: usize,

    pub accepted_rows: usize,
    pub distinct_days: usize,
    pub statuses: BTreeSet<String>,
}

impl DebugStats {
    pub fn record_drop(&mut self, reason: DropReason) {
        match reason {
            DropReason::Uniqueness => self.dropped_uniqueness += 1,
            DropReason::TimeRange => self.dropped_time_range += 1,
            DropReason::DateRange => self.dropped_date_range += 1,
            DropReason::InvalidCoordinate => self.dropped_invalid_coordinate += 1,
        }
    }

    pub fn record_status(&mut self, status: &str) {
        let status = status.trim();
        if !status.is_empty() && !self.statuses.contains(status) {
            self.statuses.insert(status.to_string());
        }
    }

    pub fn total_dropped(&self) -> usize {
        self.dropped_uniqueness
            + self.dropped_time_range
            + self.dropped_date_range
            + self.dropped_invalid_coordinate
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    pub fn dropped_pct(&self) -> f64 {
        Self::pct(self.total_dropped(), self.total_rows)
    }

    /// Folds another shard's counters in. `distinct_days` is recomputed by
    /// the caller from the merged day set.
    pub fn merge(&mut self, other: DebugStats) {
        self.total_rows += other.total_rows;
        self.dropped_uniqueness += other.dropped_uniqueness;
        self.dropped_time_range += other.dropped_time_range;
        self.dropped_date_range += other.dropped_date_range;
        self.dropped_invalid_coordinate += other.dropped_invalid_coordinate;
        self.skipped_cell_index += other.skipped_cell_index;
        self.excluded_pending += other.excluded_pending;
        self.accepted_rows += other.accepted_rows;
        self.statuses.extend(other.statuses);
    }
}
