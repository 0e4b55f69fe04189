use chrono::NaiveDate;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::config::{EngineConfig, FilterParams};
use crate::extract::{Field, FieldMap, resolve_schema};
use crate::filter::{HourWindow, RowFilter};
use crate::ingest::{RawValue, RowBatch};
use crate::stats::DebugStats;

use super::aggregate::{Aggregator, FoldOutcome, SegmentedClusters};
use super::fish_bowl::{self, FishBowl};
use super::optimize::build_clusters;
use super::supply::{Bucket, RateBasis};
use super::types::{PlanOutput, ProcessedClusters};

/// Result of the filter + aggregate pass over some rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Accumulation {
    pub clusters: SegmentedClusters,
    pub stats: DebugStats,
    pub days: BTreeSet<NaiveDate>,
}

impl Accumulation {
    pub fn merge(&mut self, other: Accumulation) {
        self.clusters.merge(other.clusters);
        self.stats.merge(other.stats);
        self.days.extend(other.days);
        self.stats.distinct_days = self.days.len();
    }
}

/// Filters and aggregates `rows`. Rows are independent, so any split of a
/// batch accumulates to the same result once merged.
pub fn accumulate(
    rows: &[Vec<RawValue>],
    fields: &FieldMap,
    config: &EngineConfig,
    params: &FilterParams,
) -> Accumulation {
    let filter = RowFilter::new(fields, params);
    let aggregator = Aggregator::new(fields, config.resolution());
    let mut acc = Accumulation::default();

    for row in rows {
        acc.stats.total_rows += 1;
        if let Some(status) = fields.text(row, Field::Status) {
            acc.stats.record_status(&status);
        }

        let accepted = match filter.apply(row) {
            Ok(accepted) => accepted,
            Err(reason) => {
                acc.stats.record_drop(reason);
                continue;
            }
        };

        acc.stats.accepted_rows += 1;
        if let Some(date) = accepted.date {
            acc.days.insert(date);
        }
        match aggregator.fold(&mut acc.clusters, &accepted) {
            FoldOutcome::Counted => {}
            FoldOutcome::Pending => acc.stats.excluded_pending += 1,
            FoldOutcome::NoCell => acc.stats.skipped_cell_index += 1,
        }
    }

    acc.stats.distinct_days = acc.days.len();
    acc
}

/// Turns an accumulation into the three cluster lists.
pub fn finalize(
    acc: Accumulation,
    config: &EngineConfig,
    params: &FilterParams,
    fish_bowl: &FishBowl,
) -> PlanOutput {
    let hours = HourWindow::from_params(params);
    let days = acc.days.len();
    let build = |map, bucket| {
        let basis = RateBasis::new(days, hours, bucket);
        debug!(?bucket, days = basis.days, hours_per_day = basis.hours_per_day, "Rate basis");
        build_clusters(map, basis, config, fish_bowl, params.fleet_size)
    };

    let clusters = ProcessedClusters {
        all_day: build(&acc.clusters.all_day, Bucket::AllDay),
        morning: build(&acc.clusters.morning, Bucket::Morning),
        evening: build(&acc.clusters.evening, Bucket::Evening),
    };

    PlanOutput {
        clusters,
        stats: acc.stats,
    }
}

/// Runs the full pipeline against the process-wide fish bowl.
pub fn process(batch: &RowBatch, config: &EngineConfig, params: &FilterParams) -> PlanOutput {
    process_with_fish_bowl(batch, config, params, fish_bowl::global())
}

#[tracing::instrument(
    skip_all,
    fields(rows = batch.len(), resolution = config.h3_resolution, fleet = ?params.fleet_size)
)]
pub fn process_with_fish_bowl(
    batch: &RowBatch,
    config: &EngineConfig,
    params: &FilterParams,
    fish_bowl: &FishBowl,
) -> PlanOutput {
    let fields = resolve_schema(&batch.headers);
    debug!(?fields, "Resolved row schema");

    let acc = accumulate(&batch.rows, &fields, config, params);
    let output = finalize(acc, config, params, fish_bowl);

    let s = &output.stats;
    info!(
        total = s.total_rows,
        accepted = s.accepted_rows,
        dropped_uniqueness = s.dropped_uniqueness,
        dropped_time_range = s.dropped_time_range,
        dropped_date_range = s.dropped_date_range,
        dropped_invalid_coordinate = s.dropped_invalid_coordinate,
        excluded_pending = s.excluded_pending,
        days = s.distinct_days,
        cells = output.clusters.all_day.len(),
        "Batch processed"
    );
    output
}
