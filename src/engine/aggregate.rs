use h3o::{CellIndex, LatLng, Resolution};
use std::collections::{HashMap, HashSet};

use crate::extract::{Field, FieldMap};
use crate::filter::AcceptedRow;

/// Morning window, inclusive.
pub const MORNING_START_HOUR: u32 = 6;
pub const MORNING_END_HOUR: u32 = 15;
/// Evening window as named. Membership is `hour >= 16 || hour < 6`, so the
/// small hours count as the tail of the previous evening.
pub const EVENING_START_HOUR: u32 = 16;
pub const EVENING_END_HOUR: u32 = 23;

/// Outcome bucket for a ride status string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RideOutcome {
    Completed,
    Cancelled,
    DriverNotFound,
    Unknown,
}

impl RideOutcome {
    /// Substring match, first hit wins: completed, cancel, driver not found.
    pub fn classify(status: &str) -> Self {
        let s = status.to_lowercase();
        if s.contains("completed") {
            RideOutcome::Completed
        } else if s.contains("cancel") {
            RideOutcome::Cancelled
        } else if s.contains("driver not found") {
            RideOutcome::DriverNotFound
        } else {
            RideOutcome::Unknown
        }
    }
}

/// Pending rides are requests that never materialized; they are not demand.
pub fn is_pending(status: &str) -> bool {
    status.to_lowercase().contains("pending")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSegment {
    Morning,
    Evening,
}

impl TimeSegment {
    pub fn of_hour(hour: u32) -> Self {
        if (MORNING_START_HOUR..=MORNING_END_HOUR).contains(&hour) {
            TimeSegment::Morning
        } else {
            TimeSegment::Evening
        }
    }
}

/// Running totals for one cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellTally {
    pub demand: u64,
    pub riders: HashSet<String>,
    pub completed: u64,
    pub cancelled: u64,
    pub driver_not_found: u64,
    pub unknown: u64,
}

impl CellTally {
    pub fn record(&mut self, rider: Option<&str>, outcome: RideOutcome) {
        self.demand += 1;
        if let Some(r) = rider {
            if !self.riders.contains(r) {
                self.riders.insert(r.to_string());
            }
        }
        match outcome {
            RideOutcome::Completed => self.completed += 1,
            RideOutcome::Cancelled => self.cancelled += 1,
            RideOutcome::DriverNotFound => self.driver_not_found += 1,
            RideOutcome::Unknown => self.unknown += 1,
        }
    }

    pub fn rider_density(&self) -> usize {
        self.riders.len()
    }

    pub fn merge(&mut self, other: CellTally) {
        self.demand += other.demand;
        self.riders.extend(other.riders);
        self.completed += other.completed;
        self.cancelled += other.cancelled;
        self.driver_not_found += other.driver_not_found;
        self.unknown += other.unknown;
    }
}

/// Cell-keyed tallies. Merging is associative and commutative, so shards
/// of a batch can be folded independently and combined in any order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterMap {
    cells: HashMap<CellIndex, CellTally>,
}

impl ClusterMap {
    pub fn record(&mut self, cell: CellIndex, rider: Option<&str>, outcome: RideOutcome) {
        self.cells.entry(cell).or_default().record(rider, outcome);
    }

    pub fn merge(&mut self, other: ClusterMap) {
        for (cell, tally) in other.cells {
            self.cells.entry(cell).or_default().merge(tally);
        }
    }

    pub fn get(&self, cell: &CellIndex) -> Option<&CellTally> {
        self.cells.get(cell)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CellIndex, &CellTally)> {
        self.cells.iter()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn total_demand(&self) -> u64 {
        self.cells.values().map(|t| t.demand).sum()
    }

    pub fn max_demand(&self) -> u64 {
        self.cells.values().map(|t| t.demand).max().unwrap_or(0)
    }

    pub fn max_rider_density(&self) -> usize {
        self.cells.values().map(CellTally::rider_density).max().unwrap_or(0)
    }
}

/// The three views built in the same pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentedClusters {
    pub all_day: ClusterMap,
    pub morning: ClusterMap,
    pub evening: ClusterMap,
}

impl SegmentedClusters {
    pub fn merge(&mut self, other: SegmentedClusters) {
        self.all_day.merge(other.all_day);
        self.morning.merge(other.morning);
        self.evening.merge(other.evening);
    }
}

/// What happened to an accepted row during aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldOutcome {
    Counted,
    Pending,
    NoCell,
}

pub fn cell_for(lat: f64, lng: f64, resolution: Resolution) -> Option<CellIndex> {
    LatLng::new(lat, lng).ok().map(|ll| ll.to_cell(resolution))
}

/// Folds accepted rows into [`SegmentedClusters`].
pub struct Aggregator<'a> {
    fields: &'a FieldMap,
    resolution: Option<Resolution>,
}

impl<'a> Aggregator<'a> {
    pub fn new(fields: &'a FieldMap, resolution: Option<Resolution>) -> Self {
        Self { fields, resolution }
    }

    pub fn fold(&self, acc: &mut SegmentedClusters, row: &AcceptedRow<'_>) -> FoldOutcome {
        let Some(cell) = self.resolution.and_then(|res| cell_for(row.lat, row.lng, res)) else {
            return FoldOutcome::NoCell;
        };

        let status = self.fields.text(row.row, Field::Status).unwrap_or_default();
        if is_pending(&status) {
            return FoldOutcome::Pending;
        }

        let outcome = RideOutcome::classify(&status);
        let rider = self.fields.text(row.row, Field::RiderId);
        let rider = rider.as_deref().map(str::trim).filter(|r| !r.is_empty());

        acc.all_day.record(cell, rider, outcome);
        match row.hour.map(TimeSegment::of_hour) {
            Some(TimeSegment::Morning) => acc.morning.record(cell, rider, outcome),
            Some(TimeSegment::Evening) => acc.evening.record(cell, rider, outcome),
            None => {}
        }
        FoldOutcome::Counted
    }
}
