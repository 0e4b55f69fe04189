//! Output types of the planning pipeline.

use serde::{Deserialize, Serialize};

use crate::config::TimeView;
use crate::stats::DebugStats;

/// One hexagonal cell's demand, supply and allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HexCluster {
    pub h3_index: String,
    pub lat: f64,
    pub lng: f64,
    pub demand: u64,
    pub rider_density: usize,
    pub demand_score: u8,
    pub required_supply: u32,
    pub allocated_supply: u32,
    pub sla_compliance_score: u8,
    pub completed: u64,
    pub cancelled: u64,
    pub driver_not_found: u64,
    pub unknown: u64,
    /// Placeholder emitted when no row produced a cell.
    pub is_fallback: bool,
}

/// Cluster lists for the three time views.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedClusters {
    pub all_day: Vec<HexCluster>,
    pub morning: Vec<HexCluster>,
    pub evening: Vec<HexCluster>,
}

impl ProcessedClusters {
    pub fn view(&self, view: TimeView) -> &[HexCluster] {
        match view {
            TimeView::All => &self.all_day,
            TimeView::Morning => &self.morning,
            TimeView::Evening => &self.evening,
        }
    }
}

/// Everything one processing call hands back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanOutput {
    pub clusters: ProcessedClusters,
    pub stats: DebugStats,
}

/// Fleet-level totals for a cluster list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FleetSummary {
    pub cells: usize,
    pub total_demand: u64,
    pub total_required: u64,
    pub total_allocated: u64,
    pub mean_sla: f64,
    pub coverage_pct: f64,
}

impl FleetSummary {
    pub fn from_clusters(clusters: &[HexCluster]) -> Self {
        let real: Vec<&HexCluster> = clusters.iter().filter(|c| !c.is_fallback).collect();
        if real.is_empty() {
            return Self::default();
        }

        let total_required: u64 = real.iter().map(|c| u64::from(c.required_supply)).sum();
        let total_allocated: u64 = real.iter().map(|c| u64::from(c.allocated_supply)).sum();
        let sla_sum: f64 = real.iter().map(|c| f64::from(c.sla_compliance_score)).sum();

        Self {
            cells: real.len(),
            total_demand: real.iter().map(|c| c.demand).sum(),
            total_required,
            total_allocated,
            mean_sla: sla_sum / real.len() as f64,
            coverage_pct: if total_required == 0 {
                100.0
            } else {
                total_allocated as f64 / total_required as f64 * 100.0
            },
        }
    }
}
