//! Turning cell tallies into scored clusters and distributing the fleet.
//!
//! Allocation order is demand descending. Candidates are first laid out by
//! ascending cell index and the demand sort is stable, so equal-demand cells
//! are always served in cell-index order.

use h3o::{CellIndex, LatLng};
use tracing::debug;

use crate::config::{EngineConfig, GeoPoint};

use super::aggregate::{CellTally, ClusterMap};
use super::fish_bowl::FishBowl;
use super::score::demand_score;
use super::supply::{RateBasis, calculate_supply};
use super::types::HexCluster;

/// Below this coverage ratio the unconstrained SLA score is penalized.
pub const UNDER_COVERAGE_RATIO: f64 = 0.5;
pub const UNDER_COVERAGE_PENALTY: f64 = 0.75;

/// SLA score used when supply is not capped.
pub fn ideal_sla_score(allocated: u32, required: u32) -> u8 {
    if required == 0 {
        return 100;
    }
    let ratio = f64::from(allocated) / f64::from(required);
    let mut score = 100.0 * ratio.min(1.0);
    if ratio < UNDER_COVERAGE_RATIO {
        score *= UNDER_COVERAGE_PENALTY;
    }
    score.round() as u8
}

/// SLA score used under a fleet ceiling: plain coverage percentage.
pub fn constrained_sla_score(allocated: u32, required: u32) -> u8 {
    if required == 0 {
        return 100;
    }
    (100.0 * f64::from(allocated) / f64::from(required))
        .round()
        .min(100.0) as u8
}

/// Placeholder cluster for an empty result, so consumers never see an
/// empty list.
pub fn fallback_cluster(center: GeoPoint) -> HexCluster {
    HexCluster {
        h3_index: "fallback".to_string(),
        lat: center.lat,
        lng: center.lng,
        demand: 0,
        rider_density: 0,
        demand_score: 0,
        required_supply: 0,
        allocated_supply: 0,
        sla_compliance_score: 0,
        completed: 0,
        cancelled: 0,
        driver_not_found: 0,
        unknown: 0,
        is_fallback: true,
    }
}

fn to_cluster(
    cell: CellIndex,
    tally: &CellTally,
    max_demand: u64,
    max_density: usize,
    basis: RateBasis,
    config: &EngineConfig,
) -> HexCluster {
    let center = LatLng::from(cell);
    let required = calculate_supply(basis.per_hour(tally.demand), config);
    HexCluster {
        h3_index: cell.to_string(),
        lat: center.lat(),
        lng: center.lng(),
        demand: tally.demand,
        rider_density: tally.rider_density(),
        demand_score: demand_score(tally.demand, tally.rider_density(), max_demand, max_density),
        required_supply: required,
        allocated_supply: required,
        sla_compliance_score: 100,
        completed: tally.completed,
        cancelled: tally.cancelled,
        driver_not_found: tally.driver_not_found,
        unknown: tally.unknown,
        is_fallback: false,
    }
}

/// Greedy allocation in demand order.
///
/// Without a ceiling every cell gets its required supply. With one, the
/// busiest cells are filled completely before the next is considered; there
/// is no rebalancing.
pub fn allocate(clusters: &mut [HexCluster], fleet_size: Option<f64>) {
    clusters.sort_by(|a, b| b.demand.cmp(&a.demand));

    let Some(fleet) = fleet_size else {
        for c in clusters.iter_mut() {
            c.allocated_supply = c.required_supply;
            c.sla_compliance_score = ideal_sla_score(c.allocated_supply, c.required_supply);
        }
        return;
    };

    let mut remaining = fleet.max(0.0).floor() as u64;
    for c in clusters.iter_mut() {
        let given = remaining.min(u64::from(c.required_supply));
        remaining -= given;
        c.allocated_supply = given as u32;
        c.sla_compliance_score = constrained_sla_score(c.allocated_supply, c.required_supply);
    }
    debug!(fleet, unallocated = remaining, "Fleet allocated");
}

/// Scores, sizes and allocates every whitelisted cell in `map`.
///
/// Scores are normalized against the whole map, including cells the fish
/// bowl later drops.
pub fn build_clusters(
    map: &ClusterMap,
    basis: RateBasis,
    config: &EngineConfig,
    fish_bowl: &FishBowl,
    fleet_size: Option<f64>,
) -> Vec<HexCluster> {
    if map.is_empty() {
        return vec![fallback_cluster(config.city_center)];
    }

    let max_demand = map.max_demand();
    let max_density = map.max_rider_density();

    let mut cells: Vec<(CellIndex, &CellTally)> = map
        .iter()
        .filter(|(cell, _)| fish_bowl.contains(**cell))
        .map(|(cell, tally)| (*cell, tally))
        .collect();
    cells.sort_by_key(|(cell, _)| u64::from(*cell));

    let mut clusters: Vec<HexCluster> = cells
        .into_iter()
        .map(|(cell, tally)| to_cluster(cell, tally, max_demand, max_density, basis, config))
        .collect();

    allocate(&mut clusters, fleet_size);
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::aggregate::{RideOutcome, cell_for};
    use h3o::Resolution;

    fn cluster(id: &str, demand: u64, required: u32) -> HexCluster {
        HexCluster {
            h3_index: id.to_string(),
            demand,
            required_supply: required,
            allocated_supply: 0,
            is_fallback: false,
            ..fallback_cluster(GeoPoint { lat: 0.0, lng: 0.0 })
        }
    }

    #[test]
    fn test_ideal_sla_score() {
        assert_eq!(ideal_sla_score(0, 0), 100);
        assert_eq!(ideal_sla_score(5, 5), 100);
        assert_eq!(ideal_sla_score(8, 5), 100);
        assert_eq!(ideal_sla_score(3, 5), 60);
        // 40% coverage falls under the penalty line: 40 × 0.75
        assert_eq!(ideal_sla_score(2, 5), 30);
    }

    #[test]
    fn test_constrained_sla_score() {
        assert_eq!(constrained_sla_score(0, 0), 100);
        assert_eq!(constrained_sla_score(2, 3), 67);
        assert_eq!(constrained_sla_score(0, 4), 0);
    }

    #[test]
    fn test_unconstrained_allocation_matches_required() {
        let mut clusters = vec![cluster("a", 5, 2), cluster("b", 50, 9), cluster("c", 0, 0)];
        allocate(&mut clusters, None);

        assert_eq!(clusters[0].h3_index, "b");
        for c in &clusters {
            assert_eq!(c.allocated_supply, c.required_supply);
            assert_eq!(c.sla_compliance_score, 100);
        }
    }

    #[test]
    fn test_greedy_fills_busiest_first() {
        let mut clusters = vec![cluster("low", 10, 4), cluster("high", 30, 5), cluster("mid", 20, 4)];
        allocate(&mut clusters, Some(7.9));

        let ids: Vec<&str> = clusters.iter().map(|c| c.h3_index.as_str()).collect();
        assert_eq!(ids, vec!["high", "mid", "low"]);
        assert_eq!(clusters[0].allocated_supply, 5);
        assert_eq!(clusters[1].allocated_supply, 2);
        assert_eq!(clusters[2].allocated_supply, 0);
        assert_eq!(clusters[0].sla_compliance_score, 100);
        assert_eq!(clusters[1].sla_compliance_score, 50);
        assert_eq!(clusters[2].sla_compliance_score, 0);

        let total: u32 = clusters.iter().map(|c| c.allocated_supply).sum();
        assert!(total <= 7);
        assert!(clusters.iter().all(|c| c.allocated_supply <= c.required_supply));
    }

    #[test]
    fn test_zero_fleet_allocates_nothing() {
        let mut clusters = vec![cluster("a", 3, 2), cluster("b", 1, 0)];
        allocate(&mut clusters, Some(0.0));

        assert_eq!(clusters[0].allocated_supply, 0);
        assert_eq!(clusters[0].sla_compliance_score, 0);
        assert_eq!(clusters[1].sla_compliance_score, 100);
    }

    #[test]
    fn test_negative_fleet_treated_as_zero() {
        let mut clusters = vec![cluster("a", 3, 2)];
        allocate(&mut clusters, Some(-4.0));
        assert_eq!(clusters[0].allocated_supply, 0);
    }

    #[test]
    fn test_equal_demand_keeps_input_order() {
        let mut clusters = vec![cluster("first", 10, 3), cluster("second", 10, 3)];
        allocate(&mut clusters, Some(3.0));

        assert_eq!(clusters[0].h3_index, "first");
        assert_eq!(clusters[0].allocated_supply, 3);
        assert_eq!(clusters[1].allocated_supply, 0);
    }

    #[test]
    fn test_build_clusters_empty_map_gives_fallback() {
        let config = EngineConfig::default();
        let basis = RateBasis { days: 1, hours_per_day: 24 };
        let clusters = build_clusters(&ClusterMap::default(), basis, &config, &FishBowl::unrestricted(), Some(10.0));

        assert_eq!(clusters.len(), 1);
        assert!(clusters[0].is_fallback);
        assert_eq!(clusters[0].lat, config.city_center.lat);
        assert_eq!(clusters[0].demand, 0);
        assert_eq!(clusters[0].allocated_supply, 0);
    }

    #[test]
    fn test_build_clusters_respects_fish_bowl() {
        let res = Resolution::try_from(8).unwrap();
        let inside = cell_for(12.9716, 77.5946, res).unwrap();
        let outside = cell_for(13.0827, 80.2707, res).unwrap();

        let mut map = ClusterMap::default();
        for _ in 0..48 {
            map.record(inside, Some("r"), RideOutcome::Completed);
        }
        map.record(outside, None, RideOutcome::Unknown);

        let config = EngineConfig::default();
        let basis = RateBasis { days: 1, hours_per_day: 24 };
        let bowl = FishBowl::from_cells([inside]);
        let clusters = build_clusters(&map, basis, &config, &bowl, None);

        assert_eq!(clusters.len(), 1);
        let c = &clusters[0];
        assert_eq!(c.h3_index, inside.to_string());
        assert_eq!(c.demand, 48);
        assert_eq!(c.demand_score, 100);
        // 2 rides/hour × 40 min / 60 / 0.8 = 1.67 → 2
        assert_eq!(c.required_supply, 2);
        assert_eq!(c.allocated_supply, 2);
        assert!((c.lat - 12.9716).abs() < 0.01);
    }
}
