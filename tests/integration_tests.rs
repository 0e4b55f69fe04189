use fleet_planner::config::{EngineConfig, FilterParams, HourBound, LocationType, TimeView};
use fleet_planner::engine::fish_bowl::FishBowl;
use fleet_planner::engine::{FleetSummary, PlanOutput, process_with_fish_bowl};
use fleet_planner::export::{clusters_to_csv, status_subset_csv};
use fleet_planner::ingest::{RowBatch, parse_rows};
use std::collections::HashMap;

const RIDES_CSV: &str = "\
Ride ID,Pickup Latitude,Pickup Longitude,Drop Latitude,Drop Longitude,Ride Date,Ride Hour,Ride Status,Rider ID,Unique Request
1,12.9716,77.5946,12.9352,77.6245,05-01-2024,8,Completed,r1,Yes
2,12.9716,77.5946,12.9352,77.6245,05-01-2024,9,Pending,r2,Yes
3,12.9716,77.5946,12.9352,77.6245,05-01-2024,22,Cancelled,r1,Yes
4,12.9352,77.6245,12.9716,77.5946,06-01-2024,23,Driver not found,r3,Yes
5,12.9352,77.6245,12.9716,77.5946,06-01-2024,1,Completed,r4,Yes
6,12.9352,77.6245,12.9716,77.5946,06-01-2024,14,Completed,r4,No
7,0,0,12.9716,77.5946,06-01-2024,10,Completed,r5,Yes
";

fn rides() -> RowBatch {
    parse_rows(RIDES_CSV.as_bytes(), "rides.csv").expect("Failed to parse rides")
}

fn plan(batch: &RowBatch, params: &FilterParams) -> PlanOutput {
    process_with_fish_bowl(batch, &EngineConfig::default(), params, &FishBowl::unrestricted())
}

fn total_demand(output: &PlanOutput, view: TimeView) -> u64 {
    output.clusters.view(view).iter().map(|c| c.demand).sum()
}

#[test]
fn test_full_pipeline() {
    let output = plan(&rides(), &FilterParams::default());
    let stats = &output.stats;

    assert_eq!(stats.total_rows, 7);
    assert_eq!(stats.dropped_uniqueness, 1);
    assert_eq!(stats.dropped_invalid_coordinate, 1);
    assert_eq!(stats.excluded_pending, 1);
    assert_eq!(stats.distinct_days, 2);

    // 7 rows - 1 non-unique - 1 zero coordinate - 1 pending
    assert_eq!(total_demand(&output, TimeView::All), 4);
    assert_eq!(total_demand(&output, TimeView::Morning), 1);
    assert_eq!(total_demand(&output, TimeView::Evening), 3);

    let clusters = output.clusters.view(TimeView::All);
    assert_eq!(clusters.len(), 2);
    assert!(clusters.iter().all(|c| !c.is_fallback));
    assert!(clusters.iter().any(|c| c.demand_score == 100));
    for c in clusters {
        assert_eq!(c.allocated_supply, c.required_supply);
        assert_eq!(c.completed + c.cancelled + c.driver_not_found + c.unknown, c.demand);
    }
}

#[test]
fn test_overnight_hour_window() {
    let params = FilterParams {
        start_hour: HourBound::At(22),
        end_hour: HourBound::At(2),
        ..Default::default()
    };
    let output = plan(&rides(), &params);

    // hours 22, 23 and 1 survive; 8, 9 and 10 do not
    assert_eq!(output.stats.dropped_time_range, 3);
    assert_eq!(total_demand(&output, TimeView::All), 3);
}

#[test]
fn test_selected_dates_override_range() {
    let day = |d| chrono::NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
    let params = FilterParams {
        start_date: Some(day(6)),
        end_date: Some(day(6)),
        selected_dates: vec![day(5)],
        ..Default::default()
    };
    let output = plan(&rides(), &params);

    assert_eq!(output.stats.distinct_days, 1);
    assert_eq!(total_demand(&output, TimeView::All), 2);
}

#[test]
fn test_empty_input_yields_fallback() {
    let batch = parse_rows(b"pickup_lat,pickup_lng,status\n", "empty.csv").unwrap();
    let output = plan(&batch, &FilterParams::default());

    let clusters = output.clusters.view(TimeView::All);
    assert_eq!(clusters.len(), 1);
    assert!(clusters[0].is_fallback);
    assert_eq!(clusters[0].h3_index, "fallback");
    assert_eq!(clusters[0].demand, 0);
    assert_eq!(clusters[0].allocated_supply, 0);
}

#[test]
fn test_zero_fleet_allocates_nothing() {
    let params = FilterParams {
        fleet_size: Some(0.0),
        ..Default::default()
    };
    let output = plan(&rides(), &params);
    let summary = FleetSummary::from_clusters(output.clusters.view(TimeView::All));

    assert_eq!(summary.total_allocated, 0);
    for c in output.clusters.view(TimeView::All) {
        let expected = if c.required_supply == 0 { 100 } else { 0 };
        assert_eq!(c.sla_compliance_score, expected);
    }
}

#[test]
fn test_cluster_csv_matches_plan() {
    let output = plan(&rides(), &FilterParams::default());
    let clusters = output.clusters.view(TimeView::All);
    let csv = clusters_to_csv(clusters).unwrap();

    let mut rdr = csv::Reader::from_reader(csv.as_bytes());
    let exported: HashMap<String, u64> = rdr
        .records()
        .map(|r| {
            let r = r.unwrap();
            (r[0].to_string(), r[4].parse().unwrap())
        })
        .collect();

    assert_eq!(exported.len(), clusters.len());
    for c in clusters {
        assert_eq!(exported[&c.h3_index], c.demand);
    }
}

#[test]
fn test_json_input_matches_csv() {
    let json = r#"[
        {"pickup_lat": 12.9716, "pickup_lng": 77.5946, "date": "05-01-2024", "hour": 8, "status": "Completed", "rider_id": "r1"},
        {"pickup_lat": 12.9716, "pickup_lng": 77.5946, "date": "05-01-2024", "hour": 9, "status": "Pending", "rider_id": "r2"},
        {"pickup_lat": 12.9352, "pickup_lng": 77.6245, "date": "06-01-2024", "hour": 23, "status": "Cancelled", "rider_id": "r3"}
    ]"#;
    let csv = "\
pickup_lat,pickup_lng,date,hour,status,rider_id
12.9716,77.5946,05-01-2024,8,Completed,r1
12.9716,77.5946,05-01-2024,9,Pending,r2
12.9352,77.6245,06-01-2024,23,Cancelled,r3
";
    let from_json = plan(&parse_rows(json.as_bytes(), "rides.json").unwrap(), &FilterParams::default());
    let from_csv = plan(&parse_rows(csv.as_bytes(), "rides.csv").unwrap(), &FilterParams::default());

    assert_eq!(from_json.clusters, from_csv.clusters);
    assert_eq!(total_demand(&from_json, TimeView::All), 2);
}

#[test]
fn test_drop_location_moves_demand() {
    let params = FilterParams {
        location_type: LocationType::Drop,
        ..Default::default()
    };
    let pickup = plan(&rides(), &FilterParams::default());
    let drop = plan(&rides(), &params);

    // the zero-coordinate pickup row has a valid drop point
    assert_eq!(total_demand(&drop, TimeView::All), 5);
    assert_ne!(pickup.clusters.all_day, drop.clusters.all_day);
}

#[test]
fn test_status_export_counts_cancelled() {
    let csv = status_subset_csv(
        &rides(),
        &["cancel".to_string(), "driver not found".to_string()],
        &EngineConfig::default(),
        LocationType::Pickup,
    )
    .unwrap();

    let mut rdr = csv::Reader::from_reader(csv.as_bytes());
    let counts: Vec<u64> = rdr.records().map(|r| r.unwrap()[3].parse().unwrap()).collect();
    assert_eq!(counts, vec![1, 1]);
}
