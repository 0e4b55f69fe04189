//! Text exports for downstream tooling: cluster CSV/JSON, status subsets,
//! raw points, and annotated rows.

use anyhow::{Context, Result};
use csv::Writer;
use h3o::{CellIndex, LatLng};
use std::collections::HashMap;

use crate::config::{EngineConfig, LocationType};
use crate::engine::aggregate::cell_for;
use crate::engine::types::HexCluster;
use crate::extract::{self, Field, resolve_schema};
use crate::ingest::{RawValue, RowBatch};

fn finish(writer: Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("flushing CSV buffer: {}", e.error()))?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

fn coord(v: f64) -> String {
    format!("{v:.6}")
}

/// `h3_index,lat,lng,autos_needed,demand`, where `autos_needed` is the
/// allocated supply.
pub fn clusters_to_csv(clusters: &[HexCluster]) -> Result<String> {
    let mut wtr = Writer::from_writer(Vec::new());
    wtr.write_record(["h3_index", "lat", "lng", "autos_needed", "demand"])?;
    for c in clusters {
        wtr.write_record([
            c.h3_index.clone(),
            coord(c.lat),
            coord(c.lng),
            c.allocated_supply.to_string(),
            c.demand.to_string(),
        ])?;
    }
    finish(wtr)
}

/// The full cluster list as pretty-printed JSON.
pub fn clusters_to_json(clusters: &[HexCluster]) -> Result<String> {
    Ok(serde_json::to_string_pretty(clusters)?)
}

/// Per-cell counts of unique requests whose status contains any of
/// `statuses` (case-insensitive). Independent of the cluster pipeline: no
/// date/hour filters, no pending exclusion.
pub fn status_subset_csv(
    batch: &RowBatch,
    statuses: &[String],
    config: &EngineConfig,
    location: LocationType,
) -> Result<String> {
    let fields = resolve_schema(&batch.headers);
    let targets: Vec<String> = statuses
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    let mut counts: HashMap<CellIndex, u64> = HashMap::new();
    if let Some(res) = config.resolution() {
        for row in &batch.rows {
            if !extract::is_unique_request(&fields, row) {
                continue;
            }
            let Some(status) = fields.text(row, Field::Status) else {
                continue;
            };
            let status = status.to_lowercase();
            if !targets.iter().any(|t| status.contains(t.as_str())) {
                continue;
            }
            let Some(cell) = extract::coordinates(&fields, row, location)
                .and_then(|(lat, lng)| cell_for(lat, lng, res))
            else {
                continue;
            };
            *counts.entry(cell).or_default() += 1;
        }
    }

    let mut cells: Vec<(CellIndex, u64)> = counts.into_iter().collect();
    cells.sort_by(|a, b| b.1.cmp(&a.1).then(u64::from(a.0).cmp(&u64::from(b.0))));

    let mut wtr = Writer::from_writer(Vec::new());
    wtr.write_record(["h3_index", "lat", "lng", "count"])?;
    for (cell, count) in cells {
        let center = LatLng::from(cell);
        wtr.write_record([
            cell.to_string(),
            coord(center.lat()),
            coord(center.lng()),
            count.to_string(),
        ])?;
    }
    finish(wtr)
}

/// Raw `lat,lng,status` of every unique request with valid coordinates.
pub fn points_csv(batch: &RowBatch, location: LocationType) -> Result<String> {
    let fields = resolve_schema(&batch.headers);
    let mut wtr = Writer::from_writer(Vec::new());
    wtr.write_record(["lat", "lng", "status"])?;

    for row in &batch.rows {
        if !extract::is_unique_request(&fields, row) {
            continue;
        }
        if let Some((lat, lng)) = extract::coordinates(&fields, row, location) {
            let status = fields.text(row, Field::Status).unwrap_or_default();
            wtr.write_record([coord(lat), coord(lng), status.into_owned()])?;
        }
    }
    finish(wtr)
}

/// Every input row with two extra columns: its H3 cell and its great-circle
/// distance from the depot. Both are blank when the coordinates are unusable.
pub fn annotated_rows_csv(
    batch: &RowBatch,
    config: &EngineConfig,
    location: LocationType,
) -> Result<String> {
    let fields = resolve_schema(&batch.headers);
    let resolution = config.resolution();
    let depot = LatLng::new(config.depot.lat, config.depot.lng).ok();

    let mut wtr = Writer::from_writer(Vec::new());
    let mut header = batch.headers.clone();
    header.push("h3_index".to_string());
    header.push("depot_distance_km".to_string());
    wtr.write_record(&header)?;

    for row in &batch.rows {
        let mut record: Vec<String> = (0..batch.headers.len())
            .map(|i| {
                RowBatch::cell(row, i)
                    .as_text()
                    .map(|s| s.into_owned())
                    .unwrap_or_default()
            })
            .collect();

        let point = extract::coordinates(&fields, row, location)
            .and_then(|(lat, lng)| LatLng::new(lat, lng).ok());
        let cell = point
            .zip(resolution)
            .map(|(ll, res)| ll.to_cell(res).to_string())
            .unwrap_or_default();
        let distance = point
            .zip(depot)
            .map(|(ll, d)| format!("{:.3}", ll.distance_km(d)))
            .unwrap_or_default();

        record.push(cell);
        record.push(distance);
        wtr.write_record(&record)?;
    }
    finish(wtr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FilterParams, GeoPoint};
    use crate::engine::fish_bowl::FishBowl;
    use crate::engine::process_with_fish_bowl;
    use std::collections::HashSet;

    fn batch(headers: &[&str], rows: &[&[&str]]) -> RowBatch {
        RowBatch::new(
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|v| RawValue::from_text(v)).collect())
                .collect(),
        )
    }

    fn rides() -> RowBatch {
        batch(
            &["pickup_lat", "pickup_lng", "drop_lat", "drop_lng", "status", "unique_request"],
            &[
                &["12.9716", "77.5946", "12.9352", "77.6245", "Completed", "yes"],
                &["12.9716", "77.5946", "12.9352", "77.6245", "Cancelled", "yes"],
                &["12.9352", "77.6245", "12.9716", "77.5946", "Cancelled by driver", "Yes"],
                &["12.9352", "77.6245", "12.9716", "77.5946", "Cancelled", "no"],
                &["0", "0", "0", "0", "Cancelled", "yes"],
            ],
        )
    }

    #[test]
    fn test_cluster_csv_round_trips_cell_ids() {
        let out = process_with_fish_bowl(
            &rides(),
            &EngineConfig::default(),
            &FilterParams::default(),
            &FishBowl::unrestricted(),
        );
        let clusters = &out.clusters.all_day;
        let csv = clusters_to_csv(clusters).unwrap();

        let mut rdr = csv::Reader::from_reader(csv.as_bytes());
        let headers: Vec<String> = rdr.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, vec!["h3_index", "lat", "lng", "autos_needed", "demand"]);
        let ids: HashSet<String> = rdr
            .records()
            .map(|r| r.unwrap()[0].to_string())
            .collect();
        let expected: HashSet<String> = clusters.iter().map(|c| c.h3_index.clone()).collect();
        assert_eq!(ids, expected);

        for id in &ids {
            assert!(id.parse::<CellIndex>().is_ok());
        }
    }

    #[test]
    fn test_cluster_csv_uses_six_decimals() {
        let cluster = HexCluster {
            lat: 12.1234567891,
            lng: 77.5,
            allocated_supply: 4,
            demand: 9,
            ..crate::engine::optimize::fallback_cluster(GeoPoint { lat: 0.0, lng: 0.0 })
        };
        let csv = clusters_to_csv(&[cluster]).unwrap();
        assert!(csv.contains("fallback,12.123457,77.500000,4,9"));
    }

    #[test]
    fn test_cluster_json_is_full_structure() {
        let cluster = crate::engine::optimize::fallback_cluster(GeoPoint { lat: 1.0, lng: 2.0 });
        let json = clusters_to_json(&[cluster]).unwrap();
        let parsed: Vec<HexCluster> = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.len(), 1);
        assert!(parsed[0].is_fallback);
        assert!(json.contains("\"sla_compliance_score\""));
    }

    #[test]
    fn test_status_subset_counts_matching_unique_rows() {
        let csv = status_subset_csv(
            &rides(),
            &["cancelled".to_string()],
            &EngineConfig::default(),
            LocationType::Pickup,
        )
        .unwrap();

        let mut rdr = csv::Reader::from_reader(csv.as_bytes());
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        // one cancelled ride in each pickup cell; the "no" row and zero coords are skipped
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| &r[3] == "1"));
    }

    #[test]
    fn test_points_csv_uses_requested_end() {
        let csv = points_csv(&rides(), LocationType::Drop).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "lat,lng,status");
        assert_eq!(lines[1], "12.935200,77.624500,Completed");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_annotated_rows_keep_every_row() {
        let config = EngineConfig {
            depot: GeoPoint { lat: 12.9716, lng: 77.5946 },
            ..Default::default()
        };
        let csv = annotated_rows_csv(&rides(), &config, LocationType::Pickup).unwrap();

        let mut rdr = csv::Reader::from_reader(csv.as_bytes());
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(&headers[6], "h3_index");
        assert_eq!(&headers[7], "depot_distance_km");

        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 5);
        assert_eq!(&rows[0][7], "0.000");
        let far: f64 = rows[2][7].parse().unwrap();
        assert!(far > 4.0 && far < 6.0);
        assert_eq!(&rows[4][6], "");
        assert_eq!(&rows[4][7], "");
    }
}
