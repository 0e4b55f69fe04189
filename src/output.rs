//! Persistence for plan exports and run history.
//!
//! Exports go to a local file and optionally to S3; each planning run can
//! also append a one-line summary to a history CSV.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use crate::engine::FleetSummary;
use crate::stats::DebugStats;

/// One row of the run-history CSV.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub time_view: String,
    pub fleet_size: Option<f64>,
    pub total_rows: usize,
    pub accepted_rows: usize,
    pub dropped_rows: usize,
    pub cells: usize,
    pub total_demand: u64,
    pub total_required: u64,
    pub total_allocated: u64,
    pub mean_sla: f64,
    pub coverage_pct: f64,
}

impl RunRecord {
    pub fn new(
        source: &str,
        time_view: &str,
        fleet_size: Option<f64>,
        stats: &DebugStats,
        summary: &FleetSummary,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            source: source.to_string(),
            time_view: time_view.to_string(),
            fleet_size,
            total_rows: stats.total_rows,
            accepted_rows: stats.accepted_rows,
            dropped_rows: stats.total_dropped(),
            cells: summary.cells,
            total_demand: summary.total_demand,
            total_required: summary.total_required,
            total_allocated: summary.total_allocated,
            mean_sla: summary.mean_sla,
            coverage_pct: summary.coverage_pct,
        }
    }
}

/// Logs debug stats using Rust's debug pretty-print format.
pub fn print_pretty(stats: &DebugStats) {
    debug!("{:#?}", stats);
}

/// Logs a fleet summary as pretty-printed JSON.
pub fn print_json(summary: &FleetSummary) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

/// Writes an export to `path`, creating parent directories.
pub fn write_export(path: &str, contents: &str) -> Result<()> {
    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("creating '{}'", dir.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("writing export '{path}'"))?;
    info!(path, bytes = contents.len(), "Export written");
    Ok(())
}

/// Appends a [`RunRecord`] to a CSV file, writing headers only on creation.
pub fn append_record(path: &str, record: &RunRecord) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending run record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    writer.serialize(record)?;
    writer.flush()?;

    Ok(())
}

pub fn gzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

/// Uploads an export to S3, gzip-compressing it (and suffixing `.gz`) when
/// asked. Returns the key written.
#[tracing::instrument(skip_all, fields(bucket = %bucket, key = %key, gzip = gzip_body))]
pub async fn publish_to_s3(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    body: &[u8],
    content_type: &str,
    gzip_body: bool,
) -> Result<String> {
    let (payload, key) = if gzip_body {
        (gzip(body)?, format!("{key}.gz"))
    } else {
        (body.to_vec(), key.to_string())
    };

    let mut req = client
        .put_object()
        .bucket(bucket)
        .key(&key)
        .body(payload.into())
        .content_type(content_type);
    if gzip_body {
        req = req.content_encoding("gzip");
    }
    req.send()
        .await
        .with_context(|| format!("uploading s3://{bucket}/{key}"))?;

    info!(bucket, key = %key, "Export published");
    Ok(key)
}
