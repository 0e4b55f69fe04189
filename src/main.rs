//! CLI entry point for the fleet planner.
//!
//! Loads a ride export from a file or URL, runs the demand pipeline, and
//! writes cluster plans or auxiliary exports, optionally publishing to S3.

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use fleet_planner::{
    config::{EngineConfig, FilterParams, HourBound, LocationType, TimeView},
    engine::{self, FleetSummary, fish_bowl},
    export,
    fetch::load_source,
    ingest::{RowBatch, parse_rows},
    output::{self, RunRecord},
};
use std::ffi::OsStr;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "fleet_planner")]
#[command(about = "Plan ride-hailing fleet placement from historical ride exports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Path to a CSV/JSON export or a URL to fetch
    #[arg(value_name = "FILE_OR_URL")]
    source: String,

    /// JSON engine config; defaults apply when omitted
    #[arg(short, long)]
    config: Option<String>,

    /// Override the configured H3 resolution
    #[arg(long)]
    resolution: Option<u8>,

    /// Place rides by pickup or drop coordinates
    #[arg(short, long, value_enum, default_value_t = LocationType::Pickup)]
    location: LocationType,

    /// JSON array of whitelisted cell ids (falls back to FISH_BOWL_PATH)
    #[arg(long)]
    fish_bowl: Option<String>,

    /// File to write the export to
    #[arg(short, long)]
    output: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the fleet plan for one time view
    Plan {
        #[command(flatten)]
        source: SourceArgs,

        /// First day to include (YYYY-MM-DD)
        #[arg(long)]
        start_date: Option<NaiveDate>,

        /// Last day to include (YYYY-MM-DD)
        #[arg(long)]
        end_date: Option<NaiveDate>,

        /// Explicit days to include; overrides the start/end range
        #[arg(long = "date")]
        dates: Vec<NaiveDate>,

        /// Hour filter start, 0-23 or ALL
        #[arg(long, default_value = "ALL")]
        start_hour: HourBound,

        /// Hour filter end, 0-23 or ALL
        #[arg(long, default_value = "ALL")]
        end_hour: HourBound,

        #[arg(short, long, value_enum, default_value_t = TimeView::All)]
        time_view: TimeView,

        /// Hard ceiling on vehicles to allocate
        #[arg(short, long)]
        fleet_size: Option<f64>,

        #[arg(long, value_enum, default_value_t = Format::Csv)]
        format: Format,

        /// CSV file to append a run summary to
        #[arg(long)]
        history: Option<String>,

        /// Optional: S3 bucket to publish the plan to
        #[arg(long)]
        s3_bucket: Option<String>,

        /// Key prefix for published plans
        #[arg(long, default_value = "plans")]
        s3_prefix: String,

        /// Optional: Gzip compress the plan before uploading to S3
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
    /// Count rides per cell for the given statuses
    StatusExport {
        #[command(flatten)]
        source: SourceArgs,

        /// Status to match (substring, case-insensitive); repeatable
        #[arg(short, long = "status", required = true)]
        statuses: Vec<String>,
    },
    /// Export raw ride coordinates with their status
    Points {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Re-emit every row with its cell id and depot distance
    Annotate {
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/fleet_planner.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("fleet_planner.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Plan {
            source,
            start_date,
            end_date,
            dates,
            start_hour,
            end_hour,
            time_view,
            fleet_size,
            format,
            history,
            s3_bucket,
            s3_prefix,
            gzip,
        } => {
            let (batch, config) = prepare(&source).await?;
            let params = FilterParams {
                start_date,
                end_date,
                selected_dates: dates,
                time_view,
                start_hour,
                end_hour,
                location_type: source.location,
                fleet_size,
            };

            let plan = engine::process(&batch, &config, &params);
            let clusters = plan.clusters.view(time_view);
            let summary = FleetSummary::from_clusters(clusters);
            let view_name = time_view
                .to_possible_value()
                .map(|v| v.get_name().to_string())
                .unwrap_or_default();

            output::print_pretty(&plan.stats);
            output::print_json(&summary)?;
            if plan.stats.accepted_rows == 0 && !batch.is_empty() {
                warn!(
                    total = plan.stats.total_rows,
                    dropped_pct = plan.stats.dropped_pct(),
                    "Every row was filtered out"
                );
            }

            let (body, ext, content_type) = match format {
                Format::Csv => (export::clusters_to_csv(clusters)?, "csv", "text/csv"),
                Format::Json => (export::clusters_to_json(clusters)?, "json", "application/json"),
            };
            output::write_export(&source.output, &body)?;

            if let Some(path) = history {
                let record =
                    RunRecord::new(&source.source, &view_name, fleet_size, &plan.stats, &summary);
                output::append_record(&path, &record)?;
            }

            if let Some(bucket) = s3_bucket {
                let aws = aws_config::load_from_env().await;
                let s3 = aws_sdk_s3::Client::new(&aws);
                let key = format!(
                    "{}/date={}/{}.{}",
                    s3_prefix.trim_end_matches('/'),
                    Utc::now().format("%Y-%m-%d"),
                    view_name,
                    ext
                );
                output::publish_to_s3(&s3, &bucket, &key, body.as_bytes(), content_type, gzip)
                    .await?;
            } else {
                info!("S3 bucket not specified, skipping upload");
            }
        }
        Commands::StatusExport { source, statuses } => {
            let (batch, config) = prepare(&source).await?;
            let csv = export::status_subset_csv(&batch, &statuses, &config, source.location)?;
            output::write_export(&source.output, &csv)?;
        }
        Commands::Points { source } => {
            let (batch, _) = prepare(&source).await?;
            let csv = export::points_csv(&batch, source.location)?;
            output::write_export(&source.output, &csv)?;
        }
        Commands::Annotate { source } => {
            let (batch, config) = prepare(&source).await?;
            let csv = export::annotated_rows_csv(&batch, &config, source.location)?;
            output::write_export(&source.output, &csv)?;
        }
    }

    Ok(())
}

/// Loads the rows, the engine config with CLI overrides, and the fish bowl.
#[tracing::instrument(skip_all, fields(source = %args.source))]
async fn prepare(args: &SourceArgs) -> Result<(RowBatch, EngineConfig)> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(res) = args.resolution {
        config.h3_resolution = res;
    }
    config.validate()?;

    let bowl_path = args
        .fish_bowl
        .clone()
        .or_else(|| std::env::var("FISH_BOWL_PATH").ok());
    if let Some(path) = bowl_path {
        fish_bowl::install(fish_bowl::FishBowl::load(&path)?)?;
    }

    let bytes = load_source(&args.source).await?;
    let batch = parse_rows(&bytes, &args.source)?;
    info!(
        rows = batch.len(),
        columns = batch.headers.len(),
        "Rows loaded"
    );
    Ok((batch, config))
}
