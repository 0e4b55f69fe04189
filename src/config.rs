//! Run configuration: the engine parameters and the per-request filters.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::ValueEnum;
use h3o::Resolution;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A plain latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Bengaluru city center; used for the empty-result cluster and as the
/// default depot.
pub const DEFAULT_CITY_CENTER: GeoPoint = GeoPoint {
    lat: 12.9716,
    lng: 77.5946,
};

/// Engine parameters, immutable for one processing run.
///
/// Loaded from JSON. Keys are snake_case; the camelCase names used by the
/// upload UI are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    #[serde(alias = "h3Resolution")]
    pub h3_resolution: u8,
    #[serde(alias = "targetSlaMinutes")]
    pub target_sla_minutes: f64,
    #[serde(alias = "avgTripTimeMinutes")]
    pub avg_trip_time_minutes: f64,
    /// Fraction of shift time a driver is actually serving rides.
    #[serde(alias = "driverEfficiency")]
    pub driver_efficiency: f64,
    #[serde(alias = "cityCenter")]
    pub city_center: GeoPoint,
    pub depot: GeoPoint,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            h3_resolution: 8,
            target_sla_minutes: 15.0,
            avg_trip_time_minutes: 25.0,
            driver_efficiency: 0.8,
            city_center: DEFAULT_CITY_CENTER,
            depot: DEFAULT_CITY_CENTER,
        }
    }
}

impl EngineConfig {
    /// Loads the config from a JSON file at `path`. Missing keys keep their
    /// defaults.
    pub fn load(path: &str) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading config '{path}'"))?;
        let config: EngineConfig = serde_json::from_str(&content)
            .with_context(|| format!("parsing config '{path}'"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        Resolution::try_from(self.h3_resolution)
            .with_context(|| format!("h3_resolution {} is not 0..=15", self.h3_resolution))?;

        if !(self.driver_efficiency > 0.0 && self.driver_efficiency <= 1.0) {
            bail!(
                "driver_efficiency must be in (0, 1], got {}",
                self.driver_efficiency
            );
        }
        if !(self.target_sla_minutes >= 0.0) || !(self.avg_trip_time_minutes >= 0.0) {
            bail!("SLA and trip time minutes must be non-negative");
        }
        Ok(())
    }

    /// The configured H3 resolution, or `None` when out of range.
    pub fn resolution(&self) -> Option<Resolution> {
        Resolution::try_from(self.h3_resolution).ok()
    }
}

/// Which slice of the day the caller is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeView {
    #[default]
    All,
    Morning,
    Evening,
}

/// Whether rides are placed by where they started or where they ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationType {
    #[default]
    Pickup,
    Drop,
}

/// One end of an hour filter: a specific hour or `ALL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HourBound {
    #[default]
    All,
    At(u32),
}

impl HourBound {
    pub fn hour(self) -> Option<u32> {
        match self {
            HourBound::All => None,
            HourBound::At(h) => Some(h),
        }
    }
}

impl FromStr for HourBound {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            return Ok(HourBound::All);
        }
        match s.parse::<u32>() {
            Ok(h) if h <= 23 => Ok(HourBound::At(h)),
            _ => Err(format!("hour must be 0-23 or ALL, got '{s}'")),
        }
    }
}

/// Per-request filters and the optional fleet ceiling.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterParams {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// When non-empty, overrides the start/end range.
    pub selected_dates: Vec<NaiveDate>,
    pub time_view: TimeView,
    pub start_hour: HourBound,
    pub end_hour: HourBound,
    pub location_type: LocationType,
    /// Hard ceiling on vehicles; `None` means allocate ideal supply.
    pub fleet_size: Option<f64>,
}
