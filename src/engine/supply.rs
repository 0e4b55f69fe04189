use crate::config::EngineConfig;
use crate::filter::HourWindow;

use super::aggregate::{EVENING_END_HOUR, EVENING_START_HOUR, MORNING_END_HOUR, MORNING_START_HOUR};

/// Which aggregation view a supply figure is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    AllDay,
    Morning,
    Evening,
}

impl Bucket {
    /// Hours per day the bucket represents when no hour filter is active.
    pub fn window_hours(self) -> u32 {
        match self {
            Bucket::AllDay => 24,
            Bucket::Morning => MORNING_END_HOUR - MORNING_START_HOUR + 1,
            Bucket::Evening => EVENING_END_HOUR - EVENING_START_HOUR + 1,
        }
    }
}

/// The observed duration that raw counts are spread over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateBasis {
    pub days: u32,
    pub hours_per_day: u32,
}

impl RateBasis {
    /// An explicit hour filter overrides the bucket window.
    pub fn new(distinct_days: usize, hours: Option<HourWindow>, bucket: Bucket) -> Self {
        Self {
            days: (distinct_days as u32).max(1),
            hours_per_day: hours.map_or_else(|| bucket.window_hours(), |w| w.span()),
        }
    }

    pub fn observed_hours(&self) -> f64 {
        f64::from(self.days.max(1)) * f64::from(self.hours_per_day.max(1))
    }

    pub fn per_hour(&self, demand: u64) -> f64 {
        demand as f64 / self.observed_hours()
    }
}

/// Vehicles needed to serve `demand_per_hour` within the target SLA.
///
/// Little's Law: vehicles in service = arrival rate × time each request
/// holds a vehicle (trip plus pickup SLA), then inflated by driver
/// efficiency.
pub fn calculate_supply(demand_per_hour: f64, config: &EngineConfig) -> u32 {
    let cycle_minutes = config.avg_trip_time_minutes + config.target_sla_minutes;
    let raw = demand_per_hour * cycle_minutes / 60.0;
    let efficiency = if config.driver_efficiency > 0.0 {
        config.driver_efficiency
    } else {
        1.0
    };
    let buffered = raw / efficiency;
    if buffered.is_finite() && buffered > 0.0 {
        buffered.ceil() as u32
    } else {
        0
    }
}
