//! Date and hour extraction from mixed spreadsheet/CSV encodings.
//!
//! Every parser here is a pure `fn(&str) -> Option<T>`. Callers run an
//! ordered strategy list and keep the first success.

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ingest::RawValue;

type Strategy<T> = fn(&str) -> Option<T>;

/// Serials at or below this are not dates (25569 is 1970-01-01).
const SERIAL_DATE_FLOOR: f64 = 25568.0;

static DAY_MONTH_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[-/](\d{1,2})[-/](\d{4})").expect("valid regex"));

static CLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[^\d])(\d{1,2}):(\d{2})(?::\d{2}(?:\.\d+)?)?\s*(?:([ap])\.?m\b\.?)?")
        .expect("valid regex")
});

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%d %b %Y", "%d %B %Y", "%b %d, %Y", "%B %d, %Y", "%b %d %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%d %I:%M %p",
    "%Y-%m-%d %I:%M:%S %p",
];

const DATE_STRATEGIES: &[Strategy<NaiveDate>] =
    &[parse_day_month_year, parse_serial_date, parse_generic_date];

const HOUR_STRATEGIES: &[Strategy<u32>] = &[
    parse_day_fraction_hour,
    parse_serial_hour,
    parse_clock_hour,
    parse_generic_hour,
];

fn first_success<T>(input: &str, strategies: &[Strategy<T>]) -> Option<T> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    strategies.iter().find_map(|parse| parse(input))
}

fn spreadsheet_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default()
}

/// `DD-MM-YYYY` or `DD/MM/YYYY`, optionally followed by a time.
pub fn parse_day_month_year(s: &str) -> Option<NaiveDate> {
    let caps = DAY_MONTH_YEAR.captures(s)?;
    let day = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let year = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Spreadsheet day serial (fraction ignored), counted from 1899-12-30.
pub fn parse_serial_date(s: &str) -> Option<NaiveDate> {
    let serial: f64 = s.parse().ok()?;
    if !serial.is_finite() || serial <= SERIAL_DATE_FLOOR {
        return None;
    }
    spreadsheet_epoch().checked_add_days(Days::new(serial.floor() as u64))
}

pub fn parse_generic_date(s: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
        .or_else(|| parse_generic_datetime(s).map(|dt| dt.date()))
}

fn parse_generic_datetime(s: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_local()))
        .or_else(|| DateTime::parse_from_rfc2822(s).ok().map(|dt| dt.naive_local()))
}

/// A bare time-of-day stored as a fraction of a day.
pub fn parse_day_fraction_hour(s: &str) -> Option<u32> {
    let v: f64 = s.parse().ok()?;
    if (0.0..1.0).contains(&v) {
        Some(((v * 24.0).floor() as u32).min(23))
    } else {
        None
    }
}

/// A full spreadsheet date-time serial; the hour lives in the fraction.
pub fn parse_serial_hour(s: &str) -> Option<u32> {
    let v: f64 = s.parse().ok()?;
    if !v.is_finite() || v <= SERIAL_DATE_FLOOR {
        return None;
    }
    Some(((v.fract() * 24.0).floor() as u32).min(23))
}

/// First `H:MM` in the string, honouring a trailing AM/PM marker.
pub fn parse_clock_hour(s: &str) -> Option<u32> {
    let caps = CLOCK.captures(s)?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    if minute > 59 {
        return None;
    }

    match caps.get(3).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(meridiem) => {
            if !(1..=12).contains(&hour) {
                return None;
            }
            let base = hour % 12;
            Some(if meridiem == "p" { base + 12 } else { base })
        }
        None if hour <= 23 => Some(hour),
        None => None,
    }
}

pub fn parse_generic_hour(s: &str) -> Option<u32> {
    parse_generic_datetime(s)
        .map(|dt| dt.hour())
        .or_else(|| NaiveTime::parse_from_str(s, "%H:%M:%S").ok().map(|t| t.hour()))
}

/// Integer hour column: direct integer first, then a floored float.
pub fn parse_hour_column(v: &RawValue) -> Option<u32> {
    let hour = match v {
        RawValue::Empty => return None,
        RawValue::Number(n) => n.floor(),
        RawValue::Text(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(h) => h as f64,
                Err(_) => s.parse::<f64>().ok()?.floor(),
            }
        }
    };
    if (0.0..24.0).contains(&hour) {
        Some(hour as u32)
    } else {
        None
    }
}

/// Ride date truncated to the day. The explicit date column wins; the
/// combined timestamp is only consulted when it is missing or unreadable.
pub fn extract_date(time_value: Option<&RawValue>, date_value: Option<&RawValue>) -> Option<NaiveDate> {
    [date_value, time_value]
        .into_iter()
        .flatten()
        .filter_map(RawValue::as_text)
        .find_map(|s| first_success(&s, DATE_STRATEGIES))
}

/// Ride hour 0-23. The explicit hour column wins over the combined timestamp.
pub fn extract_hour(time_value: Option<&RawValue>, hour_value: Option<&RawValue>) -> Option<u32> {
    hour_value.and_then(parse_hour_column).or_else(|| {
        time_value
            .and_then(RawValue::as_text)
            .and_then(|s| first_success(&s, HOUR_STRATEGIES))
    })
}
