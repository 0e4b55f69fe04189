//! Per-row predicates, applied in a fixed order.
//!
//! Order is significant: a row is charged to the first predicate it fails,
//! so the debug counters only line up when the chain runs uniqueness, hour,
//! date, then coordinates.

use chrono::NaiveDate;

use crate::config::FilterParams;
use crate::extract::{self, Field, FieldMap, extract_date, extract_hour};
use crate::ingest::RawValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Uniqueness,
    TimeRange,
    DateRange,
    InvalidCoordinate,
}

/// An active hour filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HourWindow {
    /// Inclusive; wraps past midnight when `start > end`.
    Range { start: u32, end: u32 },
    Exact(u32),
}

impl HourWindow {
    pub fn from_params(params: &FilterParams) -> Option<Self> {
        match (params.start_hour.hour(), params.end_hour.hour()) {
            (Some(start), Some(end)) => Some(HourWindow::Range { start, end }),
            (Some(h), None) | (None, Some(h)) => Some(HourWindow::Exact(h)),
            (None, None) => None,
        }
    }

    pub fn contains(&self, hour: u32) -> bool {
        match *self {
            HourWindow::Range { start, end } if start <= end => (start..=end).contains(&hour),
            HourWindow::Range { start, end } => hour >= start || hour <= end,
            HourWindow::Exact(h) => hour == h,
        }
    }

    /// Hours per day covered by the window.
    pub fn span(&self) -> u32 {
        match *self {
            HourWindow::Range { start, end } if start <= end => end - start + 1,
            HourWindow::Range { start, end } => 24 - start + end + 1,
            HourWindow::Exact(_) => 1,
        }
    }
}

/// A row that survived the filter chain, with its derived fields.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedRow<'r> {
    pub row: &'r [RawValue],
    pub lat: f64,
    pub lng: f64,
    pub hour: Option<u32>,
    pub date: Option<NaiveDate>,
}

pub struct RowFilter<'a> {
    fields: &'a FieldMap,
    params: &'a FilterParams,
    hours: Option<HourWindow>,
}

impl<'a> RowFilter<'a> {
    pub fn new(fields: &'a FieldMap, params: &'a FilterParams) -> Self {
        Self {
            fields,
            params,
            hours: HourWindow::from_params(params),
        }
    }

    pub fn hour_window(&self) -> Option<HourWindow> {
        self.hours
    }

    fn date_filter_active(&self) -> bool {
        !self.params.selected_dates.is_empty()
            || self.params.start_date.is_some()
            || self.params.end_date.is_some()
    }

    fn date_matches(&self, date: NaiveDate) -> bool {
        let p = self.params;
        if !p.selected_dates.is_empty() {
            return p.selected_dates.contains(&date);
        }
        match (p.start_date, p.end_date) {
            (Some(start), Some(end)) if start == end => date == start,
            (Some(start), Some(end)) => start <= date && date <= end,
            (Some(start), None) => date >= start,
            (None, Some(end)) => date <= end,
            (None, None) => true,
        }
    }

    pub fn apply<'r>(&self, row: &'r [RawValue]) -> Result<AcceptedRow<'r>, DropReason> {
        if !extract::is_unique_request(self.fields, row) {
            return Err(DropReason::Uniqueness);
        }

        let time = self.fields.value(row, Field::Time);
        let hour = extract_hour(time, self.fields.value(row, Field::Hour));
        if let Some(window) = self.hours {
            match hour {
                Some(h) if window.contains(h) => {}
                _ => return Err(DropReason::TimeRange),
            }
        }

        let date = extract_date(time, self.fields.value(row, Field::Date));
        if self.date_filter_active() {
            match date {
                Some(d) if self.date_matches(d) => {}
                _ => return Err(DropReason::DateRange),
            }
        }

        let (lat, lng) = extract::coordinates(self.fields, row, self.params.location_type)
            .ok_or(DropReason::InvalidCoordinate)?;

        Ok(AcceptedRow {
            row,
            lat,
            lng,
            hour,
            date,
        })
    }
}
