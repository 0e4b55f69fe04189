//! Heuristic field extraction for loosely-typed ride rows.
//!
//! [`schema`] resolves header names to logical fields once per batch;
//! [`datetime`] turns the many date/hour encodings into `NaiveDate` and hour
//! values. Everything here is total: unreadable input yields `None`.

pub mod datetime;
pub mod schema;

pub use datetime::{extract_date, extract_hour};
pub use schema::{Field, FieldMap, resolve_schema};

use crate::config::LocationType;
use crate::ingest::RawValue;

/// A usable coordinate: finite and non-zero.
pub fn parse_coordinate(v: Option<&RawValue>) -> Option<f64> {
    v.and_then(RawValue::as_f64)
        .filter(|c| c.is_finite() && *c != 0.0)
}

/// `(lat, lng)` of the requested ride end, if both parse.
pub fn coordinates(fields: &FieldMap, row: &[RawValue], location: LocationType) -> Option<(f64, f64)> {
    let (lat_field, lng_field) = FieldMap::coordinate_fields(location);
    let lat = parse_coordinate(fields.value(row, lat_field))?;
    let lng = parse_coordinate(fields.value(row, lng_field))?;
    Some((lat, lng))
}

/// Whether the row is marked as a unique request. Rows pass when the
/// batch has no such column.
pub fn is_unique_request(fields: &FieldMap, row: &[RawValue]) -> bool {
    if !fields.has(Field::UniqueRequest) {
        return true;
    }
    fields
        .text(row, Field::UniqueRequest)
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("yes"))
}
