//! Header resolution for heterogeneous ride exports.
//!
//! Each logical field is located once per batch: first by exact alias, then
//! by any header containing all fragments of one of the field's fragment
//! groups. The result is a fixed column mapping applied to every row.

use std::collections::HashMap;

use crate::config::LocationType;
use crate::ingest::{RawValue, RowBatch};

/// Logical fields the engine reads from a ride row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    PickupLat,
    PickupLng,
    DropLat,
    DropLng,
    Date,
    Hour,
    Time,
    Status,
    RiderId,
    UniqueRequest,
}

struct FieldRule {
    field: Field,
    aliases: &'static [&'static str],
    fragments: &'static [&'static [&'static str]],
}

static FIELD_RULES: &[FieldRule] = &[
    FieldRule {
        field: Field::PickupLat,
        aliases: &["pickup_lat", "pickup_latitude", "pick_lat", "start_lat", "lat", "latitude"],
        fragments: &[&["pickup", "lat"], &["pick", "lat"], &["start", "lat"]],
    },
    FieldRule {
        field: Field::PickupLng,
        aliases: &[
            "pickup_lng", "pickup_lon", "pickup_long", "pickup_longitude", "pick_lng",
            "start_lng", "lng", "lon", "long", "longitude",
        ],
        fragments: &[
            &["pickup", "lng"],
            &["pickup", "lon"],
            &["pick", "lng"],
            &["pick", "lon"],
            &["start", "lng"],
            &["start", "lon"],
        ],
    },
    FieldRule {
        field: Field::DropLat,
        aliases: &["drop_lat", "drop_latitude", "dropoff_lat", "dropoff_latitude", "end_lat"],
        fragments: &[&["drop", "lat"], &["dest", "lat"], &["end", "lat"]],
    },
    FieldRule {
        field: Field::DropLng,
        aliases: &[
            "drop_lng", "drop_lon", "drop_long", "drop_longitude", "dropoff_lng",
            "dropoff_lon", "dropoff_longitude", "end_lng",
        ],
        fragments: &[
            &["drop", "lng"],
            &["drop", "lon"],
            &["dest", "lng"],
            &["dest", "lon"],
            &["end", "lng"],
            &["end", "lon"],
        ],
    },
    FieldRule {
        field: Field::Hour,
        aliases: &["hour", "hr", "pickup_hour", "ride_hour", "booking_hour"],
        fragments: &[&["hour"]],
    },
    FieldRule {
        field: Field::Date,
        aliases: &["date", "ride_date", "trip_date", "booking_date", "pickup_date"],
        fragments: &[&["date"]],
    },
    FieldRule {
        field: Field::Time,
        aliases: &[
            "time", "timestamp", "datetime", "date_time", "created_at", "pickup_time",
            "request_time", "booking_time",
        ],
        fragments: &[&["time"]],
    },
    FieldRule {
        field: Field::Status,
        aliases: &["status", "ride_status", "trip_status", "booking_status"],
        fragments: &[&["status"]],
    },
    FieldRule {
        field: Field::RiderId,
        aliases: &["rider_id", "customer_id", "user_id", "rider", "customer", "phone", "mobile"],
        fragments: &[&["rider"], &["customer"], &["user", "id"]],
    },
    FieldRule {
        field: Field::UniqueRequest,
        aliases: &["unique_request", "is_unique", "unique"],
        fragments: &[&["unique"]],
    },
];

fn normalize_header(h: &str) -> String {
    h.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

/// Resolved column positions for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    columns: HashMap<Field, usize>,
}

impl FieldMap {
    pub fn column(&self, field: Field) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    pub fn has(&self, field: Field) -> bool {
        self.columns.contains_key(&field)
    }

    /// The row's value for `field`, or `None` when the column is absent or
    /// the cell is blank.
    pub fn value<'a>(&self, row: &'a [RawValue], field: Field) -> Option<&'a RawValue> {
        let v = RowBatch::cell(row, self.column(field)?);
        if v.is_empty() { None } else { Some(v) }
    }

    pub fn text<'a>(&self, row: &'a [RawValue], field: Field) -> Option<std::borrow::Cow<'a, str>> {
        self.value(row, field).and_then(RawValue::as_text)
    }

    /// Latitude and longitude fields for the requested end of the ride.
    pub fn coordinate_fields(location: LocationType) -> (Field, Field) {
        match location {
            LocationType::Pickup => (Field::PickupLat, Field::PickupLng),
            LocationType::Drop => (Field::DropLat, Field::DropLng),
        }
    }
}

/// Maps every logical field to a header position, alias matches first.
pub fn resolve_schema(headers: &[String]) -> FieldMap {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
    let mut columns = HashMap::new();

    for rule in FIELD_RULES {
        let exact = normalized
            .iter()
            .position(|h| rule.aliases.contains(&h.as_str()));

        let found = exact.or_else(|| {
            rule.fragments.iter().find_map(|group| {
                normalized
                    .iter()
                    .position(|h| group.iter().all(|frag| h.contains(frag)))
            })
        });

        if let Some(i) = found {
            columns.insert(rule.field, i);
        }
    }

    FieldMap { columns }
}
