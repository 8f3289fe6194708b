/// Row types for every GTFS file the merge engine understands.
///
/// Each struct corresponds to one line of its source file. Serde attributes
/// drive the CSV layer in both directions: field declaration order is the
/// canonical column order on output, and `#[serde(default)]` lets optional
/// columns be absent from input headers entirely.
///
/// Identifier fields are plain `String`s. GTFS places no shape constraint on
/// IDs, and the merge engine treats them as opaque keys; only times, dates,
/// and coordinates get dedicated types.
use serde::{Deserialize, Serialize};

use crate::newtypes::{FeedTime, ServiceDate};
use crate::serde_helpers::{ser_coord, ser_coord_opt};

// ---------------------------------------------------------------------------
// agency.txt
// ---------------------------------------------------------------------------

/// One row of `agency.txt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agency {
    /// Primary key. Optional in GTFS when the feed has a single agency; the
    /// reader substitutes the agency name as the key in that case.
    #[serde(default)]
    pub agency_id: Option<String>,
    pub agency_name: String,
    pub agency_url: String,
    pub agency_timezone: String,
    #[serde(default)]
    pub agency_lang: Option<String>,
    #[serde(default)]
    pub agency_phone: Option<String>,
    #[serde(default)]
    pub agency_fare_url: Option<String>,
    #[serde(default)]
    pub agency_email: Option<String>,
}

// ---------------------------------------------------------------------------
// levels.txt
// ---------------------------------------------------------------------------

/// One row of `levels.txt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub level_id: String,
    pub level_index: f64,
    #[serde(default)]
    pub level_name: Option<String>,
}

// ---------------------------------------------------------------------------
// areas.txt
// ---------------------------------------------------------------------------

/// One row of `areas.txt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub area_id: String,
    #[serde(default)]
    pub area_name: Option<String>,
}

// ---------------------------------------------------------------------------
// stops.txt
// ---------------------------------------------------------------------------

/// One row of `stops.txt`.
///
/// `parent_station` is the one self-referential foreign key in the data
/// model; the stop strategy resolves it in a fix-up sub-pass after all stops
/// of a feed have been placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub stop_id: String,
    #[serde(default)]
    pub stop_code: Option<String>,
    #[serde(default)]
    pub stop_name: Option<String>,
    #[serde(default)]
    pub stop_desc: Option<String>,
    #[serde(default, serialize_with = "ser_coord_opt")]
    pub stop_lat: Option<f64>,
    #[serde(default, serialize_with = "ser_coord_opt")]
    pub stop_lon: Option<f64>,
    /// Fare zone label. Zones are a namespace, not a keyed collection; the
    /// merge never renames them.
    #[serde(default)]
    pub zone_id: Option<String>,
    #[serde(default)]
    pub stop_url: Option<String>,
    #[serde(default)]
    pub location_type: Option<u8>,
    #[serde(default)]
    pub parent_station: Option<String>,
    #[serde(default)]
    pub stop_timezone: Option<String>,
    #[serde(default)]
    pub wheelchair_boarding: Option<u8>,
    #[serde(default)]
    pub level_id: Option<String>,
    #[serde(default)]
    pub platform_code: Option<String>,
}

// ---------------------------------------------------------------------------
// routes.txt
// ---------------------------------------------------------------------------

/// One row of `routes.txt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub route_id: String,
    #[serde(default)]
    pub agency_id: Option<String>,
    #[serde(default)]
    pub route_short_name: Option<String>,
    #[serde(default)]
    pub route_long_name: Option<String>,
    #[serde(default)]
    pub route_desc: Option<String>,
    pub route_type: u32,
    #[serde(default)]
    pub route_url: Option<String>,
    #[serde(default)]
    pub route_color: Option<String>,
    #[serde(default)]
    pub route_text_color: Option<String>,
    #[serde(default)]
    pub route_sort_order: Option<u32>,
}

// ---------------------------------------------------------------------------
// trips.txt
// ---------------------------------------------------------------------------

/// One row of `trips.txt`.
///
/// `block_id` references the block namespace, which (like zones) is not a
/// keyed collection; block references flow through the rewrite machinery but
/// no strategy ever records a block rename.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub route_id: String,
    pub service_id: String,
    pub trip_id: String,
    #[serde(default)]
    pub trip_headsign: Option<String>,
    #[serde(default)]
    pub trip_short_name: Option<String>,
    #[serde(default)]
    pub direction_id: Option<u8>,
    #[serde(default)]
    pub block_id: Option<String>,
    #[serde(default)]
    pub shape_id: Option<String>,
    #[serde(default)]
    pub wheelchair_accessible: Option<u8>,
    #[serde(default)]
    pub bikes_allowed: Option<u8>,
}

// ---------------------------------------------------------------------------
// stop_times.txt
// ---------------------------------------------------------------------------

/// One row of `stop_times.txt`.
///
/// Arrival and departure are optional: GTFS permits blank times on
/// non-timepoint rows. The trip-schedule scorer skips blanks when computing
/// the span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopTime {
    pub trip_id: String,
    #[serde(default)]
    pub arrival_time: Option<FeedTime>,
    #[serde(default)]
    pub departure_time: Option<FeedTime>,
    pub stop_id: String,
    pub stop_sequence: u32,
    #[serde(default)]
    pub stop_headsign: Option<String>,
    #[serde(default)]
    pub pickup_type: Option<u8>,
    #[serde(default)]
    pub drop_off_type: Option<u8>,
    #[serde(default)]
    pub shape_dist_traveled: Option<f64>,
    #[serde(default)]
    pub timepoint: Option<u8>,
}

// ---------------------------------------------------------------------------
// calendar.txt
// ---------------------------------------------------------------------------

/// One row of `calendar.txt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calendar {
    pub service_id: String,
    pub monday: u8,
    pub tuesday: u8,
    pub wednesday: u8,
    pub thursday: u8,
    pub friday: u8,
    pub saturday: u8,
    pub sunday: u8,
    pub start_date: ServiceDate,
    pub end_date: ServiceDate,
}

impl Calendar {
    /// Returns the seven weekday flags as a `"1010100"`-style bitmap string,
    /// Monday first. Used by the fuzzy calendar scorer as a single projection.
    pub fn weekday_bitmap(&self) -> String {
        format!(
            "{}{}{}{}{}{}{}",
            self.monday,
            self.tuesday,
            self.wednesday,
            self.thursday,
            self.friday,
            self.saturday,
            self.sunday
        )
    }
}

// ---------------------------------------------------------------------------
// calendar_dates.txt
// ---------------------------------------------------------------------------

/// One row of `calendar_dates.txt`, keyed by `(service_id, date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarDate {
    pub service_id: String,
    pub date: ServiceDate,
    pub exception_type: u8,
}

// ---------------------------------------------------------------------------
// shapes.txt
// ---------------------------------------------------------------------------

/// One row of `shapes.txt`. A shape is the ordered set of points sharing a
/// `shape_id`; the merge treats the whole set as one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapePoint {
    pub shape_id: String,
    #[serde(serialize_with = "ser_coord")]
    pub shape_pt_lat: f64,
    #[serde(serialize_with = "ser_coord")]
    pub shape_pt_lon: f64,
    pub shape_pt_sequence: u32,
    #[serde(default)]
    pub shape_dist_traveled: Option<f64>,
}

// ---------------------------------------------------------------------------
// frequencies.txt
// ---------------------------------------------------------------------------

/// One row of `frequencies.txt`, keyed by `(trip_id, start_time)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frequency {
    pub trip_id: String,
    pub start_time: FeedTime,
    pub end_time: FeedTime,
    pub headway_secs: u32,
    #[serde(default)]
    pub exact_times: Option<u8>,
}

// ---------------------------------------------------------------------------
// transfers.txt
// ---------------------------------------------------------------------------

/// One row of `transfers.txt`.
///
/// The route and trip columns are the GTFS-Fares extension; they are carried
/// so their references follow renames like any other foreign key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub from_stop_id: String,
    pub to_stop_id: String,
    pub transfer_type: u8,
    #[serde(default)]
    pub min_transfer_time: Option<u32>,
    #[serde(default)]
    pub from_route_id: Option<String>,
    #[serde(default)]
    pub to_route_id: Option<String>,
    #[serde(default)]
    pub from_trip_id: Option<String>,
    #[serde(default)]
    pub to_trip_id: Option<String>,
}

// ---------------------------------------------------------------------------
// pathways.txt
// ---------------------------------------------------------------------------

/// One row of `pathways.txt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pathway {
    pub pathway_id: String,
    pub from_stop_id: String,
    pub to_stop_id: String,
    pub pathway_mode: u8,
    pub is_bidirectional: u8,
    #[serde(default)]
    pub length: Option<f64>,
    #[serde(default)]
    pub traversal_time: Option<u32>,
    #[serde(default)]
    pub stair_count: Option<i32>,
    #[serde(default)]
    pub max_slope: Option<f64>,
    #[serde(default)]
    pub min_width: Option<f64>,
    #[serde(default)]
    pub signposted_as: Option<String>,
    #[serde(default)]
    pub reversed_signposted_as: Option<String>,
}

// ---------------------------------------------------------------------------
// fare_attributes.txt
// ---------------------------------------------------------------------------

/// One row of `fare_attributes.txt`.
///
/// `price` stays a string: fares are decimal currency amounts and must
/// round-trip without float formatting drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FareAttribute {
    pub fare_id: String,
    pub price: String,
    pub currency_type: String,
    pub payment_method: u8,
    #[serde(default)]
    pub transfers: Option<u8>,
    #[serde(default)]
    pub agency_id: Option<String>,
    #[serde(default)]
    pub transfer_duration: Option<u32>,
}

// ---------------------------------------------------------------------------
// fare_rules.txt
// ---------------------------------------------------------------------------

/// One row of `fare_rules.txt`.
///
/// `origin_id`, `destination_id`, and `contains_id` reference the zone
/// namespace; they pass through the rewrite machinery unchanged because
/// zones are never renamed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FareRule {
    pub fare_id: String,
    #[serde(default)]
    pub route_id: Option<String>,
    #[serde(default)]
    pub origin_id: Option<String>,
    #[serde(default)]
    pub destination_id: Option<String>,
    #[serde(default)]
    pub contains_id: Option<String>,
}

// ---------------------------------------------------------------------------
// feed_info.txt
// ---------------------------------------------------------------------------

/// One row of `feed_info.txt`. The file has no primary key; rows are carried
/// as a sequence and deduplicated only by full-row equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedInfo {
    pub feed_publisher_name: String,
    pub feed_publisher_url: String,
    pub feed_lang: String,
    #[serde(default)]
    pub default_lang: Option<String>,
    #[serde(default)]
    pub feed_start_date: Option<ServiceDate>,
    #[serde(default)]
    pub feed_end_date: Option<ServiceDate>,
    #[serde(default)]
    pub feed_version: Option<String>,
    #[serde(default)]
    pub feed_contact_email: Option<String>,
    #[serde(default)]
    pub feed_contact_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
