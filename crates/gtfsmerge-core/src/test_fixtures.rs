//! Shared test helper functions for constructing feed fixtures.
//!
//! Compiled only in test builds; provides common constructors for the entity
//! types used across unit test modules throughout `gtfsmerge-core`.
#![allow(clippy::expect_used)]

use crate::feed::Feed;
use crate::model::{
    Agency, Calendar, CalendarDate, FareAttribute, Frequency, Route, ShapePoint, Stop, StopTime,
    Transfer, Trip,
};
use crate::newtypes::{FeedTime, ServiceDate};

/// Parses a `HH:MM:SS` string, panicking on invalid input (test-only).
pub fn time(s: &str) -> FeedTime {
    FeedTime::try_from(s).expect("valid FeedTime")
}

/// Parses a `YYYYMMDD` string, panicking on invalid input (test-only).
pub fn date(s: &str) -> ServiceDate {
    ServiceDate::try_from(s).expect("valid ServiceDate")
}

/// An agency with the given id; name, url, and timezone are derived from it.
pub fn agency(id: &str) -> Agency {
    Agency {
        agency_id: Some(id.to_owned()),
        agency_name: format!("{id} Transit"),
        agency_url: format!("https://{}.example", id.to_lowercase()),
        agency_timezone: "America/Los_Angeles".to_owned(),
        agency_lang: None,
        agency_phone: None,
        agency_fare_url: None,
        agency_email: None,
    }
}

/// A stop at the given coordinates, named after its id.
pub fn stop(id: &str, lat: f64, lon: f64) -> Stop {
    Stop {
        stop_id: id.to_owned(),
        stop_code: None,
        stop_name: Some(format!("{id} Station")),
        stop_desc: None,
        stop_lat: Some(lat),
        stop_lon: Some(lon),
        zone_id: None,
        stop_url: None,
        location_type: None,
        parent_station: None,
        stop_timezone: None,
        wheelchair_boarding: None,
        level_id: None,
        platform_code: None,
    }
}

/// A bus route owned by `agency_id`.
pub fn route(id: &str, agency_id: &str) -> Route {
    Route {
        route_id: id.to_owned(),
        agency_id: Some(agency_id.to_owned()),
        route_short_name: Some(id.to_owned()),
        route_long_name: Some(format!("{id} Line")),
        route_desc: None,
        route_type: 3,
        route_url: None,
        route_color: None,
        route_text_color: None,
        route_sort_order: None,
    }
}

/// A trip on `route_id` running under `service_id`.
pub fn trip(id: &str, route_id: &str, service_id: &str) -> Trip {
    Trip {
        route_id: route_id.to_owned(),
        service_id: service_id.to_owned(),
        trip_id: id.to_owned(),
        trip_headsign: None,
        trip_short_name: None,
        direction_id: None,
        block_id: None,
        shape_id: None,
        wheelchair_accessible: None,
        bikes_allowed: None,
    }
}

/// A weekday calendar spanning `[start, end]`.
pub fn calendar(service_id: &str, start: &str, end: &str) -> Calendar {
    Calendar {
        service_id: service_id.to_owned(),
        monday: 1,
        tuesday: 1,
        wednesday: 1,
        thursday: 1,
        friday: 1,
        saturday: 0,
        sunday: 0,
        start_date: date(start),
        end_date: date(end),
    }
}

/// One calendar exception row.
pub fn calendar_date(service_id: &str, on: &str, exception_type: u8) -> CalendarDate {
    CalendarDate {
        service_id: service_id.to_owned(),
        date: date(on),
        exception_type,
    }
}

/// A stop-time row arriving and departing at `at`.
pub fn stop_time(trip_id: &str, stop_id: &str, sequence: u32, at: &str) -> StopTime {
    StopTime {
        trip_id: trip_id.to_owned(),
        arrival_time: Some(time(at)),
        departure_time: Some(time(at)),
        stop_id: stop_id.to_owned(),
        stop_sequence: sequence,
        stop_headsign: None,
        pickup_type: None,
        drop_off_type: None,
        shape_dist_traveled: None,
        timepoint: None,
    }
}

/// One shape point.
pub fn shape_point(shape_id: &str, lat: f64, lon: f64, sequence: u32) -> ShapePoint {
    ShapePoint {
        shape_id: shape_id.to_owned(),
        shape_pt_lat: lat,
        shape_pt_lon: lon,
        shape_pt_sequence: sequence,
        shape_dist_traveled: None,
    }
}

/// A frequency row for `trip_id`.
pub fn frequency(trip_id: &str, start: &str, end: &str, headway_secs: u32) -> Frequency {
    Frequency {
        trip_id: trip_id.to_owned(),
        start_time: time(start),
        end_time: time(end),
        headway_secs,
        exact_times: None,
    }
}

/// A plain transfer row between two stops.
pub fn transfer(from: &str, to: &str) -> Transfer {
    Transfer {
        from_stop_id: from.to_owned(),
        to_stop_id: to.to_owned(),
        transfer_type: 0,
        min_transfer_time: None,
        from_route_id: None,
        to_route_id: None,
        from_trip_id: None,
        to_trip_id: None,
    }
}

/// A flat-price fare.
pub fn fare_attribute(id: &str, price: &str) -> FareAttribute {
    FareAttribute {
        fare_id: id.to_owned(),
        price: price.to_owned(),
        currency_type: "USD".to_owned(),
        payment_method: 0,
        transfers: None,
        agency_id: None,
        transfer_duration: None,
    }
}

/// A minimal closed feed: one agency `A1`, stops `S1`/`S2`, route `R1`,
/// weekday service `WK`, and trip `T1` running `S1 08:00 → S2 09:00`.
pub fn minimal_feed() -> Feed {
    let mut feed = Feed::new();
    feed.agencies.insert("A1".to_owned(), agency("A1"));
    feed.stops
        .insert("S1".to_owned(), stop("S1", 47.6062, -122.3321));
    feed.stops
        .insert("S2".to_owned(), stop("S2", 47.6205, -122.3493));
    feed.routes.insert("R1".to_owned(), route("R1", "A1"));
    feed.calendars
        .insert("WK".to_owned(), calendar("WK", "20260101", "20261231"));
    feed.trips.insert("T1".to_owned(), trip("T1", "R1", "WK"));
    feed.stop_times.push(stop_time("T1", "S1", 1, "08:00:00"));
    feed.stop_times.push(stop_time("T1", "S2", 2, "09:00:00"));
    feed
}
