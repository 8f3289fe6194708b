/// The in-memory feed: every collection of a single GTFS dataset.
///
/// All keyed collections are [`IndexMap`]s so that iteration order is the
/// insertion order established by the reader (the order rows appeared in the
/// source CSV). The merge engine depends on this for determinism: strategies
/// visit entities in source order, and the writer emits them in target order.
use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;

use crate::model::{
    Agency, Area, Calendar, CalendarDate, FareAttribute, FareRule, FeedInfo, Frequency, Level,
    Pathway, Route, ShapePoint, Stop, StopTime, Transfer, Trip,
};

// ---------------------------------------------------------------------------
// ReferentialError
// ---------------------------------------------------------------------------

/// A foreign key in one collection that does not resolve within the feed.
///
/// Raised by [`Feed::check_references`]; the first offender found is
/// reported and the check stops there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferentialError {
    /// The file whose row carries the dangling reference.
    pub file: &'static str,
    /// The primary key (or best available label) of the offending row.
    pub entity: String,
    /// The name of the reference field.
    pub field: &'static str,
    /// The identifier that failed to resolve.
    pub reference: String,
}

impl fmt::Display for ReferentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: entity {:?} field {} references unknown id {:?}",
            self.file, self.entity, self.field, self.reference
        )
    }
}

impl std::error::Error for ReferentialError {}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

/// A complete GTFS dataset held in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Feed {
    /// Agencies by `agency_id` (or agency name when the feed omits the id).
    pub agencies: IndexMap<String, Agency>,
    /// Levels by `level_id`.
    pub levels: IndexMap<String, Level>,
    /// Areas by `area_id`.
    pub areas: IndexMap<String, Area>,
    /// Stops by `stop_id`.
    pub stops: IndexMap<String, Stop>,
    /// Routes by `route_id`.
    pub routes: IndexMap<String, Route>,
    /// Trips by `trip_id`.
    pub trips: IndexMap<String, Trip>,
    /// Calendars by `service_id`. A service may also exist solely through
    /// `calendar_dates`; use [`Feed::service_ids`] for the full namespace.
    pub calendars: IndexMap<String, Calendar>,
    /// Calendar exception rows in source order.
    pub calendar_dates: Vec<CalendarDate>,
    /// Shapes by `shape_id`; the point rows of one shape, in source order.
    pub shapes: IndexMap<String, Vec<ShapePoint>>,
    /// Stop-time rows in source order.
    pub stop_times: Vec<StopTime>,
    /// Frequency rows in source order.
    pub frequencies: Vec<Frequency>,
    /// Transfer rows in source order.
    pub transfers: Vec<Transfer>,
    /// Pathways by `pathway_id`.
    pub pathways: IndexMap<String, Pathway>,
    /// Fare attributes by `fare_id`.
    pub fare_attributes: IndexMap<String, FareAttribute>,
    /// Fare rule rows in source order.
    pub fare_rules: Vec<FareRule>,
    /// Feed-info rows in source order.
    pub feed_infos: Vec<FeedInfo>,
}

impl Feed {
    /// Creates an empty feed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the full service-ID namespace in deterministic order:
    /// calendar keys first (insertion order), then IDs that appear only in
    /// `calendar_dates` (first-appearance order).
    pub fn service_ids(&self) -> Vec<String> {
        let mut seen: HashSet<&str> = self.calendars.keys().map(String::as_str).collect();
        let mut ids: Vec<String> = self.calendars.keys().cloned().collect();
        for cd in &self.calendar_dates {
            if seen.insert(&cd.service_id) {
                ids.push(cd.service_id.clone());
            }
        }
        ids
    }

    /// Returns `true` when `id` names a service in this feed, whether backed
    /// by a calendar row, calendar-date rows, or both.
    pub fn has_service(&self, id: &str) -> bool {
        self.calendars.contains_key(id)
            || self.calendar_dates.iter().any(|cd| cd.service_id == id)
    }

    /// The distinct stop IDs visited by one trip, in no particular order.
    pub fn trip_stop_ids(&self, trip_id: &str) -> HashSet<&str> {
        self.stop_times
            .iter()
            .filter(|st| st.trip_id == trip_id)
            .map(|st| st.stop_id.as_str())
            .collect()
    }

    /// The distinct stop IDs reachable from one route through its trips'
    /// stop-times.
    pub fn route_stop_ids(&self, route_id: &str) -> HashSet<&str> {
        let trip_ids: HashSet<&str> = self
            .trips
            .values()
            .filter(|t| t.route_id == route_id)
            .map(|t| t.trip_id.as_str())
            .collect();
        self.stop_times
            .iter()
            .filter(|st| trip_ids.contains(st.trip_id.as_str()))
            .map(|st| st.stop_id.as_str())
            .collect()
    }

    /// The `[first departure, last arrival]` span of a trip in seconds since
    /// midnight, or `None` when the trip has no timed stop-times.
    ///
    /// Blank arrival/departure cells fall back to the row's other time; rows
    /// with neither are skipped.
    pub fn trip_time_span(&self, trip_id: &str) -> Option<(u32, u32)> {
        let mut first_departure: Option<(u32, u32)> = None; // (sequence, secs)
        let mut last_arrival: Option<(u32, u32)> = None;
        for st in self.stop_times.iter().filter(|st| st.trip_id == trip_id) {
            let departure = st.departure_time.or(st.arrival_time);
            let arrival = st.arrival_time.or(st.departure_time);
            if let Some(dep) = departure {
                match first_departure {
                    Some((seq, _)) if st.stop_sequence >= seq => {}
                    Some(_) | None => first_departure = Some((st.stop_sequence, dep.seconds())),
                }
            }
            if let Some(arr) = arrival {
                match last_arrival {
                    Some((seq, _)) if st.stop_sequence <= seq => {}
                    Some(_) | None => last_arrival = Some((st.stop_sequence, arr.seconds())),
                }
            }
        }
        match (first_departure, last_arrival) {
            (Some((_, dep)), Some((_, arr))) => Some((dep, arr)),
            (Some(_), None) | (None, Some(_)) | (None, None) => None,
        }
    }

    /// Returns `true` when any identifier in any namespace of this feed
    /// starts with `prefix`. Used to reject prefix candidates that could
    /// manufacture a collision.
    pub fn any_id_starts_with(&self, prefix: &str) -> bool {
        self.agencies.keys().any(|id| id.starts_with(prefix))
            || self.levels.keys().any(|id| id.starts_with(prefix))
            || self.areas.keys().any(|id| id.starts_with(prefix))
            || self.stops.keys().any(|id| id.starts_with(prefix))
            || self.routes.keys().any(|id| id.starts_with(prefix))
            || self.trips.keys().any(|id| id.starts_with(prefix))
            || self.shapes.keys().any(|id| id.starts_with(prefix))
            || self.pathways.keys().any(|id| id.starts_with(prefix))
            || self.fare_attributes.keys().any(|id| id.starts_with(prefix))
            || self.calendars.keys().any(|id| id.starts_with(prefix))
            || self
                .calendar_dates
                .iter()
                .any(|cd| cd.service_id.starts_with(prefix))
    }

    /// Verifies that every foreign key in this feed resolves within it.
    ///
    /// Blank optional references are fine; zone and block references are a
    /// namespace, not a collection, and are not checked.
    ///
    /// # Errors
    ///
    /// Returns the first dangling reference found, with its file, row, and
    /// field named.
    pub fn check_references(&self) -> Result<(), ReferentialError> {
        let dangling = |file, entity: &str, field, reference: &str| ReferentialError {
            file,
            entity: entity.to_owned(),
            field,
            reference: reference.to_owned(),
        };

        for (id, stop) in &self.stops {
            if let Some(parent) = non_blank(stop.parent_station.as_deref()) {
                if !self.stops.contains_key(parent) {
                    return Err(dangling("stops.txt", id, "parent_station", parent));
                }
            }
            if let Some(level) = non_blank(stop.level_id.as_deref()) {
                if !self.levels.contains_key(level) {
                    return Err(dangling("stops.txt", id, "level_id", level));
                }
            }
        }

        for (id, route) in &self.routes {
            if let Some(agency) = non_blank(route.agency_id.as_deref()) {
                if !self.agencies.contains_key(agency) {
                    return Err(dangling("routes.txt", id, "agency_id", agency));
                }
            }
        }

        for (id, trip) in &self.trips {
            if !self.routes.contains_key(&trip.route_id) {
                return Err(dangling("trips.txt", id, "route_id", &trip.route_id));
            }
            if !self.has_service(&trip.service_id) {
                return Err(dangling("trips.txt", id, "service_id", &trip.service_id));
            }
            if let Some(shape) = non_blank(trip.shape_id.as_deref()) {
                if !self.shapes.contains_key(shape) {
                    return Err(dangling("trips.txt", id, "shape_id", shape));
                }
            }
        }

        for st in &self.stop_times {
            if !self.trips.contains_key(&st.trip_id) {
                return Err(dangling("stop_times.txt", &st.trip_id, "trip_id", &st.trip_id));
            }
            if !self.stops.contains_key(&st.stop_id) {
                return Err(dangling("stop_times.txt", &st.trip_id, "stop_id", &st.stop_id));
            }
        }

        for freq in &self.frequencies {
            if !self.trips.contains_key(&freq.trip_id) {
                return Err(dangling(
                    "frequencies.txt",
                    &freq.trip_id,
                    "trip_id",
                    &freq.trip_id,
                ));
            }
        }

        for transfer in &self.transfers {
            let label = format!("{}->{}", transfer.from_stop_id, transfer.to_stop_id);
            if !self.stops.contains_key(&transfer.from_stop_id) {
                return Err(dangling(
                    "transfers.txt",
                    &label,
                    "from_stop_id",
                    &transfer.from_stop_id,
                ));
            }
            if !self.stops.contains_key(&transfer.to_stop_id) {
                return Err(dangling(
                    "transfers.txt",
                    &label,
                    "to_stop_id",
                    &transfer.to_stop_id,
                ));
            }
            if let Some(route) = non_blank(transfer.from_route_id.as_deref()) {
                if !self.routes.contains_key(route) {
                    return Err(dangling("transfers.txt", &label, "from_route_id", route));
                }
            }
            if let Some(route) = non_blank(transfer.to_route_id.as_deref()) {
                if !self.routes.contains_key(route) {
                    return Err(dangling("transfers.txt", &label, "to_route_id", route));
                }
            }
            if let Some(trip) = non_blank(transfer.from_trip_id.as_deref()) {
                if !self.trips.contains_key(trip) {
                    return Err(dangling("transfers.txt", &label, "from_trip_id", trip));
                }
            }
            if let Some(trip) = non_blank(transfer.to_trip_id.as_deref()) {
                if !self.trips.contains_key(trip) {
                    return Err(dangling("transfers.txt", &label, "to_trip_id", trip));
                }
            }
        }

        for (id, pathway) in &self.pathways {
            if !self.stops.contains_key(&pathway.from_stop_id) {
                return Err(dangling(
                    "pathways.txt",
                    id,
                    "from_stop_id",
                    &pathway.from_stop_id,
                ));
            }
            if !self.stops.contains_key(&pathway.to_stop_id) {
                return Err(dangling(
                    "pathways.txt",
                    id,
                    "to_stop_id",
                    &pathway.to_stop_id,
                ));
            }
        }

        for (id, fare) in &self.fare_attributes {
            if let Some(agency) = non_blank(fare.agency_id.as_deref()) {
                if !self.agencies.contains_key(agency) {
                    return Err(dangling("fare_attributes.txt", id, "agency_id", agency));
                }
            }
        }

        for rule in &self.fare_rules {
            if !self.fare_attributes.contains_key(&rule.fare_id) {
                return Err(dangling(
                    "fare_rules.txt",
                    &rule.fare_id,
                    "fare_id",
                    &rule.fare_id,
                ));
            }
            if let Some(route) = non_blank(rule.route_id.as_deref()) {
                if !self.routes.contains_key(route) {
                    return Err(dangling("fare_rules.txt", &rule.fare_id, "route_id", route));
                }
            }
        }

        Ok(())
    }
}

/// Treats `None` and the empty string uniformly as "no reference".
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    match value {
        Some("") | None => None,
        Some(v) => Some(v),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
