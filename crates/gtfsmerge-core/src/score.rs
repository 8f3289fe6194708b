/// Similarity scorers used by fuzzy duplicate detection.
///
/// Every scorer returns a value in `[0, 1]` and is deterministic and
/// side-effect-free. Strategies compose the per-type leaf scorers with
/// [`And`] (product with zero short-circuit) and compare the combined score
/// against the strategy's threshold.
///
/// Scorers compare entities *as their own feeds describe them*: stop sets
/// and schedule spans are gathered from each feed's raw identifiers, before
/// any rename is applied. Two trips over stops `X1, X2` in different feeds
/// therefore overlap fully even when the merge later renames one feed's
/// stops.
use std::collections::HashSet;
use std::hash::Hash;

use crate::feed::Feed;
use crate::model::{Agency, Calendar, FareAttribute, Route, Stop, Trip};

/// Mean radius of the Earth in kilometres, for [`haversine_km`].
const EARTH_RADIUS_KM: f64 = 6371.0;

// ---------------------------------------------------------------------------
// Similarity
// ---------------------------------------------------------------------------

/// A similarity function over two entities of the same type.
///
/// `a` comes from the source feed and `b` from the target feed; scorers that
/// need surrounding context (stop-times, calendars) read it from the
/// matching feed argument.
pub trait Similarity<T> {
    /// Returns a similarity in `[0, 1]`; `1` means indistinguishable.
    fn score(&self, source: &Feed, a: &T, target: &Feed, b: &T) -> f64;
}

// ---------------------------------------------------------------------------
// PropertyMatch
// ---------------------------------------------------------------------------

/// Scores by the fraction of string projections on which two entities agree.
///
/// An empty projection list scores `1`.
pub struct PropertyMatch<T> {
    projections: Vec<fn(&T) -> String>,
}

impl<T> PropertyMatch<T> {
    /// Builds a matcher over the given projections.
    pub fn new(projections: Vec<fn(&T) -> String>) -> Self {
        Self { projections }
    }
}

impl<T> Similarity<T> for PropertyMatch<T> {
    fn score(&self, _source: &Feed, a: &T, _target: &Feed, b: &T) -> f64 {
        if self.projections.is_empty() {
            return 1.0;
        }
        let matching = self
            .projections
            .iter()
            .filter(|projection| projection(a) == projection(b))
            .count();
        matching as f64 / self.projections.len() as f64
    }
}

// ---------------------------------------------------------------------------
// And
// ---------------------------------------------------------------------------

/// Product combinator: the score is the product of all child scores, with a
/// short-circuit return of `0` on the first zero child. An empty child list
/// scores `1`.
pub struct And<T> {
    children: Vec<Box<dyn Similarity<T>>>,
}

impl<T> And<T> {
    /// Builds the combinator over the given children.
    pub fn new(children: Vec<Box<dyn Similarity<T>>>) -> Self {
        Self { children }
    }
}

impl<T> Similarity<T> for And<T> {
    fn score(&self, source: &Feed, a: &T, target: &Feed, b: &T) -> f64 {
        let mut product = 1.0;
        for child in &self.children {
            let score = child.score(source, a, target, b);
            if score == 0.0 {
                return 0.0;
            }
            product *= score;
        }
        product
    }
}

// ---------------------------------------------------------------------------
// Leaf functions
// ---------------------------------------------------------------------------

/// Symmetric set-overlap score.
///
/// With `c = |a ∩ b|`, returns `(c/|a| + c/|b|) / 2`, or `0` when either set
/// is empty.
pub fn element_overlap<T: Eq + Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let common = a.intersection(b).count() as f64;
    (common / a.len() as f64 + common / b.len() as f64) / 2.0
}

/// Symmetric interval-overlap score over `[s1, e1]` and `[s2, e2]`.
///
/// With `o` the overlap length, returns `(o/len1 + o/len2) / 2`; an empty or
/// inverted interval on either side scores `0`.
pub fn interval_overlap(s1: f64, e1: f64, s2: f64, e2: f64) -> f64 {
    let len1 = e1 - s1;
    let len2 = e2 - s2;
    if len1 <= 0.0 || len2 <= 0.0 {
        return 0.0;
    }
    let overlap = (e1.min(e2) - s1.max(s2)).max(0.0);
    (overlap / len1 + overlap / len2) / 2.0
}

/// Great-circle distance between two coordinates in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

// ---------------------------------------------------------------------------
// Per-type scorers
// ---------------------------------------------------------------------------

/// Tiered proximity score over the great-circle distance between two stops.
///
/// Under 50 m scores `1.0`, under 100 m `0.75`, under 500 m `0.5`, else `0`.
/// A stop without coordinates scores `0` against everything.
pub struct StopDistance;

impl Similarity<Stop> for StopDistance {
    fn score(&self, _source: &Feed, a: &Stop, _target: &Feed, b: &Stop) -> f64 {
        let (Some(lat1), Some(lon1), Some(lat2), Some(lon2)) =
            (a.stop_lat, a.stop_lon, b.stop_lat, b.stop_lon)
        else {
            return 0.0;
        };
        let d_km = haversine_km(lat1, lon1, lat2, lon2);
        if d_km < 0.05 {
            1.0
        } else if d_km < 0.1 {
            0.75
        } else if d_km < 0.5 {
            0.5
        } else {
            0.0
        }
    }
}

/// [`element_overlap`] over the distinct stops reachable from each route
/// through its trips' stop-times.
pub struct RouteStopsOverlap;

impl Similarity<Route> for RouteStopsOverlap {
    fn score(&self, source: &Feed, a: &Route, target: &Feed, b: &Route) -> f64 {
        let stops_a: HashSet<&str> = source.route_stop_ids(&a.route_id);
        let stops_b: HashSet<&str> = target.route_stop_ids(&b.route_id);
        element_overlap(&stops_a, &stops_b)
    }
}

/// [`element_overlap`] over the distinct stops each trip visits.
pub struct TripStopsOverlap;

impl Similarity<Trip> for TripStopsOverlap {
    fn score(&self, source: &Feed, a: &Trip, target: &Feed, b: &Trip) -> f64 {
        let stops_a = source.trip_stop_ids(&a.trip_id);
        let stops_b = target.trip_stop_ids(&b.trip_id);
        element_overlap(&stops_a, &stops_b)
    }
}

/// [`interval_overlap`] of the `[first departure, last arrival]` spans of
/// two trips, in seconds since midnight.
///
/// Times past 86400 are compared as-is; overnight trips are not wrapped. A
/// trip with no timed stop-times scores `0`.
pub struct TripScheduleOverlap;

impl Similarity<Trip> for TripScheduleOverlap {
    fn score(&self, source: &Feed, a: &Trip, target: &Feed, b: &Trip) -> f64 {
        let (Some((dep_a, arr_a)), Some((dep_b, arr_b))) = (
            source.trip_time_span(&a.trip_id),
            target.trip_time_span(&b.trip_id),
        ) else {
            return 0.0;
        };
        interval_overlap(
            f64::from(dep_a),
            f64::from(arr_a),
            f64::from(dep_b),
            f64::from(arr_b),
        )
    }
}

/// Date-range overlap of the services two trips run under.
///
/// Each side's range is its calendar's `[start, end + 1 day)`, or the
/// min/max of its added (`exception_type` 1) calendar dates when the service
/// has no calendar row. A side with no date information at all abstains with
/// `1.0` rather than vetoing the conjunction.
pub struct TripServiceOverlap;

impl Similarity<Trip> for TripServiceOverlap {
    fn score(&self, source: &Feed, a: &Trip, target: &Feed, b: &Trip) -> f64 {
        let range_a = service_date_range(source, &a.service_id);
        let range_b = service_date_range(target, &b.service_id);
        match (range_a, range_b) {
            (Some((s1, e1)), Some((s2, e2))) => {
                interval_overlap(s1 as f64, e1 as f64, s2 as f64, e2 as f64)
            }
            (Some(_), None) | (None, Some(_)) | (None, None) => 1.0,
        }
    }
}

/// [`interval_overlap`] of two calendars' date ranges, end dates made
/// inclusive by extending them one day.
pub struct ServiceDateOverlap;

impl Similarity<Calendar> for ServiceDateOverlap {
    fn score(&self, _source: &Feed, a: &Calendar, _target: &Feed, b: &Calendar) -> f64 {
        interval_overlap(
            a.start_date.day_number() as f64,
            a.end_date.next_day().day_number() as f64,
            b.start_date.day_number() as f64,
            b.end_date.next_day().day_number() as f64,
        )
    }
}

/// The `[start, end + 1 day)` day-number range a service is active over, or
/// `None` when the feed has no date information for it.
fn service_date_range(feed: &Feed, service_id: &str) -> Option<(i64, i64)> {
    if let Some(calendar) = feed.calendars.get(service_id) {
        return Some((
            calendar.start_date.day_number(),
            calendar.end_date.next_day().day_number(),
        ));
    }
    let mut added: Vec<i64> = feed
        .calendar_dates
        .iter()
        .filter(|cd| cd.service_id == service_id && cd.exception_type == 1)
        .map(|cd| cd.date.day_number())
        .collect();
    if added.is_empty() {
        return None;
    }
    added.sort_unstable();
    let first = added[0];
    let last = added[added.len() - 1];
    Some((first, last + 1))
}

// ---------------------------------------------------------------------------
// Prebuilt per-type property matchers
// ---------------------------------------------------------------------------

/// Name, URL, and timezone agreement for agencies.
pub fn agency_properties() -> PropertyMatch<Agency> {
    PropertyMatch::new(vec![
        |a: &Agency| a.agency_name.clone(),
        |a: &Agency| a.agency_url.clone(),
        |a: &Agency| a.agency_timezone.clone(),
    ])
}

/// Name agreement for stops.
pub fn stop_properties() -> PropertyMatch<Stop> {
    PropertyMatch::new(vec![|s: &Stop| s.stop_name.clone().unwrap_or_default()])
}

/// Short name, long name, and route type agreement for routes.
pub fn route_properties() -> PropertyMatch<Route> {
    PropertyMatch::new(vec![
        |r: &Route| r.route_short_name.clone().unwrap_or_default(),
        |r: &Route| r.route_long_name.clone().unwrap_or_default(),
        |r: &Route| r.route_type.to_string(),
    ])
}

/// Weekday-bitmap agreement for calendars.
pub fn calendar_properties() -> PropertyMatch<Calendar> {
    PropertyMatch::new(vec![|c: &Calendar| c.weekday_bitmap()])
}

/// Price, currency, payment method, and transfer-count agreement for fares.
pub fn fare_properties() -> PropertyMatch<FareAttribute> {
    PropertyMatch::new(vec![
        |f: &FareAttribute| f.price.clone(),
        |f: &FareAttribute| f.currency_type.clone(),
        |f: &FareAttribute| f.payment_method.to_string(),
        |f: &FareAttribute| f.transfers.map(|t| t.to_string()).unwrap_or_default(),
    ])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use proptest::prelude::*;

    use super::*;
    use crate::test_fixtures::{calendar, minimal_feed, stop, stop_time, trip};

    // ── element_overlap ──────────────────────────────────────────────────────

    #[test]
    fn element_overlap_identical_sets_is_one() {
        let a: HashSet<&str> = ["x", "y"].into_iter().collect();
        let b: HashSet<&str> = ["x", "y"].into_iter().collect();
        assert_eq!(element_overlap(&a, &b), 1.0);
    }

    #[test]
    fn element_overlap_disjoint_sets_is_zero() {
        let a: HashSet<&str> = ["x"].into_iter().collect();
        let b: HashSet<&str> = ["y"].into_iter().collect();
        assert_eq!(element_overlap(&a, &b), 0.0);
    }

    #[test]
    fn element_overlap_empty_side_is_zero() {
        let a: HashSet<&str> = HashSet::new();
        let b: HashSet<&str> = ["y"].into_iter().collect();
        assert_eq!(element_overlap(&a, &b), 0.0);
        assert_eq!(element_overlap(&b, &a), 0.0);
    }

    #[test]
    fn element_overlap_partial() {
        // a = {x, y}, b = {y, z}: c = 1, (1/2 + 1/2) / 2 = 0.5
        let a: HashSet<&str> = ["x", "y"].into_iter().collect();
        let b: HashSet<&str> = ["y", "z"].into_iter().collect();
        assert_eq!(element_overlap(&a, &b), 0.5);
    }

    // ── interval_overlap ─────────────────────────────────────────────────────

    #[test]
    fn interval_overlap_identical_is_one() {
        assert_eq!(interval_overlap(0.0, 10.0, 0.0, 10.0), 1.0);
    }

    #[test]
    fn interval_overlap_disjoint_is_zero() {
        assert_eq!(interval_overlap(0.0, 10.0, 20.0, 30.0), 0.0);
    }

    #[test]
    fn interval_overlap_degenerate_is_zero() {
        assert_eq!(interval_overlap(5.0, 5.0, 0.0, 10.0), 0.0);
        assert_eq!(interval_overlap(0.0, 10.0, 7.0, 3.0), 0.0);
    }

    #[test]
    fn interval_overlap_half_nested() {
        // [0,10] vs [0,5]: o = 5, (5/10 + 5/5) / 2 = 0.75
        assert_eq!(interval_overlap(0.0, 10.0, 0.0, 5.0), 0.75);
    }

    // ── haversine ────────────────────────────────────────────────────────────

    #[test]
    fn haversine_zero_distance() {
        let d = haversine_km(47.6062, -122.3321, 47.6062, -122.3321);
        assert!(d.abs() < 1e-9, "distance: {d}");
    }

    #[test]
    fn haversine_known_distance() {
        // Seattle to Portland is roughly 233 km.
        let d = haversine_km(47.6062, -122.3321, 45.5152, -122.6784);
        assert!((d - 233.0).abs() < 5.0, "distance: {d}");
    }

    #[test]
    fn haversine_small_offset_is_tens_of_meters() {
        // The scenario pair: ~22 m apart.
        let d = haversine_km(47.6062, -122.3321, 47.6064, -122.3321);
        assert!(d < 0.05, "distance: {d}");
    }

    // ── StopDistance ─────────────────────────────────────────────────────────

    #[test]
    fn stop_distance_tiers() {
        let feed = minimal_feed();
        let base = stop("A", 47.6062, -122.3321);
        let near = stop("B", 47.6064, -122.3321); // ~22 m
        let mid = stop("C", 47.6068, -122.3321); // ~67 m
        let far = stop("D", 47.6090, -122.3321); // ~310 m
        let away = stop("E", 47.7000, -122.3321); // ~10 km

        assert_eq!(StopDistance.score(&feed, &base, &feed, &near), 1.0);
        assert_eq!(StopDistance.score(&feed, &base, &feed, &mid), 0.75);
        assert_eq!(StopDistance.score(&feed, &base, &feed, &far), 0.5);
        assert_eq!(StopDistance.score(&feed, &base, &feed, &away), 0.0);
    }

    #[test]
    fn stop_distance_missing_coordinates_is_zero() {
        let feed = minimal_feed();
        let mut a = stop("A", 47.0, -122.0);
        a.stop_lat = None;
        let b = stop("B", 47.0, -122.0);
        assert_eq!(StopDistance.score(&feed, &a, &feed, &b), 0.0);
    }

    // ── PropertyMatch / And ──────────────────────────────────────────────────

    #[test]
    fn property_match_empty_projections_is_one() {
        let feed = minimal_feed();
        let matcher: PropertyMatch<Stop> = PropertyMatch::new(vec![]);
        let a = stop("A", 0.0, 0.0);
        let b = stop("B", 1.0, 1.0);
        assert_eq!(matcher.score(&feed, &a, &feed, &b), 1.0);
    }

    #[test]
    fn property_match_counts_agreeing_projections() {
        let feed = minimal_feed();
        let mut a = stop("A", 0.0, 0.0);
        let mut b = stop("B", 0.0, 0.0);
        a.stop_name = Some("Main St".to_owned());
        b.stop_name = Some("Main St".to_owned());
        assert_eq!(stop_properties().score(&feed, &a, &feed, &b), 1.0);
        b.stop_name = Some("Other St".to_owned());
        assert_eq!(stop_properties().score(&feed, &a, &feed, &b), 0.0);
    }

    #[test]
    fn and_empty_children_is_one() {
        let feed = minimal_feed();
        let scorer: And<Stop> = And::new(vec![]);
        let a = stop("A", 0.0, 0.0);
        assert_eq!(scorer.score(&feed, &a, &feed, &a), 1.0);
    }

    #[test]
    fn and_multiplies_children() {
        let feed = minimal_feed();
        let mut a = stop("A", 47.6062, -122.3321);
        let mut b = stop("B", 47.6068, -122.3321); // 0.75 tier
        a.stop_name = Some("Same".to_owned());
        b.stop_name = Some("Same".to_owned());
        let scorer = And::new(vec![
            Box::new(stop_properties()) as Box<dyn Similarity<Stop>>,
            Box::new(StopDistance),
        ]);
        assert_eq!(scorer.score(&feed, &a, &feed, &b), 0.75);
    }

    #[test]
    fn and_short_circuits_on_zero() {
        let feed = minimal_feed();
        let a = stop("A", 47.6062, -122.3321);
        let b = stop("B", 48.0, -122.3321); // far: distance scores 0
        let scorer = And::new(vec![
            Box::new(StopDistance) as Box<dyn Similarity<Stop>>,
            Box::new(stop_properties()),
        ]);
        assert_eq!(scorer.score(&feed, &a, &feed, &b), 0.0);
    }

    // ── Trip scorers ─────────────────────────────────────────────────────────

    #[test]
    fn trip_stops_overlap_identical_trips() {
        let feed_a = minimal_feed();
        let mut feed_b = minimal_feed();
        feed_b.trips.insert("T1".to_owned(), trip("T1", "R1", "WK"));
        let a = &feed_a.trips["T1"];
        let b = &feed_b.trips["T1"];
        assert_eq!(TripStopsOverlap.score(&feed_a, a, &feed_b, b), 1.0);
    }

    #[test]
    fn trip_schedule_overlap_identical_spans() {
        let feed_a = minimal_feed();
        let feed_b = minimal_feed();
        let a = &feed_a.trips["T1"];
        let b = &feed_b.trips["T1"];
        assert_eq!(TripScheduleOverlap.score(&feed_a, a, &feed_b, b), 1.0);
    }

    #[test]
    fn trip_schedule_overlap_disjoint_spans() {
        let feed_a = minimal_feed();
        let mut feed_b = minimal_feed();
        feed_b.stop_times.clear();
        feed_b.stop_times.push(stop_time("T1", "S1", 1, "22:00:00"));
        feed_b.stop_times.push(stop_time("T1", "S2", 2, "23:00:00"));
        let a = &feed_a.trips["T1"];
        let b = &feed_b.trips["T1"];
        assert_eq!(TripScheduleOverlap.score(&feed_a, a, &feed_b, b), 0.0);
    }

    #[test]
    fn trip_schedule_overlap_untimed_trip_is_zero() {
        let feed_a = minimal_feed();
        let mut feed_b = minimal_feed();
        for st in &mut feed_b.stop_times {
            st.arrival_time = None;
            st.departure_time = None;
        }
        let a = &feed_a.trips["T1"];
        let b = &feed_b.trips["T1"];
        assert_eq!(TripScheduleOverlap.score(&feed_a, a, &feed_b, b), 0.0);
    }

    #[test]
    fn trip_service_overlap_same_calendar() {
        let feed_a = minimal_feed();
        let feed_b = minimal_feed();
        let a = &feed_a.trips["T1"];
        let b = &feed_b.trips["T1"];
        assert_eq!(TripServiceOverlap.score(&feed_a, a, &feed_b, b), 1.0);
    }

    #[test]
    fn trip_service_overlap_abstains_without_dates() {
        let feed_a = minimal_feed();
        let mut feed_b = minimal_feed();
        feed_b.calendars.clear();
        let a = &feed_a.trips["T1"];
        let b = &feed_b.trips["T1"];
        // Service WK has no calendar and no added dates in feed_b: abstain.
        assert_eq!(TripServiceOverlap.score(&feed_a, a, &feed_b, b), 1.0);
    }

    // ── ServiceDateOverlap ───────────────────────────────────────────────────

    #[test]
    fn service_date_overlap_identical_ranges() {
        let feed = minimal_feed();
        let a = calendar("X", "20260101", "20261231");
        let b = calendar("Y", "20260101", "20261231");
        assert_eq!(ServiceDateOverlap.score(&feed, &a, &feed, &b), 1.0);
    }

    #[test]
    fn service_date_overlap_single_day_ranges() {
        // One-day calendars only work because the end date is made inclusive.
        let feed = minimal_feed();
        let a = calendar("X", "20260601", "20260601");
        let b = calendar("Y", "20260601", "20260601");
        assert_eq!(ServiceDateOverlap.score(&feed, &a, &feed, &b), 1.0);
        let c = calendar("Z", "20260602", "20260602");
        assert_eq!(ServiceDateOverlap.score(&feed, &a, &feed, &c), 0.0);
    }

    // ── Property-based invariants ────────────────────────────────────────────

    proptest! {
        #[test]
        fn interval_overlap_in_bounds(
            s1 in -1e6f64..1e6, e1 in -1e6f64..1e6,
            s2 in -1e6f64..1e6, e2 in -1e6f64..1e6,
        ) {
            let score = interval_overlap(s1, e1, s2, e2);
            prop_assert!((0.0..=1.0).contains(&score), "score {score} out of bounds");
        }

        #[test]
        fn interval_overlap_symmetric(
            s1 in -1e6f64..1e6, e1 in -1e6f64..1e6,
            s2 in -1e6f64..1e6, e2 in -1e6f64..1e6,
        ) {
            let ab = interval_overlap(s1, e1, s2, e2);
            let ba = interval_overlap(s2, e2, s1, e1);
            prop_assert!((ab - ba).abs() < 1e-12);
        }

        #[test]
        fn haversine_symmetric(
            lat1 in -90.0f64..90.0, lon1 in -180.0f64..180.0,
            lat2 in -90.0f64..90.0, lon2 in -180.0f64..180.0,
        ) {
            let ab = haversine_km(lat1, lon1, lat2, lon2);
            let ba = haversine_km(lat2, lon2, lat1, lon1);
            prop_assert!((ab - ba).abs() < 1e-9, "asymmetry: {ab} vs {ba}");
        }

        #[test]
        fn haversine_non_negative(
            lat1 in -90.0f64..90.0, lon1 in -180.0f64..180.0,
            lat2 in -90.0f64..90.0, lon2 in -180.0f64..180.0,
        ) {
            prop_assert!(haversine_km(lat1, lon1, lat2, lon2) >= 0.0);
        }

        #[test]
        fn element_overlap_in_bounds(
            a in proptest::collection::hash_set(0u32..50, 0..20),
            b in proptest::collection::hash_set(0u32..50, 0..20),
        ) {
            let score = element_overlap(&a, &b);
            prop_assert!((0.0..=1.0).contains(&score), "score {score} out of bounds");
        }

        #[test]
        fn element_overlap_symmetric(
            a in proptest::collection::hash_set(0u32..50, 0..20),
            b in proptest::collection::hash_set(0u32..50, 0..20),
        ) {
            prop_assert!((element_overlap(&a, &b) - element_overlap(&b, &a)).abs() < 1e-12);
        }
    }
}
