/// Merge strategy for `trips.txt`.
///
/// Trips sit at the centre of the dependency graph: they reference routes,
/// services, and shapes (all resolved by earlier stages), and they own the
/// stop-time and frequency rows that later stages re-anchor or drop.
///
/// The fuzzy scorer is the conjunction of stop-set overlap, schedule-span
/// overlap, and service-date overlap; all three must agree before two trips
/// fold.
use indexmap::IndexMap;

use crate::context::{EntityType, FieldConflict, MergeContext};
use crate::feed::Feed;
use crate::model::Trip;
use crate::score::{
    And, Similarity, TripScheduleOverlap, TripServiceOverlap, TripStopsOverlap,
};
use crate::strategy::{
    DetectionMode, KeyedMerge, StageSummary, fill_text, fill_value, run_keyed,
};

pub(crate) struct TripMerge;

impl KeyedMerge for TripMerge {
    type Entity = Trip;
    const ENTITY_TYPE: EntityType = EntityType::Trip;
    const FILE: &'static str = "trips.txt";

    fn collection(feed: &Feed) -> &IndexMap<String, Trip> {
        &feed.trips
    }

    fn collection_mut(feed: &mut Feed) -> &mut IndexMap<String, Trip> {
        &mut feed.trips
    }

    fn set_id(entity: &mut Trip, id: &str) {
        entity.trip_id = id.to_owned();
    }

    fn rewrite_references(entity: &mut Trip, ctx: &MergeContext) {
        ctx.rewrite(EntityType::Route, &mut entity.route_id);
        ctx.rewrite(EntityType::Service, &mut entity.service_id);
        ctx.rewrite_opt(EntityType::Shape, &mut entity.shape_id);
        ctx.rewrite_opt(EntityType::Block, &mut entity.block_id);
    }

    fn scorer() -> Option<Box<dyn Similarity<Trip>>> {
        Some(Box::new(And::new(vec![
            Box::new(TripStopsOverlap) as Box<dyn Similarity<Trip>>,
            Box::new(TripScheduleOverlap),
            Box::new(TripServiceOverlap),
        ])))
    }

    fn fill_from(
        target: &mut Trip,
        source: &Trip,
        target_id: &str,
        conflicts: &mut Vec<FieldConflict>,
    ) {
        fill_text(Self::FILE, target_id, "trip_headsign", &mut target.trip_headsign, &source.trip_headsign, conflicts);
        fill_text(Self::FILE, target_id, "trip_short_name", &mut target.trip_short_name, &source.trip_short_name, conflicts);
        fill_value(Self::FILE, target_id, "direction_id", &mut target.direction_id, &source.direction_id, conflicts);
        fill_value(Self::FILE, target_id, "wheelchair_accessible", &mut target.wheelchair_accessible, &source.wheelchair_accessible, conflicts);
        fill_value(Self::FILE, target_id, "bikes_allowed", &mut target.bikes_allowed, &source.bikes_allowed, conflicts);
    }
}

/// Runs the trip stage of one pass.
pub(crate) fn merge(
    source: &Feed,
    target: &mut Feed,
    ctx: &mut MergeContext,
    mode: DetectionMode,
    threshold: f64,
) -> StageSummary {
    run_keyed::<TripMerge>(source, target, ctx, mode, threshold).summary
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::test_fixtures::{minimal_feed, stop_time, trip};

    #[test]
    fn trip_references_follow_earlier_renames() {
        let source = minimal_feed();
        let mut target = minimal_feed();
        let mut ctx = MergeContext::new("b_", false);
        ctx.record_rename(EntityType::Route, "R1", "b_R1");
        ctx.record_rename(EntityType::Service, "WK", "b_WK");

        merge(&source, &mut target, &mut ctx, DetectionMode::None, 0.5);

        let inserted = &target.trips["b_T1"];
        assert_eq!(inserted.route_id, "b_R1");
        assert_eq!(inserted.service_id, "b_WK");
    }

    #[test]
    fn fuzzy_folds_identical_schedule() {
        // The end-to-end scenario: same stops, same 08:00–09:00 span.
        let source = minimal_feed();
        let mut target = minimal_feed();
        let mut ctx = MergeContext::new("b_", false);

        let summary = merge(&source, &mut target, &mut ctx, DetectionMode::Fuzzy, 0.8);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(target.trips.len(), 1);
        assert!(ctx.is_folded(EntityType::Trip, "T1"));
    }

    #[test]
    fn fuzzy_keeps_trips_with_shifted_schedule() {
        let source = minimal_feed();
        let mut target = minimal_feed();
        target.stop_times.clear();
        target.stop_times.push(stop_time("T1", "S1", 1, "18:00:00"));
        target.stop_times.push(stop_time("T1", "S2", 2, "19:00:00"));

        let mut ctx = MergeContext::new("b_", false);
        let summary = merge(&source, &mut target, &mut ctx, DetectionMode::Fuzzy, 0.8);
        assert_eq!(summary.duplicates, 0, "disjoint schedule spans must not fold");
        assert_eq!(summary.renamed, 1);
        assert!(target.trips.contains_key("b_T1"));
    }

    #[test]
    fn fuzzy_keeps_trips_over_different_stops() {
        let source = minimal_feed();
        let mut target = minimal_feed();
        for st in &mut target.stop_times {
            st.stop_id = format!("Z_{}", st.stop_id);
        }

        let mut ctx = MergeContext::new("b_", false);
        let summary = merge(&source, &mut target, &mut ctx, DetectionMode::Fuzzy, 0.8);
        assert_eq!(summary.duplicates, 0);
    }

    #[test]
    fn identity_folds_by_trip_id_alone() {
        let mut source = minimal_feed();
        // Wildly different schedule, same trip_id: identity trusts the ID.
        source.stop_times.clear();
        source.stop_times.push(stop_time("T1", "S1", 1, "23:00:00"));
        let mut target = minimal_feed();

        let mut ctx = MergeContext::new("b_", false);
        let summary = merge(&source, &mut target, &mut ctx, DetectionMode::Identity, 0.8);
        assert_eq!(summary.duplicates, 1);
    }

    #[test]
    fn block_reference_passes_through_unchanged() {
        let mut source = minimal_feed();
        if let Some(t) = source.trips.get_mut("T1") {
            t.block_id = Some("BLK7".to_owned());
        }
        let mut target = Feed::new();
        target.calendars = source.calendars.clone();
        target.routes = source.routes.clone();

        let mut ctx = MergeContext::new("b_", false);
        merge(&source, &mut target, &mut ctx, DetectionMode::None, 0.5);
        assert_eq!(target.trips["T1"].block_id.as_deref(), Some("BLK7"));
    }

    #[test]
    fn duplicate_fold_fills_headsign() {
        let mut source = minimal_feed();
        if let Some(t) = source.trips.get_mut("T1") {
            t.trip_headsign = Some("Downtown".to_owned());
        }
        let mut target = minimal_feed();

        let mut ctx = MergeContext::new("b_", false);
        merge(&source, &mut target, &mut ctx, DetectionMode::Identity, 0.8);
        assert_eq!(target.trips["T1"].trip_headsign.as_deref(), Some("Downtown"));
        assert!(ctx.conflicts.is_empty());
    }

    #[test]
    fn non_colliding_trip_inserted_as_is() {
        let mut source = minimal_feed();
        let t2 = trip("T2", "R1", "WK");
        source.trips.insert("T2".to_owned(), t2);
        source.stop_times.push(stop_time("T2", "S1", 1, "10:00:00"));
        let mut target = minimal_feed();

        let mut ctx = MergeContext::new("b_", false);
        let summary = merge(&source, &mut target, &mut ctx, DetectionMode::Identity, 0.8);
        assert_eq!(summary.duplicates, 1, "T1 folds");
        assert_eq!(summary.inserted, 1, "T2 appends");
        assert!(target.trips.contains_key("T2"));
    }
}
