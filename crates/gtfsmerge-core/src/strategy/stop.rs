/// Merge strategy for `stops.txt`.
///
/// Stops are the one self-referential type: `parent_station` points back
/// into the stop namespace. All stops of a feed are placed in one keyed
/// pass with `parent_station` left untouched, then a fix-up sub-pass
/// rewrites the parent of every stop inserted this pass through the now
/// complete identity and rename maps. This avoids any ordering problem
/// between a platform and its station without recursion.
use std::collections::HashSet;

use indexmap::IndexMap;

use crate::context::{EntityType, FieldConflict, MergeContext};
use crate::feed::{Feed, non_blank};
use crate::model::Stop;
use crate::score::{And, Similarity, StopDistance, stop_properties};
use crate::strategy::{
    DetectionMode, KeyedMerge, StageSummary, fill_text, fill_value, run_keyed,
};

pub(crate) struct StopMerge;

impl KeyedMerge for StopMerge {
    type Entity = Stop;
    const ENTITY_TYPE: EntityType = EntityType::Stop;
    const FILE: &'static str = "stops.txt";

    fn collection(feed: &Feed) -> &IndexMap<String, Stop> {
        &feed.stops
    }

    fn collection_mut(feed: &mut Feed) -> &mut IndexMap<String, Stop> {
        &mut feed.stops
    }

    fn set_id(entity: &mut Stop, id: &str) {
        entity.stop_id = id.to_owned();
    }

    fn rewrite_references(entity: &mut Stop, ctx: &MergeContext) {
        // parent_station is deliberately not rewritten here; see the module
        // docs. level_id points at an earlier stage and is safe.
        ctx.rewrite_opt(EntityType::Level, &mut entity.level_id);
    }

    fn scorer() -> Option<Box<dyn Similarity<Stop>>> {
        Some(Box::new(And::new(vec![
            Box::new(stop_properties()) as Box<dyn Similarity<Stop>>,
            Box::new(StopDistance),
        ])))
    }

    fn fill_from(
        target: &mut Stop,
        source: &Stop,
        target_id: &str,
        conflicts: &mut Vec<FieldConflict>,
    ) {
        // parent_station is excluded: the source value is in the source
        // namespace and folding must not leak it into the target.
        fill_text(Self::FILE, target_id, "stop_code", &mut target.stop_code, &source.stop_code, conflicts);
        fill_text(Self::FILE, target_id, "stop_name", &mut target.stop_name, &source.stop_name, conflicts);
        fill_text(Self::FILE, target_id, "stop_desc", &mut target.stop_desc, &source.stop_desc, conflicts);
        fill_text(Self::FILE, target_id, "zone_id", &mut target.zone_id, &source.zone_id, conflicts);
        fill_text(Self::FILE, target_id, "stop_url", &mut target.stop_url, &source.stop_url, conflicts);
        fill_text(Self::FILE, target_id, "stop_timezone", &mut target.stop_timezone, &source.stop_timezone, conflicts);
        fill_text(Self::FILE, target_id, "platform_code", &mut target.platform_code, &source.platform_code, conflicts);
        fill_value(Self::FILE, target_id, "location_type", &mut target.location_type, &source.location_type, conflicts);
        fill_value(Self::FILE, target_id, "wheelchair_boarding", &mut target.wheelchair_boarding, &source.wheelchair_boarding, conflicts);
    }
}

/// Runs the stop stage of one pass: keyed classification followed by the
/// parent-station fix-up over this pass's insertions.
pub(crate) fn merge(
    source: &Feed,
    target: &mut Feed,
    ctx: &mut MergeContext,
    mode: DetectionMode,
    threshold: f64,
) -> StageSummary {
    let outcome = run_keyed::<StopMerge>(source, target, ctx, mode, threshold);

    for id in &outcome.inserted_ids {
        if let Some(stop) = target.stops.get_mut(id) {
            if non_blank(stop.parent_station.as_deref()).is_some() {
                ctx.rewrite_opt(EntityType::Stop, &mut stop.parent_station);
            }
        }
    }

    outcome.summary
}

/// Looks for a cycle in a feed's stop-parenting graph.
///
/// Returns the ID of a stop on the first cycle found, or `None` when the
/// parenting relation is acyclic. A cyclic input cannot be merged: the
/// fix-up pass would have to rewrite a self-referential chain
/// inconsistently.
pub(crate) fn find_parent_cycle(feed: &Feed) -> Option<String> {
    let mut cleared: HashSet<&str> = HashSet::new();
    for start in feed.stops.keys() {
        if cleared.contains(start.as_str()) {
            continue;
        }
        let mut path: Vec<&str> = Vec::new();
        let mut on_path: HashSet<&str> = HashSet::new();
        let mut current: &str = start;
        loop {
            if cleared.contains(current) {
                break;
            }
            if !on_path.insert(current) {
                return Some(current.to_owned());
            }
            path.push(current);
            let parent = feed
                .stops
                .get(current)
                .and_then(|s| non_blank(s.parent_station.as_deref()));
            match parent {
                Some(parent) if feed.stops.contains_key(parent) => current = parent,
                Some(_) | None => break,
            }
        }
        cleared.extend(path);
    }
    None
}
