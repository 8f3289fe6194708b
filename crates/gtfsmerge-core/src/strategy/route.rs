/// Merge strategy for `routes.txt`.
use indexmap::IndexMap;

use crate::context::{EntityType, FieldConflict, MergeContext};
use crate::feed::Feed;
use crate::model::Route;
use crate::score::{And, RouteStopsOverlap, Similarity, route_properties};
use crate::strategy::{
    DetectionMode, KeyedMerge, StageSummary, fill_text, fill_value, run_keyed,
};

pub(crate) struct RouteMerge;

impl KeyedMerge for RouteMerge {
    type Entity = Route;
    const ENTITY_TYPE: EntityType = EntityType::Route;
    const FILE: &'static str = "routes.txt";

    fn collection(feed: &Feed) -> &IndexMap<String, Route> {
        &feed.routes
    }

    fn collection_mut(feed: &mut Feed) -> &mut IndexMap<String, Route> {
        &mut feed.routes
    }

    fn set_id(entity: &mut Route, id: &str) {
        entity.route_id = id.to_owned();
    }

    fn rewrite_references(entity: &mut Route, ctx: &MergeContext) {
        ctx.rewrite_opt(EntityType::Agency, &mut entity.agency_id);
    }

    fn scorer() -> Option<Box<dyn Similarity<Route>>> {
        Some(Box::new(And::new(vec![
            Box::new(route_properties()) as Box<dyn Similarity<Route>>,
            Box::new(RouteStopsOverlap),
        ])))
    }

    fn fill_from(
        target: &mut Route,
        source: &Route,
        target_id: &str,
        conflicts: &mut Vec<FieldConflict>,
    ) {
        fill_text(Self::FILE, target_id, "route_short_name", &mut target.route_short_name, &source.route_short_name, conflicts);
        fill_text(Self::FILE, target_id, "route_long_name", &mut target.route_long_name, &source.route_long_name, conflicts);
        fill_text(Self::FILE, target_id, "route_desc", &mut target.route_desc, &source.route_desc, conflicts);
        fill_text(Self::FILE, target_id, "route_url", &mut target.route_url, &source.route_url, conflicts);
        fill_text(Self::FILE, target_id, "route_color", &mut target.route_color, &source.route_color, conflicts);
        fill_text(Self::FILE, target_id, "route_text_color", &mut target.route_text_color, &source.route_text_color, conflicts);
        fill_value(Self::FILE, target_id, "route_sort_order", &mut target.route_sort_order, &source.route_sort_order, conflicts);
    }
}

/// Runs the route stage of one pass.
pub(crate) fn merge(
    source: &Feed,
    target: &mut Feed,
    ctx: &mut MergeContext,
    mode: DetectionMode,
    threshold: f64,
) -> StageSummary {
    run_keyed::<RouteMerge>(source, target, ctx, mode, threshold).summary
}
