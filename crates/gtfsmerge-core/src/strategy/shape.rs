/// Merge strategy for `shapes.txt`.
///
/// A shape is a multi-row entity: the unit of merging is the whole point
/// sequence sharing a `shape_id`. There is no similarity scorer; shapes are
/// renamed on collision (or folded by ID under identity detection), and a
/// folded shape keeps the target's points.
use indexmap::IndexMap;

use crate::context::{EntityType, MergeContext};
use crate::feed::Feed;
use crate::model::ShapePoint;
use crate::strategy::{DetectionMode, KeyedMerge, StageSummary, run_keyed};

pub(crate) struct ShapeMerge;

impl KeyedMerge for ShapeMerge {
    type Entity = Vec<ShapePoint>;
    const ENTITY_TYPE: EntityType = EntityType::Shape;
    const FILE: &'static str = "shapes.txt";

    fn collection(feed: &Feed) -> &IndexMap<String, Vec<ShapePoint>> {
        &feed.shapes
    }

    fn collection_mut(feed: &mut Feed) -> &mut IndexMap<String, Vec<ShapePoint>> {
        &mut feed.shapes
    }

    fn set_id(entity: &mut Vec<ShapePoint>, id: &str) {
        for point in entity {
            point.shape_id = id.to_owned();
        }
    }
}

/// Runs the shape stage of one pass.
pub(crate) fn merge(
    source: &Feed,
    target: &mut Feed,
    ctx: &mut MergeContext,
    mode: DetectionMode,
    threshold: f64,
) -> StageSummary {
    run_keyed::<ShapeMerge>(source, target, ctx, mode, threshold).summary
}
