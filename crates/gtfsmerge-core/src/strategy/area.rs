/// Merge strategy for `areas.txt`.
use indexmap::IndexMap;

use crate::context::{EntityType, FieldConflict, MergeContext};
use crate::feed::Feed;
use crate::model::Area;
use crate::strategy::{DetectionMode, KeyedMerge, StageSummary, fill_text, run_keyed};

pub(crate) struct AreaMerge;

impl KeyedMerge for AreaMerge {
    type Entity = Area;
    const ENTITY_TYPE: EntityType = EntityType::Area;
    const FILE: &'static str = "areas.txt";

    fn collection(feed: &Feed) -> &IndexMap<String, Area> {
        &feed.areas
    }

    fn collection_mut(feed: &mut Feed) -> &mut IndexMap<String, Area> {
        &mut feed.areas
    }

    fn set_id(entity: &mut Area, id: &str) {
        entity.area_id = id.to_owned();
    }

    fn fill_from(
        target: &mut Area,
        source: &Area,
        target_id: &str,
        conflicts: &mut Vec<FieldConflict>,
    ) {
        fill_text(
            Self::FILE,
            target_id,
            "area_name",
            &mut target.area_name,
            &source.area_name,
            conflicts,
        );
    }
}

/// Runs the area stage of one pass.
pub(crate) fn merge(
    source: &Feed,
    target: &mut Feed,
    ctx: &mut MergeContext,
    mode: DetectionMode,
    threshold: f64,
) -> StageSummary {
    run_keyed::<AreaMerge>(source, target, ctx, mode, threshold).summary
}
