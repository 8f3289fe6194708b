/// Merge strategy for `levels.txt`.
use indexmap::IndexMap;

use crate::context::{EntityType, FieldConflict, MergeContext};
use crate::feed::Feed;
use crate::model::Level;
use crate::strategy::{DetectionMode, KeyedMerge, StageSummary, fill_text, run_keyed};

pub(crate) struct LevelMerge;

impl KeyedMerge for LevelMerge {
    type Entity = Level;
    const ENTITY_TYPE: EntityType = EntityType::Level;
    const FILE: &'static str = "levels.txt";

    fn collection(feed: &Feed) -> &IndexMap<String, Level> {
        &feed.levels
    }

    fn collection_mut(feed: &mut Feed) -> &mut IndexMap<String, Level> {
        &mut feed.levels
    }

    fn set_id(entity: &mut Level, id: &str) {
        entity.level_id = id.to_owned();
    }

    fn fill_from(
        target: &mut Level,
        source: &Level,
        target_id: &str,
        conflicts: &mut Vec<FieldConflict>,
    ) {
        fill_text(
            Self::FILE,
            target_id,
            "level_name",
            &mut target.level_name,
            &source.level_name,
            conflicts,
        );
    }
}

/// Runs the level stage of one pass.
pub(crate) fn merge(
    source: &Feed,
    target: &mut Feed,
    ctx: &mut MergeContext,
    mode: DetectionMode,
    threshold: f64,
) -> StageSummary {
    run_keyed::<LevelMerge>(source, target, ctx, mode, threshold).summary
}
