/// Merge strategy for `pathways.txt`.
use indexmap::IndexMap;

use crate::context::{EntityType, FieldConflict, MergeContext};
use crate::feed::Feed;
use crate::model::Pathway;
use crate::strategy::{DetectionMode, KeyedMerge, StageSummary, fill_text, run_keyed};

pub(crate) struct PathwayMerge;

impl KeyedMerge for PathwayMerge {
    type Entity = Pathway;
    const ENTITY_TYPE: EntityType = EntityType::Pathway;
    const FILE: &'static str = "pathways.txt";

    fn collection(feed: &Feed) -> &IndexMap<String, Pathway> {
        &feed.pathways
    }

    fn collection_mut(feed: &mut Feed) -> &mut IndexMap<String, Pathway> {
        &mut feed.pathways
    }

    fn set_id(entity: &mut Pathway, id: &str) {
        entity.pathway_id = id.to_owned();
    }

    fn rewrite_references(entity: &mut Pathway, ctx: &MergeContext) {
        ctx.rewrite(EntityType::Stop, &mut entity.from_stop_id);
        ctx.rewrite(EntityType::Stop, &mut entity.to_stop_id);
    }

    fn fill_from(
        target: &mut Pathway,
        source: &Pathway,
        target_id: &str,
        conflicts: &mut Vec<FieldConflict>,
    ) {
        fill_text(Self::FILE, target_id, "signposted_as", &mut target.signposted_as, &source.signposted_as, conflicts);
        fill_text(Self::FILE, target_id, "reversed_signposted_as", &mut target.reversed_signposted_as, &source.reversed_signposted_as, conflicts);
    }
}

/// Runs the pathway stage of one pass.
pub(crate) fn merge(
    source: &Feed,
    target: &mut Feed,
    ctx: &mut MergeContext,
    mode: DetectionMode,
    threshold: f64,
) -> StageSummary {
    run_keyed::<PathwayMerge>(source, target, ctx, mode, threshold).summary
}
