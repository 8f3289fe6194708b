/// Merge strategies for `fare_attributes.txt` and `fare_rules.txt`.
///
/// Fare attributes are a keyed type with an optional agency reference and a
/// property-match fuzzy scorer. Fare rules are a sequence: their fare and
/// route references are rewritten, while the zone columns resolve through
/// the zone namespace (which never accumulates renames) and so pass through
/// unchanged.
use indexmap::IndexMap;

use crate::context::{EntityType, FieldConflict, MergeContext};
use crate::feed::Feed;
use crate::model::FareAttribute;
use crate::score::{And, Similarity, fare_properties};
use crate::strategy::{
    DetectionMode, KeyedMerge, StageSummary, fill_text, fill_value, run_keyed,
};

pub(crate) struct FareAttributeMerge;

impl KeyedMerge for FareAttributeMerge {
    type Entity = FareAttribute;
    const ENTITY_TYPE: EntityType = EntityType::Fare;
    const FILE: &'static str = "fare_attributes.txt";

    fn collection(feed: &Feed) -> &IndexMap<String, FareAttribute> {
        &feed.fare_attributes
    }

    fn collection_mut(feed: &mut Feed) -> &mut IndexMap<String, FareAttribute> {
        &mut feed.fare_attributes
    }

    fn set_id(entity: &mut FareAttribute, id: &str) {
        entity.fare_id = id.to_owned();
    }

    fn rewrite_references(entity: &mut FareAttribute, ctx: &MergeContext) {
        ctx.rewrite_opt(EntityType::Agency, &mut entity.agency_id);
    }

    fn scorer() -> Option<Box<dyn Similarity<FareAttribute>>> {
        Some(Box::new(And::new(vec![
            Box::new(fare_properties()) as Box<dyn Similarity<FareAttribute>>,
        ])))
    }

    fn fill_from(
        target: &mut FareAttribute,
        source: &FareAttribute,
        target_id: &str,
        conflicts: &mut Vec<FieldConflict>,
    ) {
        fill_text(Self::FILE, target_id, "agency_id", &mut target.agency_id, &source.agency_id, conflicts);
        fill_value(Self::FILE, target_id, "transfers", &mut target.transfers, &source.transfers, conflicts);
        fill_value(Self::FILE, target_id, "transfer_duration", &mut target.transfer_duration, &source.transfer_duration, conflicts);
    }
}

/// Runs the fare-attribute stage of one pass.
pub(crate) fn merge_attributes(
    source: &Feed,
    target: &mut Feed,
    ctx: &mut MergeContext,
    mode: DetectionMode,
    threshold: f64,
) -> StageSummary {
    run_keyed::<FareAttributeMerge>(source, target, ctx, mode, threshold).summary
}

/// Runs the fare-rule stage of one pass.
pub(crate) fn merge_rules(
    source: &Feed,
    target: &mut Feed,
    ctx: &mut MergeContext,
    mode: DetectionMode,
) -> StageSummary {
    let mut summary = StageSummary::new("fare_rules.txt");

    for row in &source.fare_rules {
        let mut row = row.clone();
        ctx.rewrite(EntityType::Fare, &mut row.fare_id);
        ctx.rewrite_opt(EntityType::Route, &mut row.route_id);
        ctx.rewrite_opt(EntityType::Zone, &mut row.origin_id);
        ctx.rewrite_opt(EntityType::Zone, &mut row.destination_id);
        ctx.rewrite_opt(EntityType::Zone, &mut row.contains_id);

        let drop_duplicate = match mode {
            DetectionMode::None => false,
            DetectionMode::Identity | DetectionMode::Fuzzy => {
                target.fare_rules.iter().any(|r| *r == row)
            }
        };
        if drop_duplicate {
            summary.duplicates += 1;
        } else {
            target.fare_rules.push(row);
            summary.inserted += 1;
        }
    }

    summary
}
