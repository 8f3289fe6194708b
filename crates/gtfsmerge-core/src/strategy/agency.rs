/// Merge strategy for `agency.txt`.
///
/// Agencies are leaves in the dependency graph: nothing upstream of them is
/// rewritten, and routes and fare attributes downstream follow their renames.
use indexmap::IndexMap;

use crate::context::{EntityType, FieldConflict, MergeContext};
use crate::feed::Feed;
use crate::model::Agency;
use crate::score::{And, Similarity, agency_properties};
use crate::strategy::{
    DetectionMode, KeyedMerge, StageSummary, fill_text, note_required, run_keyed,
};

pub(crate) struct AgencyMerge;

impl KeyedMerge for AgencyMerge {
    type Entity = Agency;
    const ENTITY_TYPE: EntityType = EntityType::Agency;
    const FILE: &'static str = "agency.txt";

    fn collection(feed: &Feed) -> &IndexMap<String, Agency> {
        &feed.agencies
    }

    fn collection_mut(feed: &mut Feed) -> &mut IndexMap<String, Agency> {
        &mut feed.agencies
    }

    fn set_id(entity: &mut Agency, id: &str) {
        entity.agency_id = Some(id.to_owned());
    }

    fn scorer() -> Option<Box<dyn Similarity<Agency>>> {
        Some(Box::new(And::new(vec![Box::new(agency_properties())])))
    }

    fn fill_from(
        target: &mut Agency,
        source: &Agency,
        target_id: &str,
        conflicts: &mut Vec<FieldConflict>,
    ) {
        note_required(
            Self::FILE,
            target_id,
            "agency_name",
            &target.agency_name,
            &source.agency_name,
            conflicts,
        );
        note_required(
            Self::FILE,
            target_id,
            "agency_url",
            &target.agency_url,
            &source.agency_url,
            conflicts,
        );
        note_required(
            Self::FILE,
            target_id,
            "agency_timezone",
            &target.agency_timezone,
            &source.agency_timezone,
            conflicts,
        );
        fill_text(Self::FILE, target_id, "agency_lang", &mut target.agency_lang, &source.agency_lang, conflicts);
        fill_text(Self::FILE, target_id, "agency_phone", &mut target.agency_phone, &source.agency_phone, conflicts);
        fill_text(Self::FILE, target_id, "agency_fare_url", &mut target.agency_fare_url, &source.agency_fare_url, conflicts);
        fill_text(Self::FILE, target_id, "agency_email", &mut target.agency_email, &source.agency_email, conflicts);
    }
}

/// Runs the agency stage of one pass.
pub(crate) fn merge(
    source: &Feed,
    target: &mut Feed,
    ctx: &mut MergeContext,
    mode: DetectionMode,
    threshold: f64,
) -> StageSummary {
    run_keyed::<AgencyMerge>(source, target, ctx, mode, threshold).summary
}
