/// Merge stage for `frequencies.txt`.
///
/// Frequencies are trip-driven like stop-times: a folded owner drops its
/// source rows (the target's headways win), a renamed owner re-anchors them.
use crate::context::{EntityType, MergeContext};
use crate::feed::Feed;
use crate::strategy::StageSummary;

/// Runs the frequency stage of one pass.
pub(crate) fn merge(source: &Feed, target: &mut Feed, ctx: &mut MergeContext) -> StageSummary {
    let mut summary = StageSummary::new("frequencies.txt");

    for row in &source.frequencies {
        if ctx.is_folded(EntityType::Trip, &row.trip_id) {
            summary.duplicates += 1;
            continue;
        }
        let mut row = row.clone();
        ctx.rewrite(EntityType::Trip, &mut row.trip_id);
        target.frequencies.push(row);
        summary.inserted += 1;
    }

    summary
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::test_fixtures::frequency;

    #[test]
    fn folded_trip_drops_source_frequencies() {
        let mut source = Feed::new();
        source.frequencies.push(frequency("T1", "06:00:00", "10:00:00", 600));
        let mut target = Feed::new();
        target.frequencies.push(frequency("T1", "06:00:00", "09:00:00", 900));

        let mut ctx = MergeContext::new("b_", false);
        ctx.record_identity(EntityType::Trip, "T1", "T1");

        let summary = merge(&source, &mut target, &mut ctx);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(target.frequencies.len(), 1);
        assert_eq!(target.frequencies[0].headway_secs, 900, "target wins");
    }

    #[test]
    fn renamed_trip_reanchors_frequencies() {
        let mut source = Feed::new();
        source.frequencies.push(frequency("T1", "06:00:00", "10:00:00", 600));
        let mut target = Feed::new();

        let mut ctx = MergeContext::new("b_", false);
        ctx.record_rename(EntityType::Trip, "T1", "b_T1");

        let summary = merge(&source, &mut target, &mut ctx);
        assert_eq!(summary.inserted, 1);
        assert_eq!(target.frequencies[0].trip_id, "b_T1");
    }
}
