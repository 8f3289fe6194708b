/// Merge stage for `stop_times.txt`.
///
/// Stop-times are trip-driven, never individually mergeable. When the
/// owning trip was folded into an existing target trip this pass, the
/// source's rows are dropped wholesale (the target's schedule wins); when
/// the trip was renamed or inserted as-is, its rows follow with trip and
/// stop references rewritten.
use crate::context::{EntityType, MergeContext};
use crate::feed::Feed;
use crate::strategy::StageSummary;

/// Runs the stop-time stage of one pass.
pub(crate) fn merge(source: &Feed, target: &mut Feed, ctx: &mut MergeContext) -> StageSummary {
    let mut summary = StageSummary::new("stop_times.txt");

    for row in &source.stop_times {
        if ctx.is_folded(EntityType::Trip, &row.trip_id) {
            summary.duplicates += 1;
            continue;
        }
        let mut row = row.clone();
        ctx.rewrite(EntityType::Trip, &mut row.trip_id);
        ctx.rewrite(EntityType::Stop, &mut row.stop_id);
        target.stop_times.push(row);
        summary.inserted += 1;
    }

    summary
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::test_fixtures::{minimal_feed, stop_time};

    #[test]
    fn rows_of_folded_trip_are_dropped() {
        let source = minimal_feed();
        let mut target = minimal_feed();
        let mut ctx = MergeContext::new("b_", false);
        ctx.record_identity(EntityType::Trip, "T1", "T1");

        let summary = merge(&source, &mut target, &mut ctx);
        assert_eq!(summary.duplicates, 2);
        assert_eq!(summary.inserted, 0);
        assert_eq!(target.stop_times.len(), 2, "target schedule untouched");
    }

    #[test]
    fn rows_follow_trip_and_stop_renames() {
        let source = minimal_feed();
        let mut target = minimal_feed();
        let mut ctx = MergeContext::new("b_", false);
        ctx.record_rename(EntityType::Trip, "T1", "b_T1");
        ctx.record_rename(EntityType::Stop, "S1", "b_S1");

        let summary = merge(&source, &mut target, &mut ctx);
        assert_eq!(summary.inserted, 2);
        assert_eq!(target.stop_times.len(), 4);
        let appended = &target.stop_times[2];
        assert_eq!(appended.trip_id, "b_T1");
        assert_eq!(appended.stop_id, "b_S1");
        assert_eq!(target.stop_times[3].stop_id, "S2", "unrenamed stop passes through");
    }

    #[test]
    fn stop_reference_follows_identity_fold() {
        let mut source = Feed::new();
        source.stop_times.push(stop_time("T2", "Y", 1, "08:00:00"));
        let mut target = Feed::new();
        let mut ctx = MergeContext::new("b_", false);
        ctx.record_identity(EntityType::Stop, "Y", "X");

        merge(&source, &mut target, &mut ctx);
        assert_eq!(target.stop_times[0].stop_id, "X");
    }
}
