/// Merge stage for `feed_info.txt`.
///
/// Feed-info rows have no primary key and no references; every source row
/// is appended, except that under identity or fuzzy detection a row equal
/// to an existing target row is dropped.
use crate::context::MergeContext;
use crate::feed::Feed;
use crate::strategy::{DetectionMode, StageSummary};

/// Runs the feed-info stage of one pass.
pub(crate) fn merge(
    source: &Feed,
    target: &mut Feed,
    _ctx: &mut MergeContext,
    mode: DetectionMode,
) -> StageSummary {
    let mut summary = StageSummary::new("feed_info.txt");

    for row in &source.feed_infos {
        let drop_duplicate = match mode {
            DetectionMode::None => false,
            DetectionMode::Identity | DetectionMode::Fuzzy => {
                target.feed_infos.iter().any(|r| r == row)
            }
        };
        if drop_duplicate {
            summary.duplicates += 1;
        } else {
            target.feed_infos.push(row.clone());
            summary.inserted += 1;
        }
    }

    summary
}
