/// Merge stage for `transfers.txt`.
///
/// Transfers are keyed by their endpoints, so rewriting the stop (and
/// optional route/trip) references is the whole job. Under identity or
/// fuzzy detection a row that becomes byte-identical to an existing target
/// row after rewriting is dropped; under `None` every row is appended,
/// which preserves entity conservation.
use crate::context::{EntityType, MergeContext};
use crate::feed::Feed;
use crate::strategy::{DetectionMode, StageSummary};

/// Runs the transfer stage of one pass.
pub(crate) fn merge(
    source: &Feed,
    target: &mut Feed,
    ctx: &mut MergeContext,
    mode: DetectionMode,
) -> StageSummary {
    let mut summary = StageSummary::new("transfers.txt");

    for row in &source.transfers {
        let mut row = row.clone();
        ctx.rewrite(EntityType::Stop, &mut row.from_stop_id);
        ctx.rewrite(EntityType::Stop, &mut row.to_stop_id);
        ctx.rewrite_opt(EntityType::Route, &mut row.from_route_id);
        ctx.rewrite_opt(EntityType::Route, &mut row.to_route_id);
        ctx.rewrite_opt(EntityType::Trip, &mut row.from_trip_id);
        ctx.rewrite_opt(EntityType::Trip, &mut row.to_trip_id);

        let drop_duplicate = match mode {
            DetectionMode::None => false,
            DetectionMode::Identity | DetectionMode::Fuzzy => {
                target.transfers.iter().any(|t| *t == row)
            }
        };
        if drop_duplicate {
            summary.duplicates += 1;
        } else {
            target.transfers.push(row);
            summary.inserted += 1;
        }
    }

    summary
}
