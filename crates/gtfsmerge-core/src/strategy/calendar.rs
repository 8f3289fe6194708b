/// Merge strategy for the service namespace: `calendar.txt` and
/// `calendar_dates.txt`.
///
/// A service ID may be defined by a calendar row, by calendar-date rows, or
/// by both, so the strategy walks the full service namespace of the source
/// feed rather than just the calendar collection. Collision checks likewise
/// consult the target's full namespace; otherwise two unrelated date-only
/// services sharing an ID would silently merge.
///
/// Calendar-date rows are merged by identity on `(service_id, date)` after
/// the service-level decisions: an identical row is dropped, a row with the
/// same key but a different `exception_type` is a recorded conflict (the
/// target wins), anything else is appended. Under `None` detection nothing
/// ever collides post-rename, so every source row survives.
use tracing::debug;

use crate::context::{EntityType, FieldConflict, MergeContext};
use crate::feed::Feed;
use crate::model::Calendar;
use crate::score::{And, ServiceDateOverlap, Similarity, calendar_properties};
use crate::strategy::{DetectionMode, StageSummary, note_required};

/// Runs the service stage of one pass.
pub(crate) fn merge(
    source: &Feed,
    target: &mut Feed,
    ctx: &mut MergeContext,
    mode: DetectionMode,
    threshold: f64,
) -> StageSummary {
    let mut summary = StageSummary::new("calendar.txt");

    let scorer: Option<Box<dyn Similarity<Calendar>>> = match mode {
        DetectionMode::Fuzzy => Some(Box::new(And::new(vec![
            Box::new(ServiceDateOverlap) as Box<dyn Similarity<Calendar>>,
            Box::new(calendar_properties()),
        ]))),
        DetectionMode::None | DetectionMode::Identity => None,
    };

    for service_id in source.service_ids() {
        let duplicate_of: Option<String> = match mode {
            DetectionMode::None => None,
            DetectionMode::Identity => identity_probe(target, &service_id),
            DetectionMode::Fuzzy => match (&scorer, source.calendars.get(&service_id)) {
                (Some(scorer), Some(calendar)) => {
                    fuzzy_probe(source, calendar, target, scorer.as_ref(), threshold)
                        .or_else(|| identity_probe(target, &service_id))
                }
                // Date-only services have nothing to score; trust the ID.
                (Some(_), None) | (None, Some(_)) | (None, None) => {
                    identity_probe(target, &service_id)
                }
            },
        };

        match duplicate_of {
            Some(target_id) => {
                if let (Some(source_cal), Some(target_cal)) = (
                    source.calendars.get(&service_id),
                    target.calendars.get_mut(&target_id),
                ) {
                    note_disagreements(target_cal, source_cal, &target_id, &mut ctx.conflicts);
                } else if let (Some(source_cal), None) = (
                    source.calendars.get(&service_id),
                    target.calendars.get(&target_id),
                ) {
                    // The target knows this service only through date rows;
                    // adopt the source's calendar under the target's ID.
                    let mut adopted = source_cal.clone();
                    adopted.service_id = target_id.clone();
                    target.calendars.insert(target_id.clone(), adopted);
                }
                ctx.record_identity(EntityType::Service, &service_id, &target_id);
                summary.duplicates += 1;
                if ctx.debug {
                    debug!(
                        file = "calendar.txt",
                        source = %service_id,
                        target = %target_id,
                        "duplicate folded"
                    );
                }
            }
            None => {
                let collides = target.has_service(&service_id);
                let new_id = if collides {
                    format!("{}{service_id}", ctx.prefix)
                } else {
                    service_id.clone()
                };
                if new_id != service_id {
                    ctx.record_rename(EntityType::Service, &service_id, &new_id);
                    summary.renamed += 1;
                    if ctx.debug {
                        debug!(file = "calendar.txt", from = %service_id, to = %new_id, "renamed");
                    }
                }
                if let Some(calendar) = source.calendars.get(&service_id) {
                    let mut inserted = calendar.clone();
                    inserted.service_id = new_id.clone();
                    target.calendars.insert(new_id, inserted);
                }
                summary.inserted += 1;
            }
        }
    }

    summary
}

/// Runs the calendar-dates stage of one pass. Service IDs were resolved by
/// the calendar stage; rows are merged by identity on `(service_id, date)`.
pub(crate) fn merge_dates(
    source: &Feed,
    target: &mut Feed,
    ctx: &mut MergeContext,
) -> StageSummary {
    let mut summary = StageSummary::new("calendar_dates.txt");

    for row in &source.calendar_dates {
        let mut row = row.clone();
        ctx.rewrite(EntityType::Service, &mut row.service_id);

        let existing = target
            .calendar_dates
            .iter()
            .find(|cd| cd.service_id == row.service_id && cd.date == row.date);
        match existing {
            Some(kept) => {
                if kept.exception_type != row.exception_type {
                    ctx.conflicts.push(FieldConflict {
                        file: "calendar_dates.txt",
                        entity: format!("{}/{}", row.service_id, row.date),
                        field: "exception_type",
                        kept: kept.exception_type.to_string(),
                        discarded: row.exception_type.to_string(),
                    });
                }
                summary.duplicates += 1;
            }
            None => {
                target.calendar_dates.push(row);
                summary.inserted += 1;
            }
        }
    }

    summary
}

fn identity_probe(target: &Feed, service_id: &str) -> Option<String> {
    if target.has_service(service_id) {
        Some(service_id.to_owned())
    } else {
        None
    }
}

fn fuzzy_probe(
    source: &Feed,
    calendar: &Calendar,
    target: &Feed,
    scorer: &dyn Similarity<Calendar>,
    threshold: f64,
) -> Option<String> {
    let mut best: Option<(f64, String)> = None;
    for (target_id, candidate) in &target.calendars {
        let score = scorer.score(source, calendar, target, candidate);
        let replace = match &best {
            None => true,
            Some((best_score, best_id)) => {
                score > *best_score || (score == *best_score && target_id < best_id)
            }
        };
        if replace {
            best = Some((score, target_id.clone()));
        }
    }
    match best {
        Some((score, target_id)) if score >= threshold => Some(target_id),
        Some(_) | None => None,
    }
}

/// Weekday flags and the date range are identifying for a service; a
/// disagreement on a folded duplicate is recorded, target values stand.
fn note_disagreements(
    target: &mut Calendar,
    source: &Calendar,
    target_id: &str,
    conflicts: &mut Vec<FieldConflict>,
) {
    note_required(
        "calendar.txt",
        target_id,
        "weekdays",
        &target.weekday_bitmap(),
        &source.weekday_bitmap(),
        conflicts,
    );
    note_required(
        "calendar.txt",
        target_id,
        "start_date",
        &target.start_date.to_string(),
        &source.start_date.to_string(),
        conflicts,
    );
    note_required(
        "calendar.txt",
        target_id,
        "end_date",
        &target.end_date.to_string(),
        &source.end_date.to_string(),
        conflicts,
    );
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::test_fixtures::{calendar, calendar_date};

    fn feed_with_calendar(service_id: &str, start: &str, end: &str) -> Feed {
        let mut feed = Feed::new();
        feed.calendars
            .insert(service_id.to_owned(), calendar(service_id, start, end));
        feed
    }

    #[test]
    fn colliding_service_renamed_under_none() {
        let source = feed_with_calendar("WK", "20260101", "20261231");
        let mut target = feed_with_calendar("WK", "20260101", "20261231");
        let mut ctx = MergeContext::new("b_", false);

        let summary = merge(&source, &mut target, &mut ctx, DetectionMode::None, 0.5);
        assert_eq!(summary.renamed, 1);
        assert!(target.calendars.contains_key("b_WK"));
        assert_eq!(target.calendars["b_WK"].service_id, "b_WK");
    }

    #[test]
    fn identity_folds_matching_service() {
        let source = feed_with_calendar("WK", "20260101", "20261231");
        let mut target = feed_with_calendar("WK", "20260101", "20261231");
        let mut ctx = MergeContext::new("b_", false);

        let summary = merge(&source, &mut target, &mut ctx, DetectionMode::Identity, 0.5);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(target.calendars.len(), 1);
        assert!(ctx.is_folded(EntityType::Service, "WK"));
    }

    #[test]
    fn date_only_service_collision_is_renamed() {
        let mut source = Feed::new();
        source.calendar_dates.push(calendar_date("HOLIDAY", "20260704", 1));
        let mut target = Feed::new();
        target.calendar_dates.push(calendar_date("HOLIDAY", "20260101", 1));

        let mut ctx = MergeContext::new("b_", false);
        let summary = merge(&source, &mut target, &mut ctx, DetectionMode::None, 0.5);
        assert_eq!(summary.renamed, 1);
        assert_eq!(ctx.resolve(EntityType::Service, "HOLIDAY"), "b_HOLIDAY");

        let dates = merge_dates(&source, &mut target, &mut ctx);
        assert_eq!(dates.inserted, 1);
        assert_eq!(target.calendar_dates.len(), 2);
        assert_eq!(target.calendar_dates[1].service_id, "b_HOLIDAY");
    }

    #[test]
    fn fuzzy_folds_overlapping_identical_weekdays() {
        let source = feed_with_calendar("SRC", "20260101", "20261231");
        let mut target = feed_with_calendar("TGT", "20260101", "20261231");
        let mut ctx = MergeContext::new("b_", false);

        let summary = merge(&source, &mut target, &mut ctx, DetectionMode::Fuzzy, 0.5);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(ctx.resolve(EntityType::Service, "SRC"), "TGT");
    }

    #[test]
    fn fuzzy_keeps_disjoint_date_ranges_apart() {
        let source = feed_with_calendar("SRC", "20270101", "20271231");
        let mut target = feed_with_calendar("TGT", "20260101", "20261231");
        let mut ctx = MergeContext::new("b_", false);

        let summary = merge(&source, &mut target, &mut ctx, DetectionMode::Fuzzy, 0.5);
        assert_eq!(summary.duplicates, 0);
        assert_eq!(summary.inserted, 1);
        assert_eq!(target.calendars.len(), 2);
    }

    #[test]
    fn folding_onto_date_only_service_adopts_calendar_row() {
        let source = feed_with_calendar("WK", "20260101", "20261231");
        let mut target = Feed::new();
        target.calendar_dates.push(calendar_date("WK", "20260704", 2));

        let mut ctx = MergeContext::new("b_", false);
        let summary = merge(&source, &mut target, &mut ctx, DetectionMode::Identity, 0.5);
        assert_eq!(summary.duplicates, 1);
        assert!(
            target.calendars.contains_key("WK"),
            "calendar row adopted for the date-only target service"
        );
    }

    #[test]
    fn identical_date_rows_are_dropped_and_conflicts_recorded() {
        let mut source = Feed::new();
        source.calendar_dates.push(calendar_date("WK", "20260704", 2));
        source.calendar_dates.push(calendar_date("WK", "20260705", 1));
        let mut target = Feed::new();
        target.calendar_dates.push(calendar_date("WK", "20260704", 1));

        let mut ctx = MergeContext::new("b_", false);
        // Service WK folded by an earlier (identity) calendar stage.
        ctx.record_identity(EntityType::Service, "WK", "WK");

        let summary = merge_dates(&source, &mut target, &mut ctx);
        assert_eq!(summary.duplicates, 1, "same (service, date) key");
        assert_eq!(summary.inserted, 1);
        assert_eq!(ctx.conflicts.len(), 1, "exception_type disagreement recorded");
        assert_eq!(target.calendar_dates[0].exception_type, 1, "target wins");
    }
}
