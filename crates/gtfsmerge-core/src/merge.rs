/// The merge orchestrator: drives N feeds, one at a time, into an
/// accumulating target feed.
///
/// For each source feed after the first the orchestrator assigns a unique
/// prefix, builds a fresh [`MergeContext`], and invokes every entity-type
/// strategy in dependency order (leaves first), so that each stage only ever
/// rewrites references into namespaces that earlier stages have already
/// resolved:
///
/// ```text
/// agency → level → area → stop → calendar → calendar_dates → route
///   → shape → trip → stop_times → frequencies → transfers → pathways
///   → fare_attributes → fare_rules → feed_info
/// ```
///
/// The engine is single-threaded and sequential: the rename and identity
/// maps are read-write state touched by every stage, and the stages form a
/// strict dependency chain. A cooperative [`CancelToken`] is polled between
/// stages; a cancelled merge returns an error and the caller discards the
/// partial target.
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

use crate::context::{FieldConflict, MergeContext};
use crate::feed::{Feed, ReferentialError};
use crate::strategy::{
    DetectionMode, StageSummary, agency, area, calendar, fare, feed_info, frequency, level,
    pathway, route, shape, stop, stop_time, transfer, trip,
};

/// The stage order, which is also the order of [`MergeSummary::stages`].
const STAGE_FILES: [&str; 16] = [
    "agency.txt",
    "levels.txt",
    "areas.txt",
    "stops.txt",
    "calendar.txt",
    "calendar_dates.txt",
    "routes.txt",
    "shapes.txt",
    "trips.txt",
    "stop_times.txt",
    "frequencies.txt",
    "transfers.txt",
    "pathways.txt",
    "fare_attributes.txt",
    "fare_rules.txt",
    "feed_info.txt",
];

/// The files whose strategies offer a fuzzy scorer, for threshold warnings.
const FUZZY_CAPABLE_FILES: [&str; 6] = [
    "agency.txt",
    "stops.txt",
    "calendar.txt",
    "routes.txt",
    "trips.txt",
    "fare_attributes.txt",
];

// ---------------------------------------------------------------------------
// CancelToken
// ---------------------------------------------------------------------------

/// A shared flag for cooperatively cancelling a merge in progress.
///
/// Clones share the flag. The engine polls it between entity-type stages and
/// returns [`MergeError::Cancelled`] once it is set; no partial result is
/// exposed.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a fresh, unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; takes effect at the next stage boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// MergeError
// ---------------------------------------------------------------------------

/// Fatal conditions that halt a merge with no partial output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    /// The input slice was empty; at least one feed is required.
    NoInputFeeds,
    /// A source feed has a foreign key that does not resolve within itself.
    Referential(ReferentialError),
    /// A source feed's stop-parenting relation contains a cycle, which the
    /// fix-up pass cannot rewrite consistently.
    StopParentCycle {
        /// A stop on the cycle.
        stop_id: String,
    },
    /// No unused prefix candidate is acceptable for a source feed.
    PrefixExhausted {
        /// Zero-based index of the feed that could not be prefixed.
        feed_index: usize,
    },
    /// The caller cancelled the merge through its [`CancelToken`].
    Cancelled,
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoInputFeeds => f.write_str("merge requires at least one input feed"),
            Self::Referential(err) => write!(f, "unresolved reference in input: {err}"),
            Self::StopParentCycle { stop_id } => {
                write!(f, "cycle in stop parenting involving stop {stop_id:?}")
            }
            Self::PrefixExhausted { feed_index } => {
                write!(f, "no usable prefix left for input feed #{}", feed_index + 1)
            }
            Self::Cancelled => f.write_str("merge cancelled"),
        }
    }
}

impl std::error::Error for MergeError {}

// ---------------------------------------------------------------------------
// MergeOptions
// ---------------------------------------------------------------------------

/// Configuration for one merge run.
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Detection mode applied to every file without an override.
    pub default_detection: DetectionMode,
    /// Per-file detection overrides, keyed by file name
    /// (e.g. `"stops.txt"` → [`DetectionMode::Fuzzy`]).
    pub per_file_detection: HashMap<String, DetectionMode>,
    /// Per-file fuzzy-match thresholds, keyed by file name. Files without an
    /// entry use the built-in default (0.8 for stops, 0.5 elsewhere), and a
    /// warning is emitted when fuzzy detection relies on such a default.
    pub thresholds: HashMap<String, f64>,
    /// When true, every duplicate decision and rename is logged at debug
    /// level.
    pub debug: bool,
    /// Overrides the prefix candidate pool. Candidates are positional: input
    /// feed `i` starts scanning at candidate `i` and advances past any
    /// candidate that is already claimed or that some existing identifier
    /// starts with. The default pool is `a_` … `z_`, `aa_` … `zz_`.
    pub prefixes: Option<Vec<String>>,
    /// Cooperative cancellation flag, polled between stages.
    pub cancel: Option<CancelToken>,
}

impl MergeOptions {
    /// The effective detection mode for one file.
    pub fn mode_for(&self, file: &str) -> DetectionMode {
        self.per_file_detection
            .get(file)
            .copied()
            .unwrap_or(self.default_detection)
    }

    /// The effective fuzzy threshold for one file.
    pub fn threshold_for(&self, file: &str) -> f64 {
        self.thresholds
            .get(file)
            .copied()
            .unwrap_or_else(|| default_threshold(file))
    }

    fn check_cancelled(&self) -> Result<(), MergeError> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(MergeError::Cancelled),
            Some(_) | None => Ok(()),
        }
    }
}

/// Built-in thresholds: stops need near-certainty, everything else is
/// majority agreement.
fn default_threshold(file: &str) -> f64 {
    if file == "stops.txt" { 0.8 } else { 0.5 }
}

// ---------------------------------------------------------------------------
// MergeSummary / MergeOutput
// ---------------------------------------------------------------------------

/// Counts and conflicts accumulated over a whole merge run.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeSummary {
    /// Number of input feeds merged.
    pub feeds_merged: usize,
    /// Per-file stage counts, aggregated across all passes, in stage order.
    pub stages: Vec<StageSummary>,
    /// Non-fatal field conflicts recorded while folding duplicates.
    pub conflicts: Vec<FieldConflict>,
}

/// The result of a successful merge.
#[derive(Debug, Clone)]
pub struct MergeOutput {
    /// The consolidated feed.
    pub feed: Feed,
    /// What happened along the way.
    pub summary: MergeSummary,
}

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Merges the given feeds, in order, into one consolidated feed.
///
/// The first feed enters the target unprefixed; each later feed is assigned
/// a prefix and folded in by the strategy chain. The engine holds no global
/// state and is re-entrant.
///
/// # Errors
///
/// - [`MergeError::NoInputFeeds`] when `feeds` is empty.
/// - [`MergeError::Referential`] when any input feed has a dangling foreign
///   key (inputs must be self-consistent before merging).
/// - [`MergeError::StopParentCycle`] when any input feed has a cyclic
///   stop-parenting chain.
/// - [`MergeError::PrefixExhausted`] when no prefix candidate is usable for
///   some feed.
/// - [`MergeError::Cancelled`] when the [`CancelToken`] fires.
pub fn merge_feeds(feeds: &[Feed], options: &MergeOptions) -> Result<MergeOutput, MergeError> {
    if feeds.is_empty() {
        return Err(MergeError::NoInputFeeds);
    }

    warn_unconfigured_thresholds(options);

    for feed in feeds {
        feed.check_references().map_err(MergeError::Referential)?;
        if let Some(stop_id) = stop::find_parent_cycle(feed) {
            return Err(MergeError::StopParentCycle { stop_id });
        }
    }

    let default_pool;
    let pool: &[String] = match &options.prefixes {
        Some(custom) => custom,
        None => {
            default_pool = default_prefix_pool();
            &default_pool
        }
    };

    let mut used: HashSet<String> = HashSet::new();
    let mut target = Feed::new();
    let mut totals: Vec<StageSummary> = STAGE_FILES.into_iter().map(StageSummary::new).collect();
    let mut conflicts: Vec<FieldConflict> = Vec::new();

    for (index, source) in feeds.iter().enumerate() {
        let prefix = if index == 0 {
            String::new()
        } else {
            choose_prefix(index, source, &target, &used, pool)
                .ok_or(MergeError::PrefixExhausted { feed_index: index })?
        };
        if !prefix.is_empty() {
            used.insert(prefix.clone());
        }

        let mut ctx = MergeContext::new(&prefix, options.debug);
        let pass = run_pass(source, &mut target, &mut ctx, options)?;
        for (total, stage) in totals.iter_mut().zip(&pass) {
            total.absorb(stage);
        }
        conflicts.append(&mut ctx.conflicts);
    }

    Ok(MergeOutput {
        feed: target,
        summary: MergeSummary {
            feeds_merged: feeds.len(),
            stages: totals,
            conflicts,
        },
    })
}

// ---------------------------------------------------------------------------
// Pass driver
// ---------------------------------------------------------------------------

/// Runs every stage of one pass in dependency order, polling for
/// cancellation at each stage boundary. Returns one [`StageSummary`] per
/// entry of [`STAGE_FILES`], in order.
fn run_pass(
    source: &Feed,
    target: &mut Feed,
    ctx: &mut MergeContext,
    options: &MergeOptions,
) -> Result<Vec<StageSummary>, MergeError> {
    let mode = |file: &str| options.mode_for(file);
    let threshold = |file: &str| options.threshold_for(file);
    let mut out = Vec::with_capacity(STAGE_FILES.len());

    options.check_cancelled()?;
    out.push(agency::merge(source, target, ctx, mode("agency.txt"), threshold("agency.txt")));
    options.check_cancelled()?;
    out.push(level::merge(source, target, ctx, mode("levels.txt"), threshold("levels.txt")));
    options.check_cancelled()?;
    out.push(area::merge(source, target, ctx, mode("areas.txt"), threshold("areas.txt")));
    options.check_cancelled()?;
    out.push(stop::merge(source, target, ctx, mode("stops.txt"), threshold("stops.txt")));
    options.check_cancelled()?;
    out.push(calendar::merge(source, target, ctx, mode("calendar.txt"), threshold("calendar.txt")));
    options.check_cancelled()?;
    out.push(calendar::merge_dates(source, target, ctx));
    options.check_cancelled()?;
    out.push(route::merge(source, target, ctx, mode("routes.txt"), threshold("routes.txt")));
    options.check_cancelled()?;
    out.push(shape::merge(source, target, ctx, mode("shapes.txt"), threshold("shapes.txt")));
    options.check_cancelled()?;
    out.push(trip::merge(source, target, ctx, mode("trips.txt"), threshold("trips.txt")));
    options.check_cancelled()?;
    out.push(stop_time::merge(source, target, ctx));
    options.check_cancelled()?;
    out.push(frequency::merge(source, target, ctx));
    options.check_cancelled()?;
    out.push(transfer::merge(source, target, ctx, mode("transfers.txt")));
    options.check_cancelled()?;
    out.push(pathway::merge(source, target, ctx, mode("pathways.txt"), threshold("pathways.txt")));
    options.check_cancelled()?;
    out.push(fare::merge_attributes(source, target, ctx, mode("fare_attributes.txt"), threshold("fare_attributes.txt")));
    options.check_cancelled()?;
    out.push(fare::merge_rules(source, target, ctx, mode("fare_rules.txt")));
    options.check_cancelled()?;
    out.push(feed_info::merge(source, target, ctx, mode("feed_info.txt")));

    Ok(out)
}

// ---------------------------------------------------------------------------
// Prefix selection
// ---------------------------------------------------------------------------

/// `a_` … `z_` followed by `aa_` … `zz_`.
fn default_prefix_pool() -> Vec<String> {
    let mut pool = Vec::with_capacity(26 + 26 * 26);
    for c in b'a'..=b'z' {
        pool.push(format!("{}_", c as char));
    }
    for c1 in b'a'..=b'z' {
        for c2 in b'a'..=b'z' {
            pool.push(format!("{}{}_", c1 as char, c2 as char));
        }
    }
    pool
}

/// Picks the prefix for input feed `feed_index`.
///
/// Scans the pool starting at the feed's own position (so the second feed
/// gets `b_`, the third `c_`, matching the unprefixed first feed), skipping
/// candidates that are already claimed or that any identifier in the source
/// or the accumulated target starts with.
fn choose_prefix(
    feed_index: usize,
    source: &Feed,
    target: &Feed,
    used: &HashSet<String>,
    pool: &[String],
) -> Option<String> {
    pool.iter()
        .skip(feed_index)
        .find(|candidate| {
            !used.contains(*candidate)
                && !source.any_id_starts_with(candidate)
                && !target.any_id_starts_with(candidate)
        })
        .cloned()
}

/// Warns once per run for every fuzzy-enabled file whose threshold was left
/// at the built-in default.
fn warn_unconfigured_thresholds(options: &MergeOptions) {
    for file in FUZZY_CAPABLE_FILES {
        if options.mode_for(file) == DetectionMode::Fuzzy && !options.thresholds.contains_key(file)
        {
            warn!(
                file,
                fallback = options.threshold_for(file),
                "fuzzy detection enabled without a configured threshold; using the default"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
