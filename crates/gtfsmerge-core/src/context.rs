/// Per-pass working state: the rename and identity maps and their
/// resolution chain.
///
/// A [`MergeContext`] lives for exactly one (source feed, target feed) pass.
/// Strategies populate it as they run; every later stage consults it to
/// translate foreign keys from the source namespace into the target
/// namespace. Resolution order for a reference `r` of type `T`:
///
/// 1. `IdentityMap[(T, r)]` — the source entity was folded into an existing
///    target entity; substitute the target's ID.
/// 2. `RenameMap[(T, r)]` — the source entity was inserted under a prefixed
///    ID; substitute the new ID.
/// 3. Otherwise `r` is already target-resolvable and passes through.
///
/// Blank references pass through untouched. The chain is idempotent: new IDs
/// never appear as keys in either map, so applying it twice equals applying
/// it once.
use std::collections::HashMap;
use std::fmt;

// ---------------------------------------------------------------------------
// EntityType
// ---------------------------------------------------------------------------

/// Every reference-bearing namespace in a feed.
///
/// `Zone` and `Block` are label namespaces rather than keyed collections: no
/// strategy ever records a rename for them, so references resolve to
/// themselves — but they flow through the same map chain as everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    Agency,
    Level,
    Area,
    Stop,
    Route,
    Trip,
    Service,
    Shape,
    Pathway,
    Fare,
    Zone,
    Block,
}

impl EntityType {
    /// The feed file this namespace is keyed from, for log and conflict
    /// reporting. Namespaces without a file of their own report the file
    /// that defines their labels.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Agency => "agency.txt",
            Self::Level => "levels.txt",
            Self::Area => "areas.txt",
            Self::Stop => "stops.txt",
            Self::Route => "routes.txt",
            Self::Trip => "trips.txt",
            Self::Service => "calendar.txt",
            Self::Shape => "shapes.txt",
            Self::Pathway => "pathways.txt",
            Self::Fare => "fare_attributes.txt",
            Self::Zone | Self::Block => "stops.txt",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Agency => "agency",
            Self::Level => "level",
            Self::Area => "area",
            Self::Stop => "stop",
            Self::Route => "route",
            Self::Trip => "trip",
            Self::Service => "service",
            Self::Shape => "shape",
            Self::Pathway => "pathway",
            Self::Fare => "fare",
            Self::Zone => "zone",
            Self::Block => "block",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// FieldConflict
// ---------------------------------------------------------------------------

/// A non-fatal disagreement found while folding a duplicate: both sides had
/// a populated value for the same field and they differ.
///
/// The target's value is preserved; the conflict is recorded so the operator
/// can reconcile the sources upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldConflict {
    /// The file the entity belongs to.
    pub file: &'static str,
    /// The target entity's primary key.
    pub entity: String,
    /// The disagreeing field.
    pub field: &'static str,
    /// The value kept (the target's).
    pub kept: String,
    /// The value discarded (the source's).
    pub discarded: String,
}

impl fmt::Display for FieldConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:?}: field {} kept {:?}, discarded {:?}",
            self.file, self.entity, self.field, self.kept, self.discarded
        )
    }
}

// ---------------------------------------------------------------------------
// MergeContext
// ---------------------------------------------------------------------------

/// Working state for one source-feed pass.
#[derive(Debug, Default)]
pub struct MergeContext {
    /// The prefix assigned to this source feed; empty for the first feed.
    pub prefix: String,
    /// When true, strategies emit a debug event for every duplicate decision
    /// and rename.
    pub debug: bool,
    /// Field conflicts accumulated while folding duplicates this pass.
    pub conflicts: Vec<FieldConflict>,
    rename: HashMap<(EntityType, String), String>,
    identity: HashMap<(EntityType, String), String>,
}

impl MergeContext {
    /// Creates a context for one pass with the given feed prefix.
    pub fn new(prefix: &str, debug: bool) -> Self {
        Self {
            prefix: prefix.to_owned(),
            debug,
            conflicts: Vec::new(),
            rename: HashMap::new(),
            identity: HashMap::new(),
        }
    }

    /// Records that the source entity `old` of type `ty` was inserted into
    /// the target under `new`.
    pub fn record_rename(&mut self, ty: EntityType, old: &str, new: &str) {
        self.rename.insert((ty, old.to_owned()), new.to_owned());
    }

    /// Records that the source entity `source` of type `ty` is a duplicate
    /// of the existing target entity `target`.
    pub fn record_identity(&mut self, ty: EntityType, source: &str, target: &str) {
        self.identity
            .insert((ty, source.to_owned()), target.to_owned());
    }

    /// Returns `true` when the source entity `id` was folded into an
    /// existing target entity this pass.
    pub fn is_folded(&self, ty: EntityType, id: &str) -> bool {
        self.identity.contains_key(&(ty, id.to_owned()))
    }

    /// Translates one source-namespace reference into the target namespace.
    ///
    /// Identity wins over rename; an unmapped reference is returned as-is.
    pub fn resolve<'a>(&'a self, ty: EntityType, id: &'a str) -> &'a str {
        self.lookup(ty, id).map_or(id, String::as_str)
    }

    /// Rewrites a required reference field in place.
    pub fn rewrite(&self, ty: EntityType, field: &mut String) {
        if let Some(new) = self.lookup(ty, field) {
            field.clone_from(new);
        }
    }

    /// Rewrites an optional reference field in place; `None` and the blank
    /// string pass through.
    pub fn rewrite_opt(&self, ty: EntityType, field: &mut Option<String>) {
        let Some(value) = field.as_deref() else { return };
        if value.is_empty() {
            return;
        }
        if let Some(new) = self.lookup(ty, value) {
            *field = Some(new.clone());
        }
    }

    /// The mapped target ID for `(ty, id)`, or `None` when the reference is
    /// already target-resolvable. The borrow is tied to the context, not the
    /// queried id.
    fn lookup(&self, ty: EntityType, id: &str) -> Option<&String> {
        let key = (ty, id.to_owned());
        self.identity.get(&key).or_else(|| self.rename.get(&key))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn unmapped_reference_passes_through() {
        let ctx = MergeContext::new("b_", false);
        assert_eq!(ctx.resolve(EntityType::Stop, "S1"), "S1");
    }

    #[test]
    fn rename_is_applied() {
        let mut ctx = MergeContext::new("b_", false);
        ctx.record_rename(EntityType::Stop, "S1", "b_S1");
        assert_eq!(ctx.resolve(EntityType::Stop, "S1"), "b_S1");
    }

    #[test]
    fn identity_wins_over_rename() {
        let mut ctx = MergeContext::new("b_", false);
        ctx.record_rename(EntityType::Stop, "S1", "b_S1");
        ctx.record_identity(EntityType::Stop, "S1", "TARGET_S1");
        assert_eq!(ctx.resolve(EntityType::Stop, "S1"), "TARGET_S1");
    }

    #[test]
    fn maps_are_keyed_by_entity_type() {
        let mut ctx = MergeContext::new("b_", false);
        ctx.record_rename(EntityType::Stop, "X", "b_X");
        // The same raw identifier in a different namespace is untouched.
        assert_eq!(ctx.resolve(EntityType::Route, "X"), "X");
        assert_eq!(ctx.resolve(EntityType::Stop, "X"), "b_X");
    }

    #[test]
    fn resolution_is_idempotent() {
        let mut ctx = MergeContext::new("b_", false);
        ctx.record_rename(EntityType::Trip, "T1", "b_T1");
        let once = ctx.resolve(EntityType::Trip, "T1").to_owned();
        let twice = ctx.resolve(EntityType::Trip, &once).to_owned();
        assert_eq!(once, "b_T1");
        assert_eq!(once, twice);
    }

    #[test]
    fn rewrite_opt_skips_blank_and_none() {
        let mut ctx = MergeContext::new("b_", false);
        ctx.record_rename(EntityType::Stop, "", "b_");
        let mut none: Option<String> = None;
        ctx.rewrite_opt(EntityType::Stop, &mut none);
        assert_eq!(none, None);

        let mut blank = Some(String::new());
        ctx.rewrite_opt(EntityType::Stop, &mut blank);
        assert_eq!(blank, Some(String::new()));
    }

    #[test]
    fn rewrite_updates_required_field() {
        let mut ctx = MergeContext::new("b_", false);
        ctx.record_identity(EntityType::Trip, "T1", "T_EXISTING");
        let mut field = "T1".to_owned();
        ctx.rewrite(EntityType::Trip, &mut field);
        assert_eq!(field, "T_EXISTING");
    }

    #[test]
    fn is_folded_tracks_identity_entries_only() {
        let mut ctx = MergeContext::new("b_", false);
        ctx.record_rename(EntityType::Trip, "T1", "b_T1");
        ctx.record_identity(EntityType::Trip, "T2", "T_EXISTING");
        assert!(!ctx.is_folded(EntityType::Trip, "T1"));
        assert!(ctx.is_folded(EntityType::Trip, "T2"));
    }
}
