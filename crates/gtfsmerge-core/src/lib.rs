#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod context;
pub mod feed;
pub mod merge;
pub mod model;
pub mod newtypes;
pub mod reader;
pub mod score;
pub mod serde_helpers;
pub mod strategy;
pub mod writer;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use context::{EntityType, FieldConflict, MergeContext};
pub use feed::{Feed, ReferentialError};
pub use merge::{
    CancelToken, MergeError, MergeOptions, MergeOutput, MergeSummary, merge_feeds,
};
pub use model::{
    Agency, Area, Calendar, CalendarDate, FareAttribute, FareRule, FeedInfo, Frequency, Level,
    Pathway, Route, ShapePoint, Stop, StopTime, Transfer, Trip,
};
pub use newtypes::{FeedTime, NewtypeError, ServiceDate};
pub use reader::{InputError, read_feed};
pub use score::{
    And, PropertyMatch, RouteStopsOverlap, ServiceDateOverlap, Similarity, StopDistance,
    TripScheduleOverlap, TripServiceOverlap, TripStopsOverlap, element_overlap, haversine_km,
    interval_overlap,
};
pub use strategy::{DetectionMode, StageSummary};
pub use writer::{OutputError, write_feed};

/// Returns the current version of the gtfsmerge-core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
