/// Serde helper functions shared across the data model.
///
/// The exports here handle the CSV-specific quirks of GTFS: coordinates are
/// written with exactly six decimal places, and optional numeric cells must
/// round-trip through the empty string.
use serde::Serializer;

/// Serializes a latitude or longitude with exactly six decimal places.
///
/// Use with `#[serde(serialize_with = "crate::serde_helpers::ser_coord")]`.
/// Deserialization is untouched; any numeric representation is accepted on
/// the way in.
pub fn ser_coord<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&format_args!("{value:.6}"))
}

/// Serializes an optional coordinate: six decimal places, or the empty cell
/// when absent.
///
/// Use with `#[serde(serialize_with = "crate::serde_helpers::ser_coord_opt")]`.
pub fn ser_coord_opt<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serializer.collect_str(&format_args!("{v:.6}")),
        None => serializer.serialize_none(),
    }
}
