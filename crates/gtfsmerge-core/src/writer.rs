/// Feed writer: emits a [`Feed`] as a GTFS container (directory or `.zip`
/// archive).
///
/// Output is canonical so the diff-based test harness can compare runs
/// byte-for-byte:
/// - UTF-8, LF record terminators, no BOM.
/// - Column order is the canonical order per file (struct field order).
/// - Coordinates carry exactly six decimal places.
/// - Entities appear in collection iteration order.
/// - The five required files are always present; optional files are written
///   only when non-empty.
///
/// The output kind follows the path: a `.zip` extension produces an
/// archive, anything else a directory.
use std::fmt;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::feed::Feed;

/// Canonical headers for the required files, written even when the
/// collection is empty (serde emits headers only alongside a first record).
const AGENCY_HEADER: [&str; 8] = [
    "agency_id",
    "agency_name",
    "agency_url",
    "agency_timezone",
    "agency_lang",
    "agency_phone",
    "agency_fare_url",
    "agency_email",
];
const STOPS_HEADER: [&str; 14] = [
    "stop_id",
    "stop_code",
    "stop_name",
    "stop_desc",
    "stop_lat",
    "stop_lon",
    "zone_id",
    "stop_url",
    "location_type",
    "parent_station",
    "stop_timezone",
    "wheelchair_boarding",
    "level_id",
    "platform_code",
];
const ROUTES_HEADER: [&str; 10] = [
    "route_id",
    "agency_id",
    "route_short_name",
    "route_long_name",
    "route_desc",
    "route_type",
    "route_url",
    "route_color",
    "route_text_color",
    "route_sort_order",
];
const TRIPS_HEADER: [&str; 10] = [
    "route_id",
    "service_id",
    "trip_id",
    "trip_headsign",
    "trip_short_name",
    "direction_id",
    "block_id",
    "shape_id",
    "wheelchair_accessible",
    "bikes_allowed",
];
const STOP_TIMES_HEADER: [&str; 10] = [
    "trip_id",
    "arrival_time",
    "departure_time",
    "stop_id",
    "stop_sequence",
    "stop_headsign",
    "pickup_type",
    "drop_off_type",
    "shape_dist_traveled",
    "timepoint",
];

// ---------------------------------------------------------------------------
// OutputError
// ---------------------------------------------------------------------------

/// Errors raised while writing a feed container.
#[derive(Debug)]
pub enum OutputError {
    /// A filesystem operation failed.
    Io {
        /// The offending path.
        path: PathBuf,
        /// The underlying I/O error message.
        detail: String,
    },
    /// CSV serialization failed for one file.
    Csv {
        /// The file being written.
        file: &'static str,
        /// The underlying error message.
        detail: String,
    },
    /// The zip archive could not be written.
    Archive {
        /// The archive path.
        path: PathBuf,
        /// The underlying error message.
        detail: String,
    },
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, detail } => {
                write!(f, "cannot write {}: {detail}", path.display())
            }
            Self::Csv { file, detail } => write!(f, "{file}: {detail}"),
            Self::Archive { path, detail } => {
                write!(f, "cannot write archive {}: {detail}", path.display())
            }
        }
    }
}

impl std::error::Error for OutputError {}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Writes a feed to `path`: a `.zip` archive when the path has a `zip`
/// extension, a directory otherwise (created if absent).
///
/// # Errors
///
/// Returns an [`OutputError`] on any filesystem, serialization, or archive
/// failure.
pub fn write_feed(feed: &Feed, path: &Path) -> Result<(), OutputError> {
    let files = render_files(feed)?;
    let is_zip = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
    if is_zip {
        write_archive(path, &files)
    } else {
        write_directory(path, &files)
    }
}

/// Serializes every file of the feed to its canonical CSV bytes, in
/// canonical file order.
fn render_files(feed: &Feed) -> Result<Vec<(&'static str, Vec<u8>)>, OutputError> {
    let mut files: Vec<(&'static str, Vec<u8>)> = Vec::new();

    files.push((
        "agency.txt",
        csv_bytes("agency.txt", &AGENCY_HEADER, feed.agencies.values())?,
    ));
    if !feed.levels.is_empty() {
        files.push(("levels.txt", csv_rows("levels.txt", feed.levels.values())?));
    }
    if !feed.areas.is_empty() {
        files.push(("areas.txt", csv_rows("areas.txt", feed.areas.values())?));
    }
    files.push((
        "stops.txt",
        csv_bytes("stops.txt", &STOPS_HEADER, feed.stops.values())?,
    ));
    files.push((
        "routes.txt",
        csv_bytes("routes.txt", &ROUTES_HEADER, feed.routes.values())?,
    ));
    if !feed.calendars.is_empty() {
        files.push((
            "calendar.txt",
            csv_rows("calendar.txt", feed.calendars.values())?,
        ));
    }
    if !feed.calendar_dates.is_empty() {
        files.push((
            "calendar_dates.txt",
            csv_rows("calendar_dates.txt", feed.calendar_dates.iter())?,
        ));
    }
    if !feed.shapes.is_empty() {
        files.push((
            "shapes.txt",
            csv_rows("shapes.txt", feed.shapes.values().flatten())?,
        ));
    }
    files.push((
        "trips.txt",
        csv_bytes("trips.txt", &TRIPS_HEADER, feed.trips.values())?,
    ));
    files.push((
        "stop_times.txt",
        csv_bytes("stop_times.txt", &STOP_TIMES_HEADER, feed.stop_times.iter())?,
    ));
    if !feed.frequencies.is_empty() {
        files.push((
            "frequencies.txt",
            csv_rows("frequencies.txt", feed.frequencies.iter())?,
        ));
    }
    if !feed.transfers.is_empty() {
        files.push((
            "transfers.txt",
            csv_rows("transfers.txt", feed.transfers.iter())?,
        ));
    }
    if !feed.pathways.is_empty() {
        files.push((
            "pathways.txt",
            csv_rows("pathways.txt", feed.pathways.values())?,
        ));
    }
    if !feed.fare_attributes.is_empty() {
        files.push((
            "fare_attributes.txt",
            csv_rows("fare_attributes.txt", feed.fare_attributes.values())?,
        ));
    }
    if !feed.fare_rules.is_empty() {
        files.push((
            "fare_rules.txt",
            csv_rows("fare_rules.txt", feed.fare_rules.iter())?,
        ));
    }
    if !feed.feed_infos.is_empty() {
        files.push((
            "feed_info.txt",
            csv_rows("feed_info.txt", feed.feed_infos.iter())?,
        ));
    }

    Ok(files)
}

// ---------------------------------------------------------------------------
// CSV rendering
// ---------------------------------------------------------------------------

/// Serializes rows of a required file, emitting the canonical header even
/// when there are no rows.
fn csv_bytes<'a, T: Serialize + 'a>(
    file: &'static str,
    header: &[&str],
    rows: impl Iterator<Item = &'a T>,
) -> Result<Vec<u8>, OutputError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut wrote_any = false;
    for row in rows {
        writer.serialize(row).map_err(|e| OutputError::Csv {
            file,
            detail: e.to_string(),
        })?;
        wrote_any = true;
    }
    if !wrote_any {
        writer.write_record(header).map_err(|e| OutputError::Csv {
            file,
            detail: e.to_string(),
        })?;
    }
    writer.into_inner().map_err(|e| OutputError::Csv {
        file,
        detail: e.to_string(),
    })
}

/// Serializes rows of an optional file; callers only invoke this with a
/// non-empty collection, so serde always emits the header.
fn csv_rows<'a, T: Serialize + 'a>(
    file: &'static str,
    rows: impl Iterator<Item = &'a T>,
) -> Result<Vec<u8>, OutputError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row).map_err(|e| OutputError::Csv {
            file,
            detail: e.to_string(),
        })?;
    }
    writer.into_inner().map_err(|e| OutputError::Csv {
        file,
        detail: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Container writing
// ---------------------------------------------------------------------------

fn write_directory(dir: &Path, files: &[(&'static str, Vec<u8>)]) -> Result<(), OutputError> {
    std::fs::create_dir_all(dir).map_err(|e| OutputError::Io {
        path: dir.to_path_buf(),
        detail: e.to_string(),
    })?;
    for (name, bytes) in files {
        let path = dir.join(name);
        std::fs::write(&path, bytes).map_err(|e| OutputError::Io {
            path,
            detail: e.to_string(),
        })?;
    }
    Ok(())
}

fn write_archive(path: &Path, files: &[(&'static str, Vec<u8>)]) -> Result<(), OutputError> {
    let archive_err = |detail: String| OutputError::Archive {
        path: path.to_path_buf(),
        detail,
    };
    let file = std::fs::File::create(path).map_err(|e| OutputError::Io {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (name, bytes) in files {
        zip.start_file(*name, options)
            .map_err(|e| archive_err(e.to_string()))?;
        zip.write_all(bytes).map_err(|e| archive_err(e.to_string()))?;
    }
    zip.finish().map_err(|e| archive_err(e.to_string()))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
