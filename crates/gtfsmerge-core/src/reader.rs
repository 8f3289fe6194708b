/// Feed reader: loads a GTFS container (directory or `.zip` archive) into a
/// [`Feed`].
///
/// Reading is header-driven: input column order is arbitrary, unknown
/// columns are ignored, and optional columns may be absent entirely. A UTF-8
/// BOM at the start of any file is stripped. Keyed collections are built in
/// row order, which fixes the iteration order everything downstream relies
/// on.
///
/// The five required files are `agency.txt`, `stops.txt`, `routes.txt`,
/// `trips.txt`, and `stop_times.txt`; every other file is optional and its
/// absence is not an error.
use std::fmt;
use std::io::Read as _;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::de::DeserializeOwned;

use crate::feed::Feed;
use crate::model::{
    Agency, Area, Calendar, CalendarDate, FareAttribute, FareRule, FeedInfo, Frequency, Level,
    Pathway, Route, ShapePoint, Stop, StopTime, Transfer, Trip,
};

// ---------------------------------------------------------------------------
// InputError
// ---------------------------------------------------------------------------

/// Errors raised while reading a feed container.
#[derive(Debug)]
pub enum InputError {
    /// The container path does not exist or cannot be read.
    Io {
        /// The offending path.
        path: PathBuf,
        /// The underlying I/O error message.
        detail: String,
    },
    /// The container is a file but not a readable zip archive.
    Archive {
        /// The offending path.
        path: PathBuf,
        /// The underlying archive error message.
        detail: String,
    },
    /// A required file is missing from the container.
    MissingFile {
        /// The container path.
        path: PathBuf,
        /// The missing file name.
        file: &'static str,
    },
    /// A file failed to parse as CSV, or a cell failed to parse as its
    /// column's type. The detail includes the record position reported by
    /// the CSV layer.
    Csv {
        /// The file that failed.
        file: &'static str,
        /// The parse error message.
        detail: String,
    },
    /// Two rows of a keyed file share a primary key.
    DuplicateKey {
        /// The file with the duplicate.
        file: &'static str,
        /// The repeated key.
        id: String,
    },
    /// `agency.txt` has more than one row but a row omits `agency_id`.
    MissingAgencyId {
        /// The `agency_name` of the row without an ID.
        name: String,
    },
    /// A file is not valid UTF-8.
    Encoding {
        /// The file that failed.
        file: &'static str,
    },
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, detail } => {
                write!(f, "cannot read {}: {detail}", path.display())
            }
            Self::Archive { path, detail } => {
                write!(f, "{} is not a readable archive: {detail}", path.display())
            }
            Self::MissingFile { path, file } => {
                write!(f, "{} is missing required file {file}", path.display())
            }
            Self::Csv { file, detail } => write!(f, "{file}: {detail}"),
            Self::DuplicateKey { file, id } => {
                write!(f, "{file}: duplicate primary key {id:?}")
            }
            Self::MissingAgencyId { name } => write!(
                f,
                "agency.txt: agency {name:?} has no agency_id but the feed has several agencies"
            ),
            Self::Encoding { file } => write!(f, "{file}: not valid UTF-8"),
        }
    }
}

impl std::error::Error for InputError {}

// ---------------------------------------------------------------------------
// Container access
// ---------------------------------------------------------------------------

/// A feed container: either an extracted directory or a zip archive.
enum Container {
    Directory(PathBuf),
    Archive {
        path: PathBuf,
        zip: zip::ZipArchive<std::fs::File>,
    },
}

impl Container {
    fn open(path: &Path) -> Result<Self, InputError> {
        if path.is_dir() {
            return Ok(Self::Directory(path.to_path_buf()));
        }
        let file = std::fs::File::open(path).map_err(|e| InputError::Io {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        let zip = zip::ZipArchive::new(file).map_err(|e| InputError::Archive {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        Ok(Self::Archive {
            path: path.to_path_buf(),
            zip,
        })
    }

    /// Reads one file to a string, or `None` when the container lacks it.
    fn read(&mut self, file: &'static str) -> Result<Option<String>, InputError> {
        match self {
            Self::Directory(dir) => {
                let path = dir.join(file);
                if !path.is_file() {
                    return Ok(None);
                }
                let bytes = std::fs::read(&path).map_err(|e| InputError::Io {
                    path,
                    detail: e.to_string(),
                })?;
                let text =
                    String::from_utf8(bytes).map_err(|_| InputError::Encoding { file })?;
                Ok(Some(strip_bom(&text).to_owned()))
            }
            Self::Archive { path, zip } => {
                let mut entry = match zip.by_name(file) {
                    Ok(entry) => entry,
                    Err(zip::result::ZipError::FileNotFound) => return Ok(None),
                    Err(e) => {
                        return Err(InputError::Archive {
                            path: path.clone(),
                            detail: e.to_string(),
                        });
                    }
                };
                let mut bytes = Vec::new();
                entry
                    .read_to_end(&mut bytes)
                    .map_err(|e| InputError::Archive {
                        path: path.clone(),
                        detail: e.to_string(),
                    })?;
                let text =
                    String::from_utf8(bytes).map_err(|_| InputError::Encoding { file })?;
                Ok(Some(strip_bom(&text).to_owned()))
            }
        }
    }
}

fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Reads a feed from a directory or `.zip` archive.
///
/// # Errors
///
/// Returns an [`InputError`] when the container cannot be opened, a required
/// file is missing, any file fails to parse, or a keyed file repeats a
/// primary key. Referential consistency is *not* checked here; the merge
/// engine verifies it before using the feed.
pub fn read_feed(path: &Path) -> Result<Feed, InputError> {
    let mut container = Container::open(path)?;
    let mut feed = Feed::new();

    // agency.txt — required. The key is agency_id, or agency_name for a
    // single-agency feed that omits the id column.
    let agencies: Vec<Agency> = parse_required(&mut container, path, "agency.txt")?;
    let multiple = agencies.len() > 1;
    for agency in agencies {
        let key = match agency.agency_id.as_deref() {
            Some(id) if !id.is_empty() => id.to_owned(),
            Some(_) | None if multiple => {
                return Err(InputError::MissingAgencyId {
                    name: agency.agency_name.clone(),
                });
            }
            Some(_) | None => agency.agency_name.clone(),
        };
        insert_unique(&mut feed.agencies, "agency.txt", key, agency)?;
    }

    // levels.txt — optional, read before stops so level references resolve.
    for level in parse_optional::<Level>(&mut container, "levels.txt")? {
        insert_unique(&mut feed.levels, "levels.txt", level.level_id.clone(), level)?;
    }

    // areas.txt — optional.
    for area in parse_optional::<Area>(&mut container, "areas.txt")? {
        insert_unique(&mut feed.areas, "areas.txt", area.area_id.clone(), area)?;
    }

    // stops.txt — required.
    for stop in parse_required::<Stop>(&mut container, path, "stops.txt")? {
        insert_unique(&mut feed.stops, "stops.txt", stop.stop_id.clone(), stop)?;
    }

    // routes.txt — required.
    for route in parse_required::<Route>(&mut container, path, "routes.txt")? {
        insert_unique(&mut feed.routes, "routes.txt", route.route_id.clone(), route)?;
    }

    // calendar.txt / calendar_dates.txt — optional (at least one is present
    // in any feed that runs service, but that is the publisher's problem).
    for calendar in parse_optional::<Calendar>(&mut container, "calendar.txt")? {
        insert_unique(
            &mut feed.calendars,
            "calendar.txt",
            calendar.service_id.clone(),
            calendar,
        )?;
    }
    feed.calendar_dates = parse_optional::<CalendarDate>(&mut container, "calendar_dates.txt")?;

    // shapes.txt — optional, grouped by shape_id in first-appearance order;
    // points of one shape are ordered by their sequence number.
    for point in parse_optional::<ShapePoint>(&mut container, "shapes.txt")? {
        feed.shapes
            .entry(point.shape_id.clone())
            .or_default()
            .push(point);
    }
    for points in feed.shapes.values_mut() {
        points.sort_by_key(|p| p.shape_pt_sequence);
    }

    // trips.txt — required.
    for trip in parse_required::<Trip>(&mut container, path, "trips.txt")? {
        insert_unique(&mut feed.trips, "trips.txt", trip.trip_id.clone(), trip)?;
    }

    // stop_times.txt — required, kept in file order.
    feed.stop_times = parse_required::<StopTime>(&mut container, path, "stop_times.txt")?;

    // Remaining optional files.
    feed.frequencies = parse_optional::<Frequency>(&mut container, "frequencies.txt")?;
    feed.transfers = parse_optional::<Transfer>(&mut container, "transfers.txt")?;
    for pathway in parse_optional::<Pathway>(&mut container, "pathways.txt")? {
        insert_unique(
            &mut feed.pathways,
            "pathways.txt",
            pathway.pathway_id.clone(),
            pathway,
        )?;
    }
    for fare in parse_optional::<FareAttribute>(&mut container, "fare_attributes.txt")? {
        insert_unique(
            &mut feed.fare_attributes,
            "fare_attributes.txt",
            fare.fare_id.clone(),
            fare,
        )?;
    }
    feed.fare_rules = parse_optional::<FareRule>(&mut container, "fare_rules.txt")?;
    feed.feed_infos = parse_optional::<FeedInfo>(&mut container, "feed_info.txt")?;

    Ok(feed)
}

// ---------------------------------------------------------------------------
// Parse helpers
// ---------------------------------------------------------------------------

fn parse_required<T: DeserializeOwned>(
    container: &mut Container,
    path: &Path,
    file: &'static str,
) -> Result<Vec<T>, InputError> {
    match container.read(file)? {
        Some(text) => parse_rows(file, &text),
        None => Err(InputError::MissingFile {
            path: path.to_path_buf(),
            file,
        }),
    }
}

fn parse_optional<T: DeserializeOwned>(
    container: &mut Container,
    file: &'static str,
) -> Result<Vec<T>, InputError> {
    match container.read(file)? {
        Some(text) => parse_rows(file, &text),
        None => Ok(Vec::new()),
    }
}

fn parse_rows<T: DeserializeOwned>(file: &'static str, text: &str) -> Result<Vec<T>, InputError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        let row: T = row.map_err(|e| InputError::Csv {
            file,
            detail: e.to_string(),
        })?;
        rows.push(row);
    }
    Ok(rows)
}

fn insert_unique<T>(
    map: &mut IndexMap<String, T>,
    file: &'static str,
    key: String,
    value: T,
) -> Result<(), InputError> {
    if map.contains_key(&key) {
        return Err(InputError::DuplicateKey { file, id: key });
    }
    map.insert(key, value);
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
