/// Validated newtype wrappers for GTFS time and date strings.
///
/// Each newtype enforces its canonical shape at construction time via
/// [`TryFrom<&str>`]. Once constructed, the inner value is immutable. Serde
/// `Deserialize` impls re-run validation so invalid cells cannot enter the
/// type system from untrusted CSV.
use std::fmt;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors produced when constructing a validated newtype from an invalid string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewtypeError {
    /// The string did not match the expected format.
    InvalidFormat {
        /// Name of the type that rejected the input.
        type_name: &'static str,
        /// A human-readable description of the expected format.
        expected: &'static str,
        /// The input that was rejected.
        got: String,
    },
}

impl fmt::Display for NewtypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFormat {
                type_name,
                expected,
                got,
            } => write!(f, "invalid {type_name}: expected {expected}, got {got:?}"),
        }
    }
}

impl std::error::Error for NewtypeError {}

// ---------------------------------------------------------------------------
// Regex statics
//
// The pattern is a compile-time literal; Regex::new never returns Err for it.
// The fallback chain exists because the workspace bans expect() and unwrap();
// "a^" (a pattern that never matches) is always valid, so it satisfies the
// type checker on the unreachable path.
// ---------------------------------------------------------------------------

/// Matches `H:MM:SS` with one to three hour digits.
static FEED_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{1,3}:\d{2}:\d{2}$").unwrap_or_else(|_| {
        // Never reached: the pattern above is always valid.
        Regex::new("a^").unwrap_or_else(|_| unreachable!("regex engine broken"))
    })
});

// ---------------------------------------------------------------------------
// FeedTime
// ---------------------------------------------------------------------------

/// A GTFS time-of-day measured in seconds since noon minus twelve hours.
///
/// Values past 86400 are legal and denote service running past midnight on
/// the trip's service day (e.g. `25:30:00`); no modular wrap is applied.
/// The canonical textual form is `HH:MM:SS` with zero-padded two-digit
/// minutes and seconds and at least two hour digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeedTime(u32);

impl TryFrom<&str> for FeedTime {
    type Error = NewtypeError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let invalid = || NewtypeError::InvalidFormat {
            type_name: "FeedTime",
            expected: "HH:MM:SS (hours may exceed 23)",
            got: s.to_owned(),
        };

        if !FEED_TIME_RE.is_match(s) {
            return Err(invalid());
        }

        let mut parts = s.split(':');
        let (Some(h), Some(m), Some(sec)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };
        let h: u32 = h.parse().map_err(|_| invalid())?;
        let m: u32 = m.parse().map_err(|_| invalid())?;
        let sec: u32 = sec.parse().map_err(|_| invalid())?;
        if m >= 60 || sec >= 60 {
            return Err(invalid());
        }

        Ok(Self(h * 3600 + m * 60 + sec))
    }
}

impl FeedTime {
    /// Builds a `FeedTime` directly from a seconds-since-midnight count.
    pub fn from_seconds(seconds: u32) -> Self {
        Self(seconds)
    }

    /// Returns the total seconds since midnight (may exceed 86400).
    pub fn seconds(self) -> u32 {
        self.0
    }
}

impl fmt::Display for FeedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = self.0 / 3600;
        let m = (self.0 % 3600) / 60;
        let s = self.0 % 60;
        write!(f, "{h:02}:{m:02}:{s:02}")
    }
}

impl Serialize for FeedTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FeedTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::try_from(s.as_str()).map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// ServiceDate
// ---------------------------------------------------------------------------

/// A GTFS service date in `YYYYMMDD` form.
///
/// Stored as a [`chrono::NaiveDate`] so interval arithmetic (notably the
/// one-day extension that makes an end date inclusive) is exact across month
/// and year boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceDate(NaiveDate);

impl TryFrom<&str> for ServiceDate {
    type Error = NewtypeError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        NaiveDate::parse_from_str(s, "%Y%m%d")
            .map(Self)
            .map_err(|_| NewtypeError::InvalidFormat {
                type_name: "ServiceDate",
                expected: "YYYYMMDD (e.g. 20260115)",
                got: s.to_owned(),
            })
    }
}

impl ServiceDate {
    /// Returns the day after this date, saturating at the calendar maximum.
    pub fn next_day(self) -> Self {
        Self(self.0.succ_opt().unwrap_or(self.0))
    }

    /// Returns the date as a day ordinal suitable for interval arithmetic.
    pub fn day_number(self) -> i64 {
        i64::from(self.0.num_days_from_ce())
    }
}

impl fmt::Display for ServiceDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y%m%d"))
    }
}

impl Serialize for ServiceDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ServiceDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::try_from(s.as_str()).map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
