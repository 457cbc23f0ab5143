//! Core domain model for the METAR sync pipeline.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod geo;

pub const CRATE_NAME: &str = "metar-core";

/// Modification-time format used by the remote directory listing (`29-Mar-2024 12:55`).
pub const LISTING_TIME_FORMAT: &str = "%d-%b-%Y %H:%M";

/// Field keys the decoded reports carry for the common observations.
pub const TEMPERATURE_KEY: &str = "temperature";
pub const PRESSURE_KEY: &str = "pressure (altimeter)";
pub const WIND_KEY: &str = "wind";

/// One row of the remote listing: a report file and the time it was last modified.
///
/// `last_modified` keeps the listing's own text so cursor comparison is exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListingEntry {
    pub station_id: String,
    pub last_modified: String,
}

impl ListingEntry {
    pub fn new(station_id: impl Into<String>, last_modified: impl Into<String>) -> Self {
        Self {
            station_id: station_id.into(),
            last_modified: last_modified.into(),
        }
    }

    /// Station name with any file extension stripped (`KLYH.TXT` -> `KLYH`).
    pub fn station_name(&self) -> &str {
        match self.station_id.split_once('.') {
            Some((name, _)) => name,
            None => &self.station_id,
        }
    }

    pub fn last_modified_at(&self) -> Result<DateTime<Utc>, chrono::ParseError> {
        parse_listing_time(&self.last_modified)
    }
}

pub fn parse_listing_time(text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(text.trim(), LISTING_TIME_FORMAT).map(|naive| naive.and_utc())
}

/// Report body exactly as served, before decoding. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReport {
    pub entry: ListingEntry,
    pub body: Vec<u8>,
}

/// Persisted observation. Unique on `(name, last_modified_timestamp)`.
///
/// `fields` holds every `key: value` line of the decoded report with the key
/// lower-cased; keys the pipeline does not know about are kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedReport {
    pub name: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub last_modified_timestamp: DateTime<Utc>,
    pub fields: BTreeMap<String, String>,
}

impl ParsedReport {
    pub fn key(&self) -> ReportKey {
        ReportKey {
            name: self.name.clone(),
            last_modified_timestamp: self.last_modified_timestamp,
        }
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn temperature(&self) -> Option<&str> {
        self.field(TEMPERATURE_KEY)
    }

    pub fn pressure(&self) -> Option<&str> {
        self.field(PRESSURE_KEY)
    }

    pub fn wind(&self) -> Option<&str> {
        self.field(WIND_KEY)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReportKey {
    pub name: String,
    pub last_modified_timestamp: DateTime<Utc>,
}

/// High-water mark: the newest listing entry handled by the last completed cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressCursor {
    pub name: String,
    pub date: String,
}

impl ProgressCursor {
    pub fn matches(&self, entry: &ListingEntry) -> bool {
        self.name == entry.station_id && self.date == entry.last_modified
    }
}

impl From<&ListingEntry> for ProgressCursor {
    fn from(entry: &ListingEntry) -> Self {
        Self {
            name: entry.station_id.clone(),
            date: entry.last_modified.clone(),
        }
    }
}

/// Station position from the reference stations file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateRecord {
    pub name: String,
    pub lat: f64,
    pub long: f64,
}

/// Inclusive window over `last_modified_timestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Builds a range from Unix seconds; both bounds are required.
    pub fn from_unix(start: Option<i64>, end: Option<i64>) -> Option<Self> {
        let start = DateTime::from_timestamp(start?, 0)?;
        let end = DateTime::from_timestamp(end?, 0)?;
        Some(Self { start, end })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}
