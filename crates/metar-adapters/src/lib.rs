//! Remote METAR source contract and the NOAA decoded-report adapter.

use async_trait::async_trait;
use metar_core::{ListingEntry, RawReport};
use metar_storage::{FetchError, HttpFetcher};
use thiserror::Error;

mod listing;
mod report;
mod stations;

pub use listing::{parse_listing, REPORT_FILE_SUFFIX};
pub use report::{decode_latin1, parse_observation_time, parse_report};
pub use stations::{convert_to_decimal_degrees, parse_station_file, STATION_FILE_HEADER_LINES};

pub const CRATE_NAME: &str = "metar-adapters";

pub const DEFAULT_BASE_URL: &str = "https://tgftp.nws.noaa.gov/data/observations/metar/decoded/";
pub const DEFAULT_STATIONS_URL: &str = "http://www.moratech.com/aviation/metar-stations.txt";

/// Query string asking the directory index to sort by modification time, newest first.
pub const NEWEST_FIRST_QUERY: &str = "?C=M;O=D";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("no table found in listing page")]
    NoTable,
    #[error("invalid selector {0}")]
    Selector(String),
    #[error("report has no location line")]
    MissingLocation,
    #[error("bad observation timestamp: {0}")]
    BadTimestamp(String),
    #[error("bad listing modification time: {0}")]
    BadLastModified(String),
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// A place METAR reports are listed and served from.
#[async_trait]
pub trait MetarSource: Send + Sync {
    fn source_id(&self) -> &'static str;

    /// Listing entries, newest first.
    async fn fetch_listing(&self) -> Result<Vec<ListingEntry>, SourceError>;

    async fn fetch_report(&self, entry: &ListingEntry) -> Result<RawReport, SourceError>;
}

/// The NOAA `observations/metar/decoded` directory.
#[derive(Debug, Clone)]
pub struct NoaaMetarSource {
    http: HttpFetcher,
    base_url: String,
}

impl NoaaMetarSource {
    pub fn new(http: HttpFetcher, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn listing_url(&self) -> String {
        format!("{}{}", self.base_url, NEWEST_FIRST_QUERY)
    }

    pub fn report_url(&self, entry: &ListingEntry) -> String {
        format!("{}{}", self.base_url, entry.station_id)
    }
}

#[async_trait]
impl MetarSource for NoaaMetarSource {
    fn source_id(&self) -> &'static str {
        "noaa-decoded"
    }

    async fn fetch_listing(&self) -> Result<Vec<ListingEntry>, SourceError> {
        let response = self.http.fetch_bytes(&self.listing_url()).await?;
        let html = String::from_utf8_lossy(&response.body);
        Ok(parse_listing(&html)?)
    }

    async fn fetch_report(&self, entry: &ListingEntry) -> Result<RawReport, SourceError> {
        let response = self.http.fetch_bytes(&self.report_url(entry)).await?;
        Ok(RawReport {
            entry: entry.clone(),
            body: response.body,
        })
    }
}
