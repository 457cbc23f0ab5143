use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use metar_core::{ListingEntry, ParsedReport};

use crate::ParseError;

const OBSERVATION_DATE_FORMAT: &str = "%Y.%m.%d";
const OBSERVATION_TIME_FORMAT: &str = "%H%M";
const UTC_ZONES: [&str; 3] = ["UTC", "GMT", "Z"];

/// Decoded reports are served as single-byte text; every byte maps to the same code point.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Reads the `YYYY.MM.DD HHMM UTC` token that follows the last `/` on a line.
pub fn parse_observation_time(line: &str) -> Result<DateTime<Utc>, ParseError> {
    let bad = || ParseError::BadTimestamp(line.trim().to_string());

    let (_, token) = line.rsplit_once('/').ok_or_else(bad)?;
    let mut parts = token.split_whitespace();
    let (Some(date), Some(time), Some(zone), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(bad());
    };

    if !UTC_ZONES.contains(&zone) {
        return Err(bad());
    }
    let date = NaiveDate::parse_from_str(date, OBSERVATION_DATE_FORMAT).map_err(|_| bad())?;
    let time = NaiveTime::parse_from_str(time, OBSERVATION_TIME_FORMAT).map_err(|_| bad())?;
    Ok(date.and_time(time).and_utc())
}

/// Turns one decoded report body into a stored record.
///
/// Line 0 is the station label, line 1 carries the observation time, and every
/// later `key: value` line becomes a field with a lower-cased key.
pub fn parse_report(body: &[u8], entry: &ListingEntry) -> Result<ParsedReport, ParseError> {
    let text = decode_latin1(body);
    let mut lines = text.lines();

    match lines.next() {
        Some(label) if !label.trim().is_empty() => {}
        _ => return Err(ParseError::MissingLocation),
    }

    let time_line = lines
        .next()
        .ok_or_else(|| ParseError::BadTimestamp("missing observation time line".to_string()))?;
    let timestamp = parse_observation_time(time_line)?;

    let mut fields = BTreeMap::new();
    for line in lines {
        if let Some((key, value)) = line.trim().split_once(':') {
            fields.insert(key.trim().to_lowercase(), value.trim().to_string());
        }
    }

    let last_modified_timestamp = entry
        .last_modified_at()
        .map_err(|_| ParseError::BadLastModified(entry.last_modified.clone()))?;

    Ok(ParsedReport {
        name: entry.station_name().to_string(),
        timestamp,
        last_modified_timestamp,
        fields,
    })
}
