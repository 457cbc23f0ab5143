use metar_core::CoordinateRecord;
use tracing::debug;

/// Free-text preamble at the top of the stations file.
pub const STATION_FILE_HEADER_LINES: usize = 44;

const ICAO_COLUMNS: (usize, usize) = (19, 25);
const LAT_COLUMNS: (usize, usize) = (38, 46);
const LON_COLUMNS: (usize, usize) = (46, 55);

fn column(chars: &[char], (start, end): (usize, usize)) -> String {
    let start = start.min(chars.len());
    let end = end.min(chars.len());
    chars[start..end].iter().collect::<String>().trim().to_string()
}

/// `"37 20N"` -> `37.333..`; south and west are negative.
pub fn convert_to_decimal_degrees(coord: &str) -> Option<f64> {
    let mut parts = coord.split_whitespace();
    let degrees: f64 = parts.next()?.parse().ok()?;
    let minutes = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let hemisphere = minutes.chars().last()?;
    let minutes: f64 = minutes[..minutes.len() - hemisphere.len_utf8()].parse().ok()?;
    let value = degrees + minutes / 60.0;

    match hemisphere {
        'N' | 'E' => Some(value),
        'S' | 'W' => Some(-value),
        _ => None,
    }
}

/// Parses the fixed-width station table, skipping the header and any row
/// whose ICAO code or coordinates do not have the expected widths.
pub fn parse_station_file(text: &str) -> Vec<CoordinateRecord> {
    let mut records = Vec::new();
    for line in text.lines().skip(STATION_FILE_HEADER_LINES) {
        let chars: Vec<char> = line.chars().collect();
        let icao = column(&chars, ICAO_COLUMNS);
        let lat = column(&chars, LAT_COLUMNS);
        let long = column(&chars, LON_COLUMNS);

        if !(icao.chars().count() == 4 && lat.chars().count() == 6 && long.chars().count() == 7) {
            debug!(icao = %icao, lat = %lat, long = %long, "skipping station row");
            continue;
        }

        match (convert_to_decimal_degrees(&lat), convert_to_decimal_degrees(&long)) {
            (Some(lat), Some(long)) => records.push(CoordinateRecord {
                name: icao,
                lat,
                long,
            }),
            _ => debug!(icao = %icao, lat = %lat, long = %long, "skipping station row with unreadable coordinates"),
        }
    }
    records
}
