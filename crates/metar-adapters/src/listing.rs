use metar_core::ListingEntry;
use scraper::{ElementRef, Html, Selector};

use crate::ParseError;

/// Per-station report files are served as `<ICAO>.TXT`.
pub const REPORT_FILE_SUFFIX: &str = ".txt";

fn selector(selector: &str) -> Result<Selector, ParseError> {
    Selector::parse(selector).map_err(|e| ParseError::Selector(e.to_string()))
}

fn cell_texts(row: ElementRef<'_>, cell: &Selector) -> Vec<String> {
    row.select(cell)
        .take(2)
        .map(|td| td.text().collect::<String>().trim().to_string())
        .collect()
}

/// Extracts `(file, last modified)` pairs from a directory index page, in page order.
///
/// Only the first table is read. Header and parent-directory rows are dropped
/// because their first cell is not a report file.
pub fn parse_listing(html: &str) -> Result<Vec<ListingEntry>, ParseError> {
    let document = Html::parse_document(html);
    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("td")?;

    let table = document.select(&table_sel).next().ok_or(ParseError::NoTable)?;

    Ok(table
        .select(&row_sel)
        .filter_map(|row| {
            let mut cells = cell_texts(row, &cell_sel).into_iter();
            let file = cells.next()?;
            let modified = cells.next()?;
            is_report_file(&file).then(|| ListingEntry::new(file, modified))
        })
        .collect())
}

fn is_report_file(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(REPORT_FILE_SUFFIX)
}
