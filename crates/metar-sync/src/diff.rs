use metar_core::{ListingEntry, ProgressCursor};

/// Index of the cursor entry in a newest-first listing, if the page still contains it.
pub fn cursor_position(listing: &[ListingEntry], cursor: Option<&ProgressCursor>) -> Option<usize> {
    let cursor = cursor?;
    listing.iter().position(|entry| cursor.matches(entry))
}

/// Entries newer than `cursor`, oldest first.
///
/// Everything above the cursor row is new. Without a cursor, or when the cursor
/// has scrolled off the page, the whole page is new.
///
/// Two listings rows with the same station and the same minute are
/// indistinguishable here; the second one is treated as already processed.
pub fn diff(cursor: Option<&ProgressCursor>, listing: &[ListingEntry]) -> Vec<ListingEntry> {
    let cut = cursor_position(listing, cursor).unwrap_or(listing.len());
    listing[..cut].iter().rev().cloned().collect()
}
