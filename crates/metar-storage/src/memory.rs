use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use async_trait::async_trait;
use metar_core::geo::BoundingBox;
use metar_core::{CoordinateRecord, ParsedReport, ProgressCursor, ReportKey, TimeRange};
use tokio::sync::Mutex;

use crate::store::{CoordinateStore, ReportStore, StoreError, StoreOutcome};

/// Process-local store with the same uniqueness rules as the database.
/// Used by tests and `--memory` dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    reports: BTreeMap<ReportKey, ParsedReport>,
    cursor: Option<ProgressCursor>,
    coordinates: BTreeMap<String, CoordinateRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn insert_reports(&self, batch: &[ParsedReport]) -> Result<StoreOutcome, StoreError> {
        let mut state = self.state.lock().await;
        let mut outcome = StoreOutcome::default();
        for report in batch {
            let inserted = match state.reports.entry(report.key()) {
                Entry::Vacant(slot) => {
                    slot.insert(report.clone());
                    true
                }
                Entry::Occupied(_) => false,
            };
            outcome.record(inserted);
        }
        Ok(outcome)
    }

    async fn load_cursor(&self) -> Result<Option<ProgressCursor>, StoreError> {
        Ok(self.state.lock().await.cursor.clone())
    }

    async fn save_cursor(&self, cursor: &ProgressCursor) -> Result<(), StoreError> {
        self.state.lock().await.cursor = Some(cursor.clone());
        Ok(())
    }

    async fn reports_for_stations(
        &self,
        names: &[String],
        range: Option<TimeRange>,
    ) -> Result<Vec<ParsedReport>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .reports
            .values()
            .filter(|r| names.iter().any(|n| *n == r.name))
            .filter(|r| range.map_or(true, |range| range.contains(r.last_modified_timestamp)))
            .cloned()
            .collect())
    }

    async fn count_reports(&self) -> Result<u64, StoreError> {
        Ok(self.state.lock().await.reports.len() as u64)
    }
}

#[async_trait]
impl CoordinateStore for MemoryStore {
    async fn insert_coordinates(
        &self,
        records: &[CoordinateRecord],
    ) -> Result<StoreOutcome, StoreError> {
        let mut state = self.state.lock().await;
        let mut outcome = StoreOutcome::default();
        for record in records {
            let inserted = match state.coordinates.entry(record.name.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(record.clone());
                    true
                }
                Entry::Occupied(_) => false,
            };
            outcome.record(inserted);
        }
        Ok(outcome)
    }

    async fn count_coordinates(&self) -> Result<u64, StoreError> {
        Ok(self.state.lock().await.coordinates.len() as u64)
    }

    async fn coordinates_for(&self, name: &str) -> Result<Vec<CoordinateRecord>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.coordinates.get(name).cloned().into_iter().collect())
    }

    async fn coordinates_within(
        &self,
        bbox: &BoundingBox,
    ) -> Result<Vec<CoordinateRecord>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .coordinates
            .values()
            .filter(|c| bbox.contains(c.lat, c.long))
            .cloned()
            .collect())
    }
}
