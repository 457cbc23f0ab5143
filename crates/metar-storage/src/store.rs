use async_trait::async_trait;
use metar_core::geo::BoundingBox;
use metar_core::{CoordinateRecord, ParsedReport, ProgressCursor, TimeRange};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Result of an insert-if-absent batch. Existing keys count as `skipped`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreOutcome {
    pub inserted: usize,
    pub skipped: usize,
}

impl StoreOutcome {
    pub fn record(&mut self, inserted: bool) {
        if inserted {
            self.inserted += 1;
        } else {
            self.skipped += 1;
        }
    }
}

/// Reports keyed by `(name, last_modified_timestamp)` plus the single progress cursor.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Inserts every report whose key is not stored yet; never touches existing rows.
    async fn insert_reports(&self, batch: &[ParsedReport]) -> Result<StoreOutcome, StoreError>;

    async fn load_cursor(&self) -> Result<Option<ProgressCursor>, StoreError>;

    /// Replaces the cursor wholesale.
    async fn save_cursor(&self, cursor: &ProgressCursor) -> Result<(), StoreError>;

    /// Reports for any of `names`, ordered by name then modification time.
    async fn reports_for_stations(
        &self,
        names: &[String],
        range: Option<TimeRange>,
    ) -> Result<Vec<ParsedReport>, StoreError>;

    async fn count_reports(&self) -> Result<u64, StoreError>;

    async fn reports_for_station(
        &self,
        name: &str,
        range: Option<TimeRange>,
    ) -> Result<Vec<ParsedReport>, StoreError> {
        self.reports_for_stations(&[name.to_string()], range).await
    }
}

/// Station reference positions, written once by the coordinate loader.
#[async_trait]
pub trait CoordinateStore: Send + Sync {
    async fn insert_coordinates(
        &self,
        records: &[CoordinateRecord],
    ) -> Result<StoreOutcome, StoreError>;

    async fn count_coordinates(&self) -> Result<u64, StoreError>;

    async fn coordinates_for(&self, name: &str) -> Result<Vec<CoordinateRecord>, StoreError>;

    async fn coordinates_within(
        &self,
        bbox: &BoundingBox,
    ) -> Result<Vec<CoordinateRecord>, StoreError>;
}

pub trait MetarStore: ReportStore + CoordinateStore {}

impl<T: ReportStore + CoordinateStore + ?Sized> MetarStore for T {}
