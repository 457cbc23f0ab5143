use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metar_core::geo::BoundingBox;
use metar_core::{CoordinateRecord, ParsedReport, ProgressCursor, TimeRange};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use tracing::debug;

use crate::store::{CoordinateStore, ReportStore, StoreError, StoreOutcome};

/// Postgres-backed store. Uniqueness is enforced by the
/// `(name, last_modified_timestamp)` constraint, so concurrent writers stay idempotent.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn report_from_row(row: &PgRow) -> Result<ParsedReport, sqlx::Error> {
    let fields: Json<BTreeMap<String, String>> = row.try_get("fields")?;
    Ok(ParsedReport {
        name: row.try_get("name")?,
        timestamp: row.try_get("observed_at")?,
        last_modified_timestamp: row.try_get("last_modified_timestamp")?,
        fields: fields.0,
    })
}

fn coordinate_from_row(row: &PgRow) -> Result<CoordinateRecord, sqlx::Error> {
    Ok(CoordinateRecord {
        name: row.try_get("name")?,
        lat: row.try_get("lat")?,
        long: row.try_get("lon")?,
    })
}

#[async_trait]
impl ReportStore for PgStore {
    async fn insert_reports(&self, batch: &[ParsedReport]) -> Result<StoreOutcome, StoreError> {
        let mut outcome = StoreOutcome::default();
        if batch.is_empty() {
            return Ok(outcome);
        }

        let mut tx = self.pool.begin().await?;
        for report in batch {
            let result = sqlx::query(
                r#"
                INSERT INTO metar_reports (name, observed_at, last_modified_timestamp, fields)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (name, last_modified_timestamp) DO NOTHING
                "#,
            )
            .bind(&report.name)
            .bind(report.timestamp)
            .bind(report.last_modified_timestamp)
            .bind(Json(&report.fields))
            .execute(&mut *tx)
            .await?;
            outcome.record(result.rows_affected() > 0);
        }
        tx.commit().await?;

        debug!(inserted = outcome.inserted, skipped = outcome.skipped, "stored report batch");
        Ok(outcome)
    }

    async fn load_cursor(&self) -> Result<Option<ProgressCursor>, StoreError> {
        let row = sqlx::query("SELECT name, date FROM last_report WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(ProgressCursor {
                name: row.try_get("name")?,
                date: row.try_get("date")?,
            })),
            None => Ok(None),
        }
    }

    async fn save_cursor(&self, cursor: &ProgressCursor) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO last_report (id, name, date, updated_at)
            VALUES (1, $1, $2, now())
            ON CONFLICT (id) DO UPDATE
               SET name = EXCLUDED.name,
                   date = EXCLUDED.date,
                   updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&cursor.name)
        .bind(&cursor.date)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reports_for_stations(
        &self,
        names: &[String],
        range: Option<TimeRange>,
    ) -> Result<Vec<ParsedReport>, StoreError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let (start, end): (Option<DateTime<Utc>>, Option<DateTime<Utc>>) = match range {
            Some(range) => (Some(range.start), Some(range.end)),
            None => (None, None),
        };
        let rows = sqlx::query(
            r#"
            SELECT name, observed_at, last_modified_timestamp, fields
              FROM metar_reports
             WHERE name = ANY($1)
               AND ($2::timestamptz IS NULL OR last_modified_timestamp >= $2)
               AND ($3::timestamptz IS NULL OR last_modified_timestamp <= $3)
             ORDER BY name, last_modified_timestamp
            "#,
        )
        .bind(names)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(report_from_row(row)?);
        }
        Ok(out)
    }

    async fn count_reports(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM metar_reports")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl CoordinateStore for PgStore {
    async fn insert_coordinates(
        &self,
        records: &[CoordinateRecord],
    ) -> Result<StoreOutcome, StoreError> {
        let mut outcome = StoreOutcome::default();
        if records.is_empty() {
            return Ok(outcome);
        }

        let mut tx = self.pool.begin().await?;
        for record in records {
            let result = sqlx::query(
                r#"
                INSERT INTO station_coordinates (name, lat, lon)
                VALUES ($1, $2, $3)
                ON CONFLICT (name) DO NOTHING
                "#,
            )
            .bind(&record.name)
            .bind(record.lat)
            .bind(record.long)
            .execute(&mut *tx)
            .await?;
            outcome.record(result.rows_affected() > 0);
        }
        tx.commit().await?;
        Ok(outcome)
    }

    async fn count_coordinates(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM station_coordinates")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn coordinates_for(&self, name: &str) -> Result<Vec<CoordinateRecord>, StoreError> {
        let rows = sqlx::query("SELECT name, lat, lon FROM station_coordinates WHERE name = $1")
            .bind(name)
            .fetch_all(&self.pool)
            .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(coordinate_from_row(row)?);
        }
        Ok(out)
    }

    async fn coordinates_within(
        &self,
        bbox: &BoundingBox,
    ) -> Result<Vec<CoordinateRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT name, lat, lon
              FROM station_coordinates
             WHERE lat BETWEEN $1 AND $2
               AND lon BETWEEN $3 AND $4
             ORDER BY name
            "#,
        )
        .bind(bbox.min_lat)
        .bind(bbox.max_lat)
        .bind(bbox.min_lon)
        .bind(bbox.max_lon)
        .fetch_all(&self.pool)
        .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(coordinate_from_row(row)?);
        }
        Ok(out)
    }
}
