//! One-time import of station positions from the fixed-width stations file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use metar_adapters::parse_station_file;
use metar_storage::{CoordinateStore, HttpFetcher, StoreOutcome};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct CoordinateLoader {
    http: HttpFetcher,
    url: String,
    cache_path: PathBuf,
}

impl CoordinateLoader {
    pub fn new(http: HttpFetcher, url: impl Into<String>, cache_path: impl Into<PathBuf>) -> Self {
        Self {
            http,
            url: url.into(),
            cache_path: cache_path.into(),
        }
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Downloads the stations file unless a cached copy is already on disk.
    pub async fn ensure_station_file(&self) -> Result<&Path> {
        if fs::try_exists(&self.cache_path)
            .await
            .with_context(|| format!("checking {}", self.cache_path.display()))?
        {
            debug!(path = %self.cache_path.display(), "stations file already cached");
            return Ok(&self.cache_path);
        }

        let response = self
            .http
            .fetch_bytes(&self.url)
            .await
            .with_context(|| format!("downloading {}", self.url))?;
        write_atomically(&self.cache_path, &response.body).await?;
        info!(path = %self.cache_path.display(), bytes = response.body.len(), "stations file downloaded");
        Ok(&self.cache_path)
    }

    pub async fn load<S>(&self, store: &S) -> Result<StoreOutcome>
    where
        S: CoordinateStore + ?Sized,
    {
        let path = self.ensure_station_file().await?;
        let bytes = fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let records = parse_station_file(&String::from_utf8_lossy(&bytes));
        let outcome = store
            .insert_coordinates(&records)
            .await
            .context("storing station coordinates")?;
        info!(
            parsed = records.len(),
            inserted = outcome.inserted,
            skipped = outcome.skipped,
            "coordinates parsed"
        );
        Ok(outcome)
    }

    /// Loads coordinates only when the collection is still empty.
    pub async fn ensure_loaded<S>(&self, store: &S) -> Result<Option<StoreOutcome>>
    where
        S: CoordinateStore + ?Sized,
    {
        let existing = store
            .count_coordinates()
            .await
            .context("counting station coordinates")?;
        if existing > 0 {
            debug!(existing, "station coordinates already loaded");
            return Ok(None);
        }
        self.load(store).await.map(Some)
    }
}

async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "stations".to_string());
    let temp_path = path.with_file_name(format!(".{file_name}.tmp"));

    let mut file = fs::File::create(&temp_path)
        .await
        .with_context(|| format!("opening temp file {}", temp_path.display()))?;
    file.write_all(bytes)
        .await
        .with_context(|| format!("writing temp file {}", temp_path.display()))?;
    file.flush()
        .await
        .with_context(|| format!("flushing temp file {}", temp_path.display()))?;
    drop(file);

    if let Err(err) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(err).with_context(|| {
            format!("renaming {} -> {}", temp_path.display(), path.display())
        });
    }
    Ok(())
}
