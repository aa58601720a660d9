use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use sqlx::{Row, SqlitePool, migrate::Migrator, sqlite::SqliteConnectOptions, sqlite::SqliteRow};
use thiserror::Error;
use time::OffsetDateTime;

use crate::paths::{PathError, validate_path};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid cache path: {0}")]
    InvalidPath(#[from] PathError),
    #[error("cache entry missing after write: {0}")]
    MissingEntry(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    pub path: String,
    pub file_id: String,
    pub html: Option<String>,
    pub modified: i64,
}

/// What a path lookup means for serving: nothing stored, a placeholder with no
/// rendered body, or a servable body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Miss,
    EmptyBody,
    Found(String),
}

impl CacheLookup {
    /// Entries are expected newest first; the newest one decides.
    pub fn from_entries(entries: Vec<CacheEntry>) -> Self {
        match entries.into_iter().next() {
            None => CacheLookup::Miss,
            Some(CacheEntry { html: None, .. }) => CacheLookup::EmptyBody,
            Some(CacheEntry { html: Some(html), .. }) if html.is_empty() => CacheLookup::EmptyBody,
            Some(CacheEntry { html: Some(html), .. }) => CacheLookup::Found(html),
        }
    }

    pub fn into_html(self) -> Option<String> {
        match self {
            CacheLookup::Found(html) => Some(html),
            CacheLookup::Miss | CacheLookup::EmptyBody => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeRequest {
    pub url: String,
    /// Only entries at least this old are removed; `None` removes unconditionally.
    pub modified: Option<i64>,
    /// Only an entry owned by this file is removed.
    pub file_id: Option<String>,
}

#[async_trait]
pub trait PageCache: Send + Sync {
    /// Registers or overwrites the entry for `path`.
    async fn add(
        &self,
        file_id: &str,
        modified: i64,
        path: &str,
        html: Option<&str>,
    ) -> Result<CacheEntry, CacheError>;

    /// Entries stored for `path`, newest first.
    async fn get(&self, path: &str) -> Result<Vec<CacheEntry>, CacheError>;

    /// Returns whether anything was removed. Purging an absent path is not an error.
    async fn purge(&self, request: &PurgeRequest) -> Result<bool, CacheError>;

    async fn lookup(&self, path: &str) -> Result<CacheLookup, CacheError> {
        Ok(CacheLookup::from_entries(self.get(path).await?))
    }

    /// Like `lookup`, but an entry written for another file is a miss.
    async fn lookup_for(&self, path: &str, file_id: &str) -> Result<CacheLookup, CacheError> {
        let entries = self
            .get(path)
            .await?
            .into_iter()
            .filter(|entry| entry.file_id == file_id)
            .collect();
        Ok(CacheLookup::from_entries(entries))
    }
}

/// Hands out millisecond timestamps that never repeat or go backwards, so two
/// writes in the same millisecond still order.
#[derive(Debug, Default)]
pub struct ModifiedClock {
    last: AtomicI64,
}

impl ModifiedClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> i64 {
        let now = now_millis();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last.saturating_add(1));
            match self
                .last
                .compare_exchange_weak(last, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }
}

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

pub struct SqliteCache {
    pool: SqlitePool,
}

impl SqliteCache {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn new(database_url: &str) -> Result<Self, CacheError> {
        let pool = SqlitePool::connect(database_url).await?;
        let cache = Self { pool };
        cache.init().await?;
        Ok(cache)
    }

    pub async fn open(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        let cache = Self { pool };
        cache.init().await?;
        Ok(cache)
    }

    pub async fn init(&self) -> Result<(), CacheError> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    pub async fn len(&self) -> Result<i64, CacheError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM cache_entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("total")?)
    }
}

#[async_trait]
impl PageCache for SqliteCache {
    async fn add(
        &self,
        file_id: &str,
        modified: i64,
        path: &str,
        html: Option<&str>,
    ) -> Result<CacheEntry, CacheError> {
        validate_path(path)?;
        sqlx::query(
            "INSERT INTO cache_entries (path, file_id, html, modified)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(path) DO UPDATE SET
                file_id = excluded.file_id,
                html = excluded.html,
                modified = excluded.modified",
        )
        .bind(path)
        .bind(file_id)
        .bind(html)
        .bind(modified)
        .execute(&self.pool)
        .await?;

        self.get(path)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CacheError::MissingEntry(path.to_string()))
    }

    async fn get(&self, path: &str) -> Result<Vec<CacheEntry>, CacheError> {
        let rows = sqlx::query(
            "SELECT path, file_id, html, modified FROM cache_entries
             WHERE path = ?1
             ORDER BY modified DESC",
        )
        .bind(path)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(entry_from_row).collect()
    }

    async fn purge(&self, request: &PurgeRequest) -> Result<bool, CacheError> {
        validate_path(&request.url)?;
        let result = sqlx::query(
            "DELETE FROM cache_entries
             WHERE path = ?1
               AND (?2 IS NULL OR modified <= ?2)
               AND (?3 IS NULL OR file_id = ?3)",
        )
        .bind(&request.url)
        .bind(request.modified)
        .bind(request.file_id.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn entry_from_row(row: &SqliteRow) -> Result<CacheEntry, CacheError> {
    Ok(CacheEntry {
        path: row.try_get("path")?,
        file_id: row.try_get("file_id")?,
        html: row.try_get("html")?,
        modified: row.try_get("modified")?,
    })
}

pub fn default_db_path() -> Option<PathBuf> {
    let mut path = dirs::data_dir()?;
    path.push("librarian");
    path.push("cache.db");
    Some(path)
}
