use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};

use crate::error::{Result, StorageError};
use crate::record::{MetadataRecord, RecordStatus, RequestId};

pub const MAX_SCAN_LIMIT: u32 = 100;

const CREATE_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS records (
    id TEXT PRIMARY KEY NOT NULL,
    filename TEXT NOT NULL,
    pages INTEGER NOT NULL,
    text_length INTEGER NOT NULL,
    status TEXT NOT NULL,
    status_rank INTEGER NOT NULL,
    artifacts TEXT NOT NULL,
    model TEXT,
    usage TEXT,
    created_at TEXT NOT NULL,
    error TEXT
)";

const UPSERT: &str = "\
INSERT INTO records
    (id, filename, pages, text_length, status, status_rank, artifacts, model, usage, created_at, error)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT(id) DO UPDATE SET
    filename = excluded.filename,
    pages = excluded.pages,
    text_length = excluded.text_length,
    status = excluded.status,
    status_rank = excluded.status_rank,
    artifacts = excluded.artifacts,
    model = excluded.model,
    usage = excluded.usage,
    created_at = excluded.created_at,
    error = excluded.error
WHERE records.status_rank <= excluded.status_rank";

const SELECT_COLUMNS: &str = "\
SELECT id, filename, pages, text_length, status, artifacts, model, usage, created_at, error
FROM records";

const NEWEST_FIRST: &str = "ORDER BY created_at DESC, id DESC LIMIT ?";

/// Durable status records, one row per request id.
#[derive(Debug, Clone)]
pub struct MetadataRegistry {
    pool: SqlitePool,
}

impl MetadataRegistry {
    /// Open (or create) the `SQLite` database at `path` and ensure the table exists.
    ///
    /// `":memory:"` opens a private in-memory database on a single pinned connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the table cannot be created.
    pub async fn connect(path: &str) -> Result<Self> {
        let in_memory = path == ":memory:";
        let url = if in_memory {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let opts = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool_opts = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_opts.connect_with(opts).await?;

        let registry = Self { pool };
        registry.ensure_table().await?;
        Ok(registry)
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// # Errors
    ///
    /// Returns an error if the DDL statement fails.
    pub async fn ensure_table(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    /// Insert or update a record. An existing row is only replaced when the incoming
    /// status ranks at least as high; returns whether the row was written.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn put(&self, record: &MetadataRecord) -> Result<bool> {
        self.ensure_table().await?;

        let artifacts = serde_json::to_string(&record.artifacts)?;
        let usage = match record.usage {
            Some(usage) => Some(serde_json::to_string(&usage)?),
            None => None,
        };
        let result = sqlx::query(UPSERT)
            .bind(record.id.to_string())
            .bind(&record.filename)
            .bind(i64::from(record.pages))
            .bind(i64::try_from(record.text_length)?)
            .bind(record.status.as_str())
            .bind(record.status.rank())
            .bind(artifacts)
            .bind(record.model.as_deref())
            .bind(usage)
            .bind(record.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true))
            .bind(record.error.as_deref())
            .execute(&self.pool)
            .await?;

        let written = result.rows_affected() > 0;
        if !written {
            tracing::debug!(
                id = %record.id,
                status = %record.status,
                "registry kept higher-ranked status"
            );
        }
        Ok(written)
    }

    /// # Errors
    ///
    /// Returns an error if the query fails or the stored row cannot be decoded.
    pub async fn get(&self, id: RequestId) -> Result<Option<MetadataRecord>> {
        let row: Option<RecordRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(MetadataRecord::try_from).transpose()
    }

    /// Most recent records first, `limit` clamped to `1..=100`.
    ///
    /// Never fails: backend errors are logged and yield an empty list, and rows
    /// that cannot be decoded are skipped.
    pub async fn scan(&self, limit: u32) -> Vec<MetadataRecord> {
        let limit = i64::from(limit.clamp(1, MAX_SCAN_LIMIT));
        let query = format!("{SELECT_COLUMNS} {NEWEST_FIRST}");
        let rows: Vec<RecordRow> = match sqlx::query_as(&query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!("registry scan failed: {e:#}");
                return Vec::new();
            }
        };

        rows.into_iter()
            .filter_map(|row| {
                let id = row.id.clone();
                MetadataRecord::try_from(row)
                    .inspect_err(|e| tracing::warn!(id, "skipping undecodable record: {e:#}"))
                    .ok()
            })
            .collect()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[derive(sqlx::FromRow)]
struct RecordRow {
    id: String,
    filename: String,
    pages: i64,
    text_length: i64,
    status: String,
    artifacts: String,
    model: Option<String>,
    usage: Option<String>,
    created_at: String,
    error: Option<String>,
}

impl TryFrom<RecordRow> for MetadataRecord {
    type Error = StorageError;

    fn try_from(row: RecordRow) -> Result<Self> {
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|e| {
                StorageError::Corrupt(format!("created_at {:?}: {e}", row.created_at))
            })?
            .with_timezone(&Utc);
        Ok(Self {
            id: row.id.parse()?,
            filename: row.filename,
            pages: u32::try_from(row.pages)?,
            text_length: u64::try_from(row.text_length)?,
            status: row.status.parse()?,
            artifacts: serde_json::from_str(&row.artifacts)?,
            model: row.model,
            usage: row.usage.as_deref().map(serde_json::from_str).transpose()?,
            created_at,
            error: row.error,
        })
    }
}
