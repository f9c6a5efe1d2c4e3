//! wrt-db
//!
//! Storage boundary: a bounded Postgres pool behind the [`StorageGateway`]
//! primitives, and the SQL [`RecordStore`] the reconciliation engine reads
//! and writes through.

pub mod gateway;
pub mod records;

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};

pub use gateway::{PgGateway, StorageGateway};
pub use records::{MapId, RecordStore, SqlRecordStore, StoredRecord};

pub const ENV_DB_URL: &str = "WRT_DATABASE_URL";

// ---------------------------------------------------------------------------
// Values and rows
// ---------------------------------------------------------------------------

/// A positional query parameter or a decoded column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}

/// An ordered value tuple, one entry per selected column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row(pub Vec<SqlValue>);

impl Row {
    pub fn get(&self, idx: usize) -> Option<&SqlValue> {
        self.0.get(idx)
    }

    pub fn int(&self, idx: usize) -> Result<i64, StorageError> {
        match self.get(idx) {
            Some(SqlValue::Int(v)) => Ok(*v),
            other => Err(StorageError::Decode(format!("column {idx}: expected int, got {other:?}"))),
        }
    }

    /// Text column; SQL NULL reads as `None`.
    pub fn text(&self, idx: usize) -> Result<Option<String>, StorageError> {
        match self.get(idx) {
            Some(SqlValue::Text(v)) => Ok(Some(v.clone())),
            Some(SqlValue::Null) => Ok(None),
            other => Err(StorageError::Decode(format!("column {idx}: expected text, got {other:?}"))),
        }
    }

    /// Timestamp column; SQL NULL reads as `None`.
    pub fn timestamp(&self, idx: usize) -> Result<Option<DateTime<Utc>>, StorageError> {
        match self.get(idx) {
            Some(SqlValue::Timestamp(v)) => Ok(Some(*v)),
            Some(SqlValue::Null) => Ok(None),
            other => Err(StorageError::Decode(format!(
                "column {idx}: expected timestamp, got {other:?}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Storage failure. Fatal to the running cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// No pooled connection became available within the acquire timeout.
    PoolTimeout,
    /// The statement failed (connection loss, SQL error, ...).
    Query(String),
    /// A result column could not be mapped to a [`SqlValue`].
    Decode(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::PoolTimeout => write!(f, "timed out acquiring a pooled connection"),
            StorageError::Query(msg) => write!(f, "query failed: {msg}"),
            StorageError::Decode(msg) => write!(f, "row decode failed: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut => StorageError::PoolTimeout,
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StorageError::Decode(e.to_string())
            }
            other => StorageError::Query(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Pool bootstrap
// ---------------------------------------------------------------------------

/// Fixed pool capacity and the bound on waiting for a connection.
#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// Connect a bounded pool to `url`.
pub async fn connect(url: &str, settings: PoolSettings) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(pool)
}

/// Connect using WRT_DATABASE_URL.
pub async fn connect_from_env(settings: PoolSettings) -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url, settings).await
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}
