//! StorageGateway: parameterized query/execute over a bounded pool.
//!
//! Placeholders are positional (`$1..$n`). Every primitive runs in its own
//! transaction, committed before the connection goes back to the pool.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column, PgPool, Postgres, Row as _, TypeInfo};

use crate::{Row, SqlValue, StorageError};

#[async_trait]
pub trait StorageGateway: Send + Sync {
    async fn fetch_all(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, StorageError>;

    /// First row, if any.
    async fn fetch_one(&self, sql: &str, params: &[SqlValue]) -> Result<Option<Row>, StorageError>;

    /// Run a statement and commit. Returns the affected row count.
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64, StorageError>;
}

/// [`StorageGateway`] over a sqlx Postgres pool.
#[derive(Debug, Clone)]
pub struct PgGateway {
    pool: PgPool,
}

impl PgGateway {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn bind_all<'q>(
    mut q: Query<'q, Postgres, PgArguments>,
    params: &'q [SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    for p in params {
        q = match p {
            SqlValue::Null => q.bind(None::<String>),
            SqlValue::Bool(v) => q.bind(*v),
            SqlValue::Int(v) => q.bind(*v),
            SqlValue::Text(v) => q.bind(v.as_str()),
            SqlValue::Timestamp(v) => q.bind(*v),
        };
    }
    q
}

fn decode_row(row: &PgRow) -> Result<Row, StorageError> {
    let mut out = Vec::with_capacity(row.columns().len());
    for (idx, col) in row.columns().iter().enumerate() {
        let value = match col.type_info().name() {
            "INT8" => row.try_get::<Option<i64>, _>(idx)?.map(SqlValue::Int),
            "INT4" => row
                .try_get::<Option<i32>, _>(idx)?
                .map(|v| SqlValue::Int(i64::from(v))),
            "INT2" => row
                .try_get::<Option<i16>, _>(idx)?
                .map(|v| SqlValue::Int(i64::from(v))),
            "BOOL" => row.try_get::<Option<bool>, _>(idx)?.map(SqlValue::Bool),
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
                row.try_get::<Option<String>, _>(idx)?.map(SqlValue::Text)
            }
            "TIMESTAMPTZ" => row
                .try_get::<Option<DateTime<Utc>>, _>(idx)?
                .map(SqlValue::Timestamp),
            "TIMESTAMP" => row
                .try_get::<Option<NaiveDateTime>, _>(idx)?
                .map(|v| SqlValue::Timestamp(v.and_utc())),
            other => {
                return Err(StorageError::Decode(format!(
                    "column '{}' has unsupported type {other}",
                    col.name()
                )))
            }
        };
        out.push(value.unwrap_or(SqlValue::Null));
    }
    Ok(Row(out))
}

#[async_trait]
impl StorageGateway for PgGateway {
    async fn fetch_all(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, StorageError> {
        let mut tx = self.pool.begin().await?;
        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;
        rows.iter().map(decode_row).collect()
    }

    async fn fetch_one(&self, sql: &str, params: &[SqlValue]) -> Result<Option<Row>, StorageError> {
        let mut tx = self.pool.begin().await?;
        let row = bind_all(sqlx::query(sql), params)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        row.as_ref().map(decode_row).transpose()
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64, StorageError> {
        let mut tx = self.pool.begin().await?;
        let done = bind_all(sqlx::query(sql), params)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(done.rows_affected())
    }
}
