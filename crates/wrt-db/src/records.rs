//! Canonical record store operations used by the reconciliation engine.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use wrt_records::{MapKey, ScoreCandidate};

use crate::gateway::StorageGateway;
use crate::{SqlValue, StorageError};

/// Store-assigned id of a map row. Every provider identifier of a map
/// resolves to the same id.
pub type MapId = i64;

/// The stored best for one map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredRecord {
    pub score: i64,
    pub recorded_at: DateTime<Utc>,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Id of the map behind `key` when it exists and its stored score is
    /// strictly worse (greater) than `score`.
    async fn worse_record_map(&self, key: &MapKey, score: i64)
        -> Result<Option<MapId>, StorageError>;

    async fn current_record(&self, key: &MapKey) -> Result<Option<StoredRecord>, StorageError>;

    /// Mark the map's notification as pending with the given improvement.
    async fn arm_notification(
        &self,
        key: &MapKey,
        score_delta: i64,
        days_passed: i64,
    ) -> Result<u64, StorageError>;

    /// Replace score, holder, source and timestamp. Only touches the row if
    /// the stored score is still worse than the candidate's.
    async fn overwrite_record(&self, candidate: &ScoreCandidate) -> Result<u64, StorageError>;
}

fn key_param(key: &MapKey) -> SqlValue {
    match key {
        MapKey::Exchange(id) => SqlValue::Int(*id),
        MapKey::EngineUid(uid) => SqlValue::Text(uid.clone()),
    }
}

/// [`RecordStore`] over any [`StorageGateway`].
#[derive(Clone)]
pub struct SqlRecordStore {
    gateway: Arc<dyn StorageGateway>,
}

impl SqlRecordStore {
    pub fn new(gateway: Arc<dyn StorageGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl RecordStore for SqlRecordStore {
    async fn worse_record_map(
        &self,
        key: &MapKey,
        score: i64,
    ) -> Result<Option<MapId>, StorageError> {
        let sql = format!(
            "select r.map_id from map_records r join maps m on r.map_id = m.id \
             where r.score > $1 and m.{} = $2",
            key.column()
        );
        let row = self
            .gateway
            .fetch_one(&sql, &[SqlValue::Int(score), key_param(key)])
            .await?;
        row.map(|r| r.int(0)).transpose()
    }

    async fn current_record(&self, key: &MapKey) -> Result<Option<StoredRecord>, StorageError> {
        let sql = format!(
            "select r.score, r.recorded_at from map_records r join maps m on r.map_id = m.id \
             where m.{} = $1",
            key.column()
        );
        let Some(row) = self.gateway.fetch_one(&sql, &[key_param(key)]).await? else {
            return Ok(None);
        };
        let recorded_at = row
            .timestamp(1)?
            .ok_or_else(|| StorageError::Decode("map_records.recorded_at is null".to_string()))?;
        Ok(Some(StoredRecord {
            score: row.int(0)?,
            recorded_at,
        }))
    }

    async fn arm_notification(
        &self,
        key: &MapKey,
        score_delta: i64,
        days_passed: i64,
    ) -> Result<u64, StorageError> {
        let sql = format!(
            "insert into record_notifications (map_id, notified, score_delta, days_passed) \
             select m.id, false, $1, $2 from maps m where m.{} = $3 \
             on conflict (map_id) do update set notified = false, \
             score_delta = excluded.score_delta, days_passed = excluded.days_passed",
            key.column()
        );
        self.gateway
            .execute(
                &sql,
                &[
                    SqlValue::Int(score_delta),
                    SqlValue::Int(days_passed),
                    key_param(key),
                ],
            )
            .await
    }

    async fn overwrite_record(&self, candidate: &ScoreCandidate) -> Result<u64, StorageError> {
        let key = candidate.map_key();
        let sql = format!(
            "update map_records as r set score = $1, login = $2, nickname = $3, source = $4, \
             recorded_at = $5 from maps m \
             where r.map_id = m.id and m.{} = $6 and r.score > $1",
            key.column()
        );
        let holder = candidate.holder();
        self.gateway
            .execute(
                &sql,
                &[
                    SqlValue::Int(candidate.score()),
                    SqlValue::Text(holder.login.clone().unwrap_or_default()),
                    SqlValue::Text(holder.nickname.clone().unwrap_or_default()),
                    SqlValue::Text(candidate.source().as_str().to_string()),
                    SqlValue::Timestamp(candidate.recorded_at()),
                    key_param(key),
                ],
            )
            .await
    }
}
