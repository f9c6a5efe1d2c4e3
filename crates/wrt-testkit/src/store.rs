use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use wrt_db::{MapId, RecordStore, StorageError, StoredRecord};
use wrt_records::{MapKey, ScoreCandidate, SourceKind, UNKNOWN_RECORDED_AT};

/// One stored map record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRecord {
    pub score: i64,
    pub login: String,
    pub nickname: String,
    pub source: Option<SourceKind>,
    pub recorded_at: DateTime<Utc>,
}

/// The pending-notification side record of one map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    pub notified: bool,
    pub score_delta: i64,
    pub days_passed: i64,
}

#[derive(Default)]
struct Inner {
    ids: HashMap<MapKey, MapId>,
    next_id: MapId,
    records: HashMap<MapId, MemoryRecord>,
    notifications: HashMap<MapId, Notification>,
    fail_next: Option<StorageError>,
    fail_overwrite: Option<(usize, StorageError)>,
    writes: usize,
    queries: usize,
}

impl Inner {
    fn id_of(&self, key: &MapKey) -> Option<MapId> {
        self.ids.get(key).copied()
    }
}

/// [`RecordStore`] backed by hash maps.
///
/// Maps get sequential ids; several keys may name the same map (see
/// [`MemoryRecordStore::alias`]). Guards match `SqlRecordStore`:
/// notifications are only armed for known maps, and overwrites only land on
/// strictly worse stored scores.
#[derive(Default)]
pub struct MemoryRecordStore {
    inner: Mutex<Inner>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Insert a map with a stored score and an unknown timestamp.
    pub fn seed(&self, key: MapKey, score: i64) -> MapId {
        self.seed_at(key, score, UNKNOWN_RECORDED_AT)
    }

    /// Insert a map, or replace the record of the map `key` already names.
    pub fn seed_at(&self, key: MapKey, score: i64, recorded_at: DateTime<Utc>) -> MapId {
        let mut g = self.lock();
        let id = match g.id_of(&key) {
            Some(id) => id,
            None => {
                g.next_id += 1;
                let id = g.next_id;
                g.ids.insert(key, id);
                id
            }
        };
        g.records.insert(
            id,
            MemoryRecord {
                score,
                login: String::new(),
                nickname: String::new(),
                source: None,
                recorded_at,
            },
        );
        id
    }

    /// Make `other` a second identifier of the map `existing` names.
    pub fn alias(&self, existing: &MapKey, other: MapKey) {
        let mut g = self.lock();
        if let Some(id) = g.id_of(existing) {
            g.ids.insert(other, id);
        }
    }

    /// The next store call of any kind fails with `err`.
    pub fn fail_next(&self, err: StorageError) {
        self.lock().fail_next = Some(err);
    }

    /// The next `overwrite_record` fails with `err`; other calls succeed.
    pub fn fail_next_overwrite(&self, err: StorageError) {
        self.fail_overwrite_after(0, err);
    }

    /// Let `skip` overwrites through, then fail the next one with `err`.
    pub fn fail_overwrite_after(&self, skip: usize, err: StorageError) {
        self.lock().fail_overwrite = Some((skip, err));
    }

    /// Flip a map's notification to delivered, as the notifier would.
    pub fn mark_notified(&self, key: &MapKey) {
        let mut g = self.lock();
        if let Some(id) = g.id_of(key) {
            if let Some(n) = g.notifications.get_mut(&id) {
                n.notified = true;
            }
        }
    }

    pub fn score_of(&self, key: &MapKey) -> Option<i64> {
        self.record_of(key).map(|r| r.score)
    }

    pub fn record_of(&self, key: &MapKey) -> Option<MemoryRecord> {
        let g = self.lock();
        g.id_of(key).and_then(|id| g.records.get(&id).cloned())
    }

    pub fn notification_of(&self, key: &MapKey) -> Option<Notification> {
        let g = self.lock();
        g.id_of(key).and_then(|id| g.notifications.get(&id).copied())
    }

    /// Rows changed by notification arms and overwrites so far.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    /// Store calls served so far, failed ones included.
    pub fn query_count(&self) -> usize {
        self.lock().queries
    }

    fn begin(&self) -> Result<MutexGuard<'_, Inner>, StorageError> {
        let mut g = self.lock();
        g.queries += 1;
        match g.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(g),
        }
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn worse_record_map(
        &self,
        key: &MapKey,
        score: i64,
    ) -> Result<Option<MapId>, StorageError> {
        let g = self.begin()?;
        Ok(g.id_of(key)
            .filter(|id| g.records.get(id).is_some_and(|r| r.score > score)))
    }

    async fn current_record(&self, key: &MapKey) -> Result<Option<StoredRecord>, StorageError> {
        let g = self.begin()?;
        Ok(g.id_of(key).and_then(|id| g.records.get(&id)).map(|r| StoredRecord {
            score: r.score,
            recorded_at: r.recorded_at,
        }))
    }

    async fn arm_notification(
        &self,
        key: &MapKey,
        score_delta: i64,
        days_passed: i64,
    ) -> Result<u64, StorageError> {
        let mut g = self.begin()?;
        let Some(id) = g.id_of(key) else {
            return Ok(0);
        };
        g.notifications.insert(
            id,
            Notification {
                notified: false,
                score_delta,
                days_passed,
            },
        );
        g.writes += 1;
        Ok(1)
    }

    async fn overwrite_record(&self, candidate: &ScoreCandidate) -> Result<u64, StorageError> {
        let mut g = self.begin()?;
        match g.fail_overwrite.take() {
            Some((0, err)) => return Err(err),
            Some((skip, err)) => g.fail_overwrite = Some((skip - 1, err)),
            None => {}
        }
        let Some(id) = g.id_of(candidate.map_key()) else {
            return Ok(0);
        };
        let Some(record) = g.records.get_mut(&id) else {
            return Ok(0);
        };
        if record.score <= candidate.score() {
            return Ok(0);
        }
        let holder = candidate.holder();
        *record = MemoryRecord {
            score: candidate.score(),
            login: holder.login.clone().unwrap_or_default(),
            nickname: holder.nickname.clone().unwrap_or_default(),
            source: Some(candidate.source()),
            recorded_at: candidate.recorded_at(),
        };
        g.writes += 1;
        Ok(1)
    }
}
