use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use wrt_records::{RawRecord, SourceKind};
use wrt_sources::{FetchError, SourceConnector};

/// Provider double: hands out the same batch on every fetch, or a fixed
/// error once [`StaticConnector::failing`] is used.
pub struct StaticConnector {
    kind: SourceKind,
    batch: Mutex<Vec<RawRecord>>,
    error: Option<FetchError>,
    fetches: AtomicUsize,
}

impl StaticConnector {
    pub fn new(kind: SourceKind, batch: Vec<RawRecord>) -> Self {
        Self {
            kind,
            batch: Mutex::new(batch),
            error: None,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn failing(kind: SourceKind, error: FetchError) -> Self {
        Self {
            error: Some(error),
            ..Self::new(kind, Vec::new())
        }
    }

    /// Replace the batch returned by later fetches.
    pub fn set_batch(&self, batch: Vec<RawRecord>) {
        match self.batch.lock() {
            Ok(mut g) => *g = batch,
            Err(poisoned) => *poisoned.into_inner() = batch,
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceConnector for StaticConnector {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch(&self, _since: Option<DateTime<Utc>>) -> Result<Vec<RawRecord>, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        let batch = match self.batch.lock() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        Ok(batch)
    }
}
