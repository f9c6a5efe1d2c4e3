//! UpdateOrchestrator: one per job type.
//!
//! A cycle is IDLE -> ACQUIRING_LOCK -> RUNNING -> IDLE, or
//! ACQUIRING_LOCK -> LOCK_BUSY -> IDLE when the job's lock is not obtained
//! within the configured wait. Lock busy is reported as a skipped cycle, not
//! an error. The lock guards the job's own state (its poll counters), so a
//! counter only moves inside a cycle that holds it.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::Instrument;
use uuid::Uuid;
use wrt_auth::AuthError;
use wrt_db::StorageError;
use wrt_records::SourceKind;
use wrt_sources::FetchError;

// ---------------------------------------------------------------------------
// PollCounter
// ---------------------------------------------------------------------------

/// Rotating counter in `0..modulus`. Throttles sub-polls across cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollCounter {
    value: usize,
    modulus: usize,
}

impl PollCounter {
    pub fn new(modulus: usize) -> Self {
        Self {
            value: 0,
            modulus: modulus.max(1),
        }
    }

    pub fn value(&self) -> usize {
        self.value
    }

    /// True on the last slot of the rotation, i.e. once every `modulus` cycles.
    pub fn is_due(&self) -> bool {
        self.value == self.modulus - 1
    }

    pub fn advance(&mut self) {
        self.value = (self.value + 1) % self.modulus;
    }

    /// Current slot projected onto a rotation of `len` (which may differ from
    /// the last one, e.g. when the campaign list changed).
    pub fn slot_within(&self, len: usize) -> usize {
        if len == 0 {
            0
        } else {
            self.value % len
        }
    }

    /// Move to the slot after `slot` in a rotation of `len`.
    pub fn advance_past(&mut self, slot: usize, len: usize) {
        self.modulus = len.max(1);
        self.value = (slot + 1) % self.modulus;
    }
}

// ---------------------------------------------------------------------------
// Cycle results
// ---------------------------------------------------------------------------

/// Per-source funnel for one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source: SourceKind,
    pub fetched: usize,
    pub normalized: usize,
    pub improvements: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub job: &'static str,
    pub started_at: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
    /// Campaign processed by this cycle, if the job rotates campaigns.
    pub campaign: Option<String>,
    pub winners: usize,
    pub applied: usize,
}

impl CycleReport {
    pub fn new(job: &'static str) -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
            job,
            started_at: Utc::now(),
            sources: Vec::new(),
            campaign: None,
            winners: 0,
            applied: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    LockBusy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(CycleReport),
    Skipped(SkipReason),
}

/// Fatal to the cycle. Raised during collection, nothing has been written.
/// Raised during application, each map is applied on its own and maps
/// finished before the failure keep their new record. The failing map may be
/// left with its notification armed over the old record, since the
/// notification and the overwrite are separate statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleError {
    Auth(AuthError),
    Storage(StorageError),
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleError::Auth(e) => write!(f, "authentication failed: {e}"),
            CycleError::Storage(e) => write!(f, "storage failed: {e}"),
        }
    }
}

impl std::error::Error for CycleError {}

impl From<AuthError> for CycleError {
    fn from(e: AuthError) -> Self {
        CycleError::Auth(e)
    }
}

impl From<FetchError> for CycleError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Auth(a) => CycleError::Auth(a),
        }
    }
}

impl From<StorageError> for CycleError {
    fn from(e: StorageError) -> Self {
        CycleError::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Job + orchestrator
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// State carried across cycles, guarded by the job lock.
    type State: Send + 'static;

    fn name(&self) -> &'static str;

    async fn run(&self, state: &mut Self::State, report: &mut CycleReport)
        -> Result<(), CycleError>;
}

pub struct UpdateOrchestrator<J: Job> {
    job: J,
    state: Mutex<J::State>,
    lock_wait: Duration,
}

impl<J: Job> UpdateOrchestrator<J> {
    pub fn new(job: J, initial: J::State, lock_wait: Duration) -> Self {
        Self {
            job,
            state: Mutex::new(initial),
            lock_wait,
        }
    }

    pub fn name(&self) -> &'static str {
        self.job.name()
    }

    pub fn job(&self) -> &J {
        &self.job
    }

    /// Run one cycle, or skip it if another cycle of this job holds the lock
    /// past `lock_wait`.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, CycleError> {
        let job = self.job.name();
        let mut guard = match tokio::time::timeout(self.lock_wait, self.state.lock()).await {
            Ok(g) => g,
            Err(_) => {
                tracing::info!(job, "job lock busy, skipping cycle");
                return Ok(CycleOutcome::Skipped(SkipReason::LockBusy));
            }
        };

        let mut report = CycleReport::new(job);
        let span = tracing::info_span!("cycle", job, cycle_id = %report.cycle_id);
        let result = self.job.run(&mut guard, &mut report).instrument(span).await;
        drop(guard);

        match result {
            Ok(()) => {
                tracing::info!(
                    job,
                    cycle_id = %report.cycle_id,
                    winners = report.winners,
                    applied = report.applied,
                    "cycle completed"
                );
                Ok(CycleOutcome::Completed(report))
            }
            Err(e) => {
                tracing::error!(job, cycle_id = %report.cycle_id, error = %e, "cycle failed");
                Err(e)
            }
        }
    }

    /// Snapshot of the job state. Waits for a running cycle to finish.
    pub async fn state(&self) -> J::State
    where
        J::State: Clone,
    {
        self.state.lock().await.clone()
    }
}

// -----------------
// Tests
// -----------------
