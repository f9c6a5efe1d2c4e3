//! Shared runtime state for wrt-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The tickers write one
//! [`JobStatus`] per job after every cycle; `/v1/jobs` reads them.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;

use crate::orchestrator::{CycleError, CycleOutcome, CycleReport, Job, UpdateOrchestrator};

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastOutcome {
    Completed,
    LockBusy,
    Failed,
}

/// Running totals and the last result of one job.
#[derive(Clone, Debug, Serialize)]
pub struct JobStatus {
    pub job: &'static str,
    pub interval_secs: u64,
    pub completed: u64,
    pub skipped_lock_busy: u64,
    pub failed: u64,
    pub last_outcome: Option<LastOutcome>,
    pub last_finished_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_report: Option<CycleReport>,
}

impl JobStatus {
    fn new(job: &'static str, interval_secs: u64) -> Self {
        Self {
            job,
            interval_secs,
            completed: 0,
            skipped_lock_busy: 0,
            failed: 0,
            last_outcome: None,
            last_finished_at: None,
            last_error: None,
            last_report: None,
        }
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub build: BuildInfo,
    pub jobs: Arc<RwLock<BTreeMap<&'static str, JobStatus>>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            build: BuildInfo {
                service: "wrt-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            jobs: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Make a job visible on `/v1/jobs` before its first cycle.
    pub async fn register_job(&self, job: &'static str, interval: Duration) {
        self.jobs
            .write()
            .await
            .entry(job)
            .or_insert_with(|| JobStatus::new(job, interval.as_secs()));
    }

    pub async fn record(&self, job: &'static str, result: &Result<CycleOutcome, CycleError>) {
        let mut jobs = self.jobs.write().await;
        let st = jobs.entry(job).or_insert_with(|| JobStatus::new(job, 0));
        st.last_finished_at = Some(Utc::now());
        match result {
            Ok(CycleOutcome::Completed(report)) => {
                st.completed += 1;
                st.last_outcome = Some(LastOutcome::Completed);
                st.last_error = None;
                st.last_report = Some(report.clone());
            }
            Ok(CycleOutcome::Skipped(_)) => {
                st.skipped_lock_busy += 1;
                st.last_outcome = Some(LastOutcome::LockBusy);
            }
            Err(e) => {
                st.failed += 1;
                st.last_outcome = Some(LastOutcome::Failed);
                st.last_error = Some(e.to_string());
            }
        }
    }

    pub async fn snapshot(&self) -> Vec<JobStatus> {
        self.jobs.read().await.values().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// Tickers
// ---------------------------------------------------------------------------

/// Run one cycle and record its result.
pub async fn run_and_record<J: Job>(orch: &UpdateOrchestrator<J>, state: &AppState) {
    let result = orch.run_cycle().await;
    state.record(orch.name(), &result).await;
}

/// Spawn the fixed-interval ticker of one job. Every tick spawns its own
/// cycle task, so a slow cycle makes the next tick observe a busy lock
/// instead of delaying the ticker.
pub fn spawn_ticker<J: Job>(
    orch: Arc<UpdateOrchestrator<J>>,
    state: Arc<AppState>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        state.register_job(orch.name(), interval).await;
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let orch = Arc::clone(&orch);
            let state = Arc::clone(&state);
            tokio::spawn(async move { run_and_record(&orch, &state).await });
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::SkipReason;
    use wrt_db::StorageError;

    #[tokio::test]
    async fn record_keeps_running_totals() {
        let st = AppState::new();
        st.register_job("ledger", Duration::from_secs(60)).await;

        st.record("ledger", &Ok(CycleOutcome::Completed(CycleReport::new("ledger")))).await;
        st.record("ledger", &Ok(CycleOutcome::Skipped(SkipReason::LockBusy))).await;
        st.record("ledger", &Err(CycleError::Storage(StorageError::PoolTimeout))).await;

        let jobs = st.snapshot().await;
        assert_eq!(jobs.len(), 1);
        let j = &jobs[0];
        assert_eq!((j.completed, j.skipped_lock_busy, j.failed), (1, 1, 1));
        assert_eq!(j.interval_secs, 60);
        assert_eq!(j.last_outcome, Some(LastOutcome::Failed));
        assert!(j.last_error.as_deref().unwrap().contains("storage"));
        assert!(j.last_report.is_some());
    }
}
