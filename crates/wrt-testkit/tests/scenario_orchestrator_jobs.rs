//! Scenario: job orchestration.
//!
//! - an overlapping trigger observes LockBusy and writes nothing
//! - the dedicated ledger is polled only every Nth ledger cycle
//! - the campaign job takes one campaign per cycle and skips filtered ones
//! - an auth failure aborts the cycle before any write
//! - a storage failure while applying keeps the maps applied before it

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use wrt_auth::AuthError;
use wrt_daemon::jobs::{CampaignCatalog, CampaignJob, LedgerJob};
use wrt_daemon::orchestrator::{CycleError, CycleOutcome, PollCounter, SkipReason, UpdateOrchestrator};
use wrt_db::RecordStore;
use wrt_records::{CatalogEntry, LeaderboardEntry, MapKey, RawRecord, SourceKind, UNKNOWN_RECORDED_AT};
use wrt_sources::{CampaignFilter, CampaignRef, FetchError, SourceConnector};
use wrt_testkit::{MemoryRecordStore, StaticConnector};

fn catalog(id: i64, score: i64) -> RawRecord {
    RawRecord::Catalog(CatalogEntry {
        display_name: format!("Kackiest Kacky #{id}"),
        external_id: id,
        score,
        holder_name: "holder".to_string(),
        last_activity: None,
    })
}

fn leaderboard(uid: &str, score: i64) -> RawRecord {
    RawRecord::Leaderboard(LeaderboardEntry {
        engine_map_uid: uid.to_string(),
        account_id: "acc-1".to_string(),
        display_name: Some("player".to_string()),
        score,
        observed_at: UNKNOWN_RECORDED_AT + chrono::Duration::days(20_000),
    })
}

// ---------------------------------------------------------------------------
// Lock busy
// ---------------------------------------------------------------------------

/// Connector that parks inside `fetch` until released.
struct Parked {
    entered: Arc<Notify>,
    release: Arc<Notify>,
    batch: Vec<RawRecord>,
}

#[async_trait]
impl SourceConnector for Parked {
    fn kind(&self) -> SourceKind {
        SourceKind::Exchange
    }

    async fn fetch(&self, _since: Option<DateTime<Utc>>) -> Result<Vec<RawRecord>, FetchError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(self.batch.clone())
    }
}

#[tokio::test]
async fn overlapping_trigger_is_skipped_and_writes_nothing() {
    let store = Arc::new(MemoryRecordStore::new());
    store.seed(MapKey::Exchange(5), 9_000);
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let parked: Arc<dyn SourceConnector> = Arc::new(Parked {
        entered: entered.clone(),
        release: release.clone(),
        batch: vec![catalog(5, 8_000)],
    });

    let orch = Arc::new(UpdateOrchestrator::new(
        LedgerJob::new(store.clone() as Arc<dyn RecordStore>, vec![parked], None),
        PollCounter::new(10),
        Duration::from_millis(50),
    ));

    let first = tokio::spawn({
        let orch = orch.clone();
        async move { orch.run_cycle().await }
    });
    entered.notified().await;

    let writes_before = store.write_count();
    let second = orch.run_cycle().await.unwrap();
    assert_eq!(second, CycleOutcome::Skipped(SkipReason::LockBusy));
    assert_eq!(store.write_count(), writes_before);

    release.notify_one();
    assert!(matches!(first.await.unwrap().unwrap(), CycleOutcome::Completed(_)));
    assert_eq!(store.score_of(&MapKey::Exchange(5)), Some(8_000));
    // only the completed cycle moved the counter
    assert_eq!(orch.state().await.value(), 1);
}

// ---------------------------------------------------------------------------
// Dedicated ledger throttle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dedicated_ledger_polled_every_third_cycle() {
    let store = Arc::new(MemoryRecordStore::new());
    store.seed(MapKey::Exchange(1), 10_000);
    let exchange = Arc::new(StaticConnector::new(SourceKind::Exchange, vec![]));
    let dedicated = Arc::new(StaticConnector::new(
        SourceKind::DedicatedLedger,
        vec![catalog(1, 9_000)],
    ));

    let orch = UpdateOrchestrator::new(
        LedgerJob::new(
            store.clone() as Arc<dyn RecordStore>,
            vec![exchange.clone() as Arc<dyn SourceConnector>],
            Some(dedicated.clone() as Arc<dyn SourceConnector>),
        ),
        PollCounter::new(3),
        Duration::from_millis(50),
    );

    let mut dedicated_fetches = Vec::new();
    for _ in 0..6 {
        orch.run_cycle().await.unwrap();
        dedicated_fetches.push(dedicated.fetch_count());
    }
    assert_eq!(dedicated_fetches, vec![0, 0, 1, 1, 1, 2]);
    assert_eq!(exchange.fetch_count(), 6);
    assert_eq!(store.score_of(&MapKey::Exchange(1)), Some(9_000));
    let rec = store.record_of(&MapKey::Exchange(1)).unwrap();
    assert_eq!(rec.source, Some(SourceKind::DedicatedLedger));
    assert_eq!(rec.recorded_at, UNKNOWN_RECORDED_AT);
}

// ---------------------------------------------------------------------------
// Campaign rotation
// ---------------------------------------------------------------------------

struct FixedCatalog {
    campaigns: Vec<CampaignRef>,
    failure: Option<FetchError>,
    served: Mutex<Vec<String>>,
}

impl FixedCatalog {
    fn new(names: &[&str]) -> Self {
        Self {
            campaigns: names
                .iter()
                .enumerate()
                .map(|(i, n)| CampaignRef {
                    id: i as i64,
                    name: n.to_string(),
                })
                .collect(),
            failure: None,
            served: Mutex::new(Vec::new()),
        }
    }

    fn served(&self) -> Vec<String> {
        self.served.lock().unwrap().clone()
    }
}

#[async_trait]
impl CampaignCatalog for FixedCatalog {
    async fn campaigns(&self) -> Result<Vec<CampaignRef>, FetchError> {
        match &self.failure {
            Some(e) => Err(e.clone()),
            None => Ok(self.campaigns.clone()),
        }
    }

    fn connector(&self, campaign: CampaignRef) -> Arc<dyn SourceConnector> {
        self.served.lock().unwrap().push(campaign.name.clone());
        Arc::new(StaticConnector::new(
            SourceKind::LiveService,
            vec![leaderboard(&format!("uid-{}", campaign.id), 30_000)],
        ))
    }
}

#[tokio::test]
async fn campaign_job_rotates_and_skips_filtered_campaigns() {
    let store = Arc::new(MemoryRecordStore::new());
    for id in 0..4 {
        store.seed(MapKey::EngineUid(format!("uid-{id}")), 60_000);
    }
    let catalog = Arc::new(FixedCatalog::new(&["KR 1", "KR 2 test", "KR 3", "KR 4"]));
    let orch = UpdateOrchestrator::new(
        CampaignJob::new(
            store.clone() as Arc<dyn RecordStore>,
            catalog.clone(),
            CampaignFilter {
                include: vec!["kr".to_string()],
                exclude: vec!["TEST".to_string()],
            },
        ),
        PollCounter::new(1),
        Duration::from_millis(50),
    );

    let mut polled = Vec::new();
    for _ in 0..4 {
        let CycleOutcome::Completed(report) = orch.run_cycle().await.unwrap() else {
            panic!("cycle should complete");
        };
        polled.push(report.campaign.unwrap());
    }
    assert_eq!(polled, vec!["KR 1", "KR 3", "KR 4", "KR 1"]);
    assert_eq!(catalog.served(), polled);
    assert_eq!(store.score_of(&MapKey::EngineUid("uid-0".to_string())), Some(30_000));
    assert_eq!(store.score_of(&MapKey::EngineUid("uid-1".to_string())), Some(60_000));
    let rec = store.record_of(&MapKey::EngineUid("uid-2".to_string())).unwrap();
    assert_eq!(rec.login, "player");
    assert_eq!(rec.source, Some(SourceKind::LiveService));
}

#[tokio::test]
async fn auth_failure_is_fatal_and_writes_nothing() {
    let store = Arc::new(MemoryRecordStore::new());
    store.seed(MapKey::Exchange(1), 10_000);
    let rejected = AuthError::Rejected {
        status: 401,
        endpoint: "token/refresh".to_string(),
    };

    // a healthy source in the same cycle is not applied either
    let healthy = Arc::new(StaticConnector::new(SourceKind::Exchange, vec![catalog(1, 9_000)]));
    let failing = Arc::new(StaticConnector::failing(
        SourceKind::LiveService,
        FetchError::Auth(rejected.clone()),
    ));
    let orch = UpdateOrchestrator::new(
        LedgerJob::new(
            store.clone() as Arc<dyn RecordStore>,
            vec![healthy as Arc<dyn SourceConnector>, failing as Arc<dyn SourceConnector>],
            None,
        ),
        PollCounter::new(2),
        Duration::from_millis(50),
    );

    assert_eq!(orch.run_cycle().await, Err(CycleError::Auth(rejected.clone())));
    assert_eq!(store.write_count(), 0);
    assert_eq!(store.score_of(&MapKey::Exchange(1)), Some(10_000));
    assert_eq!(orch.state().await.value(), 0);

    let mut cat = FixedCatalog::new(&["KR 1"]);
    cat.failure = Some(FetchError::Auth(rejected.clone()));
    let campaign = UpdateOrchestrator::new(
        CampaignJob::new(store.clone() as Arc<dyn RecordStore>, Arc::new(cat), CampaignFilter::default()),
        PollCounter::new(1),
        Duration::from_millis(50),
    );
    assert_eq!(campaign.run_cycle().await, Err(CycleError::Auth(rejected)));
}

#[tokio::test]
async fn storage_failure_is_fatal() {
    let store = Arc::new(MemoryRecordStore::new());
    store.seed(MapKey::Exchange(1), 10_000);
    store.fail_next(wrt_db::StorageError::PoolTimeout);
    let exchange = Arc::new(StaticConnector::new(SourceKind::Exchange, vec![catalog(1, 9_000)]));
    let orch = UpdateOrchestrator::new(
        LedgerJob::new(
            store.clone() as Arc<dyn RecordStore>,
            vec![exchange as Arc<dyn SourceConnector>],
            None,
        ),
        PollCounter::new(2),
        Duration::from_millis(50),
    );
    assert_eq!(
        orch.run_cycle().await,
        Err(CycleError::Storage(wrt_db::StorageError::PoolTimeout))
    );
    assert_eq!(store.score_of(&MapKey::Exchange(1)), Some(10_000));
}

#[tokio::test]
async fn storage_failure_while_applying_keeps_earlier_maps() {
    let store = Arc::new(MemoryRecordStore::new());
    store.seed(MapKey::Exchange(1), 10_000);
    store.seed(MapKey::Exchange(2), 10_000);
    store.seed(MapKey::Exchange(3), 10_000);
    let reset = wrt_db::StorageError::Query("connection reset".to_string());
    store.fail_overwrite_after(1, reset.clone());
    let exchange = Arc::new(StaticConnector::new(
        SourceKind::Exchange,
        vec![catalog(1, 9_000), catalog(2, 9_500), catalog(3, 9_800)],
    ));
    let orch = UpdateOrchestrator::new(
        LedgerJob::new(
            store.clone() as Arc<dyn RecordStore>,
            vec![exchange as Arc<dyn SourceConnector>],
            None,
        ),
        PollCounter::new(2),
        Duration::from_millis(50),
    );

    assert_eq!(orch.run_cycle().await, Err(CycleError::Storage(reset)));

    assert_eq!(store.score_of(&MapKey::Exchange(1)), Some(9_000));
    assert_eq!(store.notification_of(&MapKey::Exchange(1)).unwrap().score_delta, 1_000);

    assert_eq!(store.score_of(&MapKey::Exchange(2)), Some(10_000));
    assert_eq!(store.notification_of(&MapKey::Exchange(2)).unwrap().score_delta, 500);

    assert_eq!(store.score_of(&MapKey::Exchange(3)), Some(10_000));
    assert_eq!(store.notification_of(&MapKey::Exchange(3)), None);
}
