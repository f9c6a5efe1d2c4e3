//! The two job types and the collect -> resolve -> apply pipeline they share.
//!
//! Every source of a cycle is fetched, normalized and filtered before the
//! first write, so an auth or storage failure during collection leaves the
//! store untouched.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use wrt_db::RecordStore;
use wrt_reconcile::Improvement;
use wrt_records::normalize_batch;
use wrt_sources::{
    CampaignFilter, CampaignRef, FetchError, LiveServiceSource, SourceConnector,
};

use crate::orchestrator::{CycleError, CycleReport, Job, PollCounter, SourceReport};

pub const LEDGER_JOB: &str = "ledger";
pub const CAMPAIGN_JOB: &str = "campaign";

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

async fn collect(
    store: &dyn RecordStore,
    sources: &[Arc<dyn SourceConnector>],
    report: &mut CycleReport,
) -> Result<Vec<Improvement>, CycleError> {
    let fetched = join_all(sources.iter().map(|s| s.fetch(None))).await;

    let mut improvements = Vec::new();
    for (source, batch) in sources.iter().zip(fetched) {
        let kind = source.kind();
        let raws = batch?;
        let normalized = normalize_batch(&raws, kind);
        let normalized_count = normalized.len();
        let kept = wrt_reconcile::filter(store, normalized, kind).await?;
        report.sources.push(SourceReport {
            source: kind,
            fetched: raws.len(),
            normalized: normalized_count,
            improvements: kept.len(),
        });
        improvements.extend(kept);
    }
    Ok(improvements)
}

async fn apply_winners(
    store: &dyn RecordStore,
    improvements: Vec<Improvement>,
    report: &mut CycleReport,
) -> Result<(), CycleError> {
    let winners = wrt_reconcile::resolve(improvements);
    report.winners = winners.len();
    for w in &winners {
        if wrt_reconcile::apply(store, &w.candidate).await?.is_applied() {
            report.applied += 1;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Ledger job
// ---------------------------------------------------------------------------

/// Fast job: the every-tick sources plus the dedicated ledger when its
/// counter comes due.
pub struct LedgerJob {
    store: Arc<dyn RecordStore>,
    every_tick: Vec<Arc<dyn SourceConnector>>,
    dedicated: Option<Arc<dyn SourceConnector>>,
}

impl LedgerJob {
    pub fn new(
        store: Arc<dyn RecordStore>,
        every_tick: Vec<Arc<dyn SourceConnector>>,
        dedicated: Option<Arc<dyn SourceConnector>>,
    ) -> Self {
        Self {
            store,
            every_tick,
            dedicated,
        }
    }
}

#[async_trait]
impl Job for LedgerJob {
    type State = PollCounter;

    fn name(&self) -> &'static str {
        LEDGER_JOB
    }

    async fn run(&self, counter: &mut PollCounter, report: &mut CycleReport) -> Result<(), CycleError> {
        let mut sources = self.every_tick.clone();
        if let Some(dedicated) = &self.dedicated {
            if counter.is_due() {
                tracing::debug!("dedicated ledger due this cycle");
                sources.push(dedicated.clone());
            }
        }

        let improvements = collect(self.store.as_ref(), &sources, report).await?;
        apply_winners(self.store.as_ref(), improvements, report).await?;
        counter.advance();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Campaign job
// ---------------------------------------------------------------------------

/// Rotating list of campaigns, each with its own connector.
#[async_trait]
pub trait CampaignCatalog: Send + Sync {
    async fn campaigns(&self) -> Result<Vec<CampaignRef>, FetchError>;

    fn connector(&self, campaign: CampaignRef) -> Arc<dyn SourceConnector>;
}

#[async_trait]
impl CampaignCatalog for LiveServiceSource {
    async fn campaigns(&self) -> Result<Vec<CampaignRef>, FetchError> {
        self.catalog().await
    }

    fn connector(&self, campaign: CampaignRef) -> Arc<dyn SourceConnector> {
        Arc::new(self.campaign(campaign))
    }
}

/// Slow job: one campaign per cycle, skipping campaigns the name filter
/// rejects.
pub struct CampaignJob {
    store: Arc<dyn RecordStore>,
    catalog: Arc<dyn CampaignCatalog>,
    filter: CampaignFilter,
}

impl CampaignJob {
    pub fn new(
        store: Arc<dyn RecordStore>,
        catalog: Arc<dyn CampaignCatalog>,
        filter: CampaignFilter,
    ) -> Self {
        Self {
            store,
            catalog,
            filter,
        }
    }
}

#[async_trait]
impl Job for CampaignJob {
    type State = PollCounter;

    fn name(&self) -> &'static str {
        CAMPAIGN_JOB
    }

    async fn run(&self, counter: &mut PollCounter, report: &mut CycleReport) -> Result<(), CycleError> {
        let campaigns = self.catalog.campaigns().await?;
        let len = campaigns.len();
        let start = counter.slot_within(len);
        let Some(slot) = (0..len)
            .map(|step| (start + step) % len)
            .find(|&i| self.filter.accepts(&campaigns[i].name))
        else {
            tracing::info!(campaigns = len, "no campaign passes the name filter");
            return Ok(());
        };

        let campaign = campaigns[slot].clone();
        tracing::info!(campaign = %campaign.name, slot, of = len, "polling campaign");
        report.campaign = Some(campaign.name.clone());

        let connector = self.catalog.connector(campaign);
        let improvements = collect(self.store.as_ref(), &[connector], report).await?;
        apply_winners(self.store.as_ref(), improvements, report).await?;
        counter.advance_past(slot, len);
        Ok(())
    }
}
