//! Build the job orchestrators from config and resolved secrets.

use std::sync::Arc;

use anyhow::{Context, Result};
use wrt_auth::{AuthEndpoints, HttpIdentityProvider, TokenLifecycleManager};
use wrt_config::{ResolvedSecrets, TrackerConfig};
use wrt_db::{PgGateway, PoolSettings, RecordStore, SqlRecordStore, StorageGateway};
use wrt_records::{Clock, SystemClock};
use wrt_sources::{
    CampaignFilter, DedicatedLedgerSource, ExchangeSource, LiveEndpoints, LiveServiceSource,
    LocalLedgerSource, SourceConnector,
};

use crate::jobs::{CampaignJob, LedgerJob};
use crate::orchestrator::{PollCounter, UpdateOrchestrator};

pub struct Engine {
    pub ledger: Option<Arc<UpdateOrchestrator<LedgerJob>>>,
    pub campaign: Option<Arc<UpdateOrchestrator<CampaignJob>>>,
}

pub fn canonical_pool_settings(cfg: &TrackerConfig) -> PoolSettings {
    PoolSettings {
        max_connections: cfg.database.max_connections,
        acquire_timeout: cfg.database.acquire_timeout(),
    }
}

pub async fn build_engine(cfg: &TrackerConfig, secrets: &ResolvedSecrets) -> Result<Engine> {
    let pool = wrt_db::connect(&secrets.database_url, canonical_pool_settings(cfg))
        .await
        .context("canonical store")?;
    let store: Arc<dyn RecordStore> =
        Arc::new(SqlRecordStore::new(Arc::new(PgGateway::new(pool))));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let http = wrt_sources::http_client(cfg.http.timeout(), &cfg.http.user_agent)
        .context("http client")?;
    let lock_wait = cfg.jobs.lock_wait();

    let ledger = if cfg.ledger_job_enabled() {
        let mut every_tick: Vec<Arc<dyn SourceConnector>> = Vec::new();

        if cfg.local_ledger.enabled {
            let url = secrets
                .ledger_database_url
                .as_deref()
                .context("local ledger enabled but its url was not resolved")?;
            let ledger_pool = wrt_db::connect(
                url,
                PoolSettings {
                    max_connections: cfg.local_ledger.max_connections,
                    acquire_timeout: cfg.database.acquire_timeout(),
                },
            )
            .await
            .context("local ledger")?;
            let gateway: Arc<dyn StorageGateway> = Arc::new(PgGateway::new(ledger_pool));
            every_tick.push(Arc::new(LocalLedgerSource::new(
                gateway,
                clock.clone(),
                chrono::Duration::days(cfg.local_ledger.lookback_days),
            )));
        }

        if cfg.exchange.enabled {
            every_tick.push(Arc::new(ExchangeSource::new(
                http.clone(),
                cfg.exchange.base_url.clone(),
                cfg.exchange.author.clone(),
                cfg.exchange.activity_count,
            )));
        }

        let dedicated: Option<Arc<dyn SourceConnector>> = if cfg.dedicated.enabled {
            Some(Arc::new(DedicatedLedgerSource::new(
                http.clone(),
                cfg.exchange.base_url.clone(),
                cfg.exchange.author.clone(),
                cfg.dedicated.concurrency,
            )))
        } else {
            None
        };

        let every = usize::try_from(cfg.jobs.ledger.dedicated_every).unwrap_or(1);
        Some(Arc::new(UpdateOrchestrator::new(
            LedgerJob::new(store.clone(), every_tick, dedicated),
            PollCounter::new(every),
            lock_wait,
        )))
    } else {
        None
    };

    let campaign = if cfg.campaign_job_enabled() {
        let live = &cfg.live_service;
        let credentials = secrets
            .live_credentials
            .clone()
            .context("live service enabled but its credentials were not resolved")?;
        let provider = HttpIdentityProvider::new_with_endpoints(
            http.clone(),
            credentials,
            cfg.http.user_agent.clone(),
            AuthEndpoints {
                ubi_sessions_url: live.ubi_sessions_url.clone(),
                core_base_url: live.core_base_url.clone(),
            },
        );
        let auth = Arc::new(TokenLifecycleManager::new(Arc::new(provider), clock.clone()));
        let source = LiveServiceSource::new(
            http.clone(),
            LiveEndpoints {
                live_base_url: live.live_base_url.clone(),
                core_base_url: live.core_base_url.clone(),
            },
            live.club_id,
            auth,
            clock.clone(),
        );
        let filter = CampaignFilter {
            include: live.include.clone(),
            exclude: live.exclude.clone(),
        };
        Some(Arc::new(UpdateOrchestrator::new(
            CampaignJob::new(store.clone(), Arc::new(source), filter),
            PollCounter::new(1),
            lock_wait,
        )))
    } else {
        None
    };

    Ok(Engine { ledger, campaign })
}
