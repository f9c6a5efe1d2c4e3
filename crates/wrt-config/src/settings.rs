//! Typed configuration. Every section and field has a default so a partial
//! YAML document (or none at all) still yields a runnable config.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use wrt_auth::CredentialKind;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub database: DatabaseConfig,
    pub http: HttpConfig,
    pub local_ledger: LocalLedgerConfig,
    pub exchange: ExchangeConfig,
    pub dedicated: DedicatedConfig,
    pub live_service: LiveServiceConfig,
    pub jobs: JobsConfig,
    pub daemon: DaemonConfig,
}

impl TrackerConfig {
    /// The ledger job has something to poll.
    pub fn ledger_job_enabled(&self) -> bool {
        self.local_ledger.enabled || self.exchange.enabled || self.dedicated.enabled
    }

    pub fn campaign_job_enabled(&self) -> bool {
        self.live_service.enabled
    }
}

/// Canonical store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Env var holding the connection URL.
    pub url_env: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url_env: "WRT_DATABASE_URL".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 5,
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            user_agent: "wrt-daemon (world record tracker)".to_string(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalLedgerConfig {
    pub enabled: bool,
    pub url_env: String,
    pub max_connections: u32,
    pub lookback_days: i64,
}

impl Default for LocalLedgerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url_env: "WRT_LEDGER_DATABASE_URL".to_string(),
            max_connections: 2,
            lookback_days: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub enabled: bool,
    pub base_url: String,
    /// Track author whose catalog is tracked.
    pub author: String,
    /// Entries requested from the activity listing.
    pub activity_count: u32,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://tmnf.exchange/api".to_string(),
            author: "Kackiest Kacky".to_string(),
            activity_count: 40,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedicatedConfig {
    pub enabled: bool,
    /// Parallel per-track lookups.
    pub concurrency: usize,
}

impl Default for DedicatedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveServiceConfig {
    pub enabled: bool,
    pub club_id: i64,
    pub live_base_url: String,
    pub core_base_url: String,
    pub ubi_sessions_url: String,
    /// Campaign name filters, case-insensitive substrings.
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub credentials: CredentialsConfig,
}

impl Default for LiveServiceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            club_id: 0,
            live_base_url: "https://live-services.trackmania.nadeo.live".to_string(),
            core_base_url: "https://prod.trackmania.core.nadeo.online".to_string(),
            ubi_sessions_url: "https://public-ubiservices.ubi.com/v3/profiles/sessions"
                .to_string(),
            include: Vec::new(),
            exclude: Vec::new(),
            credentials: CredentialsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub kind: CredentialKind,
    pub username_env: String,
    pub password_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            kind: CredentialKind::Account,
            username_env: "WRT_LIVE_USERNAME".to_string(),
            password_env: "WRT_LIVE_PASSWORD".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub ledger: LedgerJobConfig,
    pub campaign: CampaignJobConfig,
    /// How long a tick waits for its job's lock before skipping.
    pub lock_wait_ms: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerJobConfig::default(),
            campaign: CampaignJobConfig::default(),
            lock_wait_ms: 2_000,
        }
    }
}

impl JobsConfig {
    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerJobConfig {
    pub interval_secs: u64,
    /// Poll the dedicated ledger once every this many ledger ticks.
    pub dedicated_every: u32,
}

impl Default for LedgerJobConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            dedicated_every: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignJobConfig {
    pub interval_secs: u64,
}

impl Default for CampaignJobConfig {
    fn default() -> Self {
        Self { interval_secs: 600 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub bind: String,
    /// Fallback tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8899".to_string(),
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_layered_yaml_from_strings;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = load_layered_yaml_from_strings(&["{}"]).unwrap().typed().unwrap();
        assert_eq!(cfg, TrackerConfig::default());
        assert_eq!(cfg.jobs.ledger.interval_secs, 60);
        assert_eq!(cfg.jobs.ledger.dedicated_every, 10);
        assert_eq!(cfg.jobs.campaign.interval_secs, 600);
        assert!(cfg.ledger_job_enabled());
        assert!(!cfg.campaign_job_enabled());
    }

    #[test]
    fn partial_sections_keep_sibling_defaults() {
        let yaml = r#"
live_service:
  enabled: true
  club_id: 150
  exclude: ["test"]
  credentials:
    kind: dedicated
jobs:
  lock_wait_ms: 500
"#;
        let cfg = load_layered_yaml_from_strings(&[yaml]).unwrap().typed().unwrap();
        assert_eq!(cfg.live_service.club_id, 150);
        assert_eq!(cfg.live_service.exclude, vec!["test".to_string()]);
        assert_eq!(cfg.live_service.credentials.kind, CredentialKind::Dedicated);
        assert_eq!(cfg.live_service.credentials.username_env, "WRT_LIVE_USERNAME");
        assert_eq!(cfg.jobs.lock_wait(), Duration::from_millis(500));
        assert_eq!(cfg.jobs.ledger.interval_secs, 60);
    }

    #[test]
    fn wrong_type_is_rejected() {
        let loaded = load_layered_yaml_from_strings(&["jobs:\n  lock_wait_ms: soon\n"]).unwrap();
        assert!(loaded.typed().is_err());
    }
}
