//! Runtime secret resolution.
//!
//! YAML stores env var NAMES only. [`resolve_secrets`] reads the values once
//! at startup; the result is handed to constructors. Which secrets are
//! required depends on the enabled jobs:
//!
//! | enabled                | required                          |
//! |------------------------|-----------------------------------|
//! | always                 | canonical store URL               |
//! | local ledger source    | ledger database URL               |
//! | live service (campaign)| live account username + password  |
//!
//! Errors name the env var, never its value. `Debug` redacts values.

use anyhow::{bail, Result};
use wrt_auth::Credentials;

use crate::settings::TrackerConfig;

#[derive(Clone)]
pub struct ResolvedSecrets {
    pub database_url: String,
    pub ledger_database_url: Option<String>,
    pub live_credentials: Option<Credentials>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("database_url", &"<REDACTED>")
            .field(
                "ledger_database_url",
                &self.ledger_database_url.as_ref().map(|_| "<REDACTED>"),
            )
            .field("live_credentials", &self.live_credentials)
            .finish()
    }
}

fn required(
    lookup: &dyn Fn(&str) -> Option<String>,
    var: &str,
    what: &str,
) -> Result<String> {
    match lookup(var).filter(|v| !v.trim().is_empty()) {
        Some(v) => Ok(v),
        None => bail!("SECRETS_MISSING: required env var '{var}' ({what}) is not set or empty"),
    }
}

/// Resolve from the process environment.
pub fn resolve_secrets(cfg: &TrackerConfig) -> Result<ResolvedSecrets> {
    resolve_secrets_from(cfg, &|name| std::env::var(name).ok())
}

/// Resolve through `lookup` (env var name -> value).
pub fn resolve_secrets_from(
    cfg: &TrackerConfig,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<ResolvedSecrets> {
    let database_url = required(lookup, &cfg.database.url_env, "canonical store url")?;

    let ledger_database_url = if cfg.local_ledger.enabled {
        Some(required(lookup, &cfg.local_ledger.url_env, "local ledger url")?)
    } else {
        None
    };

    let live_credentials = if cfg.live_service.enabled {
        let c = &cfg.live_service.credentials;
        Some(Credentials {
            kind: c.kind,
            username: required(lookup, &c.username_env, "live service username")?,
            password: required(lookup, &c.password_env, "live service password")?,
        })
    } else {
        None
    };

    Ok(ResolvedSecrets {
        database_url,
        ledger_database_url,
        live_credentials,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_need_store_and_ledger_urls() {
        let cfg = TrackerConfig::default();
        let vars = env(&[("WRT_DATABASE_URL", "postgres://a"), ("WRT_LEDGER_DATABASE_URL", "postgres://b")]);
        let s = resolve_secrets_from(&cfg, &|k| vars.get(k).cloned()).unwrap();
        assert_eq!(s.database_url, "postgres://a");
        assert_eq!(s.ledger_database_url.as_deref(), Some("postgres://b"));
        assert!(s.live_credentials.is_none());

        let vars = env(&[("WRT_DATABASE_URL", "postgres://a")]);
        let err = resolve_secrets_from(&cfg, &|k| vars.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("WRT_LEDGER_DATABASE_URL"));
    }

    #[test]
    fn blank_values_count_as_missing() {
        let cfg = TrackerConfig::default();
        let vars = env(&[("WRT_DATABASE_URL", "  ")]);
        let err = resolve_secrets_from(&cfg, &|k| vars.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("SECRETS_MISSING"));
    }

    #[test]
    fn live_service_requires_credentials_and_redacts_them() {
        let mut cfg = TrackerConfig::default();
        cfg.local_ledger.enabled = false;
        cfg.live_service.enabled = true;

        let vars = env(&[("WRT_DATABASE_URL", "postgres://a"), ("WRT_LIVE_USERNAME", "bot")]);
        let err = resolve_secrets_from(&cfg, &|k| vars.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("WRT_LIVE_PASSWORD"));

        let vars = env(&[
            ("WRT_DATABASE_URL", "postgres://a"),
            ("WRT_LIVE_USERNAME", "bot"),
            ("WRT_LIVE_PASSWORD", "s3cr3t-value"),
        ]);
        let s = resolve_secrets_from(&cfg, &|k| vars.get(k).cloned()).unwrap();
        assert_eq!(s.live_credentials.as_ref().unwrap().username, "bot");
        let dbg = format!("{s:?}");
        assert!(!dbg.contains("s3cr3t-value"));
        assert!(!dbg.contains("postgres://a"));
    }
}
