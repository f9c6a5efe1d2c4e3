//! wrt-sources
//!
//! Record-provider connectors. Each one fetches raw per-map bests from one
//! provider family and hands them over untouched for normalization.
//!
//! Failure policy shared by every connector:
//! - provider unavailable (transport, status, undecodable body): warn, return
//!   an empty batch
//! - a single malformed entry: drop it, keep the rest
//! - authentication failure: the only error a connector surfaces

pub mod dedicated;
pub mod exchange;
pub mod live;
pub mod local_ledger;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use wrt_auth::AuthError;
use wrt_records::{RawRecord, SourceKind};

pub use dedicated::DedicatedLedgerSource;
pub use exchange::ExchangeSource;
pub use live::{CampaignFilter, CampaignRef, CampaignSource, LiveEndpoints, LiveServiceSource};
pub use local_ledger::LocalLedgerSource;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error surfaced by [`SourceConnector::fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    Auth(AuthError),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Auth(e) => write!(f, "connector authentication failed: {e}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<AuthError> for FetchError {
    fn from(e: AuthError) -> Self {
        FetchError::Auth(e)
    }
}

/// Provider-side failure. Logged by the connector, never returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    Transport(String),
    Status { status: u16, url: String },
    Decode(String),
    Storage(String),
}

impl fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectorError::Transport(msg) => write!(f, "transport error: {msg}"),
            ConnectorError::Status { status, url } => {
                write!(f, "http error status={status} url={url}")
            }
            ConnectorError::Decode(msg) => write!(f, "decode error: {msg}"),
            ConnectorError::Storage(msg) => write!(f, "ledger query failed: {msg}"),
        }
    }
}

impl std::error::Error for ConnectorError {}

// ---------------------------------------------------------------------------
// Connector trait
// ---------------------------------------------------------------------------

/// One record provider.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Fetch raw bests, optionally only those newer than `since`.
    async fn fetch(&self, since: Option<DateTime<Utc>>) -> Result<Vec<RawRecord>, FetchError>;
}

/// Log a provider failure and turn it into an empty batch.
pub(crate) fn unavailable(kind: SourceKind, err: &ConnectorError) -> Vec<RawRecord> {
    tracing::warn!(source = %kind, error = %err, "provider unavailable, no candidates this cycle");
    Vec::new()
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

/// Shared client for every HTTP connector.
pub fn http_client(timeout: Duration, user_agent: &str) -> Result<reqwest::Client, ConnectorError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
        .map_err(|e| ConnectorError::Transport(format!("http client build failed: {e}")))
}

pub(crate) async fn send_json<T: DeserializeOwned>(
    req: reqwest::RequestBuilder,
    url: &str,
) -> Result<T, ConnectorError> {
    let resp = req
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(|e| ConnectorError::Transport(e.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(ConnectorError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    resp.json::<T>()
        .await
        .map_err(|e| ConnectorError::Decode(format!("{url}: {e}")))
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(join_url("http://x/api/", "/tracks"), "http://x/api/tracks");
        assert_eq!(join_url("http://x/api", "tracks"), "http://x/api/tracks");
    }

    #[test]
    fn fetch_error_wraps_auth() {
        let e: FetchError = AuthError::Decode("bad".to_string()).into();
        assert!(e.to_string().contains("authentication"));
    }
}
