//! Track-exchange site: recent activity on the configured author's tracks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use wrt_records::{parse_timestamp, CatalogEntry, RawRecord, SourceKind};

use crate::{join_url, send_json, unavailable, ConnectorError, FetchError, SourceConnector};

pub const DEFAULT_EXCHANGE_BASE_URL: &str = "https://tmnf.exchange/api";

// Activity listing ordering code: most recent activity first.
const ORDER_BY_ACTIVITY: &str = "10";
const ACTIVITY_FIELDS: &str =
    "TrackId,TrackName,WRReplay.User.Name,WRReplay.ReplayTime,ActivityAt";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// `{"Results": [...]}` envelope. Entries are decoded one by one so a single
/// odd entry does not sink the whole listing.
#[derive(Debug, Deserialize)]
pub(crate) struct Listing {
    #[serde(rename = "Results", default)]
    pub results: Vec<serde_json::Value>,
}

impl Listing {
    pub fn entries<T: serde::de::DeserializeOwned>(self, kind: SourceKind) -> Vec<T> {
        self.results
            .into_iter()
            .filter_map(|v| match serde_json::from_value::<T>(v) {
                Ok(t) => Some(t),
                Err(e) => {
                    tracing::debug!(source = %kind, error = %e, "dropping undecodable entry");
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ActivityEntry {
    track_id: i64,
    track_name: String,
    #[serde(rename = "WRReplay")]
    wr_replay: Option<WrReplay>,
    activity_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WrReplay {
    user: ReplayUser,
    replay_time: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ReplayUser {
    name: String,
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ExchangeSource {
    http: reqwest::Client,
    base_url: String,
    author: String,
    count: u32,
}

impl ExchangeSource {
    pub fn new(http: reqwest::Client, base_url: String, author: String, count: u32) -> Self {
        Self {
            http,
            base_url,
            author,
            count,
        }
    }

    async fn recent_activity(&self) -> Result<Vec<ActivityEntry>, ConnectorError> {
        let url = join_url(&self.base_url, "tracks");
        let count = self.count.to_string();
        let req = self.http.get(&url).query(&[
            ("author", self.author.as_str()),
            ("count", count.as_str()),
            ("order1", ORDER_BY_ACTIVITY),
            ("fields", ACTIVITY_FIELDS),
        ]);
        let listing: Listing = send_json(req, &url).await?;
        Ok(listing.entries(SourceKind::Exchange))
    }
}

fn to_raw(entry: ActivityEntry, since: Option<DateTime<Utc>>) -> Option<RawRecord> {
    let Some(wr) = entry.wr_replay else {
        tracing::debug!(track_id = entry.track_id, "no world-record replay, skipping");
        return None;
    };
    if let (Some(since), Some(at)) = (since, entry.activity_at.as_deref().and_then(parse_timestamp))
    {
        if at <= since {
            return None;
        }
    }
    Some(RawRecord::Catalog(CatalogEntry {
        display_name: entry.track_name,
        external_id: entry.track_id,
        score: wr.replay_time,
        holder_name: wr.user.name,
        last_activity: entry.activity_at,
    }))
}

#[async_trait]
impl SourceConnector for ExchangeSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Exchange
    }

    async fn fetch(&self, since: Option<DateTime<Utc>>) -> Result<Vec<RawRecord>, FetchError> {
        let entries = match self.recent_activity().await {
            Ok(v) => v,
            Err(e) => return Ok(unavailable(self.kind(), &e)),
        };
        let out: Vec<RawRecord> = entries.into_iter().filter_map(|e| to_raw(e, since)).collect();
        tracing::debug!(source = %self.kind(), fetched = out.len(), "exchange activity fetched");
        Ok(out)
    }
}

// -----------------
// Tests (local mock server)
// -----------------
