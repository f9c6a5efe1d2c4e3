//! Dedicated-server ledger, reached through the exchange site.
//!
//! Lists the author's catalog, then asks for the dedicated-ledger top entry
//! of every track with bounded concurrency. The ledger reports no timestamp.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use serde::Deserialize;
use wrt_records::{CatalogEntry, RawRecord, SourceKind};

use crate::exchange::Listing;
use crate::{join_url, send_json, unavailable, ConnectorError, FetchError, SourceConnector};

const CATALOG_COUNT: &str = "500";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CatalogTrack {
    track_id: i64,
    track_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DedicatedTop {
    time: i64,
    login: String,
}

#[derive(Debug, Clone)]
pub struct DedicatedLedgerSource {
    http: reqwest::Client,
    base_url: String,
    author: String,
    concurrency: usize,
}

impl DedicatedLedgerSource {
    pub fn new(http: reqwest::Client, base_url: String, author: String, concurrency: usize) -> Self {
        Self {
            http,
            base_url,
            author,
            concurrency: concurrency.max(1),
        }
    }

    async fn catalog(&self) -> Result<Vec<CatalogTrack>, ConnectorError> {
        let url = join_url(&self.base_url, "tracks");
        let req = self.http.get(&url).query(&[
            ("author", self.author.as_str()),
            ("count", CATALOG_COUNT),
            ("fields", "TrackId,TrackName"),
        ]);
        let listing: Listing = send_json(req, &url).await?;
        Ok(listing.entries(SourceKind::DedicatedLedger))
    }

    async fn top_for(&self, track: CatalogTrack) -> Option<RawRecord> {
        let url = join_url(&self.base_url, "tracks/dedimania");
        let track_id = track.track_id.to_string();
        let req = self.http.get(&url).query(&[
            ("trackId", track_id.as_str()),
            ("count", "1"),
            ("fields", "Time,Login"),
        ]);
        let listing: Listing = match send_json(req, &url).await {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(track_id = track.track_id, error = %e, "dedicated ledger lookup failed");
                return None;
            }
        };
        let Some(top) = listing
            .entries::<DedicatedTop>(SourceKind::DedicatedLedger)
            .into_iter()
            .next()
        else {
            tracing::debug!(track_id = track.track_id, "no dedicated ledger records");
            return None;
        };
        Some(RawRecord::Catalog(CatalogEntry {
            display_name: track.track_name,
            external_id: track.track_id,
            score: top.time,
            holder_name: top.login,
            last_activity: None,
        }))
    }
}

#[async_trait]
impl SourceConnector for DedicatedLedgerSource {
    fn kind(&self) -> SourceKind {
        SourceKind::DedicatedLedger
    }

    /// `since` is ignored: the ledger has no activity timestamp to filter on.
    async fn fetch(&self, _since: Option<DateTime<Utc>>) -> Result<Vec<RawRecord>, FetchError> {
        let tracks = match self.catalog().await {
            Ok(t) => t,
            Err(e) => return Ok(unavailable(self.kind(), &e)),
        };
        let total = tracks.len();
        let out: Vec<RawRecord> = stream::iter(tracks)
            .map(|t| self.top_for(t))
            .buffered(self.concurrency)
            .filter_map(|r| async move { r })
            .collect()
            .await;
        tracing::debug!(source = %self.kind(), tracks = total, fetched = out.len(), "dedicated ledger polled");
        Ok(out)
    }
}
