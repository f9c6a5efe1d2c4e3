//! Live service: club campaigns, per-map top leaderboards, display names.
//!
//! Every request first asks the [`TokenLifecycleManager`] for a valid token
//! of the audience it needs. The orchestrator picks one campaign per cycle
//! through [`LiveServiceSource::campaign`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use wrt_auth::{Audience, AuthError, TokenLifecycleManager};
use wrt_records::{Clock, LeaderboardEntry, RawRecord, SourceKind};

use crate::{join_url, send_json, unavailable, ConnectorError, FetchError, SourceConnector};

pub const DEFAULT_LIVE_BASE_URL: &str = "https://live-services.trackmania.nadeo.live";
pub const DEFAULT_CORE_BASE_URL: &str = "https://prod.trackmania.core.nadeo.online";

const DISPLAY_NAME_BATCH: usize = 50;
const WORLD_ZONE: &str = "World";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityPage {
    #[serde(default)]
    activity_list: Vec<Activity>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Activity {
    activity_type: String,
    campaign_id: Option<i64>,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct CampaignDetail {
    campaign: CampaignBody,
}

#[derive(Debug, Deserialize)]
struct CampaignBody {
    #[serde(default)]
    playlist: Vec<PlaylistEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistEntry {
    map_uid: String,
}

#[derive(Debug, Deserialize)]
struct MapTops {
    #[serde(default)]
    tops: Vec<ZoneTop>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZoneTop {
    zone_name: String,
    #[serde(default)]
    top: Vec<TopEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopEntry {
    account_id: String,
    position: i64,
    score: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DisplayName {
    account_id: String,
    display_name: String,
}

// ---------------------------------------------------------------------------
// Campaign selection
// ---------------------------------------------------------------------------

/// A campaign in the club's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignRef {
    pub id: i64,
    pub name: String,
}

/// Name filter over campaigns. Case-insensitive substring match; an empty
/// include list accepts everything not excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl CampaignFilter {
    pub fn accepts(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        let hit = |needle: &String| name.contains(&needle.to_lowercase());
        (self.include.is_empty() || self.include.iter().any(hit)) && !self.exclude.iter().any(hit)
    }
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

enum Failure {
    Auth(AuthError),
    Provider(ConnectorError),
}

impl From<ConnectorError> for Failure {
    fn from(e: ConnectorError) -> Self {
        Failure::Provider(e)
    }
}

/// Base URLs of the live-service and core-service APIs.
#[derive(Debug, Clone)]
pub struct LiveEndpoints {
    pub live_base_url: String,
    pub core_base_url: String,
}

impl Default for LiveEndpoints {
    fn default() -> Self {
        Self {
            live_base_url: DEFAULT_LIVE_BASE_URL.to_string(),
            core_base_url: DEFAULT_CORE_BASE_URL.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct LiveServiceSource {
    http: reqwest::Client,
    endpoints: LiveEndpoints,
    club_id: i64,
    activity_length: u32,
    auth: Arc<TokenLifecycleManager>,
    clock: Arc<dyn Clock>,
}

impl LiveServiceSource {
    pub fn new(
        http: reqwest::Client,
        endpoints: LiveEndpoints,
        club_id: i64,
        auth: Arc<TokenLifecycleManager>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            http,
            endpoints,
            club_id,
            activity_length: 64,
            auth,
            clock,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        audience: Audience,
    ) -> Result<T, Failure> {
        let token = self.auth.ensure_valid(audience).await.map_err(Failure::Auth)?;
        let req = self
            .http
            .get(url)
            .query(query)
            .header("Authorization", format!("nadeo_v1 t={token}"));
        Ok(send_json(req, url).await?)
    }

    /// Campaigns currently active in the club, in the service's order.
    pub async fn catalog(&self) -> Result<Vec<CampaignRef>, FetchError> {
        let url = join_url(
            &self.endpoints.live_base_url,
            &format!("api/token/club/{}/activity", self.club_id),
        );
        let query = [
            ("offset", "0".to_string()),
            ("length", self.activity_length.to_string()),
            ("active", "1".to_string()),
        ];
        let page: ActivityPage = match self.get_json(&url, &query, Audience::LiveServices).await {
            Ok(p) => p,
            Err(Failure::Auth(e)) => return Err(FetchError::Auth(e)),
            Err(Failure::Provider(e)) => {
                tracing::warn!(club = self.club_id, error = %e, "club activity unavailable");
                return Ok(Vec::new());
            }
        };
        Ok(page
            .activity_list
            .into_iter()
            .filter(|a| a.activity_type == "campaign")
            .filter_map(|a| {
                a.campaign_id.map(|id| CampaignRef { id, name: a.name })
            })
            .collect())
    }

    /// Connector over a single campaign.
    pub fn campaign(&self, campaign: CampaignRef) -> CampaignSource {
        CampaignSource {
            live: self.clone(),
            campaign,
        }
    }

    async fn campaign_maps(&self, campaign: &CampaignRef) -> Result<Vec<String>, Failure> {
        let url = join_url(
            &self.endpoints.live_base_url,
            &format!("api/token/club/{}/campaign/{}", self.club_id, campaign.id),
        );
        let detail: CampaignDetail = self.get_json(&url, &[], Audience::LiveServices).await?;
        Ok(detail.campaign.playlist.into_iter().map(|p| p.map_uid).collect())
    }

    async fn world_top(&self, map_uid: &str) -> Result<Option<TopEntry>, Failure> {
        let url = join_url(
            &self.endpoints.live_base_url,
            &format!("api/token/leaderboard/group/Personal_Best/map/{map_uid}/top"),
        );
        let tops: MapTops = self.get_json(&url, &[], Audience::LiveServices).await?;
        Ok(tops
            .tops
            .into_iter()
            .find(|z| z.zone_name == WORLD_ZONE)
            .and_then(|z| z.top.into_iter().find(|e| e.position == 1)))
    }

    async fn display_names(&self, account_ids: &[String]) -> Result<HashMap<String, String>, AuthError> {
        let url = join_url(&self.endpoints.core_base_url, "accounts/displayNames/");
        let mut names = HashMap::new();
        for chunk in account_ids.chunks(DISPLAY_NAME_BATCH) {
            let query = [("accountIdList", chunk.join(","))];
            match self
                .get_json::<Vec<DisplayName>>(&url, &query, Audience::CoreServices)
                .await
            {
                Ok(batch) => names.extend(batch.into_iter().map(|d| (d.account_id, d.display_name))),
                Err(Failure::Auth(e)) => return Err(e),
                Err(Failure::Provider(e)) => {
                    tracing::warn!(error = %e, "display name lookup failed, falling back to account ids");
                }
            }
        }
        Ok(names)
    }

    async fn fetch_campaign(&self, campaign: &CampaignRef) -> Result<Vec<RawRecord>, FetchError> {
        let kind = SourceKind::LiveService;
        let maps = match self.campaign_maps(campaign).await {
            Ok(m) => m,
            Err(Failure::Auth(e)) => return Err(FetchError::Auth(e)),
            Err(Failure::Provider(e)) => return Ok(unavailable(kind, &e)),
        };

        let mut tops: Vec<(String, TopEntry)> = Vec::with_capacity(maps.len());
        for map_uid in maps {
            match self.world_top(&map_uid).await {
                Ok(Some(top)) => tops.push((map_uid, top)),
                Ok(None) => tracing::debug!(map = %map_uid, "no world top entry"),
                Err(Failure::Auth(e)) => return Err(FetchError::Auth(e)),
                Err(Failure::Provider(e)) => {
                    tracing::warn!(map = %map_uid, error = %e, "leaderboard unavailable, skipping map");
                }
            }
        }

        let mut account_ids: Vec<String> = tops.iter().map(|(_, t)| t.account_id.clone()).collect();
        account_ids.sort();
        account_ids.dedup();
        let names = self.display_names(&account_ids).await?;

        let observed_at = self.clock.now();
        let out: Vec<RawRecord> = tops
            .into_iter()
            .map(|(map_uid, top)| {
                RawRecord::Leaderboard(LeaderboardEntry {
                    engine_map_uid: map_uid,
                    display_name: names.get(&top.account_id).cloned(),
                    account_id: top.account_id,
                    score: top.score,
                    observed_at,
                })
            })
            .collect();
        tracing::debug!(source = %kind, campaign = %campaign.name, fetched = out.len(), "campaign leaderboards fetched");
        Ok(out)
    }
}

/// [`SourceConnector`] bound to one campaign of the club.
#[derive(Clone)]
pub struct CampaignSource {
    live: LiveServiceSource,
    campaign: CampaignRef,
}

impl CampaignSource {
    pub fn campaign(&self) -> &CampaignRef {
        &self.campaign
    }
}

#[async_trait]
impl SourceConnector for CampaignSource {
    fn kind(&self) -> SourceKind {
        SourceKind::LiveService
    }

    /// Leaderboards are current-state snapshots, so `since` does not apply.
    async fn fetch(&self, _since: Option<DateTime<Utc>>) -> Result<Vec<RawRecord>, FetchError> {
        self.live.fetch_campaign(&self.campaign).await
    }
}

// -----------------
// Tests (local mock server)
// -----------------

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use chrono::TimeZone;
    use httpmock::prelude::*;
    use serde_json::json;
    use wrt_auth::{IdentityProvider, IdentityTicket, RawTokenPair};

    struct FixedClock;

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
        }
    }

    fn token(tag: &str) -> String {
        let payload = URL_SAFE_NO_PAD.encode(br#"{"iat":0,"rat":4102444800,"exp":4102444800}"#);
        format!("{tag}.{payload}.sig")
    }

    /// Hands out never-expiring tokens whose header segment names the audience.
    struct StaticIdentity {
        fail: bool,
    }

    #[async_trait]
    impl IdentityProvider for StaticIdentity {
        async fn identity_ticket(&self) -> Result<IdentityTicket, AuthError> {
            if self.fail {
                return Err(AuthError::Rejected {
                    status: 401,
                    endpoint: "test".to_string(),
                });
            }
            Ok(IdentityTicket::Basic)
        }

        async fn exchange_ticket(
            &self,
            _ticket: &IdentityTicket,
            audience: Audience,
        ) -> Result<RawTokenPair, AuthError> {
            Ok(RawTokenPair {
                access_token: token(audience.as_str()),
                refresh_token: token("refresh"),
            })
        }

        async fn refresh(&self, _t: &str, audience: Audience) -> Result<RawTokenPair, AuthError> {
            self.exchange_ticket(&IdentityTicket::Basic, audience).await
        }
    }

    fn live(server: &MockServer, fail_auth: bool) -> LiveServiceSource {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock);
        let auth = Arc::new(TokenLifecycleManager::new(
            Arc::new(StaticIdentity { fail: fail_auth }),
            clock.clone(),
        ));
        LiveServiceSource::new(
            reqwest::Client::new(),
            LiveEndpoints {
                live_base_url: server.url("/live"),
                core_base_url: server.url("/core"),
            },
            77,
            auth,
            clock,
        )
    }

    #[test]
    fn campaign_filter_include_exclude() {
        let f = CampaignFilter {
            include: vec!["reloaded".to_string()],
            exclude: vec!["test".to_string()],
        };
        assert!(f.accepts("Kacky Reloaded 3"));
        assert!(!f.accepts("Kacky Reloaded TEST"));
        assert!(!f.accepts("Other campaign"));
        assert!(CampaignFilter::default().accepts("anything"));
    }

    #[tokio::test]
    async fn catalog_keeps_only_campaigns_and_sends_live_token() {
        let server = MockServer::start_async().await;
        let m = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/live/api/token/club/77/activity")
                    .query_param("active", "1")
                    .header("Authorization", format!("nadeo_v1 t={}", token("NadeoLiveServices")));
                then.status(200).json_body(json!({
                    "activityList": [
                        { "activityType": "campaign", "campaignId": 1, "name": "KR 1" },
                        { "activityType": "room", "name": "Room" },
                        { "activityType": "campaign", "campaignId": 2, "name": "KR 2" }
                    ]
                }));
            })
            .await;

        let cat = live(&server, false).catalog().await.unwrap();
        m.assert_async().await;
        assert_eq!(
            cat,
            vec![
                CampaignRef { id: 1, name: "KR 1".to_string() },
                CampaignRef { id: 2, name: "KR 2".to_string() },
            ]
        );
    }

    #[tokio::test]
    async fn campaign_fetch_resolves_world_tops_and_names() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/live/api/token/club/77/campaign/5");
                then.status(200).json_body(json!({
                    "campaign": { "playlist": [ { "mapUid": "m1" }, { "mapUid": "m2" }, { "mapUid": "m3" } ] }
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/live/api/token/leaderboard/group/Personal_Best/map/m1/top");
                then.status(200).json_body(json!({
                    "mapUid": "m1",
                    "tops": [
                        { "zoneName": "Europe", "top": [ { "accountId": "eu", "position": 1, "score": 1 } ] },
                        { "zoneName": "World", "top": [ { "accountId": "acc-a", "position": 1, "score": 31_000 } ] }
                    ]
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/live/api/token/leaderboard/group/Personal_Best/map/m2/top");
                then.status(200).json_body(json!({ "mapUid": "m2", "tops": [] }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/live/api/token/leaderboard/group/Personal_Best/map/m3/top");
                then.status(500);
            })
            .await;
        let names = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/core/accounts/displayNames/")
                    .query_param("accountIdList", "acc-a")
                    .header("Authorization", format!("nadeo_v1 t={}", token("NadeoServices")));
                then.status(200)
                    .json_body(json!([ { "accountId": "acc-a", "displayName": "Alice" } ]));
            })
            .await;

        let src = live(&server, false).campaign(CampaignRef {
            id: 5,
            name: "KR 5".to_string(),
        });
        assert_eq!(src.kind(), SourceKind::LiveService);
        let out = src.fetch(None).await.unwrap();
        names.assert_async().await;

        assert_eq!(out.len(), 1);
        match &out[0] {
            RawRecord::Leaderboard(e) => {
                assert_eq!(e.engine_map_uid, "m1");
                assert_eq!(e.score, 31_000);
                assert_eq!(e.display_name.as_deref(), Some("Alice"));
                assert_eq!(e.observed_at, FixedClock.now());
            }
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[tokio::test]
    async fn auth_failure_is_surfaced() {
        let server = MockServer::start_async().await;
        let err = live(&server, true).catalog().await.unwrap_err();
        assert!(matches!(err, FetchError::Auth(AuthError::Rejected { status: 401, .. })));
    }
}
