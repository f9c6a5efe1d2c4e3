//! Identity-service boundary.
//!
//! The trait is what [`crate::TokenLifecycleManager`] talks to; the HTTP
//! implementation speaks the upstream identity + core-services protocol.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::session::Audience;
use crate::AuthError;

pub const DEFAULT_UBI_SESSIONS_URL: &str = "https://public-ubiservices.ubi.com/v3/profiles/sessions";
pub const DEFAULT_CORE_BASE_URL: &str = "https://prod.trackmania.core.nadeo.online";

const UBI_APP_ID: &str = "86263886-327a-4328-ac69-527f0d20a237";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Token pair exactly as the core-services endpoints return it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for RawTokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RawTokenPair { .. }")
    }
}

/// Upstream proof of identity used to obtain per-audience tokens.
#[derive(Clone, PartialEq, Eq)]
pub enum IdentityTicket {
    /// Player account: ticket issued by the identity service.
    Ubi(String),
    /// Dedicated-server account: credentials go straight to the basic endpoint.
    Basic,
}

impl fmt::Debug for IdentityTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityTicket::Ubi(_) => f.write_str("Ubi(<redacted>)"),
            IdentityTicket::Basic => f.write_str("Basic"),
        }
    }
}

#[derive(Deserialize)]
struct UbiSessionResponse {
    ticket: String,
}

#[derive(Serialize)]
struct AudienceBody<'a> {
    audience: &'a str,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Obtain a fresh upstream ticket. One call per reauthentication.
    async fn identity_ticket(&self) -> Result<IdentityTicket, AuthError>;

    async fn exchange_ticket(
        &self,
        ticket: &IdentityTicket,
        audience: Audience,
    ) -> Result<RawTokenPair, AuthError>;

    async fn refresh(&self, refresh_token: &str, audience: Audience)
        -> Result<RawTokenPair, AuthError>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// Player account (identity-service ticket, `ubi_v1` scheme).
    Account,
    /// Dedicated-server account (basic auth on the basic-token endpoint).
    Dedicated,
}

#[derive(Clone)]
pub struct Credentials {
    pub kind: CredentialKind,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("kind", &self.kind)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AuthEndpoints {
    pub ubi_sessions_url: String,
    pub core_base_url: String,
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self {
            ubi_sessions_url: DEFAULT_UBI_SESSIONS_URL.to_string(),
            core_base_url: DEFAULT_CORE_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpIdentityProvider {
    http: reqwest::Client,
    endpoints: AuthEndpoints,
    credentials: Credentials,
    user_agent: String,
}

impl HttpIdentityProvider {
    pub fn new(http: reqwest::Client, credentials: Credentials, user_agent: String) -> Self {
        Self::new_with_endpoints(http, credentials, user_agent, AuthEndpoints::default())
    }

    /// `http` should carry a request timeout; the token manager holds its
    /// session lock for the whole identity call.
    pub fn new_with_endpoints(
        http: reqwest::Client,
        credentials: Credentials,
        user_agent: String,
        endpoints: AuthEndpoints,
    ) -> Self {
        Self {
            http,
            endpoints,
            credentials,
            user_agent,
        }
    }

    fn token_url(&self, path: &str) -> String {
        format!(
            "{}/v2/authentication/token/{path}",
            self.endpoints.core_base_url.trim_end_matches('/')
        )
    }

    async fn read_pair(
        resp: reqwest::Response,
        endpoint: &str,
    ) -> Result<RawTokenPair, AuthError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                endpoint: endpoint.to_string(),
            });
        }
        resp.json::<RawTokenPair>()
            .await
            .map_err(|e| AuthError::Decode(format!("{endpoint} token response: {e}")))
    }
}

fn transport(endpoint: &str, e: reqwest::Error) -> AuthError {
    AuthError::Transport(format!("{endpoint}: {e}"))
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn identity_ticket(&self) -> Result<IdentityTicket, AuthError> {
        if self.credentials.kind == CredentialKind::Dedicated {
            return Ok(IdentityTicket::Basic);
        }

        let endpoint = "identity sessions";
        let resp = self
            .http
            .post(&self.endpoints.ubi_sessions_url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .header("Ubi-AppId", UBI_APP_ID)
            .header("User-Agent", &self.user_agent)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| transport(endpoint, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                endpoint: endpoint.to_string(),
            });
        }
        let body: UbiSessionResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::Decode(format!("identity session response: {e}")))?;
        tracing::debug!("obtained identity ticket");
        Ok(IdentityTicket::Ubi(body.ticket))
    }

    async fn exchange_ticket(
        &self,
        ticket: &IdentityTicket,
        audience: Audience,
    ) -> Result<RawTokenPair, AuthError> {
        let body = AudienceBody {
            audience: audience.as_str(),
        };
        let (endpoint, req) = match ticket {
            IdentityTicket::Ubi(t) => (
                "token/ubiservices",
                self.http
                    .post(self.token_url("ubiservices"))
                    .header("Authorization", format!("ubi_v1 t={t}")),
            ),
            IdentityTicket::Basic => (
                "token/basic",
                self.http
                    .post(self.token_url("basic"))
                    .basic_auth(&self.credentials.username, Some(&self.credentials.password)),
            ),
        };
        let resp = req
            .header("User-Agent", &self.user_agent)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport(endpoint, e))?;
        Self::read_pair(resp, endpoint).await
    }

    async fn refresh(
        &self,
        refresh_token: &str,
        audience: Audience,
    ) -> Result<RawTokenPair, AuthError> {
        let endpoint = "token/refresh";
        let resp = self
            .http
            .post(self.token_url("refresh"))
            .header("Authorization", format!("nadeo_v1 t={refresh_token}"))
            .header("User-Agent", &self.user_agent)
            .json(&AudienceBody {
                audience: audience.as_str(),
            })
            .send()
            .await
            .map_err(|e| transport(endpoint, e))?;
        Self::read_pair(resp, endpoint).await
    }
}

// -----------------
// Tests (local mock server)
// -----------------
