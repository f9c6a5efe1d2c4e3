use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::claims::{TokenClaims, TokenState};
use crate::provider::RawTokenPair;
use crate::AuthError;

// ---------------------------------------------------------------------------
// Audience
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Audience {
    CoreServices,
    LiveServices,
    ClubServices,
}

impl Audience {
    pub const ALL: [Audience; 3] = [
        Audience::CoreServices,
        Audience::LiveServices,
        Audience::ClubServices,
    ];

    /// Name sent in the `audience` field of token requests.
    pub fn as_str(&self) -> &'static str {
        match self {
            Audience::CoreServices => "NadeoServices",
            Audience::LiveServices => "NadeoLiveServices",
            Audience::ClubServices => "NadeoClubServices",
        }
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TokenPair
// ---------------------------------------------------------------------------

/// Access + refresh token for one audience, claims decoded up front.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    access_token: String,
    refresh_token: String,
    access: TokenClaims,
    refresh: TokenClaims,
}

impl TokenPair {
    pub fn decode(raw: RawTokenPair) -> Result<TokenPair, AuthError> {
        let access = TokenClaims::decode(&raw.access_token)?;
        let refresh = TokenClaims::decode(&raw.refresh_token)?;
        Ok(TokenPair {
            access_token: raw.access_token,
            refresh_token: raw.refresh_token,
            access,
            refresh,
        })
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    /// The pair's state is its access token's state.
    pub fn state(&self, now: DateTime<Utc>) -> TokenState {
        self.access.state(now)
    }

    pub fn refresh_state(&self, now: DateTime<Utc>) -> TokenState {
        self.refresh.state(now)
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &self.access)
            .field("refresh", &self.refresh)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// AuthSession
// ---------------------------------------------------------------------------

/// One token pair per audience.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthSession {
    pairs: BTreeMap<Audience, TokenPair>,
}

impl AuthSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, audience: Audience, pair: TokenPair) {
        self.pairs.insert(audience, pair);
    }

    pub fn pair(&self, audience: Audience) -> Option<&TokenPair> {
        self.pairs.get(&audience)
    }

    pub fn access_token(&self, audience: Audience) -> Option<&str> {
        self.pair(audience).map(TokenPair::access_token)
    }

    /// Weakest state over all audiences. A missing audience counts as expired.
    pub fn state(&self, now: DateTime<Utc>) -> TokenState {
        Audience::ALL
            .iter()
            .map(|a| {
                self.pairs
                    .get(a)
                    .map_or(TokenState::Expired, |p| p.state(now))
            })
            .min()
            .unwrap_or(TokenState::Expired)
    }

    /// True when a refresh can not be attempted for every audience.
    pub fn refresh_expired(&self, now: DateTime<Utc>) -> bool {
        Audience::ALL.iter().any(|a| {
            self.pairs
                .get(a)
                .map_or(true, |p| p.refresh_state(now) == TokenState::Expired)
        })
    }
}
