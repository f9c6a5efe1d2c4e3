//! JWT payload claims and the derived token state.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::AuthError;

/// Timing claims read from the (unverified) payload segment of a JWT.
/// All values are UTC epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    #[serde(rename = "iat", default)]
    pub issued_at: i64,
    #[serde(rename = "rat")]
    pub refresh_after: i64,
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

impl TokenClaims {
    /// Decode the claims of `token` (`header.payload.signature`).
    pub fn decode(token: &str) -> Result<TokenClaims, AuthError> {
        let payload = token
            .split('.')
            .nth(1)
            .ok_or_else(|| AuthError::Decode("token has no payload segment".to_string()))?;
        // some issuers pad the segment anyway
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim().trim_end_matches('='))
            .map_err(|e| AuthError::Decode(format!("token payload is not base64url: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| AuthError::Decode(format!("token payload claims: {e}")))
    }

    pub fn state(&self, now: DateTime<Utc>) -> TokenState {
        let now = now.timestamp();
        if now >= self.expires_at {
            TokenState::Expired
        } else if now >= self.refresh_after {
            TokenState::Refreshable
        } else {
            TokenState::Fresh
        }
    }
}

/// Ordered weakest first, so `min` over several tokens gives the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TokenState {
    Expired,
    Refreshable,
    Fresh,
}

impl TokenState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenState::Expired => "expired",
            TokenState::Refreshable => "refreshable",
            TokenState::Fresh => "fresh",
        }
    }
}

#[cfg(test)]
pub(crate) fn forge(iat: i64, rat: i64, exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload =
        URL_SAFE_NO_PAD.encode(format!(r#"{{"iat":{iat},"rat":{rat},"exp":{exp}}}"#).as_bytes());
    format!("{header}.{payload}.sig")
}
