//! TokenLifecycleManager: the single writer of the [`AuthSession`].
//!
//! `ensure_valid` decides from the session state (weakest audience wins):
//! - FRESH: nothing to do
//! - REFRESHABLE: refresh every audience with its own refresh token, unless
//!   any refresh token has itself expired, then reauthenticate
//! - EXPIRED / never initialised: one identity ticket, exchanged per audience
//!
//! A new session is built aside and swapped in only when every audience
//! succeeded. A failure leaves the previous session in place and is returned
//! to the caller; cached tokens are never used as a fallback.

use std::sync::Arc;

use tokio::sync::Mutex;
use wrt_records::Clock;

use crate::claims::TokenState;
use crate::provider::IdentityProvider;
use crate::session::{Audience, AuthSession, TokenPair};
use crate::AuthError;

pub struct TokenLifecycleManager {
    provider: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    session: Mutex<Option<AuthSession>>,
}

impl TokenLifecycleManager {
    pub fn new(provider: Arc<dyn IdentityProvider>, clock: Arc<dyn Clock>) -> Self {
        Self {
            provider,
            clock,
            session: Mutex::new(None),
        }
    }

    /// Return a usable access token for `audience`, refreshing or
    /// reauthenticating first when needed.
    pub async fn ensure_valid(&self, audience: Audience) -> Result<String, AuthError> {
        let mut guard = self.session.lock().await;
        let now = self.clock.now();

        let replacement = match guard.as_ref() {
            None => {
                tracing::info!("no auth session, authenticating");
                Some(self.reauthenticate().await?)
            }
            Some(session) => match session.state(now) {
                TokenState::Fresh => None,
                TokenState::Refreshable if !session.refresh_expired(now) => {
                    tracing::info!("access tokens refreshable, refreshing");
                    Some(self.refresh_all(session).await?)
                }
                state => {
                    tracing::info!(state = state.as_str(), "auth session unusable, reauthenticating");
                    Some(self.reauthenticate().await?)
                }
            },
        };

        if let Some(next) = replacement {
            *guard = Some(next);
        }

        guard
            .as_ref()
            .and_then(|s| s.access_token(audience))
            .map(str::to_string)
            .ok_or(AuthError::MissingAudience(audience))
    }

    /// Current aggregate state without touching the session.
    pub async fn session_state(&self) -> TokenState {
        let guard = self.session.lock().await;
        guard
            .as_ref()
            .map_or(TokenState::Expired, |s| s.state(self.clock.now()))
    }

    async fn reauthenticate(&self) -> Result<AuthSession, AuthError> {
        let ticket = self.provider.identity_ticket().await?;
        let mut next = AuthSession::new();
        for audience in Audience::ALL {
            let raw = self.provider.exchange_ticket(&ticket, audience).await?;
            next.insert(audience, TokenPair::decode(raw)?);
        }
        Ok(next)
    }

    async fn refresh_all(&self, current: &AuthSession) -> Result<AuthSession, AuthError> {
        let mut next = AuthSession::new();
        for audience in Audience::ALL {
            let pair = current
                .pair(audience)
                .ok_or(AuthError::MissingAudience(audience))?;
            let raw = self.provider.refresh(pair.refresh_token(), audience).await?;
            next.insert(audience, TokenPair::decode(raw)?);
        }
        Ok(next)
    }
}
