use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, TimeZone, Utc};
use wrt_auth::{Audience, AuthError, IdentityProvider, IdentityTicket, RawTokenPair};
use wrt_records::Clock;

/// Unsigned JWT carrying only the claims the token manager reads.
pub fn forge_token(iat: i64, rat: i64, exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload =
        URL_SAFE_NO_PAD.encode(format!(r#"{{"iat":{iat},"rat":{rat},"exp":{exp}}}"#).as_bytes());
    format!("{header}.{payload}.unsigned")
}

// ---------------------------------------------------------------------------
// ManualClock
// ---------------------------------------------------------------------------

/// Clock that only moves when told to. Second resolution.
#[derive(Debug)]
pub struct ManualClock {
    secs: AtomicI64,
}

impl ManualClock {
    pub fn at(secs: i64) -> Self {
        Self {
            secs: AtomicI64::new(secs),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.secs.fetch_add(by.num_seconds(), Ordering::SeqCst);
    }

    pub fn set(&self, secs: i64) {
        self.secs.store(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.secs.load(Ordering::SeqCst), 0)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

// ---------------------------------------------------------------------------
// ScriptedIdentityProvider
// ---------------------------------------------------------------------------

/// Identity service double. Every pair it issues is stamped from the shared
/// clock: access tokens become refreshable after `refresh_after` and expire
/// after `expires_after`; refresh tokens expire after `refresh_lifetime`.
pub struct ScriptedIdentityProvider {
    clock: Arc<ManualClock>,
    refresh_after: Duration,
    expires_after: Duration,
    refresh_lifetime: Duration,
    failure: Mutex<Option<AuthError>>,
    tickets: AtomicUsize,
    exchanges: AtomicUsize,
    refreshes: AtomicUsize,
}

impl ScriptedIdentityProvider {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self::with_lifetimes(clock, Duration::hours(1), Duration::hours(2), Duration::hours(24))
    }

    pub fn with_lifetimes(
        clock: Arc<ManualClock>,
        refresh_after: Duration,
        expires_after: Duration,
        refresh_lifetime: Duration,
    ) -> Self {
        Self {
            clock,
            refresh_after,
            expires_after,
            refresh_lifetime,
            failure: Mutex::new(None),
            tickets: AtomicUsize::new(0),
            exchanges: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
        }
    }

    /// Every following call fails with `err` until cleared with `None`.
    pub fn fail_with(&self, err: Option<AuthError>) {
        match self.failure.lock() {
            Ok(mut g) => *g = err,
            Err(poisoned) => *poisoned.into_inner() = err,
        }
    }

    pub fn ticket_count(&self) -> usize {
        self.tickets.load(Ordering::SeqCst)
    }

    pub fn exchange_count(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), AuthError> {
        let failure = match self.failure.lock() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        failure.map_or(Ok(()), Err)
    }

    fn issue(&self) -> RawTokenPair {
        let now = self.clock.now().timestamp();
        RawTokenPair {
            access_token: forge_token(
                now,
                now + self.refresh_after.num_seconds(),
                now + self.expires_after.num_seconds(),
            ),
            refresh_token: forge_token(
                now,
                now + self.refresh_lifetime.num_seconds(),
                now + self.refresh_lifetime.num_seconds(),
            ),
        }
    }
}

#[async_trait]
impl IdentityProvider for ScriptedIdentityProvider {
    async fn identity_ticket(&self) -> Result<IdentityTicket, AuthError> {
        self.check()?;
        self.tickets.fetch_add(1, Ordering::SeqCst);
        Ok(IdentityTicket::Basic)
    }

    async fn exchange_ticket(
        &self,
        _ticket: &IdentityTicket,
        _audience: Audience,
    ) -> Result<RawTokenPair, AuthError> {
        self.check()?;
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        Ok(self.issue())
    }

    async fn refresh(
        &self,
        _refresh_token: &str,
        _audience: Audience,
    ) -> Result<RawTokenPair, AuthError> {
        self.check()?;
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(self.issue())
    }
}
