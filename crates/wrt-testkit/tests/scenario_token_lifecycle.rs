//! Scenario: token state transitions drive refresh vs reauthentication.
//!
//! Tokens are issued at t with rat = t + 1h, exp = t + 2h; refresh tokens
//! live 24h.
//! - FRESH: no upstream call
//! - REFRESHABLE: every audience refreshed, no new ticket
//! - EXPIRED: one new ticket, exchanged per audience
//! - refresh token expired: reauthenticate instead of refreshing
//! - failure: surfaced, previous session untouched

use std::sync::Arc;

use chrono::Duration;
use wrt_auth::{Audience, AuthError, TokenClaims, TokenLifecycleManager, TokenState};
use wrt_records::Clock;
use wrt_testkit::{ManualClock, ScriptedIdentityProvider};

const T0: i64 = 1_700_000_000;

fn setup() -> (Arc<ManualClock>, Arc<ScriptedIdentityProvider>, TokenLifecycleManager) {
    let clock = Arc::new(ManualClock::at(T0));
    let provider = Arc::new(ScriptedIdentityProvider::new(clock.clone()));
    let mgr = TokenLifecycleManager::new(provider.clone(), clock.clone());
    (clock, provider, mgr)
}

#[tokio::test]
async fn fresh_session_is_reused() {
    let (clock, provider, mgr) = setup();
    let first = mgr.ensure_valid(Audience::LiveServices).await.unwrap();
    clock.advance(Duration::minutes(59));
    let second = mgr.ensure_valid(Audience::LiveServices).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(provider.ticket_count(), 1);
    assert_eq!(provider.exchange_count(), 3);
    assert_eq!(provider.refresh_count(), 0);
    assert_eq!(mgr.session_state().await, TokenState::Fresh);
}

#[tokio::test]
async fn refreshable_session_refreshes_every_audience() {
    let (clock, provider, mgr) = setup();
    mgr.ensure_valid(Audience::CoreServices).await.unwrap();
    clock.advance(Duration::minutes(90));
    assert_eq!(mgr.session_state().await, TokenState::Refreshable);

    let token = mgr.ensure_valid(Audience::CoreServices).await.unwrap();
    assert_eq!(provider.refresh_count(), 3);
    assert_eq!(provider.ticket_count(), 1);

    let claims = TokenClaims::decode(&token).unwrap();
    assert_eq!(claims.issued_at, clock.now().timestamp());
    assert_eq!(mgr.session_state().await, TokenState::Fresh);
}

#[tokio::test]
async fn expired_session_reauthenticates() {
    let (clock, provider, mgr) = setup();
    mgr.ensure_valid(Audience::ClubServices).await.unwrap();
    clock.advance(Duration::hours(3));
    assert_eq!(mgr.session_state().await, TokenState::Expired);

    mgr.ensure_valid(Audience::ClubServices).await.unwrap();
    assert_eq!(provider.ticket_count(), 2);
    assert_eq!(provider.exchange_count(), 6);
    assert_eq!(provider.refresh_count(), 0);
}

#[tokio::test]
async fn expired_refresh_token_forces_reauthentication() {
    let clock = Arc::new(ManualClock::at(T0));
    let provider = Arc::new(ScriptedIdentityProvider::with_lifetimes(
        clock.clone(),
        Duration::hours(1),
        Duration::hours(4),
        Duration::hours(2),
    ));
    let mgr = TokenLifecycleManager::new(provider.clone(), clock.clone());

    mgr.ensure_valid(Audience::LiveServices).await.unwrap();
    // access token refreshable, refresh token already expired
    clock.advance(Duration::hours(3));
    mgr.ensure_valid(Audience::LiveServices).await.unwrap();

    assert_eq!(provider.refresh_count(), 0);
    assert_eq!(provider.ticket_count(), 2);
}

#[tokio::test]
async fn failure_is_returned_and_session_kept() {
    let (clock, provider, mgr) = setup();
    let before = mgr.ensure_valid(Audience::LiveServices).await.unwrap();

    clock.advance(Duration::minutes(90));
    let rejected = AuthError::Rejected {
        status: 401,
        endpoint: "token/refresh".to_string(),
    };
    provider.fail_with(Some(rejected.clone()));
    assert_eq!(mgr.ensure_valid(Audience::LiveServices).await, Err(rejected));
    assert_eq!(mgr.session_state().await, TokenState::Refreshable);

    provider.fail_with(None);
    let after = mgr.ensure_valid(Audience::LiveServices).await.unwrap();
    assert_ne!(before, after);
}
