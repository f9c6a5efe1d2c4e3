//! wrt-auth
//!
//! Token lifecycle for the OAuth-like live-service provider family.
//!
//! - [`claims`]: JWT payload decoding and the FRESH / REFRESHABLE / EXPIRED state
//! - [`session`]: per-audience token pairs and the session aggregate
//! - [`provider`]: identity-service boundary (trait + HTTP implementation)
//! - [`manager`]: [`TokenLifecycleManager`], the only owner of the session
//!
//! Signatures are never verified; the claims only drive refresh timing.

pub mod claims;
pub mod manager;
pub mod provider;
pub mod session;

use std::fmt;

pub use claims::{TokenClaims, TokenState};
pub use manager::TokenLifecycleManager;
pub use provider::{
    AuthEndpoints, CredentialKind, Credentials, HttpIdentityProvider, IdentityProvider,
    IdentityTicket, RawTokenPair,
};
pub use session::{Audience, AuthSession, TokenPair};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Authentication failure. Always fatal to the calling job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Network or transport failure talking to an identity endpoint.
    Transport(String),
    /// An identity endpoint answered with a non-success status.
    Rejected { status: u16, endpoint: String },
    /// A response or token could not be decoded.
    Decode(String),
    /// The session has no token for the requested audience.
    MissingAudience(Audience),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::Transport(msg) => write!(f, "auth transport error: {msg}"),
            AuthError::Rejected { status, endpoint } => {
                write!(f, "auth rejected by {endpoint} (status={status})")
            }
            AuthError::Decode(msg) => write!(f, "auth decode error: {msg}"),
            AuthError::MissingAudience(a) => write!(f, "no token for audience {a}"),
        }
    }
}

impl std::error::Error for AuthError {}
