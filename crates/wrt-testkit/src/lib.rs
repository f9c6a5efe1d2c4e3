//! wrt-testkit
//!
//! In-process doubles for the record tracker:
//! - [`MemoryRecordStore`]: canonical store with the same guard semantics as
//!   the SQL store, plus one-shot failure injection
//! - [`StaticConnector`]: a provider that returns a fixed batch
//! - [`ScriptedIdentityProvider`] + [`ManualClock`]: token lifecycle without
//!   a network
//!
//! Scenario tests for the whole engine live under `tests/`.

mod auth;
mod connector;
mod store;

pub use auth::{forge_token, ManualClock, ScriptedIdentityProvider};
pub use connector::StaticConnector;
pub use store::{MemoryRecord, MemoryRecordStore, Notification};
