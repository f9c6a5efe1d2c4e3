//! wrt-reconcile
//!
//! Per-cycle reconciliation of normalized candidates against the canonical
//! store:
//! - filter: keep only strict improvements over the stored record
//! - dedup: one winner per stored map when several providers report at once,
//!   keyed by the store's map id rather than the provider identifier
//! - applier: write the winner and arm the pending notification
//!
//! Store access goes through [`wrt_db::RecordStore`]; any storage failure is
//! returned to the caller untouched.

mod applier;
mod dedup;
mod filter;

pub use applier::{apply, elapsed_days, ApplyOutcome};
pub use dedup::{beats, resolve};
pub use filter::{filter, Improvement};
