//! Raw provider shapes.
//!
//! Each provider family reports bests in its own layout. Connectors hand these
//! to the normalizer untouched; no validation happens here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

/// One per-map best row from the local records ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub engine_map_uid: String,
    pub display_name: Option<String>,
    pub score: i64,
    pub recorded_at: Option<DateTime<Utc>>,
    pub login: Option<String>,
    pub nickname: Option<String>,
}

/// One catalog entry from the track-exchange site or the dedicated ledger.
///
/// `last_activity` is the provider's raw timestamp string; the dedicated
/// ledger never reports one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub display_name: String,
    pub external_id: i64,
    pub score: i64,
    pub holder_name: String,
    pub last_activity: Option<String>,
}

/// Top entry of a live-service map leaderboard, with the account id already
/// resolved to a display name where possible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub engine_map_uid: String,
    pub account_id: String,
    pub display_name: Option<String>,
    pub score: i64,
    pub observed_at: DateTime<Utc>,
}

/// Tagged union over every raw shape a connector can produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum RawRecord {
    LedgerRow(LedgerRow),
    Catalog(CatalogEntry),
    Leaderboard(LeaderboardEntry),
}

impl RawRecord {
    pub fn shape_name(&self) -> &'static str {
        match self {
            RawRecord::LedgerRow(_) => "ledger_row",
            RawRecord::Catalog(_) => "catalog",
            RawRecord::Leaderboard(_) => "leaderboard",
        }
    }
}
