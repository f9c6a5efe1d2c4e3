//! wrt-records
//!
//! Canonical record model shared by every other crate: source kinds, map keys,
//! record holders and the validated [`ScoreCandidate`]. Also owns the raw
//! provider shapes and the normalizer that turns them into candidates.
//!
//! Pure logic. No IO, no HTTP, no database.

pub mod clock;
pub mod normalizer;
pub mod raw;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use clock::{Clock, SystemClock};
pub use normalizer::{
    extract_map_label, normalize, normalize_batch, normalize_tagged, parse_timestamp,
    NormalizeError,
};
pub use raw::{CatalogEntry, LeaderboardEntry, LedgerRow, RawRecord};

/// Track-length cap in milliseconds. A score at or above this value is not a
/// real record (providers use it as a "no time" sentinel).
pub const TRACK_LENGTH_CAP_MS: i64 = 15 * 60 * 1000;

/// Timestamp used when a provider does not report when a record was set.
/// Never wins an equal-score tie-break against a real timestamp.
pub const UNKNOWN_RECORDED_AT: DateTime<Utc> = DateTime::<Utc>::UNIX_EPOCH;

// ---------------------------------------------------------------------------
// SourceKind
// ---------------------------------------------------------------------------

/// The provider family a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    LocalLedger,
    Exchange,
    DedicatedLedger,
    LiveService,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::LocalLedger,
        SourceKind::Exchange,
        SourceKind::DedicatedLedger,
        SourceKind::LiveService,
    ];

    /// Tag persisted in the `source` column of the canonical store.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::LocalLedger => "KKDB",
            SourceKind::Exchange => "TMX",
            SourceKind::DedicatedLedger => "DEDI",
            SourceKind::LiveService => "NADO",
        }
    }

    /// Parse a persisted tag or a config-style name (case-insensitive).
    ///
    /// `KRDB` is the tag the second local ledger used historically and maps to
    /// the same kind.
    pub fn parse(tag: &str) -> Option<SourceKind> {
        match tag.trim().to_ascii_uppercase().as_str() {
            "KKDB" | "KRDB" | "LOCAL_LEDGER" => Some(SourceKind::LocalLedger),
            "TMX" | "EXCHANGE" => Some(SourceKind::Exchange),
            "DEDI" | "DEDICATED_LEDGER" => Some(SourceKind::DedicatedLedger),
            "NADO" | "LIVE_SERVICE" => Some(SourceKind::LiveService),
            _ => None,
        }
    }

    /// Final tie-break when two candidates share both score and timestamp.
    /// Lower rank wins.
    pub fn tie_break_rank(&self) -> u8 {
        match self {
            SourceKind::LocalLedger => 0,
            SourceKind::LiveService => 1,
            SourceKind::Exchange => 2,
            SourceKind::DedicatedLedger => 3,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// MapKey
// ---------------------------------------------------------------------------

/// Identifier used to address a map in the canonical store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MapKey {
    /// Numeric id on the track-exchange site.
    Exchange(i64),
    /// Engine-level map uid.
    EngineUid(String),
}

impl MapKey {
    /// Store column holding this identifier.
    pub fn column(&self) -> &'static str {
        match self {
            MapKey::Exchange(_) => "exchange_map_id",
            MapKey::EngineUid(_) => "engine_map_uid",
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Exchange(id) => write!(f, "exchange:{id}"),
            MapKey::EngineUid(uid) => write!(f, "uid:{uid}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Holder
// ---------------------------------------------------------------------------

/// Who set the record. At least one field is present on a valid candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holder {
    pub login: Option<String>,
    pub nickname: Option<String>,
}

impl Holder {
    /// Best human-readable name (nickname first).
    pub fn display(&self) -> &str {
        self.nickname
            .as_deref()
            .or(self.login.as_deref())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Candidate invariants
// ---------------------------------------------------------------------------

/// A candidate that violates the model invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidCandidate {
    /// Neither exchange id nor engine uid was provided.
    MissingMapKey,
    /// Neither login nor nickname was provided.
    MissingHolder,
    /// The source tag is not one of the four known kinds.
    UnknownSource(String),
}

impl fmt::Display for InvalidCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidCandidate::MissingMapKey => {
                write!(f, "candidate has neither exchange map id nor engine map uid")
            }
            InvalidCandidate::MissingHolder => {
                write!(f, "candidate has neither holder login nor nickname")
            }
            InvalidCandidate::UnknownSource(tag) => write!(f, "unknown source kind '{tag}'"),
        }
    }
}

impl std::error::Error for InvalidCandidate {}

// ---------------------------------------------------------------------------
// ScoreCandidate
// ---------------------------------------------------------------------------

/// Unvalidated candidate fields. Call [`CandidateDraft::build`] to obtain a
/// [`ScoreCandidate`]. Blank strings count as absent.
#[derive(Debug, Clone, Default)]
pub struct CandidateDraft {
    pub exchange_map_id: Option<i64>,
    pub engine_map_uid: Option<String>,
    pub map_label: Option<String>,
    pub score: i64,
    pub recorded_at: Option<DateTime<Utc>>,
    pub login: Option<String>,
    pub nickname: Option<String>,
}

impl CandidateDraft {
    pub fn build(self, source: SourceKind) -> Result<ScoreCandidate, InvalidCandidate> {
        let engine_map_uid = non_blank(self.engine_map_uid);
        let map_key = match (self.exchange_map_id, &engine_map_uid) {
            (Some(id), _) => MapKey::Exchange(id),
            (None, Some(uid)) => MapKey::EngineUid(uid.clone()),
            (None, None) => return Err(InvalidCandidate::MissingMapKey),
        };

        let holder = Holder {
            login: non_blank(self.login),
            nickname: non_blank(self.nickname),
        };
        if holder.login.is_none() && holder.nickname.is_none() {
            return Err(InvalidCandidate::MissingHolder);
        }

        Ok(ScoreCandidate {
            map_key,
            exchange_map_id: self.exchange_map_id,
            engine_map_uid,
            map_label: non_blank(self.map_label),
            score: self.score,
            recorded_at: self.recorded_at.unwrap_or(UNKNOWN_RECORDED_AT),
            source,
            holder,
        })
    }
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// A normalized report of a possibly-new best time from one provider.
///
/// Only constructible through [`CandidateDraft::build`], so every instance
/// carries a map key and a holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreCandidate {
    map_key: MapKey,
    exchange_map_id: Option<i64>,
    engine_map_uid: Option<String>,
    map_label: Option<String>,
    score: i64,
    recorded_at: DateTime<Utc>,
    source: SourceKind,
    holder: Holder,
}

impl ScoreCandidate {
    /// Preferred store key: exchange id when present, engine uid otherwise.
    pub fn map_key(&self) -> &MapKey {
        &self.map_key
    }

    pub fn exchange_map_id(&self) -> Option<i64> {
        self.exchange_map_id
    }

    pub fn engine_map_uid(&self) -> Option<&str> {
        self.engine_map_uid.as_deref()
    }

    pub fn map_label(&self) -> Option<&str> {
        self.map_label.as_deref()
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    /// False when the provider did not report a usable timestamp.
    pub fn has_known_timestamp(&self) -> bool {
        self.recorded_at != UNKNOWN_RECORDED_AT
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn holder(&self) -> &Holder {
        &self.holder
    }
}

// -----------------
// Tests
// -----------------
