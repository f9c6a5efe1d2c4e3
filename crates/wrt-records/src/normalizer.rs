//! Canonical candidate normalization.
//!
//! Converts raw provider shapes ([`RawRecord`]) into validated
//! [`ScoreCandidate`] values.
//!
//! It does **not**:
//! - fetch anything (that is `wrt-sources`)
//! - compare against the stored record (that is `wrt-reconcile`)

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::raw::{CatalogEntry, LeaderboardEntry, LedgerRow, RawRecord};
use crate::{CandidateDraft, InvalidCandidate, ScoreCandidate, SourceKind, TRACK_LENGTH_CAP_MS};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Why a raw record did not become a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    InvalidCandidate(InvalidCandidate),
    /// The raw shape is not sane (bad score, wrong shape for the kind, ...).
    MalformedRecord(String),
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeError::InvalidCandidate(e) => write!(f, "invalid candidate: {e}"),
            NormalizeError::MalformedRecord(msg) => write!(f, "malformed record: {msg}"),
        }
    }
}

impl std::error::Error for NormalizeError {}

impl From<InvalidCandidate> for NormalizeError {
    fn from(e: InvalidCandidate) -> Self {
        NormalizeError::InvalidCandidate(e)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Extract the catalog label from a display name such as
/// `"Kackiest Kacky #42"` or `"#151–1 Name"`.
///
/// Takes the text after the first `#` up to the next `#`, trims it and
/// replaces en-dashes with ASCII hyphens. `None` when there is no `#` or the
/// segment is empty.
pub fn extract_map_label(display_name: &str) -> Option<String> {
    let segment = display_name.split('#').nth(1)?;
    let label = segment.trim().replace('\u{2013}', "-");
    if label.is_empty() {
        None
    } else {
        Some(label)
    }
}

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

/// Parse a provider timestamp (RFC 3339, or naive `T`/space separated taken
/// as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn check_score(score: i64) -> Result<i64, NormalizeError> {
    if score <= 0 {
        return Err(NormalizeError::MalformedRecord(format!(
            "score must be > 0, got {score}"
        )));
    }
    if score >= TRACK_LENGTH_CAP_MS {
        return Err(NormalizeError::MalformedRecord(format!(
            "score {score} is at or above the track-length cap {TRACK_LENGTH_CAP_MS}"
        )));
    }
    Ok(score)
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Normalize one raw record produced by a connector of kind `kind`.
pub fn normalize(raw: &RawRecord, kind: SourceKind) -> Result<ScoreCandidate, NormalizeError> {
    let draft = match (kind, raw) {
        (SourceKind::LocalLedger, RawRecord::LedgerRow(row)) => from_ledger_row(row)?,
        (SourceKind::Exchange | SourceKind::DedicatedLedger, RawRecord::Catalog(entry)) => {
            from_catalog(entry)?
        }
        (SourceKind::LiveService, RawRecord::Leaderboard(entry)) => from_leaderboard(entry)?,
        (kind, raw) => {
            return Err(NormalizeError::MalformedRecord(format!(
                "shape '{}' does not belong to source {kind}",
                raw.shape_name()
            )))
        }
    };
    Ok(draft.build(kind)?)
}

/// Like [`normalize`], but the source arrives as a persisted tag.
pub fn normalize_tagged(raw: &RawRecord, tag: &str) -> Result<ScoreCandidate, NormalizeError> {
    let kind = SourceKind::parse(tag)
        .ok_or_else(|| InvalidCandidate::UnknownSource(tag.to_string()))?;
    normalize(raw, kind)
}

/// Normalize a whole fetch result. Failures are logged and dropped.
pub fn normalize_batch(raws: &[RawRecord], kind: SourceKind) -> Vec<ScoreCandidate> {
    raws.iter()
        .filter_map(|raw| match normalize(raw, kind) {
            Ok(c) => Some(c),
            Err(err) => {
                tracing::warn!(source = %kind, error = %err, "dropping raw record");
                None
            }
        })
        .collect()
}

fn from_ledger_row(row: &LedgerRow) -> Result<CandidateDraft, NormalizeError> {
    Ok(CandidateDraft {
        engine_map_uid: Some(row.engine_map_uid.clone()),
        map_label: row.display_name.as_deref().and_then(extract_map_label),
        score: check_score(row.score)?,
        recorded_at: row.recorded_at,
        login: row.login.clone(),
        nickname: row.nickname.clone(),
        ..Default::default()
    })
}

fn from_catalog(entry: &CatalogEntry) -> Result<CandidateDraft, NormalizeError> {
    if entry.external_id <= 0 {
        return Err(NormalizeError::MalformedRecord(format!(
            "exchange id must be > 0, got {}",
            entry.external_id
        )));
    }
    let recorded_at = entry.last_activity.as_deref().and_then(|s| {
        let parsed = parse_timestamp(s);
        if parsed.is_none() {
            tracing::debug!(raw = s, "unparseable activity timestamp, using epoch");
        }
        parsed
    });
    Ok(CandidateDraft {
        exchange_map_id: Some(entry.external_id),
        map_label: extract_map_label(&entry.display_name),
        score: check_score(entry.score)?,
        recorded_at,
        nickname: Some(entry.holder_name.clone()),
        ..Default::default()
    })
}

fn from_leaderboard(entry: &LeaderboardEntry) -> Result<CandidateDraft, NormalizeError> {
    let login = entry
        .display_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| entry.account_id.clone());
    Ok(CandidateDraft {
        engine_map_uid: Some(entry.engine_map_uid.clone()),
        score: check_score(entry.score)?,
        recorded_at: Some(entry.observed_at),
        login: Some(login),
        ..Default::default()
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
