use chrono::{DateTime, Utc};
use wrt_db::{RecordStore, StorageError};
use wrt_records::ScoreCandidate;

/// What [`apply`] did for one winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied {
        previous_score: i64,
        score_delta: i64,
        days_passed: i64,
    },
    /// The map has no stored record row.
    MapMissing,
    /// The stored score is already as good as the candidate's.
    Superseded,
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied { .. })
    }
}

/// Whole days between the previous record and the new one. Floored; a new
/// timestamp that predates the old one counts as zero days.
pub fn elapsed_days(old: DateTime<Utc>, new: DateTime<Utc>) -> i64 {
    (new - old).num_days().max(0)
}

/// Write one winning candidate.
///
/// Arms the notification, then overwrites the record. The two statements are
/// not atomic: a failure in between leaves the notification armed over the
/// old record.
pub async fn apply(
    store: &dyn RecordStore,
    candidate: &ScoreCandidate,
) -> Result<ApplyOutcome, StorageError> {
    let key = candidate.map_key();
    let Some(previous) = store.current_record(key).await? else {
        tracing::debug!(map = %key, "no stored record, skipping");
        return Ok(ApplyOutcome::MapMissing);
    };
    if previous.score <= candidate.score() {
        tracing::debug!(map = %key, stored = previous.score, score = candidate.score(), "stored record already as good");
        return Ok(ApplyOutcome::Superseded);
    }

    let score_delta = previous.score - candidate.score();
    let days_passed = elapsed_days(previous.recorded_at, candidate.recorded_at());

    store.arm_notification(key, score_delta, days_passed).await?;
    let written = store.overwrite_record(candidate).await?;
    if written == 0 {
        tracing::warn!(map = %key, score = candidate.score(), "record changed underneath the overwrite, notification left armed");
        return Ok(ApplyOutcome::Superseded);
    }

    tracing::info!(
        map = %key,
        label = candidate.map_label().unwrap_or(""),
        source = %candidate.source(),
        holder = %candidate.holder().display(),
        previous = previous.score,
        score = candidate.score(),
        delta = score_delta,
        days = days_passed,
        "new record applied"
    );
    Ok(ApplyOutcome::Applied {
        previous_score: previous.score,
        score_delta,
        days_passed,
    })
}
