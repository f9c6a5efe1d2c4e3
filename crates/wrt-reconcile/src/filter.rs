use wrt_db::{MapId, RecordStore, StorageError};
use wrt_records::{ScoreCandidate, SourceKind};

/// A candidate that beats the stored record of map `map_id`.
///
/// Providers name maps by different identifiers; `map_id` is the store's
/// own id, so it is the same for every provider reporting one map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Improvement {
    pub map_id: MapId,
    pub candidate: ScoreCandidate,
}

/// Keep the candidates whose map exists in the store with a strictly worse
/// score. One store query per candidate; maps unknown to the store are
/// dropped without comment.
pub async fn filter(
    store: &dyn RecordStore,
    candidates: Vec<ScoreCandidate>,
    kind: SourceKind,
) -> Result<Vec<Improvement>, StorageError> {
    let total = candidates.len();
    let mut kept = Vec::new();
    for candidate in candidates {
        if let Some(map_id) = store.worse_record_map(candidate.map_key(), candidate.score()).await? {
            kept.push(Improvement { map_id, candidate });
        }
    }
    tracing::debug!(source = %kind, candidates = total, improvements = kept.len(), "filtered candidates");
    Ok(kept)
}
