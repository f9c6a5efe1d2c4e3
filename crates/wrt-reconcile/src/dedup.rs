use std::collections::HashMap;

use chrono::{DateTime, Utc};
use wrt_db::MapId;
use wrt_records::ScoreCandidate;

use crate::filter::Improvement;

fn rank_key(c: &ScoreCandidate) -> (i64, bool, DateTime<Utc>, u8) {
    (
        c.score(),
        !c.has_known_timestamp(),
        c.recorded_at(),
        c.source().tie_break_rank(),
    )
}

/// True when `challenger` strictly beats `incumbent`: lower score, then a
/// known timestamp over an unknown one, then earlier timestamp, then higher
/// source priority. Identical on all of these: the incumbent stays.
pub fn beats(challenger: &ScoreCandidate, incumbent: &ScoreCandidate) -> bool {
    rank_key(challenger) < rank_key(incumbent)
}

/// Collapse improvements to one winner per stored map, whichever identifier
/// each provider used. Output follows the order in which each map first
/// appeared.
pub fn resolve(improvements: Vec<Improvement>) -> Vec<Improvement> {
    let mut order: Vec<MapId> = Vec::new();
    let mut best: HashMap<MapId, Improvement> = HashMap::new();

    for imp in improvements {
        match best.get_mut(&imp.map_id) {
            Some(current) => {
                if beats(&imp.candidate, &current.candidate) {
                    *current = imp;
                }
            }
            None => {
                order.push(imp.map_id);
                best.insert(imp.map_id, imp);
            }
        }
    }

    order.into_iter().filter_map(|id| best.remove(&id)).collect()
}
