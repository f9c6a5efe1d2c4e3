//! Local records ledger: per-map bests straight from its own database.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use wrt_db::{Row, SqlValue, StorageError, StorageGateway};
use wrt_records::{Clock, LedgerRow, RawRecord, SourceKind};

use crate::{unavailable, ConnectorError, FetchError, SourceConnector};

/// Best record per map among non-banned players, set after `$1`. Ties on
/// score all come back; deduplication sorts them out.
const RECENT_BESTS_SQL: &str = r#"
select records.challenge_uid,
       challenges.name,
       records.score,
       records.date,
       players.login,
       players.nickname
from (select records.challenge_uid, min(records.score) as best
      from records
      join players on records.player_id = players.id
      where players.banned = 0
      group by records.challenge_uid) top
join records
  on top.challenge_uid = records.challenge_uid
 and top.best = records.score
left join players on records.player_id = players.id
left join challenges on challenges.uid = records.challenge_uid
where records.date > $1
"#;

pub struct LocalLedgerSource {
    gateway: Arc<dyn StorageGateway>,
    clock: Arc<dyn Clock>,
    lookback: Duration,
}

impl LocalLedgerSource {
    pub fn new(gateway: Arc<dyn StorageGateway>, clock: Arc<dyn Clock>, lookback: Duration) -> Self {
        Self {
            gateway,
            clock,
            lookback,
        }
    }

    fn decode(row: &Row) -> Result<LedgerRow, StorageError> {
        let engine_map_uid = row
            .text(0)?
            .ok_or_else(|| StorageError::Decode("challenge_uid is null".to_string()))?;
        Ok(LedgerRow {
            engine_map_uid,
            display_name: row.text(1)?,
            score: row.int(2)?,
            recorded_at: row.timestamp(3)?,
            login: row.text(4)?,
            nickname: row.text(5)?,
        })
    }
}

#[async_trait]
impl SourceConnector for LocalLedgerSource {
    fn kind(&self) -> SourceKind {
        SourceKind::LocalLedger
    }

    async fn fetch(&self, since: Option<DateTime<Utc>>) -> Result<Vec<RawRecord>, FetchError> {
        let since = since.unwrap_or_else(|| self.clock.now() - self.lookback);
        let rows = match self
            .gateway
            .fetch_all(RECENT_BESTS_SQL, &[SqlValue::Timestamp(since)])
            .await
        {
            Ok(rows) => rows,
            Err(e) => return Ok(unavailable(self.kind(), &ConnectorError::Storage(e.to_string()))),
        };

        let out: Vec<RawRecord> = rows
            .iter()
            .filter_map(|row| match Self::decode(row) {
                Ok(r) => Some(RawRecord::LedgerRow(r)),
                Err(e) => {
                    tracing::debug!(error = %e, "dropping ledger row");
                    None
                }
            })
            .collect();
        tracing::debug!(source = %self.kind(), fetched = out.len(), since = %since, "ledger bests fetched");
        Ok(out)
    }
}
