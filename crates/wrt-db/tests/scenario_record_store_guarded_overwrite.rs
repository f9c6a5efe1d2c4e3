//! The SQL record store against a real Postgres.
//!
//! DB-backed test, skipped if WRT_DATABASE_URL is not set.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use wrt_db::{PgGateway, PoolSettings, RecordStore, SqlRecordStore, SqlValue, StorageGateway};
use wrt_records::{CandidateDraft, MapKey, SourceKind};

#[tokio::test]
async fn guarded_overwrite_and_notification_roundtrip() -> anyhow::Result<()> {
    let url = match std::env::var(wrt_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: WRT_DATABASE_URL not set");
            return Ok(());
        }
    };

    let pool = wrt_db::connect(&url, PoolSettings::default()).await?;
    wrt_db::migrate(&pool).await?;
    wrt_db::migrate(&pool).await?;

    let gateway: Arc<dyn StorageGateway> = Arc::new(PgGateway::new(pool));
    let uid = format!("scenario-{}", uuid::Uuid::new_v4());
    let old_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    gateway
        .execute(
            "insert into maps (engine_map_uid, display_name) values ($1, $2)",
            &[SqlValue::Text(uid.clone()), SqlValue::from("Scenario #1")],
        )
        .await?;
    gateway
        .execute(
            "insert into map_records (map_id, score, login, nickname, source, recorded_at) \
             select id, $1, 'old', 'old', 'KKDB', $2 from maps where engine_map_uid = $3",
            &[
                SqlValue::Int(5_000),
                SqlValue::Timestamp(old_at),
                SqlValue::Text(uid.clone()),
            ],
        )
        .await?;

    let store = SqlRecordStore::new(gateway.clone());
    let key = MapKey::EngineUid(uid.clone());

    let map_id = store.worse_record_map(&key, 4_800).await?.expect("map is worse");
    assert_eq!(store.worse_record_map(&key, 5_000).await?, None);
    let id_row = gateway
        .fetch_one("select id from maps where engine_map_uid = $1", &[SqlValue::Text(uid.clone())])
        .await?
        .expect("map row exists");
    assert_eq!(id_row.int(0)?, map_id);

    let better = CandidateDraft {
        engine_map_uid: Some(uid.clone()),
        score: 4_800,
        recorded_at: Some(Utc.with_ymd_and_hms(2024, 1, 4, 0, 0, 0).unwrap()),
        login: Some("new".to_string()),
        ..Default::default()
    }
    .build(SourceKind::LiveService)?;

    assert_eq!(store.arm_notification(&key, 200, 3).await?, 1);
    assert_eq!(store.overwrite_record(&better).await?, 1);
    // same candidate again: the guard keeps the row untouched
    assert_eq!(store.overwrite_record(&better).await?, 0);

    let current = store.current_record(&key).await?.expect("row exists");
    assert_eq!(current.score, 4_800);

    let row = gateway
        .fetch_one(
            "select n.notified, n.score_delta, n.days_passed, r.source, r.nickname \
             from record_notifications n join maps m on n.map_id = m.id \
             join map_records r on r.map_id = m.id where m.engine_map_uid = $1",
            &[SqlValue::Text(uid)],
        )
        .await?
        .expect("notification row exists");
    assert_eq!(row.get(0), Some(&SqlValue::Bool(false)));
    assert_eq!(row.int(1)?, 200);
    assert_eq!(row.int(2)?, 3);
    assert_eq!(row.text(3)?.as_deref(), Some("NADO"));
    assert_eq!(row.text(4)?.as_deref(), Some(""));

    Ok(())
}
