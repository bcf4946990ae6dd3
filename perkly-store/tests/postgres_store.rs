use chrono::{TimeDelta, TimeZone, Utc};
use perkly_core::repository::{RecordStore, StoreError};
use perkly_core::{Offer, Transaction};
use perkly_store::PostgresRecordStore;
use sqlx::PgPool;

fn offer(id: &str) -> Offer {
    Offer {
        id: id.to_string(),
        merchant_id: "merchant-abc".to_string(),
        mcc_whitelist: vec!["5812".to_string(), "5814".to_string()],
        active: true,
        min_txn_count: 3,
        lookback_days: 30,
        starts_at: Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap(),
        ends_at: Utc.with_ymd_and_hms(2025, 10, 31, 23, 59, 59).unwrap(),
        created_at: None,
        updated_at: None,
    }
}

fn txn(user_id: &str, merchant_id: &str, mcc: &str, days_ago: i64) -> Transaction {
    let now = Utc.with_ymd_and_hms(2025, 10, 21, 10, 0, 0).unwrap();
    Transaction {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        merchant_id: merchant_id.to_string(),
        mcc: mcc.to_string(),
        amount_cents: 1250,
        approved_at: now - TimeDelta::days(days_ago),
        created_at: None,
    }
}

#[sqlx::test(migrations = "../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn upsert_replaces_every_field_and_keeps_created_at(pool: PgPool) {
    let store = PostgresRecordStore::new(pool);
    let id = uuid::Uuid::new_v4().to_string();

    let first = store.upsert_offer(&offer(&id)).await.unwrap();

    let mut changed = offer(&id);
    changed.active = false;
    changed.mcc_whitelist = vec![];
    changed.min_txn_count = 0;
    let second = store.upsert_offer(&changed).await.unwrap();

    assert!(!second.active);
    assert!(second.mcc_whitelist.is_empty());
    assert_eq!(second.min_txn_count, 0);
    assert_eq!(first.created_at, second.created_at);
}

#[sqlx::test(migrations = "../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn active_offers_uses_inclusive_bounds(pool: PgPool) {
    let store = PostgresRecordStore::new(pool);
    let o = offer(&uuid::Uuid::new_v4().to_string());
    store.upsert_offer(&o).await.unwrap();

    assert_eq!(store.active_offers(o.starts_at).await.unwrap().len(), 1);
    assert_eq!(store.active_offers(o.ends_at).await.unwrap().len(), 1);
    assert!(store
        .active_offers(o.ends_at + TimeDelta::seconds(1))
        .await
        .unwrap()
        .is_empty());
}

#[sqlx::test(migrations = "../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_id_rolls_back_the_whole_batch(pool: PgPool) {
    let store = PostgresRecordStore::new(pool);
    let existing = txn("u1", "merchant-abc", "5812", 1);
    store.insert_transactions(&[existing.clone()]).await.unwrap();

    let fresh = txn("u1", "merchant-abc", "5812", 2);
    let err = store
        .insert_transactions(&[fresh.clone(), existing.clone()])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Duplicate(ref id) if *id == existing.id));

    let now = Utc.with_ymd_and_hms(2025, 10, 21, 10, 0, 0).unwrap();
    let count = store
        .count_matching_transactions("u1", &offer("o"), now)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[sqlx::test(migrations = "../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn count_matches_merchant_or_mcc_within_window(pool: PgPool) {
    let store = PostgresRecordStore::new(pool);
    store
        .insert_transactions(&[
            txn("u1", "merchant-abc", "0000", 1),
            txn("u1", "elsewhere", "5814", 5),
            txn("u1", "elsewhere", "5999", 5),
            txn("u1", "merchant-abc", "5812", 45),
            txn("u2", "merchant-abc", "5812", 1),
        ])
        .await
        .unwrap();

    let now = Utc.with_ymd_and_hms(2025, 10, 21, 10, 0, 0).unwrap();
    let count = store
        .count_matching_transactions("u1", &offer("o"), now)
        .await
        .unwrap();
    assert_eq!(count, 2);
}
