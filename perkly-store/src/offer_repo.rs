use async_trait::async_trait;
use chrono::{DateTime, Utc};
use perkly_core::repository::{RecordStore, StoreError};
use perkly_core::{Offer, Transaction};
use sqlx::PgPool;

/// Record store backed by Postgres. Offers live here; the transaction side is in
/// `transaction_repo`.
#[derive(Clone)]
pub struct PostgresRecordStore {
    pub pool: PgPool,
}

impl PostgresRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct OfferRow {
    id: String,
    merchant_id: String,
    mcc_whitelist: Vec<String>,
    active: bool,
    min_txn_count: i64,
    lookback_days: i64,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OfferRow> for Offer {
    type Error = StoreError;

    fn try_from(row: OfferRow) -> Result<Self, Self::Error> {
        let min_txn_count = u32::try_from(row.min_txn_count).map_err(|_| {
            StoreError::Corrupt(format!("offer {}: min_txn_count {}", row.id, row.min_txn_count))
        })?;
        let lookback_days = u32::try_from(row.lookback_days).map_err(|_| {
            StoreError::Corrupt(format!("offer {}: lookback_days {}", row.id, row.lookback_days))
        })?;

        Ok(Offer {
            id: row.id,
            merchant_id: row.merchant_id,
            mcc_whitelist: row.mcc_whitelist,
            active: row.active,
            min_txn_count,
            lookback_days,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            created_at: Some(row.created_at),
            updated_at: Some(row.updated_at),
        })
    }
}

const OFFER_COLUMNS: &str = "id, merchant_id, mcc_whitelist, active, min_txn_count, \
     lookback_days, starts_at, ends_at, created_at, updated_at";

#[async_trait]
impl RecordStore for PostgresRecordStore {
    async fn upsert_offer(&self, offer: &Offer) -> Result<Offer, StoreError> {
        // Every column is overwritten on conflict; only created_at survives.
        let sql = format!(
            r#"
            INSERT INTO offers (id, merchant_id, mcc_whitelist, active, min_txn_count, lookback_days, starts_at, ends_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                merchant_id = EXCLUDED.merchant_id,
                mcc_whitelist = EXCLUDED.mcc_whitelist,
                active = EXCLUDED.active,
                min_txn_count = EXCLUDED.min_txn_count,
                lookback_days = EXCLUDED.lookback_days,
                starts_at = EXCLUDED.starts_at,
                ends_at = EXCLUDED.ends_at,
                updated_at = NOW()
            RETURNING {}
            "#,
            OFFER_COLUMNS
        );

        let row = sqlx::query_as::<_, OfferRow>(&sql)
            .bind(&offer.id)
            .bind(&offer.merchant_id)
            .bind(&offer.mcc_whitelist)
            .bind(offer.active)
            .bind(i64::from(offer.min_txn_count))
            .bind(i64::from(offer.lookback_days))
            .bind(offer.starts_at)
            .bind(offer.ends_at)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        row.try_into()
    }

    async fn insert_transactions(&self, transactions: &[Transaction]) -> Result<u64, StoreError> {
        self.insert_transaction_batch(transactions).await
    }

    async fn active_offers(&self, now: DateTime<Utc>) -> Result<Vec<Offer>, StoreError> {
        let sql = format!(
            "SELECT {} FROM offers WHERE active AND starts_at <= $1 AND ends_at >= $1",
            OFFER_COLUMNS
        );

        let rows = sqlx::query_as::<_, OfferRow>(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        rows.into_iter().map(Offer::try_from).collect()
    }

    async fn count_matching_transactions(
        &self,
        user_id: &str,
        offer: &Offer,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        self.count_matching(user_id, offer, now).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        Ok(())
    }
}
