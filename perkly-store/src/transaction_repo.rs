use chrono::{DateTime, Utc};
use perkly_core::repository::StoreError;
use perkly_core::{Offer, Transaction};
use tracing::debug;

use crate::offer_repo::PostgresRecordStore;

fn insert_error(err: sqlx::Error, id: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::Duplicate(id.to_string())
        }
        _ => StoreError::backend(err),
    }
}

impl PostgresRecordStore {
    /// All rows go through one database transaction; an error drops it uncommitted,
    /// which rolls back every row written so far.
    pub async fn insert_transaction_batch(
        &self,
        transactions: &[Transaction],
    ) -> Result<u64, StoreError> {
        if transactions.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;

        for txn in transactions {
            sqlx::query(
                r#"
                INSERT INTO transactions (id, user_id, merchant_id, mcc, amount_cents, approved_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(&txn.id)
            .bind(&txn.user_id)
            .bind(&txn.merchant_id)
            .bind(&txn.mcc)
            .bind(txn.amount_cents)
            .bind(txn.approved_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| insert_error(e, &txn.id))?;
        }

        tx.commit().await.map_err(StoreError::backend)?;

        debug!("Inserted {} transactions", transactions.len());
        Ok(transactions.len() as u64)
    }

    pub async fn count_matching(
        &self,
        user_id: &str,
        offer: &Offer,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        // Served by idx_transactions_user_approved_at. An empty whitelist makes
        // `mcc = ANY('{}')` false, leaving merchant identity as the only match.
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM transactions
            WHERE user_id = $1
              AND approved_at >= $2
              AND approved_at <= $3
              AND (merchant_id = $4 OR mcc = ANY($5))
            "#,
        )
        .bind(user_id)
        .bind(offer.lookback_start(now))
        .bind(now)
        .bind(&offer.merchant_id)
        .bind(&offer.mcc_whitelist)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(count.max(0) as u64)
    }
}
