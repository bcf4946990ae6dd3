use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Offer, Transaction};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists: {0}")]
    Duplicate(String),
    #[error("storage backend failure: {0}")]
    Backend(#[source] BoxError),
    #[error("stored record is corrupt: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn backend(err: impl Into<BoxError>) -> Self {
        StoreError::Backend(err.into())
    }
}

/// Durable storage for offers (upsertable) and transactions (append-only).
///
/// Every write is atomic with respect to concurrent readers. Reads carry no
/// snapshot guarantee across calls.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or wholly replace the offer keyed by `offer.id`, returning the stored row.
    async fn upsert_offer(&self, offer: &Offer) -> Result<Offer, StoreError>;

    /// Insert every transaction or none of them. Any id that already exists, in
    /// storage or earlier in the same batch, fails the whole batch with `Duplicate`.
    async fn insert_transactions(&self, transactions: &[Transaction]) -> Result<u64, StoreError>;

    /// Offers with `active` set and `starts_at <= now <= ends_at`, in no particular order.
    async fn active_offers(&self, now: DateTime<Utc>) -> Result<Vec<Offer>, StoreError>;

    /// Transactions of `user_id` approved within `[now - lookback_days, now]` that match
    /// the offer by merchant or by category code.
    async fn count_matching_transactions(
        &self,
        user_id: &str,
        offer: &Offer,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Best-effort key/value cache placed in front of the record store.
#[async_trait]
pub trait LookasideCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
