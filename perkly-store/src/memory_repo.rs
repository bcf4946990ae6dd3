use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use perkly_core::repository::{RecordStore, StoreError};
use perkly_core::{Offer, Transaction};
use tokio::sync::RwLock;

/// Per-user transaction index ordered by `(approved_at, insertion sequence)`.
type UserLedger = BTreeMap<(DateTime<Utc>, u64), Transaction>;

#[derive(Default)]
struct Ledger {
    ids: HashSet<String>,
    by_user: HashMap<String, UserLedger>,
    next_seq: u64,
}

/// Process-local record store. Each write holds the relevant lock for its whole
/// duration, so readers see a batch entirely or not at all.
#[derive(Default)]
pub struct InMemoryRecordStore {
    offers: RwLock<HashMap<String, Offer>>,
    ledger: RwLock<Ledger>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn transaction_count(&self) -> usize {
        self.ledger.read().await.ids.len()
    }

    pub async fn offer_count(&self) -> usize {
        self.offers.read().await.len()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn upsert_offer(&self, offer: &Offer) -> Result<Offer, StoreError> {
        let mut offers = self.offers.write().await;
        let now = Utc::now();
        let created_at = offers
            .get(&offer.id)
            .and_then(|existing| existing.created_at)
            .unwrap_or(now);

        let stored = Offer {
            created_at: Some(created_at),
            updated_at: Some(now),
            ..offer.clone()
        };
        offers.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn insert_transactions(&self, transactions: &[Transaction]) -> Result<u64, StoreError> {
        let mut ledger = self.ledger.write().await;

        let mut batch_ids = HashSet::with_capacity(transactions.len());
        for txn in transactions {
            if ledger.ids.contains(&txn.id) || !batch_ids.insert(txn.id.as_str()) {
                return Err(StoreError::Duplicate(txn.id.clone()));
            }
        }

        let now = Utc::now();
        for txn in transactions {
            let seq = ledger.next_seq;
            ledger.next_seq += 1;
            ledger.ids.insert(txn.id.clone());

            let stored = Transaction {
                created_at: Some(now),
                ..txn.clone()
            };
            ledger
                .by_user
                .entry(txn.user_id.clone())
                .or_default()
                .insert((txn.approved_at, seq), stored);
        }

        Ok(transactions.len() as u64)
    }

    async fn active_offers(&self, now: DateTime<Utc>) -> Result<Vec<Offer>, StoreError> {
        let offers = self.offers.read().await;
        Ok(offers
            .values()
            .filter(|offer| offer.is_active_at(now))
            .cloned()
            .collect())
    }

    async fn count_matching_transactions(
        &self,
        user_id: &str,
        offer: &Offer,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let start = offer.lookback_start(now);
        if start > now {
            return Ok(0);
        }

        let ledger = self.ledger.read().await;
        let Some(user_ledger) = ledger.by_user.get(user_id) else {
            return Ok(0);
        };

        let count = user_ledger
            .range((Bound::Included((start, 0)), Bound::Included((now, u64::MAX))))
            .filter(|(_, txn)| offer.matches(txn))
            .count();

        Ok(count as u64)
    }
}
