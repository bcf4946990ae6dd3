use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt, TryStreamExt};
use perkly_core::repository::{RecordStore, StoreError};
use perkly_core::Offer;

/// Outcome of checking one active offer against one user's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferVerdict {
    pub offer_id: String,
    pub min_txn_count: u32,
    pub lookback_days: u32,
    pub matched: u64,
}

impl OfferVerdict {
    fn new(offer: &Offer, matched: u64) -> Self {
        Self {
            offer_id: offer.id.clone(),
            min_txn_count: offer.min_txn_count,
            lookback_days: offer.lookback_days,
            matched,
        }
    }

    /// A zero threshold is met by any history, including none.
    pub fn eligible(&self) -> bool {
        self.matched >= u64::from(self.min_txn_count)
    }

    pub fn reason(&self) -> String {
        format!(
            ">= {} matching transactions in last {} days (found {})",
            self.min_txn_count, self.lookback_days, self.matched
        )
    }
}

/// Checks every active offer independently, each over its own lookback window.
#[derive(Clone)]
pub struct EligibilityEvaluator {
    store: Arc<dyn RecordStore>,
    concurrency: usize,
}

impl EligibilityEvaluator {
    pub fn new(store: Arc<dyn RecordStore>, concurrency: usize) -> Self {
        Self {
            store,
            concurrency: concurrency.max(1),
        }
    }

    /// One verdict per active offer, in the order the store returned them.
    ///
    /// The first failing count aborts the evaluation and drops the counts still in flight.
    pub async fn evaluate(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<OfferVerdict>, StoreError> {
        let offers = self.store.active_offers(now).await?;
        let store = &self.store;

        let counts: Vec<_> = offers
            .iter()
            .map(|offer| async move {
                let matched = store.count_matching_transactions(user_id, offer, now).await?;
                Ok::<_, StoreError>(OfferVerdict::new(offer, matched))
            })
            .collect();

        stream::iter(counts)
            .buffered(self.concurrency)
            .try_collect()
            .await
    }
}
