use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Offer payload as submitted by a merchant, before sanitation and validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OfferRequest {
    pub id: String,
    pub merchant_id: String,
    pub mcc_whitelist: Vec<String>,
    pub active: bool,
    pub min_txn_count: i64,
    pub lookback_days: i64,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

/// A validated merchant offer.
///
/// Writing an offer with an existing `id` replaces every field; `created_at` and
/// `updated_at` are owned by the store and ignored on write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub merchant_id: String,
    pub mcc_whitelist: Vec<String>,
    pub active: bool,
    pub min_txn_count: u32,
    pub lookback_days: u32,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Offer {
    /// Administrative flag on and `now` inside `[starts_at, ends_at]`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.active && self.starts_at <= now && now <= self.ends_at
    }

    /// Inclusive lower bound of this offer's lookback window ending at `now`.
    pub fn lookback_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(TimeDelta::days(i64::from(self.lookback_days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Merchant identity or category membership; the time window is not considered.
    pub fn matches(&self, txn: &Transaction) -> bool {
        txn.merchant_id == self.merchant_id || self.mcc_whitelist.iter().any(|mcc| *mcc == txn.mcc)
    }

    /// Whether `txn` counts toward this offer for `user_id` at `now`.
    pub fn counts(&self, user_id: &str, txn: &Transaction, now: DateTime<Utc>) -> bool {
        txn.user_id == user_id
            && txn.approved_at >= self.lookback_start(now)
            && txn.approved_at <= now
            && self.matches(txn)
    }
}

/// Transaction payload as submitted by the ingestion caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionRequest {
    pub id: String,
    pub user_id: String,
    pub merchant_id: String,
    pub mcc: String,
    pub amount_cents: i64,
    pub approved_at: Option<DateTime<Utc>>,
}

/// An approved purchase. Append-only: never updated, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub merchant_id: String,
    pub mcc: String,
    pub amount_cents: i64,
    pub approved_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibleOffer {
    pub offer_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityResponse {
    pub user_id: String,
    #[serde(default)]
    pub eligible_offers: Vec<EligibleOffer>,
}
