use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OfferUpsertedEvent {
    pub offer_id: String,
    pub merchant_id: String,
    pub active: bool,
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TransactionsIngestedEvent {
    pub transaction_ids: Vec<String>,
    pub inserted: u64,
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EligibilityCheckedEvent {
    pub user_id: String,
    pub eligible_offer_ids: Vec<String>,
    pub evaluated_at: DateTime<Utc>,
    pub timestamp: i64,
}

/// Everything the engine announces after a successful operation.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    OfferUpserted(OfferUpsertedEvent),
    TransactionsIngested(TransactionsIngestedEvent),
    EligibilityChecked(EligibilityCheckedEvent),
}

impl DomainEvent {
    /// Dotted event name, used as routing key and in logs.
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::OfferUpserted(_) => "offer.upserted",
            DomainEvent::TransactionsIngested(_) => "transaction.created",
            DomainEvent::EligibilityChecked(_) => "eligibility.checked",
        }
    }
}
