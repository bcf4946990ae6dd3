//! Structural and domain checks applied to offer and transaction payloads before
//! they reach a record store.
//!
//! Every check first sanitises the string fields (control characters stripped,
//! whitespace trimmed, identifiers lowercased). Sanitation never fails; the checks
//! that follow return the first violation found.

use std::collections::HashSet;

use chrono::{DateTime, Months, TimeDelta, Utc};
use uuid::{Uuid, Variant, Version};

use crate::models::{Offer, OfferRequest, Transaction, TransactionRequest};

pub const MAX_WHITELIST_LEN: usize = 100;
pub const MAX_LOOKBACK_DAYS: i64 = 365;
pub const MAX_OFFER_SPAN_DAYS: i64 = 2 * 365;
pub const MAX_AMOUNT_CENTS: i64 = 100_000_000;
pub const FUTURE_SKEW_HOURS: i64 = 1;
pub const MAX_TRANSACTION_AGE_YEARS: u32 = 10;

/// `0001-01-01T00:00:00Z`, the zero time some clients send in place of "unset".
const ZERO_TIME_UNIX_SECS: i64 = -62_135_596_800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    InvalidIdentifier,
    InvalidWhitelist,
    InvalidThreshold,
    InvalidWindow,
    InvalidMcc,
    InvalidAmount,
    InvalidTimestamp,
    InvalidBatch,
}

impl ValidationErrorKind {
    pub fn at(self, field: impl Into<String>, message: impl Into<String>) -> ValidationError {
        ValidationError {
            kind: self,
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A caller-correctable rejection, naming the offending field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("validation error on field '{field}': {message}")]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub field: String,
    pub message: String,
}

impl ValidationError {
    /// Re-scope the field under a batch position, e.g. `transactions[3].mcc`.
    pub fn in_batch(self, collection: &str, index: usize) -> Self {
        Self {
            field: format!("{}[{}].{}", collection, index, self.field),
            ..self
        }
    }
}

/// Strip control characters (tab, CR and LF survive until trimming) and trim.
pub fn sanitize(input: &str) -> String {
    let kept: String = input
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect();
    kept.trim().to_string()
}

/// Sanitise and lowercase an identifier so the store only sees one spelling of it.
pub fn sanitize_identifier(input: &str) -> String {
    sanitize(input).to_ascii_lowercase()
}

/// Check that `id` is a hyphenated RFC 4122 version-4 UUID.
pub fn validate_identifier(id: &str, field: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationErrorKind::InvalidIdentifier.at(field, "is required"));
    }

    let well_formed = id.len() == 36
        && Uuid::try_parse(id)
            .map(|u| u.get_version() == Some(Version::Random) && u.get_variant() == Variant::RFC4122)
            .unwrap_or(false);

    if !well_formed {
        return Err(ValidationErrorKind::InvalidIdentifier.at(field, "must be a valid UUID v4"));
    }

    Ok(())
}

pub fn is_mcc(code: &str) -> bool {
    code.len() == 4 && code.bytes().all(|b| b.is_ascii_digit())
}

fn check_mcc(code: &str, kind: ValidationErrorKind, field: &str) -> Result<(), ValidationError> {
    if code.is_empty() {
        return Err(kind.at(field, "is required"));
    }
    if !is_mcc(code) {
        return Err(kind.at(field, "must be a 4-digit numeric code"));
    }
    Ok(())
}

fn sanitize_whitelist(codes: &[String]) -> Result<Vec<String>, ValidationError> {
    let kind = ValidationErrorKind::InvalidWhitelist;

    if codes.len() > MAX_WHITELIST_LEN {
        return Err(kind.at(
            "mcc_whitelist",
            format!("cannot contain more than {} MCC codes", MAX_WHITELIST_LEN),
        ));
    }

    let mut seen = HashSet::with_capacity(codes.len());
    let mut cleaned = Vec::with_capacity(codes.len());

    for (i, raw) in codes.iter().enumerate() {
        let code = sanitize(raw);
        check_mcc(&code, kind, &format!("mcc_whitelist[{}]", i))?;

        if !seen.insert(code.clone()) {
            return Err(kind.at("mcc_whitelist", format!("duplicate MCC code: {}", code)));
        }
        cleaned.push(code);
    }

    Ok(cleaned)
}

/// Drops a timestamp that only carries the zero time.
fn present(t: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    t.filter(|t| t.timestamp() != ZERO_TIME_UNIX_SECS || t.timestamp_subsec_nanos() != 0)
}

/// Sanitise and validate an offer payload, producing the record to persist.
pub fn validate_offer(req: OfferRequest) -> Result<Offer, ValidationError> {
    let id = sanitize_identifier(&req.id);
    validate_identifier(&id, "id")?;

    let merchant_id = sanitize_identifier(&req.merchant_id);
    validate_identifier(&merchant_id, "merchant_id")?;

    let mcc_whitelist = sanitize_whitelist(&req.mcc_whitelist)?;

    let threshold = ValidationErrorKind::InvalidThreshold;
    if req.min_txn_count < 0 {
        return Err(threshold.at("min_txn_count", "must be non-negative"));
    }
    let min_txn_count = u32::try_from(req.min_txn_count)
        .map_err(|_| threshold.at("min_txn_count", format!("cannot exceed {}", u32::MAX)))?;

    if req.lookback_days < 0 {
        return Err(threshold.at("lookback_days", "must be non-negative"));
    }
    if req.lookback_days > MAX_LOOKBACK_DAYS {
        return Err(threshold.at(
            "lookback_days",
            format!("cannot exceed {} days", MAX_LOOKBACK_DAYS),
        ));
    }
    // Bounded by MAX_LOOKBACK_DAYS above.
    let lookback_days = req.lookback_days as u32;

    let window = ValidationErrorKind::InvalidWindow;
    let starts_at = present(req.starts_at).ok_or_else(|| window.at("starts_at", "is required"))?;
    let ends_at = present(req.ends_at).ok_or_else(|| window.at("ends_at", "is required"))?;

    if starts_at >= ends_at {
        return Err(window.at("starts_at", "must be before ends_at"));
    }
    if ends_at - starts_at > TimeDelta::days(MAX_OFFER_SPAN_DAYS) {
        return Err(window.at("ends_at", "offer duration cannot exceed 2 years"));
    }

    Ok(Offer {
        id,
        merchant_id,
        mcc_whitelist,
        active: req.active,
        min_txn_count,
        lookback_days,
        starts_at,
        ends_at,
        created_at: None,
        updated_at: None,
    })
}

/// Sanitise and validate a transaction payload against the ingestion clock `now`.
pub fn validate_transaction(
    req: TransactionRequest,
    now: DateTime<Utc>,
) -> Result<Transaction, ValidationError> {
    let id = sanitize_identifier(&req.id);
    validate_identifier(&id, "id")?;

    let user_id = sanitize_identifier(&req.user_id);
    validate_identifier(&user_id, "user_id")?;

    let merchant_id = sanitize_identifier(&req.merchant_id);
    validate_identifier(&merchant_id, "merchant_id")?;

    let mcc = sanitize(&req.mcc);
    check_mcc(&mcc, ValidationErrorKind::InvalidMcc, "mcc")?;

    let amount = ValidationErrorKind::InvalidAmount;
    if req.amount_cents < 0 {
        return Err(amount.at("amount_cents", "must be non-negative"));
    }
    if req.amount_cents > MAX_AMOUNT_CENTS {
        return Err(amount.at("amount_cents", "exceeds maximum allowed amount"));
    }

    let timestamp = ValidationErrorKind::InvalidTimestamp;
    let approved_at = present(req.approved_at)
        .ok_or_else(|| timestamp.at("approved_at", "is required"))?;

    if approved_at > now + TimeDelta::hours(FUTURE_SKEW_HOURS) {
        return Err(timestamp.at("approved_at", "cannot be more than 1 hour in the future"));
    }

    let oldest = now
        .checked_sub_months(Months::new(12 * MAX_TRANSACTION_AGE_YEARS))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    if approved_at < oldest {
        return Err(timestamp.at("approved_at", "cannot be more than 10 years in the past"));
    }

    Ok(Transaction {
        id,
        user_id,
        merchant_id,
        mcc,
        amount_cents: req.amount_cents,
        approved_at,
        created_at: None,
    })
}
