use perkly_core::{EligibilityResponse, EligibleOffer};

use crate::eligibility::OfferVerdict;

/// Keeps the eligible verdicts in evaluation order. No verdicts yields an empty list.
pub fn assemble(user_id: &str, verdicts: &[OfferVerdict]) -> EligibilityResponse {
    EligibilityResponse {
        user_id: user_id.to_string(),
        eligible_offers: verdicts
            .iter()
            .filter(|v| v.eligible())
            .map(|v| EligibleOffer {
                offer_id: v.offer_id.clone(),
                reason: v.reason(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(id: &str, min_txn_count: u32, matched: u64) -> OfferVerdict {
        OfferVerdict {
            offer_id: id.to_string(),
            min_txn_count,
            lookback_days: 7,
            matched,
        }
    }

    #[test]
    fn test_preserves_order_and_drops_ineligible() {
        let verdicts = vec![verdict("c", 1, 2), verdict("a", 5, 1), verdict("b", 0, 0)];
        let resp = assemble("u", &verdicts);

        let ids: Vec<_> = resp.eligible_offers.iter().map(|o| o.offer_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);
        assert_eq!(resp.eligible_offers[1].reason, ">= 0 matching transactions in last 7 days (found 0)");
    }

    #[test]
    fn test_no_verdicts_is_empty_list() {
        let resp = assemble("u", &[]);
        assert_eq!(resp.user_id, "u");
        assert!(resp.eligible_offers.is_empty());
    }
}
