//! Per-request obligation enforcement.
//!
//! Obligations are decided once at session start and never change; every
//! tool call is checked against them before anything is forwarded
//! upstream. Check order is binding, amount, merchant, ttl; the first
//! violation wins.

use thiserror::Error;

use waygate_core::api::Obligations;

/// What a tool request asserts about itself, extracted from its query and
/// body before forwarding.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestFacts<'a> {
    pub order_id: Option<&'a str>,
    pub amount_cents: Option<u64>,
    pub merchant_id: Option<&'a str>,
}

/// An obligation the request failed.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ObligationViolation {
    #[error("orderId mismatch")]
    OrderMismatch,
    #[error("amount exceeds max")]
    AmountExceedsMax,
    #[error("merchant not allowed")]
    MerchantNotAllowed,
    /// Distinct from the others: the session itself must re-authenticate
    #[error("obligation ttl elapsed")]
    TtlElapsed,
}

/// Check `facts` against `obligations` issued at `issued_at`.
pub fn enforce(
    obligations: &Obligations,
    issued_at: u64,
    facts: &RequestFacts<'_>,
    now: u64,
) -> Result<(), ObligationViolation> {
    if let Some(bound_order) = obligations.bind_order.as_deref() {
        if facts.order_id != Some(bound_order) {
            return Err(ObligationViolation::OrderMismatch);
        }
    }

    if let (Some(amount), Some(cap)) = (facts.amount_cents, obligations.max_amount_cents) {
        if amount > cap {
            return Err(ObligationViolation::AmountExceedsMax);
        }
    }

    if let Some(merchants) = obligations.merchant_allowlist.as_ref() {
        match facts.merchant_id {
            Some(merchant) if merchants.iter().any(|allowed| allowed == merchant) => (),
            _ => return Err(ObligationViolation::MerchantNotAllowed),
        }
    }

    if let Some(ttl) = obligations.ttl {
        if now.saturating_sub(issued_at) > ttl {
            return Err(ObligationViolation::TtlElapsed);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obligations() -> Obligations {
        Obligations {
            bind_order: Some("order-1001".into()),
            max_amount_cents: Some(2000),
            merchant_allowlist: Some(vec!["mcp-tix".into()]),
            ttl: Some(900),
        }
    }

    fn facts() -> RequestFacts<'static> {
        RequestFacts {
            order_id: Some("order-1001"),
            amount_cents: Some(1200),
            merchant_id: Some("mcp-tix"),
        }
    }

    #[test]
    fn a_conforming_request_passes() {
        assert_eq!(enforce(&obligations(), 100, &facts(), 100), Ok(()));
    }

    #[test]
    fn the_order_binding_is_exact() {
        let mismatched = RequestFacts {
            order_id: Some("order-9999"),
            ..facts()
        };
        assert_eq!(
            enforce(&obligations(), 100, &mismatched, 100),
            Err(ObligationViolation::OrderMismatch)
        );

        let absent = RequestFacts {
            order_id: None,
            ..facts()
        };
        assert_eq!(
            enforce(&obligations(), 100, &absent, 100),
            Err(ObligationViolation::OrderMismatch)
        );
    }

    #[test]
    fn amounts_above_the_cap_are_refused() {
        let over = RequestFacts {
            amount_cents: Some(3000),
            ..facts()
        };
        assert_eq!(
            enforce(&obligations(), 100, &over, 100),
            Err(ObligationViolation::AmountExceedsMax)
        );
        // At the cap is fine
        let at = RequestFacts {
            amount_cents: Some(2000),
            ..facts()
        };
        assert_eq!(enforce(&obligations(), 100, &at, 100), Ok(()));
    }

    #[test]
    fn unknown_merchants_are_refused() {
        let foreign = RequestFacts {
            merchant_id: Some("evil-shop"),
            ..facts()
        };
        assert_eq!(
            enforce(&obligations(), 100, &foreign, 100),
            Err(ObligationViolation::MerchantNotAllowed)
        );
    }

    #[test]
    fn checks_short_circuit_in_documented_order() {
        // Both the order and the amount are wrong; the binding wins
        let doubly_wrong = RequestFacts {
            order_id: Some("order-9999"),
            amount_cents: Some(9999),
            merchant_id: Some("mcp-tix"),
        };
        assert_eq!(
            enforce(&obligations(), 100, &doubly_wrong, 100),
            Err(ObligationViolation::OrderMismatch)
        );
    }

    #[test]
    fn the_ttl_is_inclusive_then_fatal() {
        let within = enforce(&obligations(), 100, &facts(), 100 + 900);
        assert_eq!(within, Ok(()));

        assert_eq!(
            enforce(&obligations(), 100, &facts(), 100 + 901),
            Err(ObligationViolation::TtlElapsed)
        );
    }

    #[test]
    fn empty_obligations_constrain_nothing() {
        assert_eq!(
            enforce(&Obligations::default(), 0, &RequestFacts::default(), u64::MAX),
            Ok(())
        );
    }
}
