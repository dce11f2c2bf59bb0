//! Pure policy evaluation over a (possibly absent) delegation record.

use serde_json::Value;

use waygate_core::api::{ConsentRequest, ConsentResponse, EvaluateRequest, EvaluateResponse, Obligations};
use waygate_core::time::unix_now;

use crate::store::DelegationRecord;

/// Default obligation lifetime; the canonical source of the ttl the gateway
/// enforces.
pub const DEFAULT_OBLIGATION_TTL_SECONDS: u64 = 900;

fn deny(reason: &str) -> EvaluateResponse {
    EvaluateResponse {
        allow: false,
        scopes: Vec::new(),
        obligations: Obligations::default(),
        reason: Some(reason.into()),
    }
}

fn context_str<'a>(request: &'a EvaluateRequest, key: &str) -> Option<&'a str> {
    request.context.get(key).and_then(Value::as_str)
}

fn context_u64(request: &EvaluateRequest, key: &str) -> Option<u64> {
    request.context.get(key).and_then(Value::as_u64)
}

/// Decide scopes and obligations for `(subject, agent, tool, context)`.
///
/// With a live delegation: grant the intersection of requested and delegated
/// scopes (falling back to the full delegated set when the intersection is
/// empty), check constraints against the context, and emit obligations.
/// Without one: allow with minimal obligations in demo mode, deny in strict
/// mode.
pub fn evaluate(
    delegation: Option<&DelegationRecord>,
    request: &EvaluateRequest,
    strict: bool,
    now: u64,
) -> EvaluateResponse {
    let delegation = delegation.filter(|record| !record.is_expired(now));

    let Some(delegation) = delegation else {
        if strict {
            debug!(
                "Denying {}/{} on {}: no delegation in strict mode",
                request.subject, request.agent_id, request.tool_id
            );
            return deny("no_delegation");
        }

        // Demo posture: even without a delegation, sessions get an order
        // binding and a ttl.
        return EvaluateResponse {
            allow: true,
            scopes: request.requested_scopes.clone(),
            obligations: Obligations {
                bind_order: context_str(request, "orderId").map(String::from),
                max_amount_cents: None,
                merchant_allowlist: None,
                ttl: Some(DEFAULT_OBLIGATION_TTL_SECONDS),
            },
            reason: None,
        };
    };

    if delegation.scopes.is_empty() {
        return deny("delegation_has_no_scopes");
    }

    let mut scopes: Vec<String> = request
        .requested_scopes
        .iter()
        .filter(|scope| delegation.scopes.contains(scope))
        .cloned()
        .collect();
    if scopes.is_empty() {
        scopes = delegation.scopes.clone();
    }

    let constraints = delegation.constraints.clone().unwrap_or_default();

    if let (Some(amount), Some(cap)) =
        (context_u64(request, "amount_cents"), constraints.max_amount_cents)
    {
        if amount > cap {
            return deny("amount exceeds max");
        }
    }

    if let (Some(merchant), Some(merchants)) = (
        context_str(request, "merchant_id"),
        constraints.merchants.as_ref(),
    ) {
        if !merchants.iter().any(|allowed| allowed == merchant) {
            return deny("merchant not allowed");
        }
    }

    EvaluateResponse {
        allow: true,
        scopes,
        obligations: Obligations {
            bind_order: context_str(request, "orderId").map(String::from),
            max_amount_cents: constraints.max_amount_cents,
            merchant_allowlist: constraints.merchants,
            ttl: Some(constraints.ttl.unwrap_or(DEFAULT_OBLIGATION_TTL_SECONDS)),
        },
        reason: None,
    }
}

/// Decide whether consent can be granted without a human in the loop.
pub fn decide_consent(
    delegation: Option<&DelegationRecord>,
    request: &ConsentRequest,
    now: u64,
) -> ConsentResponse {
    let covered = delegation
        .filter(|record| !record.is_expired(now))
        .map(|record| {
            request
                .scopes
                .iter()
                .all(|scope| record.scopes.contains(scope))
        })
        .unwrap_or(false);

    if covered {
        return ConsentResponse {
            allow: true,
            record_id: Some(format!("auto-{}", unix_now())),
            reason: None,
        };
    }

    if request.explicit {
        return ConsentResponse {
            allow: true,
            record_id: Some(format!("exp-{}", unix_now())),
            reason: None,
        };
    }

    ConsentResponse {
        allow: false,
        record_id: None,
        reason: Some("explicit_required".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use waygate_core::authority::{DelegationConstraints, PublicJwk};

    fn delegation(scopes: &[&str], constraints: Option<DelegationConstraints>) -> DelegationRecord {
        DelegationRecord {
            subject: "user-123".into(),
            agent_id: "agent-demo".into(),
            tool_id: "mcp.pay".into(),
            scopes: scopes.iter().map(|scope| scope.to_string()).collect(),
            not_after: unix_now() + 3600,
            issuer: "user-123".into(),
            envelope: "a.b.c".into(),
            jwk: PublicJwk {
                kty: "OKP".into(),
                crv: Some("Ed25519".into()),
                x: Some("AAAA".into()),
                y: None,
                n: None,
                e: None,
            },
            constraints,
        }
    }

    fn request(scopes: &[&str], context: serde_json::Value) -> EvaluateRequest {
        EvaluateRequest {
            subject: "user-123".into(),
            agent_id: "agent-demo".into(),
            tool_id: "mcp.pay".into(),
            audience: "http://rs.test/mcp".into(),
            requested_scopes: scopes.iter().map(|scope| scope.to_string()).collect(),
            context: context.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn granted_scopes_are_the_intersection() {
        let record = delegation(&["payments:charge", "tickets:read"], None);
        let response = evaluate(
            Some(&record),
            &request(&["payments:charge"], json!({})),
            true,
            unix_now(),
        );
        assert!(response.allow);
        assert_eq!(response.scopes, vec!["payments:charge".to_string()]);
        assert_eq!(response.obligations.ttl, Some(DEFAULT_OBLIGATION_TTL_SECONDS));
    }

    #[test]
    fn an_empty_intersection_falls_back_to_the_delegated_set() {
        let record = delegation(&["tickets:read"], None);
        let response = evaluate(
            Some(&record),
            &request(&["payments:charge"], json!({})),
            true,
            unix_now(),
        );
        assert!(response.allow);
        assert_eq!(response.scopes, vec!["tickets:read".to_string()]);
    }

    #[test]
    fn an_over_cap_amount_is_denied() {
        let record = delegation(
            &["payments:charge"],
            Some(DelegationConstraints {
                max_amount_cents: Some(2000),
                merchants: None,
                ttl: None,
            }),
        );
        let response = evaluate(
            Some(&record),
            &request(&["payments:charge"], json!({ "amount_cents": 3000 })),
            true,
            unix_now(),
        );
        assert!(!response.allow);
        assert_eq!(response.reason.as_deref(), Some("amount exceeds max"));
    }

    #[test]
    fn a_foreign_merchant_is_denied() {
        let record = delegation(
            &["payments:charge"],
            Some(DelegationConstraints {
                max_amount_cents: None,
                merchants: Some(vec!["mcp-tix".into()]),
                ttl: None,
            }),
        );
        let response = evaluate(
            Some(&record),
            &request(
                &["payments:charge"],
                json!({ "merchant_id": "evil-shop" }),
            ),
            true,
            unix_now(),
        );
        assert!(!response.allow);
        assert_eq!(response.reason.as_deref(), Some("merchant not allowed"));
    }

    #[test]
    fn constraints_flow_into_obligations() {
        let record = delegation(
            &["payments:charge"],
            Some(DelegationConstraints {
                max_amount_cents: Some(2000),
                merchants: Some(vec!["mcp-tix".into()]),
                ttl: Some(600),
            }),
        );
        let response = evaluate(
            Some(&record),
            &request(
                &["payments:charge"],
                json!({ "orderId": "order-1001", "amount_cents": 1200, "merchant_id": "mcp-tix" }),
            ),
            true,
            unix_now(),
        );
        assert!(response.allow);
        assert_eq!(response.obligations.bind_order.as_deref(), Some("order-1001"));
        assert_eq!(response.obligations.max_amount_cents, Some(2000));
        assert_eq!(
            response.obligations.merchant_allowlist,
            Some(vec!["mcp-tix".to_string()])
        );
        assert_eq!(response.obligations.ttl, Some(600));
    }

    #[test]
    fn missing_delegations_split_on_the_mode_switch() {
        let demo = evaluate(None, &request(&["echo:read"], json!({})), false, unix_now());
        assert!(demo.allow);
        assert_eq!(demo.scopes, vec!["echo:read".to_string()]);
        assert_eq!(demo.obligations.ttl, Some(DEFAULT_OBLIGATION_TTL_SECONDS));

        let strict = evaluate(None, &request(&["echo:read"], json!({})), true, unix_now());
        assert!(!strict.allow);
        assert_eq!(strict.reason.as_deref(), Some("no_delegation"));
    }

    #[test]
    fn an_expired_delegation_counts_as_absent() {
        let mut record = delegation(&["echo:read"], None);
        record.not_after = unix_now() - 10;

        let strict = evaluate(Some(&record), &request(&["echo:read"], json!({})), true, unix_now());
        assert!(!strict.allow);
    }

    #[test]
    fn consent_is_automatic_only_when_covered() {
        let record = delegation(&["payments:charge"], None);
        let consent_request = ConsentRequest {
            subject: "user-123".into(),
            agent_id: "agent-demo".into(),
            tool_id: "mcp.pay".into(),
            audience: "http://rs.test/mcp".into(),
            scopes: vec!["payments:charge".into()],
            explicit: false,
        };

        let auto = decide_consent(Some(&record), &consent_request, unix_now());
        assert!(auto.allow);
        assert!(auto.record_id.unwrap().starts_with("auto-"));

        let uncovered = decide_consent(None, &consent_request, unix_now());
        assert!(!uncovered.allow);
        assert_eq!(uncovered.reason.as_deref(), Some("explicit_required"));

        let explicit = decide_consent(
            None,
            &ConsentRequest {
                explicit: true,
                ..consent_request
            },
            unix_now(),
        );
        assert!(explicit.allow);
        assert!(explicit.record_id.unwrap().starts_with("exp-"));
    }
}
