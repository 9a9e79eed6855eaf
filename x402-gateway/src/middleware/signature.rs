//! Signature validation: the pipeline's second stage.
//!
//! Decodes and structurally validates the `payment-signature` header against
//! the route's policy, without ever talking to the facilitator — failing
//! fast here keeps ill-formed or unauthorized requests off the facilitator's
//! hot path entirely.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use x402_proto::{PaymentPayload, amount_satisfies};

use crate::error::GatewayError;
use crate::scratch;
use crate::server::AppState;

const REQUIRED_FIELDS: &[&str] = &[
    "scheme", "network", "asset", "payTo", "amount", "nonce", "signature", "resource",
];

/// Decodes and validates `payment-signature`, attaching the parsed payload
/// to the request's scratch area on success.
///
/// Requests with no `payment-signature` header pass through untouched: the
/// payment gate downstream is responsible for issuing the 402 in that case.
pub async fn middleware(State(state): State<Arc<AppState>>, mut req: Request, next: Next) -> Response {
    let Some(header_value) = req.headers().get("payment-signature").cloned() else {
        return next.run(req).await;
    };

    let path = req.uri().path().to_owned();
    let method = req.method().to_string();

    let Ok(raw) = header_value.to_str() else {
        tracing::debug!(%path, %method, "payment-signature header was not valid UTF-8");
        return GatewayError::MalformedSignature("not valid base64-encoded JSON".to_owned()).into_response();
    };

    let Ok(bytes) = STANDARD.decode(raw.trim()) else {
        tracing::debug!(%path, %method, "payment-signature header failed base64 decode");
        return GatewayError::MalformedSignature("not valid base64-encoded JSON".to_owned()).into_response();
    };

    let Ok(value) = serde_json::from_slice::<Value>(&bytes) else {
        tracing::debug!(%path, %method, "payment-signature payload was not valid JSON");
        return GatewayError::MalformedSignature("not valid base64-encoded JSON".to_owned()).into_response();
    };

    let missing = missing_required_fields(&value);
    if !missing.is_empty() {
        tracing::debug!(%path, %method, missing = missing.join(", "), "payment-signature missing required fields");
        return GatewayError::MalformedSignature(format!("missing required fields: {}", missing.join(", ")))
            .into_response();
    }

    match value.get("x402Version").and_then(Value::as_u64) {
        Some(2) => {}
        _ => {
            tracing::debug!(%path, %method, "payment-signature carried an unsupported x402Version");
            return GatewayError::MalformedSignature("unsupported x402Version".to_owned()).into_response();
        }
    }

    let payload: PaymentPayload = match serde_json::from_value(value) {
        Ok(payload) => payload,
        Err(error) => {
            tracing::debug!(%path, %method, %error, "payment-signature deserialization failed");
            return GatewayError::MalformedSignature(format!("not valid base64-encoded JSON: {error}")).into_response();
        }
    };

    if let Some(policy) = state.policies.find(&path, &method) {
        let mismatches = offer_mismatches(&payload, policy);
        if !mismatches.is_empty() {
            tracing::debug!(%path, %method, mismatches = mismatches.join(", "), "payment offer mismatch");
            return GatewayError::OfferMismatch(mismatches.join(", ")).into_response();
        }

        match amount_satisfies(&payload.amount, &policy.amount) {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(%path, %method, required = %policy.amount, "insufficient payment amount");
                return GatewayError::InsufficientAmount {
                    required: policy.amount.clone(),
                    provided: payload.amount.clone(),
                }
                .into_response();
            }
            Err(error) => {
                tracing::debug!(%path, %method, %error, "payment amount failed to parse");
                return GatewayError::MalformedSignature(error.to_string()).into_response();
            }
        }
    }

    scratch::set_payload(req.extensions_mut(), payload);
    next.run(req).await
}

fn missing_required_fields(value: &Value) -> Vec<&'static str> {
    REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| !value.get(field).and_then(Value::as_str).is_some_and(|s| !s.is_empty()))
        .collect()
}

fn offer_mismatches(payload: &PaymentPayload, policy: &crate::policy::RoutePolicy) -> Vec<String> {
    let mut mismatches = Vec::new();
    if payload.scheme != policy.scheme {
        mismatches.push(format!("scheme: expected {:?}, got {:?}", policy.scheme, payload.scheme));
    }
    if payload.network != policy.network {
        mismatches.push(format!("network: expected {:?}, got {:?}", policy.network, payload.network));
    }
    if payload.asset != policy.asset {
        mismatches.push(format!("asset: expected {:?}, got {:?}", policy.asset, payload.asset));
    }
    if payload.pay_to != policy.pay_to {
        mismatches.push(format!("payTo: expected {:?}, got {:?}", policy.pay_to, payload.pay_to));
    }
    mismatches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_all_missing_fields() {
        let value = serde_json::json!({ "x402Version": 2, "scheme": "exact" });
        let missing = missing_required_fields(&value);
        assert!(missing.contains(&"network"));
        assert!(missing.contains(&"amount"));
        assert!(!missing.contains(&"scheme"));
    }

    #[test]
    fn empty_string_counts_as_missing() {
        let value = serde_json::json!({ "scheme": "" });
        assert!(missing_required_fields(&value).contains(&"scheme"));
    }

    fn sample_policy() -> crate::policy::RoutePolicy {
        crate::policy::RoutePolicy::builder("/v1/premium/echo")
            .method("GET")
            .network("stacks:2147483648")
            .amount("STX", "1000000")
            .pay_to("SP000000000000000000002Q6VF78")
            .description("paid echo")
            .build()
            .unwrap()
    }

    fn sample_payload() -> PaymentPayload {
        PaymentPayload {
            x402_version: x402_proto::V2,
            scheme: "exact".into(),
            network: "stacks:2147483648".into(),
            asset: "STX".into(),
            pay_to: "SP000000000000000000002Q6VF78".into(),
            amount: "1000000".into(),
            nonce: "n1".into(),
            signature: "sig".into(),
            resource: "https://gateway.example/v1/premium/echo".into(),
            memo: None,
        }
    }

    #[test]
    fn matching_payload_has_no_mismatches() {
        assert!(offer_mismatches(&sample_payload(), &sample_policy()).is_empty());
    }

    #[test]
    fn mismatched_recipient_is_reported() {
        let mut payload = sample_payload();
        payload.pay_to = "someone-else".into();
        let mismatches = offer_mismatches(&payload, &sample_policy());
        assert_eq!(mismatches.len(), 1);
        assert!(mismatches[0].contains("payTo"));
    }
}
