//! x402 protocol version 2 wire types.
//!
//! Unlike the multi-chain registry these types were adapted from, the
//! gateway speaks a single scheme/network combination per deployment, so
//! every field here is a concrete `String` rather than a generic type
//! parameter.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::version::{V2, X402Version2};

/// A single accepted payment method, as advertised in a 402 response or a
/// discovery document entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAccept {
    /// Payment scheme identifier, e.g. `"exact"`.
    pub scheme: String,
    /// CAIP-2 chain identifier, e.g. `"stacks:2147483648"`.
    pub network: String,
    /// Asset identifier (contract address or native-asset marker).
    pub asset: String,
    /// Minimum amount required, as a decimal-integer string of atomic units.
    pub max_amount_required: String,
    /// Address payment must be sent to.
    pub pay_to: String,
    /// The resource URL this payment method unlocks.
    pub resource: String,
    /// Human-readable description of the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// MIME type of the resource response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Seconds after which an unsettled payment attempt expires.
    pub max_timeout_seconds: u64,
    /// Scheme-specific extension data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

/// The body of a `402 Payment Required` response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// Protocol version; always `2`.
    pub x402_version: X402Version2,
    /// Human-readable reason the request was rejected.
    pub error: String,
    /// The resource that required payment.
    pub resource: String,
    /// Payment methods the caller may use to satisfy the requirement.
    pub accepts: Vec<PaymentAccept>,
}

impl PaymentRequired {
    /// Builds a `402` body from a single accepted payment method.
    #[must_use]
    pub fn new(error: impl Into<String>, resource: impl Into<String>, accept: PaymentAccept) -> Self {
        Self {
            x402_version: V2,
            error: error.into(),
            resource: resource.into(),
            accepts: vec![accept],
        }
    }
}

/// The payment proof a client attaches via the `X-Payment` header.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// Protocol version; always `2`.
    pub x402_version: X402Version2,
    /// Payment scheme identifier, must match the accepted scheme.
    pub scheme: String,
    /// CAIP-2 chain identifier.
    pub network: String,
    /// Asset identifier.
    pub asset: String,
    /// Address payment was sent to.
    pub pay_to: String,
    /// Amount paid, as a decimal-integer string of atomic units.
    pub amount: String,
    /// Client-generated nonce, unique per payment attempt.
    pub nonce: String,
    /// Scheme-specific signature authorizing the payment.
    pub signature: String,
    /// The resource this payment is claimed against.
    pub resource: String,
    /// Optional free-form memo attached to the payment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

/// The settlement receipt a gateway attaches via the `Payment-Response`
/// header after verifying and settling a payment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    /// On-chain transaction hash, if settlement has occurred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    /// CAIP-2 chain identifier the payment settled on.
    pub network: String,
    /// Address that made the payment.
    pub payer: String,
    /// Amount paid, as a decimal-integer string of atomic units.
    pub amount: String,
    /// Unix epoch milliseconds at which the receipt was issued.
    pub timestamp: u64,
    /// Whether settlement has completed on-chain.
    pub settled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_required_round_trips() {
        let accept = PaymentAccept {
            scheme: "exact".into(),
            network: "stacks:2147483648".into(),
            asset: "STX".into(),
            max_amount_required: "1000000".into(),
            pay_to: "SP000000000000000000002Q6VF78".into(),
            resource: "https://example.com/paid".into(),
            description: None,
            mime_type: Some("application/json".into()),
            max_timeout_seconds: 60,
            extra: None,
        };
        let body = PaymentRequired::new("payment required", "https://example.com/paid", accept);
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"x402Version\":2"));
        assert!(json.contains("\"maxAmountRequired\":\"1000000\""));
        let round_tripped: PaymentRequired = serde_json::from_str(&json).unwrap();
        assert_eq!(round_tripped, body);
    }

    #[test]
    fn mismatched_version_rejected() {
        let json = r#"{"x402Version":1,"error":"x","resource":"x","accepts":[]}"#;
        let err = serde_json::from_str::<PaymentRequired>(json).unwrap_err();
        assert!(err.to_string().contains("x402Version"));
    }
}
