//! The `{ success, data, receipt }` envelope applied to JSON responses.

use serde::Serialize;
use serde_json::Value;
use x402_proto::PaymentReceipt;

/// Wraps a JSON response body alongside its payment receipt, when one exists.
///
/// Non-JSON bodies are never wrapped — the receipt still reaches the caller
/// via the `payment-response` header, but the body passes through untouched.
#[derive(Debug, Serialize)]
pub struct GatewayResponse {
    /// Whether the wrapped response represents a successful outcome.
    pub success: bool,
    /// The upstream or local handler's response body.
    pub data: Value,
    /// The payment receipt, if this request was paid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<PaymentReceipt>,
}

impl GatewayResponse {
    /// Builds an envelope around `data`, attaching `receipt` if present.
    #[must_use]
    pub fn new(success: bool, data: Value, receipt: Option<PaymentReceipt>) -> Self {
        Self { success, data, receipt }
    }
}
