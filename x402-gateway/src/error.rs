//! Top-level gateway error type and its HTTP mapping.

use axum::Json;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;
use x402_proto::PaymentRequired;

/// Every error category the gateway's pipeline can produce, each mapped to
/// exactly one client-facing status code.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The `payment-signature` header failed to decode, parse, or validate structurally.
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
    /// The decoded payload's scheme/network/asset/recipient did not match the route's offer.
    #[error("offer mismatch: {0}")]
    OfferMismatch(String),
    /// The payload's amount was less than the route's required minimum.
    #[error("insufficient amount: required {required}, provided {provided}")]
    InsufficientAmount {
        /// Minimum amount the route's policy requires.
        required: String,
        /// Amount the client actually provided.
        provided: String,
    },
    /// A payment carrying a `(nonce, memo)` pair already seen was rejected.
    #[error("replay detected")]
    Replay,
    /// No signature header was present; the caller must pay to proceed.
    #[error("payment required")]
    PaymentRequired(Box<PaymentRequired>),
    /// The facilitator reported the payment signature as invalid.
    #[error("payment signature verification failed")]
    FacilitatorRejected,
    /// The facilitator could not be reached or returned an unexpected response.
    #[error("facilitator error: {0}")]
    FacilitatorUnreachable(String),
    /// The upstream service could not be reached or returned an unexpected response.
    #[error("upstream error: {0}")]
    UpstreamUnreachable(String),
    /// Anything else; never exposes internal detail to the client.
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            Self::PaymentRequired(body) => {
                let mut response = (StatusCode::PAYMENT_REQUIRED, Json(json!(*body))).into_response();
                match x402_proto::encode_json(body.as_ref()) {
                    Ok(encoded) => {
                        if let Ok(value) = HeaderValue::from_str(&encoded) {
                            response.headers_mut().insert("payment-required", value);
                        }
                    }
                    Err(error) => {
                        tracing::warn!(%error, "failed to encode payment-required header");
                    }
                }
                response
            }
            Self::MalformedSignature(_) | Self::OfferMismatch(_) | Self::InsufficientAmount { .. } => {
                status_response(StatusCode::BAD_REQUEST, &self)
            }
            Self::FacilitatorRejected => status_response(StatusCode::UNAUTHORIZED, &self),
            Self::Replay => status_response(StatusCode::CONFLICT, &self),
            Self::FacilitatorUnreachable(_) | Self::UpstreamUnreachable(_) => {
                status_response(StatusCode::BAD_GATEWAY, &self)
            }
            Self::Internal(_) => status_response(StatusCode::INTERNAL_SERVER_ERROR, &self),
        }
    }
}

fn status_response(status: StatusCode, error: &GatewayError) -> Response {
    (
        status,
        Json(ErrorBody {
            error: error.to_string(),
        }),
    )
        .into_response()
}
