//! Per-request scratch area threaded through the middleware pipeline.
//!
//! `axum` passes a single owned [`Request`](axum::extract::Request) through
//! each `from_fn` middleware in turn, so the natural place for one stage to
//! hand state to a later stage is the request's extension map rather than
//! any global keyed by task or connection id. This module is just named
//! accessors over that map so call sites read like field access instead of
//! `extensions().get::<T>()` sprinkled everywhere.

use axum::http::Extensions;
use x402_proto::{PaymentPayload, PaymentReceipt};

/// Attaches the structurally-validated payment payload for stages downstream
/// of signature validation.
pub fn set_payload(extensions: &mut Extensions, payload: PaymentPayload) {
    extensions.insert(payload);
}

/// Reads the payload attached by signature validation, if that stage ran and succeeded.
pub fn payload(extensions: &Extensions) -> Option<&PaymentPayload> {
    extensions.get::<PaymentPayload>()
}

/// Attaches the settlement receipt issued by the payment gate.
pub fn set_receipt(extensions: &mut Extensions, receipt: PaymentReceipt) {
    extensions.insert(receipt);
}

/// Reads the receipt attached by the payment gate, if the request was paid.
pub fn receipt(extensions: &Extensions) -> Option<&PaymentReceipt> {
    extensions.get::<PaymentReceipt>()
}
