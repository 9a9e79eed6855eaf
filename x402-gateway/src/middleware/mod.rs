//! The gateway's five-stage request pipeline: idempotency, signature
//! validation, replay protection, and the payment gate. The fifth stage —
//! the handler, local or proxied — lives in [`crate::handlers`] and
//! [`crate::proxy`] respectively, since it is not middleware but the route
//! target the other four stages wrap.

pub mod idempotency;
pub mod payment_gate;
pub mod replay;
pub mod signature;
