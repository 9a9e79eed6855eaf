//! Protocol-level error types shared across the gateway.

use crate::amount::InvalidAmount;
use crate::encoding::DecodeJsonError;

/// Error validating or decoding an x402 v2 protocol message.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    /// A `X-Payment`/`Payment-Required`/`Payment-Response` header failed to decode.
    #[error("failed to decode payment header: {0}")]
    HeaderDecode(#[from] DecodeJsonError),
    /// An amount field was not a valid decimal-integer string.
    #[error(transparent)]
    InvalidAmount(#[from] InvalidAmount),
    /// The payload's `x402Version` did not match the version this gateway speaks.
    #[error("unsupported x402Version: {0}")]
    UnsupportedVersion(u8),
}
