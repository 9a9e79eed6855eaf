//! Wire types and codecs for the x402 v2 payment protocol.
//!
//! This crate has no I/O dependencies: it defines the JSON shapes carried
//! by the `X-Payment`, `Payment-Required` and `Payment-Response` headers,
//! helpers for encoding/decoding them as `base64(json(..))`, and
//! arbitrary-precision amount comparison. The gateway binary (`x402-gateway`)
//! is the only crate that talks HTTP.

pub mod amount;
pub mod discovery;
pub mod encoding;
pub mod error;
pub mod network;
pub mod v2;
pub mod version;

pub use amount::{amount_satisfies, parse_amount, InvalidAmount};
pub use discovery::{DiscoveryAccept, DiscoveryDocument, OutputSchema};
pub use encoding::{decode_json, encode_json, Base64Bytes, DecodeJsonError};
pub use error::ProtoError;
pub use network::short_token;
pub use v2::{PaymentAccept, PaymentPayload, PaymentReceipt, PaymentRequired};
pub use version::{Version, X402Version2, V2};
