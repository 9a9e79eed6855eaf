//! Base64 wire encoding helper for header-carried payloads.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

/// A byte blob that serializes to/from a JSON string containing standard
/// base64, matching the wire format of the `X-Payment`, `Payment-Required`
/// and `Payment-Response` headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Base64Bytes(pub Vec<u8>);

impl Base64Bytes {
    /// Decodes a standard-base64 string into raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `input` is not valid standard base64.
    pub fn decode(input: &str) -> Result<Self, base64::DecodeError> {
        STANDARD.decode(input).map(Self)
    }

    /// Encodes the contained bytes as standard base64.
    #[must_use]
    pub fn encode(&self) -> String {
        STANDARD.encode(&self.0)
    }
}

impl AsRef<[u8]> for Base64Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for Base64Bytes {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Base64Bytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Display for Base64Bytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// Encodes any serializable value as `base64(json(value))`, the shape used
/// by every x402 payment header.
///
/// # Errors
///
/// Returns an error if `value` cannot be serialized to JSON.
pub fn encode_json<T: serde::Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64Bytes::from(json).encode())
}

/// Decodes a `base64(json(value))` header into the target type.
///
/// # Errors
///
/// Returns [`DecodeJsonError::Base64`] if `input` is not valid base64, or
/// [`DecodeJsonError::Json`] if the decoded bytes are not valid JSON for `T`.
pub fn decode_json<T: serde::de::DeserializeOwned>(input: &str) -> Result<T, DecodeJsonError> {
    let bytes = Base64Bytes::decode(input)?;
    let value = serde_json::from_slice(bytes.as_ref())?;
    Ok(value)
}

/// Error decoding a `base64(json(..))` header value.
#[derive(Debug, thiserror::Error)]
pub enum DecodeJsonError {
    /// The header value was not valid standard base64.
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    /// The decoded bytes were not valid JSON for the target type.
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}
