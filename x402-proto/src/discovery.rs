//! Discovery document types served at `/.well-known/x402`.

use serde::{Deserialize, Serialize};

use crate::v2::PaymentAccept;

/// Describes the request/response shape of a discoverable resource, so
/// crawlers such as x402scan can render a usable form without a human
/// reading the route's documentation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OutputSchema {
    /// HTTP method the resource is invoked with.
    pub method: String,
    /// JSON schema (or freeform description) of the expected request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,
    /// JSON schema (or freeform description) of the response body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
}

/// A discoverable resource entry: a [`PaymentAccept`] plus its input/output
/// schema, with `network` normalized to the short token form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryAccept {
    /// Payment terms for this resource.
    #[serde(flatten)]
    pub accept: PaymentAccept,
    /// Request/response shape of the resource.
    pub output_schema: OutputSchema,
}

/// The full discovery document returned at `/.well-known/x402`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryDocument {
    /// Protocol version this document was generated for.
    pub x402_version: u8,
    /// Human-readable name of the service exposing these resources.
    pub service_name: String,
    /// Human-readable description of the service.
    pub description: String,
    /// URL of an image representing the service, for crawler UIs.
    pub image_url: String,
    /// Canonical URL of the service.
    pub url: String,
    /// Every policy-registered route, advertised as a discoverable resource.
    pub items: Vec<DiscoveryAccept>,
}
