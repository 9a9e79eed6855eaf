//! Route policy registry: the immutable, boot-time catalogue of priced
//! routes.

use std::collections::HashMap;

use serde_json::Value;
use x402_proto::discovery::OutputSchema;
use x402_proto::PaymentAccept;

/// One priced route. Registered at startup; immutable thereafter.
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    /// Literal path this policy matches, e.g. `/proxy/forecast`.
    pub path: String,
    /// HTTP method this policy matches, upper-cased.
    pub method: String,
    /// Payment scheme identifier, e.g. `"exact"`.
    pub scheme: String,
    /// CAIP-2 chain identifier.
    pub network: String,
    /// Asset identifier.
    pub asset: String,
    /// Minimum amount required, as a decimal-integer string of atomic units.
    pub amount: String,
    /// Address payment must be sent to.
    pub pay_to: String,
    /// Human-readable description shown in the 402 offer and discovery document.
    pub description: String,
    /// MIME type of the route's response.
    pub mime_type: String,
    /// Seconds to await settlement before a facilitator call is aborted.
    pub max_timeout_seconds: u64,
    /// Extra scheme-specific metadata forwarded to the facilitator.
    pub extra: Option<Value>,
    /// Input/output schema advertised in the discovery document, if any.
    pub output_schema: Option<OutputSchema>,
}

impl RoutePolicy {
    /// Starts a fluent builder for a policy matching `path`.
    #[must_use]
    pub fn builder(path: impl Into<String>) -> RoutePolicyBuilder {
        RoutePolicyBuilder::new(path)
    }

    /// Renders this policy as the wire-level [`PaymentAccept`] for a 402 offer,
    /// with `resource` set to `base_url` joined with this policy's path.
    #[must_use]
    pub fn to_accept(&self, resource: impl Into<String>) -> PaymentAccept {
        PaymentAccept {
            scheme: self.scheme.clone(),
            network: self.network.clone(),
            asset: self.asset.clone(),
            max_amount_required: self.amount.clone(),
            pay_to: self.pay_to.clone(),
            resource: resource.into(),
            description: Some(self.description.clone()),
            mime_type: Some(self.mime_type.clone()),
            max_timeout_seconds: self.max_timeout_seconds,
            extra: self.extra.clone(),
        }
    }
}

/// Error building a [`RoutePolicy`] via [`RoutePolicyBuilder`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PolicyBuildError {
    /// `method` was never set.
    #[error("route policy for {path:?} is missing a method")]
    MissingMethod {
        /// Path of the incomplete policy.
        path: String,
    },
    /// `network` was never set.
    #[error("route policy for {path:?} is missing a chain identifier")]
    MissingNetwork {
        /// Path of the incomplete policy.
        path: String,
    },
    /// `amount` or `asset` was never set.
    #[error("route policy for {path:?} is missing an amount or asset")]
    MissingAmountOrAsset {
        /// Path of the incomplete policy.
        path: String,
    },
    /// `pay_to` was never set.
    #[error("route policy for {path:?} is missing a recipient address")]
    MissingPayTo {
        /// Path of the incomplete policy.
        path: String,
    },
    /// `description` was never set.
    #[error("route policy for {path:?} is missing a description")]
    MissingDescription {
        /// Path of the incomplete policy.
        path: String,
    },
}

/// Fluent builder for [`RoutePolicy`], validating required fields at build
/// time and defaulting `scheme` to `"exact"`, `mime_type` to
/// `"application/json"`, and `max_timeout_seconds` to `60`.
#[derive(Debug, Clone)]
pub struct RoutePolicyBuilder {
    path: String,
    method: Option<String>,
    scheme: String,
    network: Option<String>,
    asset: Option<String>,
    amount: Option<String>,
    pay_to: Option<String>,
    description: Option<String>,
    mime_type: String,
    max_timeout_seconds: u64,
    extra: Option<Value>,
    output_schema: Option<OutputSchema>,
}

impl RoutePolicyBuilder {
    fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: None,
            scheme: "exact".to_owned(),
            network: None,
            asset: None,
            amount: None,
            pay_to: None,
            description: None,
            mime_type: "application/json".to_owned(),
            max_timeout_seconds: 60,
            extra: None,
            output_schema: None,
        }
    }

    /// Sets the HTTP method this policy matches.
    #[must_use]
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into().to_uppercase());
        self
    }

    /// Overrides the default `"exact"` payment scheme.
    #[must_use]
    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Sets the CAIP-2 chain identifier.
    #[must_use]
    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    /// Sets the asset identifier and minimum required amount.
    #[must_use]
    pub fn amount(mut self, asset: impl Into<String>, amount: impl Into<String>) -> Self {
        self.asset = Some(asset.into());
        self.amount = Some(amount.into());
        self
    }

    /// Sets the recipient address.
    #[must_use]
    pub fn pay_to(mut self, pay_to: impl Into<String>) -> Self {
        self.pay_to = Some(pay_to.into());
        self
    }

    /// Sets the human-readable description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Overrides the default `"application/json"` MIME type.
    #[must_use]
    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// Overrides the default 60-second settlement timeout.
    #[must_use]
    pub fn max_timeout_seconds(mut self, seconds: u64) -> Self {
        self.max_timeout_seconds = seconds;
        self
    }

    /// Attaches extra scheme-specific metadata forwarded to the facilitator.
    #[must_use]
    pub fn extra(mut self, extra: Value) -> Self {
        self.extra = Some(extra);
        self
    }

    /// Attaches an explicit discovery input/output schema.
    #[must_use]
    pub fn output_schema(mut self, schema: OutputSchema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Validates and builds the [`RoutePolicy`].
    ///
    /// # Errors
    ///
    /// Returns [`PolicyBuildError`] if method, chain, amount/asset,
    /// recipient, or description was never set.
    pub fn build(self) -> Result<RoutePolicy, PolicyBuildError> {
        let method = self
            .method
            .ok_or_else(|| PolicyBuildError::MissingMethod { path: self.path.clone() })?;
        let network = self
            .network
            .ok_or_else(|| PolicyBuildError::MissingNetwork { path: self.path.clone() })?;
        let (asset, amount) = match (self.asset, self.amount) {
            (Some(asset), Some(amount)) => (asset, amount),
            _ => {
                return Err(PolicyBuildError::MissingAmountOrAsset { path: self.path.clone() });
            }
        };
        let pay_to = self
            .pay_to
            .ok_or_else(|| PolicyBuildError::MissingPayTo { path: self.path.clone() })?;
        let description = self
            .description
            .ok_or_else(|| PolicyBuildError::MissingDescription { path: self.path.clone() })?;

        Ok(RoutePolicy {
            path: self.path,
            method,
            scheme: self.scheme,
            network,
            asset,
            amount,
            pay_to,
            description,
            mime_type: self.mime_type,
            max_timeout_seconds: self.max_timeout_seconds,
            extra: self.extra,
            output_schema: self.output_schema,
        })
    }
}

/// Immutable, boot-time registry of [`RoutePolicy`] entries, keyed by
/// `(path, method)`.
#[derive(Debug, Default)]
pub struct PolicyRegistry {
    policies: HashMap<(String, String), RoutePolicy>,
    order: Vec<(String, String)>,
}

impl PolicyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `policy`, keyed by `(path, method)`.
    ///
    /// # Panics
    ///
    /// Panics if a policy for the same `(path, method)` pair is already
    /// registered — registration happens once at startup, so a duplicate
    /// indicates a programming error rather than a runtime condition to
    /// recover from.
    pub fn register(&mut self, policy: RoutePolicy) {
        let key = (policy.path.clone(), policy.method.clone());
        assert!(
            !self.policies.contains_key(&key),
            "duplicate route policy for {} {}",
            policy.method,
            policy.path
        );
        self.order.push(key.clone());
        self.policies.insert(key, policy);
    }

    /// Looks up the policy matching `path` and `method` exactly (method
    /// compared case-insensitively).
    #[must_use]
    pub fn find(&self, path: &str, method: &str) -> Option<&RoutePolicy> {
        self.policies.get(&(path.to_owned(), method.to_uppercase()))
    }

    /// Returns every registered policy, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RoutePolicy> {
        self.order.iter().filter_map(|key| self.policies.get(key))
    }

    /// Returns `true` if `path` falls under the proxy subtree, i.e. starts
    /// with `prefix`.
    #[must_use]
    pub fn is_proxy_path(path: &str, prefix: &str) -> bool {
        path.starts_with(prefix)
    }
}
