//! Application state and router assembly.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;

use crate::cache::TtlCache;
use crate::config::Config;
use crate::facilitator::{FacilitatorClient, FacilitatorError};
use crate::middleware::idempotency::CachedResponse;
use crate::middleware::{idempotency, payment_gate, replay, signature};
use crate::policy::{PolicyRegistry, RoutePolicy};
use crate::proxy::proxy_handler;

const IDEMPOTENCY_TTL: Duration = Duration::from_secs(10 * 60);
const NONCE_TTL: Duration = Duration::from_secs(5 * 60);

/// Shared state reachable from every handler and middleware stage.
pub struct AppState {
    /// Process configuration, loaded once at startup.
    pub config: Config,
    /// Immutable, boot-time catalogue of priced routes.
    pub policies: PolicyRegistry,
    /// Cache of successful responses keyed by client idempotency token.
    pub idempotency_cache: TtlCache<String, CachedResponse>,
    /// Cache of consumed `(nonce, memo)` pairs.
    pub nonce_cache: TtlCache<String, ()>,
    /// Client for the external facilitator's verify/settle API.
    pub facilitator: FacilitatorClient,
    /// Shared HTTP client the proxy handler forwards requests through.
    pub http_client: reqwest::Client,
}

impl AppState {
    /// Assembles application state from `config`, registering the gateway's
    /// demo route policies and constructing the facilitator client.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorError`] if the facilitator base URL cannot be
    /// joined with its `verify`/`settle` endpoint paths.
    pub fn new(config: Config) -> Result<Self, FacilitatorError> {
        let http_client = reqwest::Client::new();
        let facilitator = FacilitatorClient::new(http_client.clone(), &config.facilitator_url)?;
        let policies = default_policies(&config);

        Ok(Self {
            config,
            policies,
            idempotency_cache: TtlCache::new(IDEMPOTENCY_TTL),
            nonce_cache: TtlCache::new(NONCE_TTL),
            facilitator,
            http_client,
        })
    }

    /// Builds the absolute resource URL a policy's path resolves to under
    /// this deployment's canonical base URL.
    #[must_use]
    pub fn resource_url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path.trim_start_matches('/'))
    }
}

/// Registers the gateway's own demo route policies: a local paid echo
/// endpoint and two proxied upstream routes.
fn default_policies(config: &Config) -> PolicyRegistry {
    let asset = "STX";
    let default_amount = config.amount_microstx.clone().unwrap_or_else(|| "100000".to_owned());
    let pay_to = config.pay_to.clone().unwrap_or_else(|| "ST1MOCKPAYTO00000000000000000000MOCK".to_owned());

    let mut policies = PolicyRegistry::new();

    policies.register(
        RoutePolicy::builder("/v1/premium/echo")
            .method("GET")
            .network(&config.network)
            .amount(asset, "100000")
            .pay_to(&pay_to)
            .description("Paid echo demo resource")
            .build()
            .unwrap_or_else(|error| panic!("invalid default policy: {error}")),
    );

    policies.register(
        RoutePolicy::builder("/proxy/api/weather")
            .method("GET")
            .network(&config.network)
            .amount(asset, "100000")
            .pay_to(&pay_to)
            .description("Proxied weather forecast")
            .build()
            .unwrap_or_else(|error| panic!("invalid default policy: {error}")),
    );

    policies.register(
        RoutePolicy::builder("/proxy/api/summarize")
            .method("POST")
            .network(&config.network)
            .amount(asset, &default_amount)
            .pay_to(&pay_to)
            .description("Proxied text summarization")
            .build()
            .unwrap_or_else(|error| panic!("invalid default policy: {error}")),
    );

    policies
}

async fn health() -> &'static str {
    "ok"
}

/// Assembles the full axum [`Router`], wiring route handlers through the
/// fixed five-stage pipeline: idempotency is outermost so a cache hit skips
/// every other stage; the payment gate is innermost so it runs immediately
/// before the handler.
#[must_use]
pub fn app(state: Arc<AppState>) -> Router {
    let proxy_require_policy = state.config.proxy_require_policy;

    let paid_routes = Router::new()
        .route("/v1/premium/echo", get(crate::handlers::echo_handler))
        .route(
            "/proxy/{*remainder}",
            get(proxy_handler)
                .post(proxy_handler)
                .put(proxy_handler)
                .delete(proxy_handler)
                .patch(proxy_handler),
        )
        .layer(axum::middleware::from_fn_with_state(Arc::clone(&state), payment_gate::middleware))
        .layer(axum::middleware::from_fn_with_state(Arc::clone(&state), replay::middleware))
        .layer(axum::middleware::from_fn_with_state(Arc::clone(&state), signature::middleware))
        .layer(axum::middleware::from_fn_with_state(Arc::clone(&state), idempotency::middleware));

    let paid_routes = if proxy_require_policy {
        paid_routes.layer(axum::middleware::from_fn_with_state(Arc::clone(&state), reject_unregistered_proxy_paths))
    } else {
        paid_routes
    };

    Router::new()
        .route("/.well-known/x402", get(crate::discovery::discovery_handler))
        .route("/health", get(health))
        .merge(paid_routes)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn reject_unregistered_proxy_paths(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    use axum::response::IntoResponse;

    let path = req.uri().path();
    if PolicyRegistry::is_proxy_path(path, crate::proxy::PROXY_PREFIX) && state.policies.find(path, req.method().as_str()).is_none() {
        return axum::http::StatusCode::NOT_FOUND.into_response();
    }
    next.run(req).await
}
