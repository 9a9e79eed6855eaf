//! Environment-sourced configuration.

use std::env;

use url::Url;

const DEFAULT_NETWORK: &str = "stacks:2147483648";
const DEFAULT_FACILITATOR_URL: &str = "https://facilitator.stacksx402.com";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_UPSTREAM_URL: &str = "http://localhost:4000";
const DEFAULT_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_SERVICE_NAME: &str = "x402 gateway";
const DEFAULT_SERVICE_DESCRIPTION: &str = "Reverse-proxy x402 payment gateway";
const DEFAULT_IMAGE_URL: &str = "https://stacksx402.com/logo.png";

/// Gateway configuration, assembled once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// CAIP-2 chain identifier this deployment settles on.
    pub network: String,
    /// Base URL of the facilitator's verify/settle API.
    pub facilitator_url: Url,
    /// Recipient address for paid routes. Required unless `mock_payments` is set.
    pub pay_to: Option<String>,
    /// Default route amount, in atomic units. Required unless `mock_payments` is set.
    pub amount_microstx: Option<String>,
    /// When true, bypass the facilitator and synthesize settled receipts.
    pub mock_payments: bool,
    /// TCP port the gateway listens on.
    pub port: u16,
    /// Base URL of the upstream service proxied requests are forwarded to.
    pub upstream_url: Url,
    /// Canonical base URL used to build `resource` fields in 402 offers.
    pub base_url: Url,
    /// Public HTTPS base URL used to build `resource` fields in the discovery document.
    pub public_base_url: Url,
    /// When true, unregistered `/proxy/...` paths return 404 instead of forwarding unpaid.
    pub proxy_require_policy: bool,
    /// Human-readable service name advertised in the discovery document.
    pub service_name: String,
    /// Human-readable service description advertised in the discovery document.
    pub service_description: String,
    /// Image URL advertised in the discovery document.
    pub image_url: String,
}

/// Error constructing [`Config`] from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable was not set.
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),
    /// An environment variable was set but could not be parsed.
    #[error("invalid value for {name}: {source}")]
    InvalidValue {
        /// Name of the offending variable.
        name: &'static str,
        /// The underlying parse error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Config {
    /// Loads configuration from the process environment, optionally reading
    /// a `.env` file first if one is present in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable required by the selected mode
    /// (live vs. mock payments) is missing, or if a set variable fails to
    /// parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Absence of a `.env` file is not an error; dotenvy just no-ops.
        let _ = dotenvy::dotenv();

        let mock_payments = parse_bool_flag("MOCK_PAYMENTS");
        let proxy_require_policy = parse_bool_flag("PROXY_REQUIRE_POLICY");

        let network = env::var("NETWORK").unwrap_or_else(|_| DEFAULT_NETWORK.to_owned());

        let facilitator_url = parse_url_var(
            "FACILITATOR_URL",
            &env::var("FACILITATOR_URL").unwrap_or_else(|_| DEFAULT_FACILITATOR_URL.to_owned()),
        )?;

        let pay_to = match env::var("PAY_TO") {
            Ok(v) if !v.is_empty() => Some(v),
            _ if mock_payments => None,
            _ => return Err(ConfigError::MissingVar("PAY_TO")),
        };

        let amount_microstx = match env::var("AMOUNT_MICROSTX") {
            Ok(v) if !v.is_empty() => Some(v),
            _ if mock_payments => None,
            _ => return Err(ConfigError::MissingVar("AMOUNT_MICROSTX")),
        };

        let port = match env::var("PORT") {
            Ok(v) => v.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                name: "PORT",
                source: Box::new(e),
            })?,
            Err(_) => DEFAULT_PORT,
        };

        let upstream_url = parse_url_var(
            "UPSTREAM_URL",
            &env::var("UPSTREAM_URL").unwrap_or_else(|_| DEFAULT_UPSTREAM_URL.to_owned()),
        )?;

        let base_url = parse_url_var(
            "BASE_URL",
            &env::var("BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned()),
        )?;

        let public_base_url = match env::var("PUBLIC_BASE_URL") {
            Ok(v) => parse_url_var("PUBLIC_BASE_URL", &v)?,
            Err(_) => base_url.clone(),
        };

        let service_name = env::var("SERVICE_NAME").unwrap_or_else(|_| DEFAULT_SERVICE_NAME.to_owned());
        let service_description =
            env::var("SERVICE_DESCRIPTION").unwrap_or_else(|_| DEFAULT_SERVICE_DESCRIPTION.to_owned());
        let image_url = env::var("IMAGE_URL").unwrap_or_else(|_| DEFAULT_IMAGE_URL.to_owned());

        Ok(Self {
            network,
            facilitator_url,
            pay_to,
            amount_microstx,
            mock_payments,
            port,
            upstream_url,
            base_url,
            public_base_url,
            proxy_require_policy,
            service_name,
            service_description,
            image_url,
        })
    }
}

fn parse_bool_flag(name: &str) -> bool {
    match env::var(name) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "true" | "1"),
        Err(_) => false,
    }
}

fn parse_url_var(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidValue {
        name,
        source: Box::new(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_flag_accepts_true_and_one() {
        // SAFETY in the loose sense only: these tests run single-threaded
        // within this crate because `cargo test` isolates env mutation per
        // process, but parallel test binaries could race; kept narrow to
        // this module's own vars to minimize cross-test interference.
        unsafe { env::set_var("TEST_FLAG_GATEWAY", "TRUE") };
        assert!(parse_bool_flag("TEST_FLAG_GATEWAY"));
        unsafe { env::set_var("TEST_FLAG_GATEWAY", "1") };
        assert!(parse_bool_flag("TEST_FLAG_GATEWAY"));
        unsafe { env::set_var("TEST_FLAG_GATEWAY", "0") };
        assert!(!parse_bool_flag("TEST_FLAG_GATEWAY"));
        unsafe { env::remove_var("TEST_FLAG_GATEWAY") };
    }
}
