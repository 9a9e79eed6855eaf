//! Client for the external facilitator's verify/settle API.

use serde::{Deserialize, Serialize};
use url::Url;
use x402_proto::PaymentRequired;

/// Response from `POST {facilitator}/verify`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    /// Whether the submitted signature is valid for the given requirements.
    pub valid: bool,
    /// Address that signed the payment.
    #[serde(default)]
    pub payer: Option<String>,
    /// Amount the payer actually signed for.
    #[serde(default)]
    pub amount: Option<String>,
    /// Chain identifier the payment targets.
    #[serde(default)]
    pub network: Option<String>,
    /// Transaction hash, if the facilitator already knows it at verify time.
    #[serde(default)]
    pub tx_hash: Option<String>,
}

/// Response from `POST {facilitator}/settle`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    /// Whether settlement completed on-chain.
    pub settled: bool,
    /// On-chain transaction hash.
    #[serde(default)]
    pub tx_hash: Option<String>,
    /// Chain identifier the payment settled on.
    pub network: String,
    /// Unix epoch milliseconds at which settlement completed.
    pub timestamp: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FacilitatorRequest<'a> {
    payment_signature: &'a str,
    requirements: &'a PaymentRequired,
}

/// Error calling the facilitator's verify/settle API.
#[derive(Debug, thiserror::Error)]
pub enum FacilitatorError {
    /// The facilitator base URL could not be parsed.
    #[error("invalid facilitator URL: {0}")]
    UrlParse(#[from] url::ParseError),
    /// The HTTP request itself failed (connection, TLS, timeout).
    #[error("facilitator request failed ({context}): {source}")]
    Http {
        /// Which call failed (`"verify"` or `"settle"`).
        context: &'static str,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },
    /// The facilitator responded with a non-2xx status.
    #[error("facilitator returned {status} ({context}): {body}")]
    HttpStatus {
        /// Which call failed.
        context: &'static str,
        /// The response status code.
        status: reqwest::StatusCode,
        /// The response body text, for surfacing to the caller.
        body: String,
    },
    /// The facilitator's response body could not be read.
    #[error("failed to read facilitator response body ({context}): {source}")]
    ResponseBodyRead {
        /// Which call failed.
        context: &'static str,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },
    /// The facilitator's response body was not valid JSON for the expected shape.
    #[error("failed to deserialize facilitator response ({context}): {source}")]
    JsonDeserialization {
        /// Which call failed.
        context: &'static str,
        /// The underlying deserialization error.
        #[source]
        source: serde_json::Error,
    },
}

/// Talks to the external facilitator service that verifies signed payments
/// and settles them on-chain. Stateless beyond the HTTP client and the two
/// resolved endpoint URLs; no retries, since the facilitator is treated as
/// authoritative and idempotent at its own layer.
#[derive(Debug, Clone)]
pub struct FacilitatorClient {
    client: reqwest::Client,
    verify_url: Url,
    settle_url: Url,
}

impl FacilitatorClient {
    /// Builds a client from the facilitator's base URL, resolving `/verify`
    /// and `/settle` beneath it.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorError::UrlParse`] if the endpoint paths cannot be
    /// joined onto `base_url`.
    pub fn new(client: reqwest::Client, base_url: &Url) -> Result<Self, FacilitatorError> {
        Ok(Self {
            client,
            verify_url: base_url.join("verify")?,
            settle_url: base_url.join("settle")?,
        })
    }

    /// Calls `POST {facilitator}/verify` with the raw base64-encoded
    /// signature header and the route's requirements.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorError`] if the request fails, the facilitator
    /// responds with a non-2xx status, or the response body is not valid
    /// JSON for [`VerifyResponse`].
    pub async fn verify(
        &self,
        payment_signature: &str,
        requirements: &PaymentRequired,
    ) -> Result<VerifyResponse, FacilitatorError> {
        self.post_json(&self.verify_url, payment_signature, requirements, "verify")
            .await
    }

    /// Calls `POST {facilitator}/settle` with the raw base64-encoded
    /// signature header and the route's requirements.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorError`] if the request fails, the facilitator
    /// responds with a non-2xx status, or the response body is not valid
    /// JSON for [`SettleResponse`].
    pub async fn settle(
        &self,
        payment_signature: &str,
        requirements: &PaymentRequired,
    ) -> Result<SettleResponse, FacilitatorError> {
        self.post_json(&self.settle_url, payment_signature, requirements, "settle")
            .await
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &Url,
        payment_signature: &str,
        requirements: &PaymentRequired,
        context: &'static str,
    ) -> Result<T, FacilitatorError> {
        let body = FacilitatorRequest {
            payment_signature,
            requirements,
        };

        let response = self
            .client
            .post(url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|source| FacilitatorError::Http { context, source })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|source| FacilitatorError::ResponseBodyRead { context, source })?;

        if !status.is_success() {
            return Err(FacilitatorError::HttpStatus {
                context,
                status,
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|source| FacilitatorError::JsonDeserialization { context, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use x402_proto::PaymentAccept;

    fn sample_requirements() -> PaymentRequired {
        PaymentRequired::new(
            "payment required",
            "https://gateway.example/proxy/forecast",
            PaymentAccept {
                scheme: "exact".into(),
                network: "stacks:2147483648".into(),
                asset: "STX".into(),
                max_amount_required: "1000000".into(),
                pay_to: "SP000000000000000000002Q6VF78".into(),
                resource: "https://gateway.example/proxy/forecast".into(),
                description: None,
                mime_type: None,
                max_timeout_seconds: 60,
                extra: None,
            },
        )
    }

    #[tokio::test]
    async fn verify_success_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "valid": true,
                "payer": "SPABC",
                "amount": "1000000",
                "network": "stacks:2147483648",
            })))
            .mount(&server)
            .await;

        let base = Url::parse(&server.uri()).unwrap();
        let client = FacilitatorClient::new(reqwest::Client::new(), &base).unwrap();
        let response = client.verify("signature", &sample_requirements()).await.unwrap();
        assert!(response.valid);
        assert_eq!(response.payer.as_deref(), Some("SPABC"));
    }

    #[tokio::test]
    async fn settle_non_2xx_is_surfaced_as_http_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/settle"))
            .respond_with(ResponseTemplate::new(500).set_body_string("facilitator down"))
            .mount(&server)
            .await;

        let base = Url::parse(&server.uri()).unwrap();
        let client = FacilitatorClient::new(reqwest::Client::new(), &base).unwrap();
        let err = client.settle("signature", &sample_requirements()).await.unwrap_err();
        match err {
            FacilitatorError::HttpStatus { context, body, .. } => {
                assert_eq!(context, "settle");
                assert_eq!(body, "facilitator down");
            }
            other => panic!("expected HttpStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_response_body_is_json_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let base = Url::parse(&server.uri()).unwrap();
        let client = FacilitatorClient::new(reqwest::Client::new(), &base).unwrap();
        let err = client.verify("signature", &sample_requirements()).await.unwrap_err();
        assert!(matches!(err, FacilitatorError::JsonDeserialization { .. }));
    }
}
