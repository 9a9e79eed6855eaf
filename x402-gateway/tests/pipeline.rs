//! End-to-end pipeline tests driving the router with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tower::ServiceExt;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use x402_gateway::config::Config;
use x402_gateway::server::{AppState, app};

fn base_config(facilitator_url: Url, upstream_url: Url, mock_payments: bool) -> Config {
    Config {
        network: "stacks:2147483648".to_owned(),
        facilitator_url,
        pay_to: Some("SP000000000000000000002Q6VF78".to_owned()),
        amount_microstx: Some("100000".to_owned()),
        mock_payments,
        port: 0,
        upstream_url,
        base_url: "https://gateway.example/".parse().unwrap(),
        public_base_url: "https://gateway.example/".parse().unwrap(),
        proxy_require_policy: false,
        service_name: "x402 gateway".to_owned(),
        service_description: "test gateway".to_owned(),
        image_url: "https://gateway.example/logo.png".to_owned(),
    }
}

fn signature_header(payload: &serde_json::Value) -> String {
    STANDARD.encode(serde_json::to_vec(payload).unwrap())
}

fn valid_payload(amount: &str) -> serde_json::Value {
    serde_json::json!({
        "x402Version": 2,
        "scheme": "exact",
        "network": "stacks:2147483648",
        "asset": "STX",
        "payTo": "SP000000000000000000002Q6VF78",
        "amount": amount,
        "nonce": "nonce-1",
        "signature": "sig",
        "resource": "https://gateway.example/v1/premium/echo",
    })
}

#[tokio::test]
async fn unpaid_request_to_paid_route_returns_402_with_offer() {
    let upstream = MockServer::start().await;
    let facilitator = MockServer::start().await;
    let config = base_config(
        facilitator.uri().parse().unwrap(),
        upstream.uri().parse().unwrap(),
        true,
    );
    let state = Arc::new(AppState::new(config).unwrap());
    let app = app(state);

    let response = app
        .oneshot(Request::builder().uri("/v1/premium/echo").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    assert!(response.headers().get("payment-required").is_some());
}

#[tokio::test]
async fn mock_mode_settles_and_serves_handler() {
    let upstream = MockServer::start().await;
    let facilitator = MockServer::start().await;
    let config = base_config(
        facilitator.uri().parse().unwrap(),
        upstream.uri().parse().unwrap(),
        true,
    );
    let state = Arc::new(AppState::new(config).unwrap());
    let app = app(state);

    let header = signature_header(&valid_payload("100000"));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/premium/echo?msg=hello")
                .header("payment-signature", header)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("payment-response").is_some());
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let envelope: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(envelope["data"]["echo"], serde_json::json!("hello"));
    assert!(envelope["data"]["ts"].is_string());
}

#[tokio::test]
async fn underpayment_is_rejected_before_facilitator_is_called() {
    let upstream = MockServer::start().await;
    let facilitator = MockServer::start().await;
    let config = base_config(
        facilitator.uri().parse().unwrap(),
        upstream.uri().parse().unwrap(),
        true,
    );
    let state = Arc::new(AppState::new(config).unwrap());
    let app = app(state);

    let header = signature_header(&valid_payload("1"));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/premium/echo")
                .header("payment-signature", header)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn replayed_nonce_is_rejected_with_409() {
    let upstream = MockServer::start().await;
    let facilitator = MockServer::start().await;
    let config = base_config(
        facilitator.uri().parse().unwrap(),
        upstream.uri().parse().unwrap(),
        true,
    );
    let state = Arc::new(AppState::new(config).unwrap());
    let app = app(state);

    let header = signature_header(&valid_payload("100000"));

    let first = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/premium/echo")
                .header("payment-signature", header.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(
            Request::builder()
                .uri("/v1/premium/echo")
                .header("payment-signature", header)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn idempotency_key_replays_cached_response_without_rerunning_pipeline() {
    let upstream = MockServer::start().await;
    let facilitator = MockServer::start().await;
    let config = base_config(
        facilitator.uri().parse().unwrap(),
        upstream.uri().parse().unwrap(),
        true,
    );
    let state = Arc::new(AppState::new(config).unwrap());
    let app = app(state);

    let header = signature_header(&valid_payload("100000"));

    let first = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/premium/echo")
                .header("payment-signature", header.clone())
                .header("idempotency-key", "key-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    // Second call reuses the same nonce too, but the idempotency cache should
    // intercept before the replay guard ever runs, so it must still succeed.
    let second = app
        .oneshot(
            Request::builder()
                .uri("/v1/premium/echo")
                .header("payment-signature", header)
                .header("idempotency-key", "key-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
}

#[tokio::test]
async fn live_mode_rejects_when_facilitator_says_invalid() {
    let upstream = MockServer::start().await;
    let facilitator = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "valid": false })))
        .mount(&facilitator)
        .await;

    let config = base_config(
        facilitator.uri().parse().unwrap(),
        upstream.uri().parse().unwrap(),
        false,
    );
    let state = Arc::new(AppState::new(config).unwrap());
    let app = app(state);

    let header = signature_header(&valid_payload("100000"));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/premium/echo")
                .header("payment-signature", header)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn live_mode_settles_and_proxy_strips_payment_headers_from_upstream() {
    let upstream = MockServer::start().await;
    let facilitator = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "valid": true,
            "payer": "SPPAYER",
            "amount": "100000",
            "network": "stacks:2147483648",
        })))
        .mount(&facilitator)
        .await;
    Mock::given(method("POST"))
        .and(path("/settle"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "settled": true,
            "txHash": "0xabc",
            "network": "stacks:2147483648",
            "timestamp": 1_700_000_000_000_u64,
        })))
        .mount(&facilitator)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/weather"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "forecast": "sunny" }))
                .insert_header("content-type", "application/json"),
        )
        .mount(&upstream)
        .await;

    let config = base_config(
        facilitator.uri().parse().unwrap(),
        upstream.uri().parse().unwrap(),
        false,
    );
    let state = Arc::new(AppState::new(config).unwrap());
    let app = app(state);

    let mut payload = valid_payload("100000");
    payload["resource"] = serde_json::json!("https://gateway.example/proxy/api/weather");
    let header = signature_header(&payload);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/proxy/api/weather")
                .header("payment-signature", header)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("payment-response").is_some());
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let envelope: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(envelope["success"], serde_json::json!(true));
    assert_eq!(envelope["data"]["forecast"], serde_json::json!("sunny"));
    assert!(envelope["receipt"]["settled"].as_bool().unwrap());
}

#[tokio::test]
async fn discovery_document_lists_every_registered_route() {
    let upstream = MockServer::start().await;
    let facilitator = MockServer::start().await;
    let config = base_config(
        facilitator.uri().parse().unwrap(),
        upstream.uri().parse().unwrap(),
        true,
    );
    let state = Arc::new(AppState::new(config).unwrap());
    let app = app(state);

    let response = app
        .oneshot(Request::builder().uri("/.well-known/x402").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("cache-control").and_then(|v| v.to_str().ok()),
        Some("public, max-age=300")
    );
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let document: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(document["items"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn unregistered_proxy_path_passes_through_unpaid_by_default() {
    let upstream = MockServer::start().await;
    let facilitator = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/other"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&upstream)
        .await;

    let config = base_config(
        facilitator.uri().parse().unwrap(),
        upstream.uri().parse().unwrap(),
        true,
    );
    let state = Arc::new(AppState::new(config).unwrap());
    let app = app(state);

    let response = app
        .oneshot(Request::builder().uri("/proxy/other").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
