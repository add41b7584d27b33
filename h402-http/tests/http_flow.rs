//! HTTP-level behavior: the 402 dance, dynamic pricing, the retry cap,
//! and the facilitator HTTP client.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use axum::Router;
use axum::routing::get;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use h402::proto::{
    PaymentPayload, PaymentRequired, PaymentRequirements, SettleResponse, SupportedKind,
    SupportedResponse, VerifyResponse,
};
use h402::scheme::{
    AssetAmount, BoxFuture, SchemeClient, SchemeError, SchemeServer,
};
use h402::server::FacilitatorClient;
use h402::{X402Client, X402ResourceServer};
use h402_http::headers::{
    PAYMENT_REQUIRED, PAYMENT_RESPONSE, PAYMENT_SIGNATURE, decode_payment_required,
    decode_payment_response, encode_payment_required,
};
use h402_http::server::{AdmitOutcome, PaymentGate, PaymentLayer, PaymentOption, RouteConfig, ValueSource};
use h402_http::{HttpFacilitatorClient, PaymentMiddleware, RequestContext};
use h402_proto::helpers::PaymentRequiredEnum;

const NETWORK: &str = "x402:test";

/// Minimal scheme fixture: `toy` payments sign with `paid-by:<payer>`
/// and always verify; settlement succeeds unless the signature is
/// `paid-by:nobody`.
struct ToySchemeClient;

impl SchemeClient for ToySchemeClient {
    fn scheme(&self) -> &str {
        "toy"
    }

    fn create_payment_payload<'a>(
        &'a self,
        _requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<Value, SchemeError>> {
        Box::pin(async move { Ok(json!({"signature": "paid-by:tester"})) })
    }
}

struct ToySchemeServer;

impl SchemeServer for ToySchemeServer {
    fn scheme(&self) -> &str {
        "toy"
    }

    fn parse_price(&self, price: &Value, _network: &str) -> Result<AssetAmount, SchemeError> {
        let text = price.as_str().ok_or("toy prices are strings")?;
        Ok(AssetAmount {
            amount: text.trim_start_matches('$').to_owned(),
            asset: "TOY".into(),
            extra: None,
        })
    }

    fn enhance_payment_requirements(
        &self,
        requirements: PaymentRequirements,
        _supported_kind: &SupportedKind,
        _extensions: &[String],
    ) -> PaymentRequirements {
        requirements
    }
}

/// In-process facilitator stub counting verify/settle calls.
struct ToyFacilitatorClient {
    verifies: Arc<AtomicU32>,
    settles: Arc<AtomicU32>,
    settle_fails: bool,
}

impl FacilitatorClient for ToyFacilitatorClient {
    fn verify<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        _requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<VerifyResponse, SchemeError>> {
        self.verifies.fetch_add(1, Ordering::SeqCst);
        let signature = payload.payload["signature"].as_str().unwrap_or_default();
        let response = if signature.starts_with("paid-by:") {
            VerifyResponse::valid(signature.trim_start_matches("paid-by:"))
        } else {
            VerifyResponse::invalid("invalid_signature", "not a toy signature")
        };
        Box::pin(async move { Ok(response) })
    }

    fn settle<'a>(
        &'a self,
        payload: &'a PaymentPayload,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<SettleResponse, SchemeError>> {
        self.settles.fetch_add(1, Ordering::SeqCst);
        let payer = payload.payload["signature"]
            .as_str()
            .unwrap_or_default()
            .trim_start_matches("paid-by:")
            .to_owned();
        let response = if self.settle_fails {
            SettleResponse::error("submission_failed", "toy chain offline", &requirements.network)
        } else {
            SettleResponse::success("toy-tx-1", &requirements.network, payer)
        };
        Box::pin(async move { Ok(response) })
    }

    fn get_supported(&self) -> BoxFuture<'_, Result<SupportedResponse, SchemeError>> {
        Box::pin(async move {
            Ok(SupportedResponse {
                kinds: vec![SupportedKind {
                    x402_version: 2,
                    scheme: "toy".into(),
                    network: NETWORK.into(),
                    extra: None,
                }],
                extensions: vec![],
                signers: std::collections::HashMap::new(),
            })
        })
    }
}

struct Fixture {
    gate: PaymentGate,
    verifies: Arc<AtomicU32>,
    settles: Arc<AtomicU32>,
}

async fn fixture(settle_fails: bool) -> Fixture {
    let verifies = Arc::new(AtomicU32::new(0));
    let settles = Arc::new(AtomicU32::new(0));
    let mut server = X402ResourceServer::with_facilitator(Box::new(ToyFacilitatorClient {
        verifies: Arc::clone(&verifies),
        settles: Arc::clone(&settles),
        settle_fails,
    }));
    server.register(NETWORK, Box::new(ToySchemeServer));
    server.initialize().await.expect("initialize");
    Fixture {
        gate: PaymentGate::new(Arc::new(server)),
        verifies,
        settles,
    }
}

fn toy_client() -> X402Client {
    let mut client = X402Client::new();
    client.register(NETWORK, Box::new(ToySchemeClient));
    client
}

fn tiered_route() -> RouteConfig {
    RouteConfig::new(PaymentOption {
        scheme: "toy".into(),
        network: NETWORK.into(),
        price: ValueSource::dynamic(|ctx: RequestContext| async move {
            let price = if ctx.query_param("tier") == Some("business") {
                "$0.05"
            } else {
                "$0.10"
            };
            Ok(json!(price))
        }),
        pay_to: ValueSource::from("Merchant"),
        max_timeout_seconds: None,
    })
}

fn context(url: &str) -> RequestContext {
    let uri: http::Uri = url.parse().unwrap();
    RequestContext::from_parts(&http::Method::GET, &uri, &http::HeaderMap::new())
}

#[tokio::test]
async fn dynamic_price_sees_query_params() {
    let fixture = fixture(false).await;
    let route = tiered_route();

    let business = fixture
        .gate
        .challenge(&route, &context("https://api.example.com/api/data?tier=business"), None)
        .await
        .unwrap();
    let decoded = decode_payment_required(&business.header_value).unwrap();
    let PaymentRequiredEnum::V2(required) = decoded else {
        panic!("expected V2 challenge");
    };
    assert_eq!(required.accepts[0].amount, "0.05");

    let standard = fixture
        .gate
        .challenge(&route, &context("https://api.example.com/api/data?tier=free"), None)
        .await
        .unwrap();
    let PaymentRequiredEnum::V2(required) = decode_payment_required(&standard.header_value).unwrap()
    else {
        panic!("expected V2 challenge");
    };
    assert_eq!(required.accepts[0].amount, "0.10");
}

#[tokio::test]
async fn hook_timeout_is_a_gate_error_not_a_challenge() {
    let fixture = fixture(false).await;
    let route = RouteConfig::new(PaymentOption {
        scheme: "toy".into(),
        network: NETWORK.into(),
        price: ValueSource::dynamic(|_ctx: RequestContext| async move {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            Ok(json!("$1"))
        }),
        pay_to: ValueSource::from("Merchant"),
        max_timeout_seconds: None,
    })
    .with_hook_timeout(std::time::Duration::from_millis(20));

    let err = fixture
        .gate
        .challenge(&route, &context("https://api.example.com/x"), None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("timed out"));
}

#[tokio::test]
async fn gate_settles_only_verified_payments() {
    let fixture = fixture(false).await;
    let route = RouteConfig::new(PaymentOption::new("toy", NETWORK, "$1", "Merchant"));
    let ctx = context("https://api.example.com/paid");

    // Produce a payload by answering the gate's own challenge.
    let challenge = fixture.gate.challenge(&route, &ctx, None).await.unwrap();
    let required = decode_payment_required(&challenge.header_value).unwrap();
    let payload = toy_client().create_payment_payload(&required).await.unwrap();
    let header = match &payload {
        h402_proto::helpers::PaymentPayloadEnum::V2(p) => {
            h402_http::headers::encode_payment_signature(p).unwrap()
        }
        h402_proto::helpers::PaymentPayloadEnum::V1(_) => unreachable!(),
    };

    let outcome = fixture.gate.admit(&route, &ctx, &header).await.unwrap();
    let AdmitOutcome::Verified(verified) = outcome else {
        panic!("expected verified payment");
    };
    assert_eq!(fixture.verifies.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.settles.load(Ordering::SeqCst), 0);

    let response_header = fixture.gate.settle(verified).await.unwrap();
    let settled = decode_payment_response(&response_header).unwrap();
    assert!(settled.success);
    assert_eq!(settled.transaction, "toy-tx-1");
    assert_eq!(fixture.settles.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn garbage_payment_header_is_rejected_with_a_challenge() {
    let fixture = fixture(false).await;
    let route = RouteConfig::new(PaymentOption::new("toy", NETWORK, "$1", "Merchant"));
    let ctx = context("https://api.example.com/paid");

    let outcome = fixture
        .gate
        .admit(&route, &ctx, "not base64 at all")
        .await
        .unwrap();
    assert!(matches!(outcome, AdmitOutcome::Rejected(_)));
    assert_eq!(fixture.verifies.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn mismatched_payment_is_rejected_with_requirements_mismatch() {
    let fixture = fixture(false).await;
    let route = RouteConfig::new(PaymentOption::new("toy", NETWORK, "$1", "Company B"));
    let ctx = context("https://api.example.com/paid");

    // Payload built against a different offer (Company A).
    let other = PaymentRequired {
        x402_version: 2,
        accepts: vec![PaymentRequirements {
            scheme: "toy".into(),
            network: NETWORK.into(),
            amount: "1".into(),
            pay_to: "Company A".into(),
            max_timeout_seconds: 300,
            asset: "TOY".into(),
            extra: None,
        }],
        error: None,
        resource: None,
        extensions: None,
    };
    let payload = toy_client().create_payment_payload_v2(&other).await.unwrap();
    let header = h402_http::headers::encode_payment_signature(&payload).unwrap();

    let outcome = fixture.gate.admit(&route, &ctx, &header).await.unwrap();
    let AdmitOutcome::Rejected(challenge) = outcome else {
        panic!("expected rejection");
    };
    let PaymentRequiredEnum::V2(required) =
        decode_payment_required(&challenge.header_value).unwrap()
    else {
        panic!("expected V2 challenge");
    };
    assert_eq!(required.error.as_deref(), Some("requirements_mismatch"));
    assert_eq!(fixture.verifies.load(Ordering::SeqCst), 0);
}

fn layer_app(gate: PaymentGate, route: RouteConfig) -> Router {
    Router::new()
        .route("/paid", get(|| async { "the goods" }))
        .layer(PaymentLayer::new(gate, route))
}

#[tokio::test]
async fn layer_challenges_then_serves_then_settles() {
    let fixture = fixture(false).await;
    let route = RouteConfig::new(PaymentOption::new("toy", NETWORK, "$1", "Merchant"));
    let app = layer_app(fixture.gate.clone(), route);

    // First request: no payment header, expect 402 with requirements.
    let response = app
        .clone()
        .oneshot(
            http::Request::builder()
                .uri("/paid")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), http::StatusCode::PAYMENT_REQUIRED);
    let challenge_header = response
        .headers()
        .get(PAYMENT_REQUIRED)
        .and_then(|v| v.to_str().ok())
        .expect("challenge header")
        .to_owned();

    // Second request: pay.
    let required = decode_payment_required(&challenge_header).unwrap();
    let PaymentRequiredEnum::V2(required) = required else {
        panic!("expected V2 challenge");
    };
    let payload = toy_client().create_payment_payload_v2(&required).await.unwrap();
    let header = h402_http::headers::encode_payment_signature(&payload).unwrap();

    let response = app
        .oneshot(
            http::Request::builder()
                .uri("/paid")
                .header(PAYMENT_SIGNATURE, header)
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), http::StatusCode::OK);
    let settlement = response
        .headers()
        .get(PAYMENT_RESPONSE)
        .and_then(|v| v.to_str().ok())
        .expect("settlement header");
    assert!(decode_payment_response(settlement).unwrap().success);
    assert_eq!(fixture.verifies.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.settles.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn layer_returns_402_when_settlement_fails_after_handler() {
    let fixture = fixture(true).await;
    let route = RouteConfig::new(PaymentOption::new("toy", NETWORK, "$1", "Merchant"));
    let app = layer_app(fixture.gate.clone(), route.clone());

    let ctx = context("https://api.example.com/paid");
    let challenge = fixture.gate.challenge(&route, &ctx, None).await.unwrap();
    let PaymentRequiredEnum::V2(required) =
        decode_payment_required(&challenge.header_value).unwrap()
    else {
        panic!("expected V2 challenge");
    };
    let payload = toy_client().create_payment_payload_v2(&required).await.unwrap();
    let header = h402_http::headers::encode_payment_signature(&payload).unwrap();

    let response = app
        .oneshot(
            http::Request::builder()
                .uri("/paid")
                .header(PAYMENT_SIGNATURE, header)
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    // The handler ran, but without settlement proof the response is 402.
    assert_eq!(response.status(), http::StatusCode::PAYMENT_REQUIRED);
    assert_eq!(fixture.settles.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn client_middleware_retries_once_and_surfaces_second_402() {
    let server = MockServer::start().await;
    let required = PaymentRequired {
        x402_version: 2,
        accepts: vec![PaymentRequirements {
            scheme: "toy".into(),
            network: NETWORK.into(),
            amount: "1".into(),
            pay_to: "Merchant".into(),
            max_timeout_seconds: 300,
            asset: "TOY".into(),
            extra: None,
        }],
        error: None,
        resource: None,
        extensions: None,
    };
    let challenge_header = encode_payment_required(&required).unwrap();

    // The server rejects every attempt.
    Mock::given(method("GET"))
        .and(path("/paid"))
        .respond_with(
            ResponseTemplate::new(402).insert_header(PAYMENT_REQUIRED, challenge_header.as_str()),
        )
        .expect(2)
        .mount(&server)
        .await;

    let http = reqwest_middleware::ClientBuilder::new(reqwest::Client::new())
        .with(PaymentMiddleware::new(toy_client()))
        .build();

    let response = http
        .get(format!("{}/paid", server.uri()))
        .send()
        .await
        .unwrap();
    // Exactly one payment attempt happened (expect(2) covers the
    // original plus the single retry); the second 402 surfaced.
    assert_eq!(response.status(), reqwest::StatusCode::PAYMENT_REQUIRED);
}

#[tokio::test]
async fn client_middleware_attaches_payment_and_succeeds() {
    let server = MockServer::start().await;
    let required = PaymentRequired {
        x402_version: 2,
        accepts: vec![PaymentRequirements {
            scheme: "toy".into(),
            network: NETWORK.into(),
            amount: "1".into(),
            pay_to: "Merchant".into(),
            max_timeout_seconds: 300,
            asset: "TOY".into(),
            extra: None,
        }],
        error: None,
        resource: None,
        extensions: None,
    };
    let challenge_header = encode_payment_required(&required).unwrap();

    // Without a payment header: 402. With one: 200.
    Mock::given(method("GET"))
        .and(path("/paid"))
        .and(wiremock::matchers::header_exists(PAYMENT_SIGNATURE))
        .respond_with(ResponseTemplate::new(200).set_body_string("the goods"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/paid"))
        .respond_with(
            ResponseTemplate::new(402).insert_header(PAYMENT_REQUIRED, challenge_header.as_str()),
        )
        .mount(&server)
        .await;

    let http = reqwest_middleware::ClientBuilder::new(reqwest::Client::new())
        .with(PaymentMiddleware::new(toy_client()))
        .build();

    let response = http
        .get(format!("{}/paid", server.uri()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "the goods");
}

#[tokio::test]
async fn facilitator_http_client_speaks_the_wire_format() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "isValid": true,
            "payer": "0xPayer"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/settle"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "transaction": "0xabc",
            "network": NETWORK,
            "payer": "0xPayer"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/supported"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kinds": [{"x402Version": 2, "scheme": "toy", "network": NETWORK}],
            "extensions": ["bazaar"],
            "signers": {"x402:*": ["signer-1"]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpFacilitatorClient::try_new(&format!("{}/", server.uri())).unwrap();

    let requirements = PaymentRequirements {
        scheme: "toy".into(),
        network: NETWORK.into(),
        amount: "1".into(),
        pay_to: "Merchant".into(),
        max_timeout_seconds: 300,
        asset: "TOY".into(),
        extra: None,
    };
    let payload = PaymentPayload {
        x402_version: 2,
        accepted: requirements.clone(),
        payload: json!({"signature": "paid-by:tester"}),
        resource: None,
        extensions: None,
    };

    let verify = client.verify(&payload, &requirements).await.unwrap();
    assert!(verify.is_valid);
    assert_eq!(verify.payer.as_deref(), Some("0xPayer"));

    let settle = client.settle(&payload, &requirements).await.unwrap();
    assert!(settle.success);
    assert_eq!(settle.transaction, "0xabc");

    // Two calls, one upstream request: the supported response is cached.
    let supported = client.get_supported().await.unwrap();
    assert_eq!(supported.kinds.len(), 1);
    assert_eq!(supported.extensions, vec!["bazaar".to_owned()]);
    let again = client.get_supported().await.unwrap();
    assert_eq!(again, supported);
}
