use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use orryin::config::{SumsubConfig, WiseConfig};
use orryin::integrations::{build_client, DriveWealthClient, SumsubClient, WiseClient};
use orryin::store::InMemoryEntityStore;
use orryin::workflows::onboarding::{onboarding_router, OnboardingServices, WebhookSettings};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn providers() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/resources/applicants"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "65f0c0ffee",
            "review": {"reviewStatus": "init"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/rates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"rate": 0.1934, "source": "BRL", "target": "USD", "time": "2024-05-01T10:15:00+0000"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v3/quotes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "quote-1",
            "rate": 0.1934,
            "paymentOptions": [{"disabled": false, "targetAmount": 19.34}]
        })))
        .mount(&server)
        .await;
    server
}

fn app(server: &MockServer) -> Router {
    let client = build_client(Duration::from_secs(5)).expect("reqwest client");
    let sumsub = SumsubClient::new(
        client.clone(),
        &SumsubConfig {
            app_token: Some("token".to_string()),
            secret_key: Some("secret".to_string()),
            base_url: server.uri(),
            level_name: "basic-kyc-id-doc".to_string(),
            webhook_secret: None,
            enforce_webhook_signature: false,
        },
    );
    let wise = WiseClient::new(
        client,
        &WiseConfig {
            api_key: Some("wise-key".to_string()),
            base_url: server.uri(),
            profile_id: None,
        },
    );

    let services = OnboardingServices::new(
        Arc::new(InMemoryEntityStore::new()),
        Arc::new(sumsub),
        Arc::new(wise),
        Arc::new(DriveWealthClient::mock()),
        WebhookSettings::default(),
    );
    onboarding_router(Arc::new(services))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

#[tokio::test]
async fn full_flow_snapshot_through_real_clients() {
    let server = providers().await;
    let response = app(&server)
        .oneshot(post_json("/mvp/test-flow", json!({"name": "Test User"})))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert!(!body["user"]["id"].as_str().expect("user id").is_empty());
    assert_eq!(body["cashAccount"]["balance"].as_f64(), Some(0.0));
    let kyc_status = body["kyc"]["status"].as_str().expect("kyc status");
    assert!(kyc_status == "pending" || kyc_status == "already_exists");
    assert!(body["fx"]["rate"].as_f64().expect("rate") > 0.0);
    assert_eq!(body["fx"]["outcome"], "success");
    assert!(!body["brokerage"]["accountId"]
        .as_str()
        .expect("account id")
        .is_empty());
}

#[tokio::test]
async fn brokerage_account_appears_in_listing() {
    let server = providers().await;
    let router = app(&server);

    let created = router
        .clone()
        .oneshot(post_json("/users/dev-create", json!({"email": "ana@example.com"})))
        .await
        .expect("response");
    assert_eq!(created.status(), StatusCode::CREATED);
    let user_id = read_json(created).await["user"]["id"]
        .as_str()
        .expect("user id")
        .to_string();

    let mut opened = Vec::new();
    for _ in 0..2 {
        let response = router
            .clone()
            .oneshot(post_json(
                "/brokerage/onboard",
                json!({"user_id": user_id, "base_currency": "usd"}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = read_json(response).await;
        opened.push(body["external_account_id"].as_str().expect("id").to_string());
    }

    let listed = router
        .oneshot(
            Request::builder()
                .uri(format!("/brokerage/accounts/{user_id}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(listed.status(), StatusCode::OK);
    let accounts = read_json(listed).await;
    let listed_ids: Vec<String> = accounts
        .as_array()
        .expect("array")
        .iter()
        .map(|account| account["external_account_id"].as_str().expect("id").to_string())
        .collect();
    assert_eq!(listed_ids, opened);
}

#[tokio::test]
async fn kyc_applicant_twice_hits_provider_once() {
    let server = providers().await;
    let router = app(&server);

    let created = router
        .clone()
        .oneshot(post_json("/users/dev-create", json!({"email": "once@example.com"})))
        .await
        .expect("response");
    let user_id = read_json(created).await["user"]["id"]
        .as_str()
        .expect("user id")
        .to_string();

    let request = json!({
        "user_id": user_id,
        "first_name": "Ana",
        "last_name": "Souza",
        "country": "BRA"
    });
    for _ in 0..2 {
        let response = router
            .clone()
            .oneshot(post_json("/kyc/applicant", request.clone()))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await["applicant_id"], "65f0c0ffee");
    }

    let applicant_calls = server
        .received_requests()
        .await
        .expect("recording enabled")
        .iter()
        .filter(|request| request.url.path() == "/resources/applicants")
        .count();
    assert_eq!(applicant_calls, 1);
}
