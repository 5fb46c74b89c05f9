use std::time::Duration;

use orryin::config::{SumsubConfig, WiseConfig};
use orryin::integrations::sumsub::sign_request;
use orryin::integrations::{
    build_client, ApplicantCreation, FxProvider, KycProvider, ProviderError, SumsubClient,
    WiseClient,
};
use orryin::workflows::onboarding::domain::{ApplicantProfile, TransferOutcome};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn http_client() -> reqwest::Client {
    build_client(Duration::from_secs(5)).expect("reqwest client")
}

fn sumsub(server: &MockServer) -> SumsubClient {
    SumsubClient::new(
        http_client(),
        &SumsubConfig {
            app_token: Some("app-token".to_string()),
            secret_key: Some("secret".to_string()),
            base_url: server.uri(),
            level_name: "basic-kyc-id-doc".to_string(),
            webhook_secret: None,
            enforce_webhook_signature: false,
        },
    )
}

fn wise(server: &MockServer, profile_id: Option<&str>) -> WiseClient {
    WiseClient::new(
        http_client(),
        &WiseConfig {
            api_key: Some("wise-key".to_string()),
            base_url: server.uri(),
            profile_id: profile_id.map(str::to_string),
        },
    )
}

fn profile() -> ApplicantProfile {
    ApplicantProfile {
        email: "ana@example.com".to_string(),
        first_name: "Ana".to_string(),
        last_name: "Souza".to_string(),
        country: "BRA".to_string(),
    }
}

#[tokio::test]
async fn sumsub_create_applicant_sends_signed_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/resources/applicants"))
        .and(query_param("levelName", "basic-kyc-id-doc"))
        .and(header("X-App-Token", "app-token"))
        .and(header_exists("X-App-Access-Ts"))
        .and(header_exists("X-App-Access-Sig"))
        .and(body_json(json!({
            "externalUserId": "user-42",
            "email": "ana@example.com",
            "info": {"firstName": "Ana", "lastName": "Souza", "country": "BRA"}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "65f0c0ffee",
            "review": {"reviewStatus": "init"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let created = sumsub(&server)
        .create_applicant("user-42", &profile())
        .await
        .expect("created");
    assert_eq!(
        created,
        ApplicantCreation::Created {
            applicant_id: "65f0c0ffee".to_string(),
            raw_status: "init".to_string(),
        }
    );

    let requests = server.received_requests().await.expect("recording enabled");
    let request = &requests[0];
    let ts: i64 = request
        .headers
        .get("X-App-Access-Ts")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .expect("timestamp header");
    let signature = request
        .headers
        .get("X-App-Access-Sig")
        .and_then(|value| value.to_str().ok())
        .expect("signature header");
    let expected = sign_request(
        "secret",
        ts,
        "POST",
        "/resources/applicants?levelName=basic-kyc-id-doc",
        &request.body,
    )
    .expect("signature");
    assert_eq!(signature, expected);
}

#[tokio::test]
async fn sumsub_conflict_is_returned_as_already_exists() {
    let server = MockServer::start().await;
    let body = json!({
        "code": 409,
        "description": "Applicant with external user id 'user-42' already exists: 695b2a5fd78655e152921a6c"
    });
    Mock::given(method("POST"))
        .and(path("/resources/applicants"))
        .respond_with(ResponseTemplate::new(409).set_body_json(body))
        .mount(&server)
        .await;

    let outcome = sumsub(&server)
        .create_applicant("user-42", &profile())
        .await
        .expect("conflict is not an error");
    match outcome {
        ApplicantCreation::AlreadyExists(conflict) => {
            assert!(conflict.body.contains("695b2a5fd78655e152921a6c"));
        }
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn sumsub_server_error_is_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/resources/applicants"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&server)
        .await;

    let err = sumsub(&server)
        .create_applicant("user-42", &profile())
        .await
        .expect_err("server error");
    assert_eq!(err.http_status(), Some(500));
    assert_eq!(err.reason_code(), "http_status");
}

#[tokio::test]
async fn sumsub_without_credentials_is_not_configured() {
    let server = MockServer::start().await;
    let client = SumsubClient::new(
        http_client(),
        &SumsubConfig {
            app_token: None,
            secret_key: None,
            base_url: server.uri(),
            level_name: "basic-kyc-id-doc".to_string(),
            webhook_secret: None,
            enforce_webhook_signature: false,
        },
    );

    let err = client
        .create_applicant("user-42", &profile())
        .await
        .expect_err("missing token");
    assert!(matches!(err, ProviderError::NotConfigured { .. }));
    assert!(server
        .received_requests()
        .await
        .expect("recording enabled")
        .is_empty());
}

#[tokio::test]
async fn wise_rate_accepts_list_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/rates"))
        .and(query_param("source", "BRL"))
        .and(query_param("target", "USD"))
        .and(header("Authorization", "Bearer wise-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"rate": 0.1934, "source": "BRL", "target": "USD", "time": "2024-05-01T10:15:00+0000"}
        ])))
        .mount(&server)
        .await;

    let rate = wise(&server, None)
        .get_rate("brl", "usd")
        .await
        .expect("rate");
    assert_eq!(rate.rate, dec!(0.1934));
    assert_eq!(rate.timestamp.to_rfc3339(), "2024-05-01T10:15:00+00:00");
}

#[tokio::test]
async fn wise_rate_accepts_object_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/rates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rate": "5.17"})))
        .mount(&server)
        .await;

    let rate = wise(&server, None)
        .get_rate("USD", "BRL")
        .await
        .expect("rate");
    assert_eq!(rate.rate, dec!(5.17));
}

#[tokio::test]
async fn wise_rate_rejects_empty_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/rates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let err = wise(&server, None)
        .get_rate("BRL", "USD")
        .await
        .expect_err("no entries");
    assert_eq!(err.reason_code(), "malformed_response");
}

#[tokio::test]
async fn wise_quote_uses_profile_path_and_reports_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/profiles/p-77/quotes"))
        .and(body_json(json!({
            "sourceCurrency": "BRL",
            "targetCurrency": "USD",
            "sourceAmount": 100.0
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "quote-abc",
            "rate": 0.1931,
            "paymentOptions": [
                {"disabled": false, "targetAmount": 19.05},
                {"disabled": true, "targetAmount": 18.9}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let simulated = wise(&server, Some("p-77"))
        .simulate_transfer(dec!(100), "BRL", "USD")
        .await
        .expect("quote");
    assert_eq!(simulated.outcome, TransferOutcome::Success);
    assert_eq!(simulated.estimated_target_amount, dec!(19.05));
    assert_eq!(simulated.quote_id.as_deref(), Some("quote-abc"));
}

#[tokio::test]
async fn wise_quote_with_all_options_disabled_is_simulated_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/quotes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rate": 0.2,
            "paymentOptions": [
                {"disabled": true, "disabledReason": {"code": "error.payInMethod.disabled", "message": "Not available for BRL"}}
            ]
        })))
        .mount(&server)
        .await;

    let simulated = wise(&server, None)
        .simulate_transfer(dec!(100), "BRL", "USD")
        .await
        .expect("quote");
    assert_eq!(simulated.outcome, TransferOutcome::SimulatedFailure);
    assert_eq!(
        simulated.failure_reason.as_deref(),
        Some("Not available for BRL")
    );
    assert_eq!(simulated.estimated_target_amount, dec!(20));
}

#[tokio::test]
async fn wise_error_status_is_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/rates"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;

    let err = wise(&server, None)
        .get_rate("BRL", "USD")
        .await
        .expect_err("unauthorized");
    assert_eq!(err.http_status(), Some(401));
}

#[tokio::test]
async fn wise_quote_prefers_reported_target_amount_for_huge_sources() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/quotes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rate": 5.0,
            "targetAmount": 1000.5
        })))
        .mount(&server)
        .await;

    let simulated = wise(&server, None)
        .simulate_transfer(Decimal::MAX, "USD", "BRL")
        .await
        .expect("quote");
    assert_eq!(simulated.estimated_target_amount, dec!(1000.5));
}

#[tokio::test]
async fn wise_quote_overflowing_estimate_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/quotes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rate": 5.0})))
        .mount(&server)
        .await;

    let err = wise(&server, None)
        .simulate_transfer(Decimal::MAX, "USD", "BRL")
        .await
        .expect_err("estimate overflows");
    assert_eq!(err.reason_code(), "malformed_response");
}
