use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::brokerage::BrokerageOnboardRequest;
use super::domain::{ApplicantProfile, KycRecord, KycStatus, UserId};
use super::error::OnboardingError;
use super::flow::FlowProfileInput;
use super::payments::SandboxTransferRequest;
use super::service::OnboardingServices;
use crate::integrations::sumsub::SIGNATURE_HEADER;

/// Router exposing the flow and the standalone onboarding endpoints.
pub fn onboarding_router(services: Arc<OnboardingServices>) -> Router {
    Router::new()
        .route("/mvp/test-flow", post(test_flow_handler))
        .route("/kyc/applicant", post(kyc_applicant_handler))
        .route("/kyc/status", get(kyc_status_handler))
        .route("/kyc/webhook/sumsub", post(sumsub_webhook_handler))
        .route("/payments/fx-rate", get(fx_rate_handler))
        .route("/payments/transfer/sandbox", post(sandbox_transfer_handler))
        .route("/brokerage/onboard", post(brokerage_onboard_handler))
        .route("/brokerage/accounts/:user_id", get(brokerage_accounts_handler))
        .route("/users/dev-create", post(create_user_handler))
        .route("/users", get(list_users_handler))
        .with_state(services)
}

#[derive(Debug, Deserialize)]
pub(crate) struct KycApplicantRequest {
    user_id: UserId,
    #[serde(default)]
    email: Option<String>,
    first_name: String,
    last_name: String,
    country: String,
}

#[derive(Debug, Serialize)]
struct KycRecordView {
    user_id: UserId,
    applicant_id: String,
    status: KycStatus,
    review_result: Option<String>,
}

impl From<KycRecord> for KycRecordView {
    fn from(record: KycRecord) -> Self {
        Self {
            user_id: record.user_id,
            applicant_id: record.applicant_id,
            status: record.status,
            review_result: record.review_result,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserQuery {
    user_id: UserId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FxRateQuery {
    source: String,
    target: String,
    #[serde(default)]
    amount: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateUserRequest {
    email: String,
}

/// An empty body runs the flow with generated defaults.
fn parse_flow_input(body: &[u8]) -> Result<FlowProfileInput, OnboardingError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(FlowProfileInput::default());
    }
    serde_json::from_slice(body)
        .map_err(|err| OnboardingError::validation(format!("invalid flow request body: {err}")))
}

pub(crate) async fn test_flow_handler(
    State(services): State<Arc<OnboardingServices>>,
    body: Bytes,
) -> Response {
    let input = match parse_flow_input(&body) {
        Ok(input) => input,
        Err(err) => return err.into_response(),
    };
    match services.flow.run_full_flow(input).await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn kyc_applicant_handler(
    State(services): State<Arc<OnboardingServices>>,
    Json(request): Json<KycApplicantRequest>,
) -> Response {
    let user = match services.users.require(&request.user_id).await {
        Ok(user) => user,
        Err(err) => return err.into_response(),
    };

    let profile = ApplicantProfile {
        email: request.email.unwrap_or(user.email),
        first_name: request.first_name,
        last_name: request.last_name,
        country: request.country.trim().to_ascii_uppercase(),
    };

    match services.kyc.ensure_applicant(&user.id, &profile).await {
        Ok(record) => (StatusCode::OK, Json(KycRecordView::from(record))).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn kyc_status_handler(
    State(services): State<Arc<OnboardingServices>>,
    Query(query): Query<UserQuery>,
) -> Response {
    match services.kyc.status(&query.user_id).await {
        Ok(record) => (StatusCode::OK, Json(KycRecordView::from(record))).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn sumsub_webhook_handler(
    State(services): State<Arc<OnboardingServices>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    match services.kyc.apply_webhook(&body, signature).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn fx_rate_handler(
    State(services): State<Arc<OnboardingServices>>,
    Query(query): Query<FxRateQuery>,
) -> Response {
    match services
        .payments
        .fx_rate(&query.source, &query.target, query.amount)
        .await
    {
        Ok(lookup) => (StatusCode::OK, Json(lookup)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn sandbox_transfer_handler(
    State(services): State<Arc<OnboardingServices>>,
    Json(request): Json<SandboxTransferRequest>,
) -> Response {
    match services.payments.sandbox_transfer(request).await {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn brokerage_onboard_handler(
    State(services): State<Arc<OnboardingServices>>,
    Json(request): Json<BrokerageOnboardRequest>,
) -> Response {
    match services
        .brokerage
        .onboard(&request.user_id, request.base_currency.as_deref())
        .await
    {
        Ok(account) => (StatusCode::CREATED, Json(account)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn brokerage_accounts_handler(
    State(services): State<Arc<OnboardingServices>>,
    Path(user_id): Path<String>,
) -> Response {
    match services.brokerage.accounts(&UserId(user_id)).await {
        Ok(accounts) => (StatusCode::OK, Json(accounts)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn create_user_handler(
    State(services): State<Arc<OnboardingServices>>,
    Json(request): Json<CreateUserRequest>,
) -> Response {
    match services.users.create_with_cash_account(&request.email).await {
        Ok(onboarded) => (StatusCode::CREATED, Json(onboarded)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn list_users_handler(State(services): State<Arc<OnboardingServices>>) -> Response {
    match services.users.list().await {
        Ok(users) => (StatusCode::OK, Json(users)).into_response(),
        Err(err) => err.into_response(),
    }
}
