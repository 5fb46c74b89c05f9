//! Sumsub KYC adapter: signed applicant creation and webhook decoding.

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::http::{self, join_url};
use super::{ApplicantCreation, KycProvider, Provider, ProviderConflict, ProviderError};
use crate::config::SumsubConfig;
use crate::workflows::onboarding::domain::{ApplicantProfile, KycStatus};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Signature";

#[derive(Clone)]
pub struct SumsubClient {
    client: Client,
    app_token: Option<String>,
    secret_key: Option<String>,
    base_url: String,
    level_name: String,
}

impl std::fmt::Debug for SumsubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SumsubClient")
            .field("base_url", &self.base_url)
            .field("level_name", &self.level_name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplicantPayload<'a> {
    external_user_id: &'a str,
    email: &'a str,
    info: ApplicantInfo<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplicantInfo<'a> {
    first_name: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    last_name: &'a str,
    country: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplicantResponse {
    id: Option<String>,
    review: Option<ReviewState>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewState {
    review_status: Option<String>,
}

impl SumsubClient {
    pub fn new(client: Client, config: &SumsubConfig) -> Self {
        Self {
            client,
            app_token: config.app_token.clone(),
            secret_key: config.secret_key.clone(),
            base_url: config.base_url.clone(),
            level_name: config.level_name.clone(),
        }
    }

    fn credentials(&self) -> Result<(&str, &str), ProviderError> {
        let token = self
            .app_token
            .as_deref()
            .ok_or(ProviderError::NotConfigured {
                provider: Provider::Sumsub,
                setting: "SUMSUB_APP_TOKEN",
            })?;
        let secret = self
            .secret_key
            .as_deref()
            .ok_or(ProviderError::NotConfigured {
                provider: Provider::Sumsub,
                setting: "SUMSUB_SECRET_KEY",
            })?;
        Ok((token, secret))
    }
}

/// Hex HMAC-SHA256 over `ts + METHOD + path_with_query + body`, as Sumsub expects
/// in `X-App-Access-Sig`.
pub fn sign_request(
    secret: &str,
    ts: i64,
    method: &str,
    path: &str,
    body: &[u8],
) -> Result<String, ProviderError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|err| {
        ProviderError::malformed(Provider::Sumsub, format!("unusable signing key: {err}"))
    })?;
    mac.update(ts.to_string().as_bytes());
    mac.update(method.to_ascii_uppercase().as_bytes());
    mac.update(path.as_bytes());
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[async_trait]
impl KycProvider for SumsubClient {
    async fn create_applicant(
        &self,
        external_user_id: &str,
        profile: &ApplicantProfile,
    ) -> Result<ApplicantCreation, ProviderError> {
        let (token, secret) = self.credentials()?;
        let path = format!("/resources/applicants?levelName={}", self.level_name);

        let payload = ApplicantPayload {
            external_user_id,
            email: &profile.email,
            info: ApplicantInfo {
                first_name: &profile.first_name,
                last_name: &profile.last_name,
                country: &profile.country,
            },
        };
        // The signature covers these exact bytes, so they are sent verbatim.
        let body = serde_json::to_vec(&payload).map_err(|err| {
            ProviderError::malformed(Provider::Sumsub, format!("unable to encode payload: {err}"))
        })?;

        let ts = Utc::now().timestamp();
        let signature = sign_request(secret, ts, "POST", &path, &body)?;

        let request = self
            .client
            .post(join_url(&self.base_url, &path))
            .header("X-App-Token", token)
            .header("X-App-Access-Ts", ts.to_string())
            .header("X-App-Access-Sig", signature)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(body);

        let raw = http::send(Provider::Sumsub, request).await?;
        if raw.status == StatusCode::CONFLICT {
            return Ok(ApplicantCreation::AlreadyExists(ProviderConflict {
                provider: Provider::Sumsub,
                body: raw.body,
            }));
        }
        if !raw.is_success() {
            return Err(raw.into_error(Provider::Sumsub));
        }

        let created: ApplicantResponse = raw.json(Provider::Sumsub)?;
        let applicant_id = created
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ProviderError::malformed(Provider::Sumsub, "missing applicant id"))?;
        let raw_status = created
            .review
            .and_then(|review| review.review_status)
            .unwrap_or_else(|| "init".to_string());

        Ok(ApplicantCreation::Created {
            applicant_id,
            raw_status,
        })
    }
}

/// Pull the applicant id out of a 409 body such as
/// `{"description": "Applicant with external user id 'user-49' already exists: 695b2a5f"}`.
/// Non-JSON bodies are scanned as plain text.
pub fn conflict_applicant_id(body: &str) -> Option<String> {
    let description = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => map
            .get("description")
            .and_then(|value| value.as_str())
            .unwrap_or_default()
            .to_string(),
        _ => body.to_string(),
    };
    let description = description.trim();
    if description.is_empty() {
        return None;
    }

    if let Some(index) = description.rfind("already exists:") {
        let tail = description[index + "already exists:".len()..].trim();
        if !tail.is_empty() && tail.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Some(tail.to_string());
        }
    }

    description
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .last()
        .map(str::to_string)
}

/// Decoded status-change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub event_type: Option<String>,
    pub applicant_id: Option<String>,
    pub external_user_id: Option<String>,
    pub new_status: KycStatus,
    pub review_result: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWebhook {
    #[serde(rename = "type")]
    event_type: Option<String>,
    applicant_id: Option<String>,
    external_user_id: Option<String>,
    review_result: Option<RawReview>,
    data: Option<RawWebhookData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWebhookData {
    applicant_id: Option<String>,
    external_user_id: Option<String>,
    review_result: Option<RawReview>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReview {
    review_status: Option<String>,
    review_answer: Option<String>,
}

/// Decode a webhook body. Identifiers are read from the top level first and
/// then from a nested `data` object.
pub fn parse_webhook_event(payload: &[u8]) -> Result<WebhookEvent, serde_json::Error> {
    let raw: RawWebhook = serde_json::from_slice(payload)?;
    let data = raw.data.unwrap_or_default();

    let applicant_id = raw
        .applicant_id
        .or(data.applicant_id)
        .filter(|id| !id.is_empty());
    let external_user_id = raw
        .external_user_id
        .or(data.external_user_id)
        .filter(|id| !id.is_empty());

    let (new_status, review_result) = match raw.event_type.as_deref() {
        Some("applicantReviewed") => {
            let review = raw.review_result.or(data.review_result).unwrap_or_default();
            let status = match review.review_answer.as_deref() {
                Some("GREEN") => KycStatus::Approved,
                Some("RED") => KycStatus::Rejected,
                _ => KycStatus::Pending,
            };
            let summary = format!(
                "{}:{}",
                review.review_status.as_deref().unwrap_or("unknown"),
                review.review_answer.as_deref().unwrap_or("unknown")
            );
            (status, Some(summary))
        }
        _ => (KycStatus::Pending, None),
    };

    Ok(WebhookEvent {
        event_type: raw.event_type,
        applicant_id,
        external_user_id,
        new_status,
        review_result,
    })
}

/// Constant-time check of the hex HMAC-SHA256 of the raw body; a `sha256=`
/// prefix on the header value is accepted.
pub fn verify_webhook_signature(secret: &str, raw_body: &[u8], header: Option<&str>) -> bool {
    let Some(header) = header else {
        return false;
    };
    if secret.is_empty() {
        return false;
    }
    let provided = header.trim();
    let provided = provided.strip_prefix("sha256=").unwrap_or(provided);
    let Ok(expected) = hex::decode(provided) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(raw_body);
    mac.verify_slice(&expected).is_ok()
}
