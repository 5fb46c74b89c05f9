//! Idempotent applicant creation and webhook-driven status updates.
//!
//! A user gets at most one applicant at the KYC provider. Once a local record
//! exists the provider is never called again for that user; a provider-side
//! "already exists" answer is absorbed into a record with status
//! `already_exists`.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;

use super::domain::{ApplicantProfile, KycRecord, KycStatus, UserId};
use super::error::OnboardingError;
use crate::config::SumsubConfig;
use crate::integrations::{
    conflict_applicant_id, parse_webhook_event, verify_webhook_signature, ApplicantCreation,
    KycProvider, ProviderError,
};
use crate::store::{EntityStore, StoreError};

const LOCK_STRIPES: usize = 32;

/// How inbound webhook signatures are treated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookSettings {
    pub signing_secret: Option<String>,
    pub enforce_signature: bool,
}

impl WebhookSettings {
    pub fn from_config(config: &SumsubConfig) -> Self {
        Self {
            signing_secret: config.webhook_signing_secret().map(str::to_string),
            enforce_signature: config.enforce_webhook_signature,
        }
    }
}

/// Result of applying a webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WebhookOutcome {
    #[serde(rename = "ok")]
    Updated {
        applicant_id: String,
        kyc_status: KycStatus,
    },
    Ignored { reason: String },
}

pub struct KycService {
    store: Arc<dyn EntityStore>,
    provider: Arc<dyn KycProvider>,
    webhook: WebhookSettings,
    locks: Vec<Mutex<()>>,
}

impl KycService {
    pub fn new(
        store: Arc<dyn EntityStore>,
        provider: Arc<dyn KycProvider>,
        webhook: WebhookSettings,
    ) -> Self {
        Self {
            store,
            provider,
            webhook,
            locks: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    fn lock_for(&self, user_id: &UserId) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        user_id.hash(&mut hasher);
        let index = (hasher.finish() % self.locks.len() as u64) as usize;
        &self.locks[index]
    }

    /// Return the user's KYC record, creating the applicant at the provider
    /// only when no local record exists yet.
    pub async fn ensure_applicant(
        &self,
        user_id: &UserId,
        profile: &ApplicantProfile,
    ) -> Result<KycRecord, OnboardingError> {
        let _guard = self.lock_for(user_id).lock().await;

        if let Some(existing) = self.store.fetch_kyc(user_id).await? {
            tracing::debug!(
                user_id = %user_id,
                applicant_id = %existing.applicant_id,
                "reusing stored KYC record"
            );
            return Ok(existing);
        }

        let external_user_id = user_id.external_kyc_id();
        let (applicant_id, status) = match self
            .provider
            .create_applicant(&external_user_id, profile)
            .await?
        {
            ApplicantCreation::Created {
                applicant_id,
                raw_status,
            } => {
                tracing::info!(
                    user_id = %user_id,
                    applicant_id = %applicant_id,
                    provider_status = %raw_status,
                    "KYC applicant created"
                );
                (applicant_id, KycStatus::Pending)
            }
            ApplicantCreation::AlreadyExists(conflict) => {
                let applicant_id = conflict_applicant_id(&conflict.body).ok_or_else(|| {
                    ProviderError::malformed(
                        conflict.provider,
                        format!(
                            "conflict body carries no applicant id: {}",
                            conflict.body
                        ),
                    )
                })?;
                tracing::info!(
                    user_id = %user_id,
                    applicant_id = %applicant_id,
                    "KYC applicant already existed at provider"
                );
                (applicant_id, KycStatus::AlreadyExists)
            }
        };

        let record = KycRecord::new(user_id, applicant_id, status);
        match self.store.insert_kyc(record).await {
            Ok(saved) => Ok(saved),
            Err(conflict @ StoreError::Conflict { .. }) => {
                // Another process won the insert; its record is authoritative.
                match self.store.fetch_kyc(user_id).await? {
                    Some(saved) => Ok(saved),
                    None => Err(conflict.into()),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Read-only lookup. Fails when the user or its record is absent.
    pub async fn status(&self, user_id: &UserId) -> Result<KycRecord, OnboardingError> {
        if self.store.fetch_user(user_id).await?.is_none() {
            return Err(OnboardingError::not_found(format!(
                "user '{user_id}' not found"
            )));
        }
        self.store.fetch_kyc(user_id).await?.ok_or_else(|| {
            OnboardingError::not_found(format!("no KYC record for user '{user_id}'"))
        })
    }

    /// Apply a provider webhook. Unknown applicants are ignored rather than
    /// rejected so the provider does not keep redelivering.
    pub async fn apply_webhook(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, OnboardingError> {
        self.check_signature(raw_body, signature)?;

        let event = parse_webhook_event(raw_body)
            .map_err(|err| OnboardingError::validation(format!("invalid webhook body: {err}")))?;

        let mut target = None;
        if let Some(applicant_id) = event.applicant_id.as_deref() {
            target = self.store.fetch_kyc_by_applicant(applicant_id).await?;
        }
        if target.is_none() {
            if let Some(external_user_id) = event.external_user_id.as_deref() {
                target = self
                    .store
                    .fetch_kyc_by_external_user(external_user_id)
                    .await?;
            }
        }

        let Some(mut record) = target else {
            let reason = if event.applicant_id.is_none() && event.external_user_id.is_none() {
                "no applicantId or externalUserId"
            } else {
                "KYC record not found"
            };
            tracing::info!(
                event_type = event.event_type.as_deref().unwrap_or("unknown"),
                reason,
                "webhook ignored"
            );
            return Ok(WebhookOutcome::Ignored {
                reason: reason.to_string(),
            });
        };

        record.status = event.new_status;
        if event.review_result.is_some() {
            record.review_result = event.review_result;
        }
        record.updated_at = Utc::now();
        self.store.update_kyc(record.clone()).await?;

        tracing::info!(
            user_id = %record.user_id,
            applicant_id = %record.applicant_id,
            kyc_status = %record.status,
            "KYC status updated from webhook"
        );
        Ok(WebhookOutcome::Updated {
            applicant_id: record.applicant_id,
            kyc_status: record.status,
        })
    }

    fn check_signature(&self, raw_body: &[u8], signature: Option<&str>) -> Result<(), OnboardingError> {
        let valid = self
            .webhook
            .signing_secret
            .as_deref()
            .is_some_and(|secret| verify_webhook_signature(secret, raw_body, signature));
        if valid {
            return Ok(());
        }
        if self.webhook.enforce_signature {
            return Err(OnboardingError::Unauthorized(
                "webhook signature is missing or invalid".to_string(),
            ));
        }
        tracing::warn!(
            signature_present = signature.is_some(),
            "webhook signature not verified; processing anyway"
        );
        Ok(())
    }
}
