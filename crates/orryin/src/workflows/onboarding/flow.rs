//! End-to-end onboarding run used to validate the provider integrations.
//!
//! The user and cash account must be created for the run to mean anything, so
//! failures there abort. Each later stage (KYC, FX, brokerage) is attempted in
//! order regardless of how the previous one went; a provider, validation or
//! not-found failure is recorded in that stage's slot of the snapshot. Store
//! failures always abort.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::brokerage::{BrokerageService, DEFAULT_BASE_CURRENCY};
use super::domain::{
    ApplicantProfile, BrokerageAccount, CashAccount, FxQuote, KycRecord, KycStatus, User, UserId,
};
use super::error::{ErrorDescriptor, OnboardingError};
use super::kyc::KycService;
use super::payments::PaymentsService;
use super::users::UserService;

pub const FLOW_SOURCE_CURRENCY: &str = "BRL";
pub const FLOW_TARGET_CURRENCY: &str = "USD";
pub const FLOW_SOURCE_AMOUNT: u32 = 100;
pub const DEFAULT_COUNTRY: &str = "BRA";
pub const DEFAULT_NAME: &str = "Test User";

/// Optional caller-supplied identity for a flow run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FlowProfileInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl FlowProfileInput {
    fn email_or_generated(&self) -> String {
        match self.email.as_deref().map(str::trim) {
            Some(email) if !email.is_empty() => email.to_string(),
            _ => {
                let suffix = Uuid::new_v4().simple().to_string();
                format!("mvp+{}@example.com", &suffix[..8])
            }
        }
    }

    fn applicant_profile(&self, email: &str) -> ApplicantProfile {
        let name = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_NAME);
        let (first_name, last_name) = match name.split_once(' ') {
            Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
            None => (name.to_string(), String::new()),
        };
        let country = self
            .country
            .as_deref()
            .map(str::trim)
            .filter(|country| !country.is_empty())
            .unwrap_or(DEFAULT_COUNTRY)
            .to_ascii_uppercase();

        ApplicantProfile {
            email: email.to_string(),
            first_name,
            last_name,
            country,
        }
    }
}

/// Outcome of one isolated stage: its result, or an error descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Stage<T> {
    Completed(T),
    Failed(StageFailure),
}

impl<T> Stage<T> {
    pub fn completed(&self) -> Option<&T> {
        match self {
            Stage::Completed(value) => Some(value),
            Stage::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ErrorDescriptor> {
        match self {
            Stage::Completed(_) => None,
            Stage::Failed(failure) => Some(&failure.error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageFailure {
    pub status: &'static str,
    pub error: ErrorDescriptor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: UserId,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CashAccountView {
    pub id: String,
    pub user_id: UserId,
    pub currency: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
}

impl From<CashAccount> for CashAccountView {
    fn from(account: CashAccount) -> Self {
        Self {
            id: account.id,
            user_id: account.user_id,
            currency: account.currency,
            balance: account.balance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KycView {
    pub applicant_id: String,
    pub status: KycStatus,
    pub review_result: Option<String>,
}

impl From<KycRecord> for KycView {
    fn from(record: KycRecord) -> Self {
        Self {
            applicant_id: record.applicant_id,
            status: record.status,
            review_result: record.review_result,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerageView {
    pub account_id: String,
    pub customer_id: String,
    pub broker: String,
    pub base_currency: String,
    pub status: String,
}

impl From<BrokerageAccount> for BrokerageView {
    fn from(account: BrokerageAccount) -> Self {
        Self {
            account_id: account.external_account_id,
            customer_id: account.external_customer_id,
            broker: account.broker,
            base_currency: account.base_currency,
            status: account.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowSnapshot {
    pub user: UserView,
    pub cash_account: CashAccountView,
    pub kyc: Stage<KycView>,
    pub fx: Stage<FxQuote>,
    pub brokerage: Stage<BrokerageView>,
}

fn isolate<T>(stage: &'static str, result: Result<T, OnboardingError>) -> Result<Stage<T>, OnboardingError> {
    match result {
        Ok(value) => Ok(Stage::Completed(value)),
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            tracing::warn!(stage, error = %err, "flow stage failed");
            Ok(Stage::Failed(StageFailure {
                status: "error",
                error: err.descriptor(),
            }))
        }
    }
}

pub struct FlowOrchestrator {
    users: Arc<UserService>,
    kyc: Arc<KycService>,
    payments: Arc<PaymentsService>,
    brokerage: Arc<BrokerageService>,
}

impl FlowOrchestrator {
    pub fn new(
        users: Arc<UserService>,
        kyc: Arc<KycService>,
        payments: Arc<PaymentsService>,
        brokerage: Arc<BrokerageService>,
    ) -> Self {
        Self {
            users,
            kyc,
            payments,
            brokerage,
        }
    }

    /// Run every onboarding stage once for a brand-new user.
    pub async fn run_full_flow(
        &self,
        input: FlowProfileInput,
    ) -> Result<FlowSnapshot, OnboardingError> {
        let email = input.email_or_generated();
        let onboarded = self.users.create_with_cash_account(&email).await?;
        let user_id = onboarded.user.id.clone();
        let cash_account_id = onboarded.cash_account.id.clone();
        tracing::info!(user_id = %user_id, "flow started");

        let profile = input.applicant_profile(&onboarded.user.email);
        let kyc = isolate(
            "kyc",
            self.kyc
                .ensure_applicant(&user_id, &profile)
                .await
                .map(KycView::from),
        )?;

        let fx_result = async {
            let quote = self
                .payments
                .quote(
                    Decimal::from(FLOW_SOURCE_AMOUNT),
                    FLOW_SOURCE_CURRENCY,
                    FLOW_TARGET_CURRENCY,
                )
                .await?;
            self.payments
                .record_sandbox_transfer(&user_id, &cash_account_id, &quote)
                .await?;
            Ok::<_, OnboardingError>(quote)
        }
        .await;
        let fx = isolate("fx", fx_result)?;

        let brokerage = isolate(
            "brokerage",
            self.brokerage
                .onboard(&user_id, Some(DEFAULT_BASE_CURRENCY))
                .await
                .map(BrokerageView::from),
        )?;

        tracing::info!(
            user_id = %user_id,
            kyc_ok = kyc.completed().is_some(),
            fx_ok = fx.completed().is_some(),
            brokerage_ok = brokerage.completed().is_some(),
            "flow finished"
        );

        Ok(FlowSnapshot {
            user: onboarded.user.into(),
            cash_account: onboarded.cash_account.into(),
            kyc,
            fx,
            brokerage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_name_and_defaults_country() {
        let input = FlowProfileInput {
            name: Some("Ana Maria Souza".to_string()),
            ..FlowProfileInput::default()
        };
        let profile = input.applicant_profile("ana@example.com");
        assert_eq!(profile.first_name, "Ana");
        assert_eq!(profile.last_name, "Maria Souza");
        assert_eq!(profile.country, "BRA");
    }

    #[test]
    fn single_word_name_has_empty_last_name() {
        let input = FlowProfileInput {
            name: Some("Ana".to_string()),
            country: Some("prt".to_string()),
            ..FlowProfileInput::default()
        };
        let profile = input.applicant_profile("ana@example.com");
        assert_eq!(profile.first_name, "Ana");
        assert_eq!(profile.last_name, "");
        assert_eq!(profile.country, "PRT");
    }

    #[test]
    fn generated_email_uses_short_hex_suffix() {
        let email = FlowProfileInput::default().email_or_generated();
        let local = email
            .strip_prefix("mvp+")
            .and_then(|rest| rest.strip_suffix("@example.com"))
            .expect("generated shape");
        assert_eq!(local.len(), 8);
        assert!(local.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn failed_stage_serializes_as_error_object() {
        let stage: Stage<KycView> = isolate(
            "kyc",
            Err(OnboardingError::not_found("user 'u-1' not found")),
        )
        .expect("not fatal");
        let value = serde_json::to_value(&stage).expect("serialize");
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"]["reason"], "not_found");
    }
}
