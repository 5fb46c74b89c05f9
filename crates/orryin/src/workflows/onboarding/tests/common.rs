use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::to_bytes;
use axum::response::Response;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use crate::integrations::{
    ApplicantCreation, DriveWealthClient, FxProvider, FxRate, KycProvider, Provider,
    ProviderConflict, ProviderError, SimulatedTransfer,
};
use crate::store::{EntityStore, InMemoryEntityStore, StoreError};
use crate::workflows::onboarding::domain::{
    ApplicantProfile, BrokerageAccount, CashAccount, KycRecord, Transaction, TransferOutcome,
    User, UserId,
};
use crate::workflows::onboarding::{OnboardingServices, WebhookSettings};

pub(super) const WEBHOOK_SECRET: &str = "whsec-test";

/// KYC fake that counts calls and replays a configured answer.
pub(super) struct RecordingKycProvider {
    calls: AtomicUsize,
    answer: Mutex<Result<ApplicantCreation, ProviderError>>,
}

impl RecordingKycProvider {
    pub(super) fn created(applicant_id: &str) -> Self {
        Self::answering(Ok(ApplicantCreation::Created {
            applicant_id: applicant_id.to_string(),
            raw_status: "init".to_string(),
        }))
    }

    pub(super) fn conflict(body: &str) -> Self {
        Self::answering(Ok(ApplicantCreation::AlreadyExists(ProviderConflict {
            provider: Provider::Sumsub,
            body: body.to_string(),
        })))
    }

    pub(super) fn failing(status: u16) -> Self {
        Self::answering(Err(ProviderError::Http {
            provider: Provider::Sumsub,
            status,
            body: "sumsub unavailable".to_string(),
        }))
    }

    fn answering(answer: Result<ApplicantCreation, ProviderError>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            answer: Mutex::new(answer),
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KycProvider for RecordingKycProvider {
    async fn create_applicant(
        &self,
        _external_user_id: &str,
        _profile: &ApplicantProfile,
    ) -> Result<ApplicantCreation, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.lock().expect("answer lock").clone()
    }
}

/// FX fake answering a fixed rate, or failing every call.
pub(super) struct StaticFx {
    rate: Decimal,
    outcome: TransferOutcome,
    fail: bool,
}

impl StaticFx {
    pub(super) fn rate(rate: Decimal) -> Self {
        Self {
            rate,
            outcome: TransferOutcome::Success,
            fail: false,
        }
    }

    pub(super) fn simulated_failure(rate: Decimal) -> Self {
        Self {
            rate,
            outcome: TransferOutcome::SimulatedFailure,
            fail: false,
        }
    }

    pub(super) fn failing() -> Self {
        Self {
            rate: Decimal::ZERO,
            outcome: TransferOutcome::Success,
            fail: true,
        }
    }

    fn outage() -> ProviderError {
        ProviderError::Transport {
            provider: Provider::Wise,
            message: "connection refused".to_string(),
        }
    }
}

#[async_trait]
impl FxProvider for StaticFx {
    async fn get_rate(&self, _source: &str, _target: &str) -> Result<FxRate, ProviderError> {
        if self.fail {
            return Err(Self::outage());
        }
        Ok(FxRate {
            rate: self.rate,
            timestamp: Utc::now(),
        })
    }

    async fn simulate_transfer(
        &self,
        amount: Decimal,
        _source: &str,
        _target: &str,
    ) -> Result<SimulatedTransfer, ProviderError> {
        if self.fail {
            return Err(Self::outage());
        }
        let failure_reason = match self.outcome {
            TransferOutcome::Success => None,
            TransferOutcome::SimulatedFailure => Some("no payment option available".to_string()),
        };
        Ok(SimulatedTransfer {
            rate: self.rate,
            estimated_target_amount: amount * self.rate,
            outcome: self.outcome,
            failure_reason,
            quote_id: Some("quote-1".to_string()),
        })
    }
}

/// Store wrapper whose KYC inserts fail, for fatal-error paths.
#[derive(Default)]
pub(super) struct BrokenKycStore {
    inner: InMemoryEntityStore,
}

#[async_trait]
impl EntityStore for BrokenKycStore {
    async fn insert_user(&self, user: User) -> Result<User, StoreError> {
        self.inner.insert_user(user).await
    }

    async fn fetch_user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        self.inner.fetch_user(id).await
    }

    async fn list_users(&self, limit: usize) -> Result<Vec<User>, StoreError> {
        self.inner.list_users(limit).await
    }

    async fn insert_cash_account(&self, account: CashAccount) -> Result<CashAccount, StoreError> {
        self.inner.insert_cash_account(account).await
    }

    async fn fetch_cash_account(&self, id: &str) -> Result<Option<CashAccount>, StoreError> {
        self.inner.fetch_cash_account(id).await
    }

    async fn insert_kyc(&self, _record: KycRecord) -> Result<KycRecord, StoreError> {
        Err(StoreError::Unavailable("disk full".to_string()))
    }

    async fn update_kyc(&self, record: KycRecord) -> Result<(), StoreError> {
        self.inner.update_kyc(record).await
    }

    async fn fetch_kyc(&self, user_id: &UserId) -> Result<Option<KycRecord>, StoreError> {
        self.inner.fetch_kyc(user_id).await
    }

    async fn fetch_kyc_by_applicant(
        &self,
        applicant_id: &str,
    ) -> Result<Option<KycRecord>, StoreError> {
        self.inner.fetch_kyc_by_applicant(applicant_id).await
    }

    async fn fetch_kyc_by_external_user(
        &self,
        external_user_id: &str,
    ) -> Result<Option<KycRecord>, StoreError> {
        self.inner.fetch_kyc_by_external_user(external_user_id).await
    }

    async fn insert_brokerage_account(
        &self,
        account: BrokerageAccount,
    ) -> Result<BrokerageAccount, StoreError> {
        self.inner.insert_brokerage_account(account).await
    }

    async fn list_brokerage_accounts(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<BrokerageAccount>, StoreError> {
        self.inner.list_brokerage_accounts(user_id).await
    }

    async fn insert_transaction(
        &self,
        transaction: Transaction,
    ) -> Result<Transaction, StoreError> {
        self.inner.insert_transaction(transaction).await
    }

    async fn list_transactions(&self, user_id: &UserId) -> Result<Vec<Transaction>, StoreError> {
        self.inner.list_transactions(user_id).await
    }
}

pub(super) struct Harness {
    pub(super) store: Arc<InMemoryEntityStore>,
    pub(super) kyc: Arc<RecordingKycProvider>,
    pub(super) services: Arc<OnboardingServices>,
}

pub(super) fn harness_with(kyc: RecordingKycProvider, fx: StaticFx) -> Harness {
    harness_with_webhook(kyc, fx, WebhookSettings::default())
}

pub(super) fn harness_with_webhook(
    kyc: RecordingKycProvider,
    fx: StaticFx,
    webhook: WebhookSettings,
) -> Harness {
    let store = Arc::new(InMemoryEntityStore::new());
    let kyc = Arc::new(kyc);
    let services = Arc::new(OnboardingServices::new(
        store.clone(),
        kyc.clone(),
        Arc::new(fx),
        Arc::new(DriveWealthClient::mock()),
        webhook,
    ));
    Harness {
        store,
        kyc,
        services,
    }
}

pub(super) fn harness() -> Harness {
    harness_with(
        RecordingKycProvider::created("6a1f0c2b9d"),
        StaticFx::rate(dec!(0.1934)),
    )
}

pub(super) fn enforcing_webhook() -> WebhookSettings {
    WebhookSettings {
        signing_secret: Some(WEBHOOK_SECRET.to_string()),
        enforce_signature: true,
    }
}

pub(super) fn profile() -> ApplicantProfile {
    ApplicantProfile {
        email: "ana@example.com".to_string(),
        first_name: "Ana".to_string(),
        last_name: "Souza".to_string(),
        country: "BRA".to_string(),
    }
}

pub(super) async fn seeded_user(harness: &Harness, email: &str) -> (User, CashAccount) {
    let onboarded = harness
        .services
        .users
        .create_with_cash_account(email)
        .await
        .expect("user created");
    (onboarded.user, onboarded.cash_account)
}

pub(super) async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    serde_json::from_slice(&bytes).expect("json body")
}
