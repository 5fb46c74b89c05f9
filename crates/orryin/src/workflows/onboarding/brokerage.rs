use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::domain::{normalize_currency, BrokerageAccount, UserId, DRIVEWEALTH_BROKER};
use super::error::OnboardingError;
use crate::integrations::{BrokerageProfile, BrokerageProvider};
use crate::store::EntityStore;

pub const DEFAULT_BASE_CURRENCY: &str = "USD";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BrokerageOnboardRequest {
    pub user_id: UserId,
    #[serde(default)]
    pub base_currency: Option<String>,
}

/// Opens brokerage accounts. Every call opens a new account; a user may hold
/// several.
pub struct BrokerageService {
    store: Arc<dyn EntityStore>,
    provider: Arc<dyn BrokerageProvider>,
}

impl BrokerageService {
    pub fn new(store: Arc<dyn EntityStore>, provider: Arc<dyn BrokerageProvider>) -> Self {
        Self { store, provider }
    }

    pub async fn onboard(
        &self,
        user_id: &UserId,
        base_currency: Option<&str>,
    ) -> Result<BrokerageAccount, OnboardingError> {
        let base_currency = match base_currency {
            Some(raw) => normalize_currency(raw).ok_or_else(|| {
                OnboardingError::validation(format!("'{raw}' is not a three-letter currency code"))
            })?,
            None => DEFAULT_BASE_CURRENCY.to_string(),
        };

        let user = self.store.fetch_user(user_id).await?.ok_or_else(|| {
            OnboardingError::not_found(format!("user '{user_id}' not found"))
        })?;

        let opened = self
            .provider
            .create_account(
                user_id,
                &BrokerageProfile {
                    email: user.email,
                    base_currency,
                },
            )
            .await?;

        let account = self
            .store
            .insert_brokerage_account(BrokerageAccount {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.clone(),
                broker: DRIVEWEALTH_BROKER.to_string(),
                external_customer_id: opened.customer_id,
                external_account_id: opened.account_id,
                base_currency: opened.base_currency,
                status: opened.status,
                created_at: Utc::now(),
            })
            .await?;

        tracing::info!(
            user_id = %user_id,
            account_id = %account.external_account_id,
            "brokerage account opened"
        );
        Ok(account)
    }

    /// Accounts for a user, oldest first. Unknown users simply have none.
    pub async fn accounts(&self, user_id: &UserId) -> Result<Vec<BrokerageAccount>, OnboardingError> {
        Ok(self.store.list_brokerage_accounts(user_id).await?)
    }
}
