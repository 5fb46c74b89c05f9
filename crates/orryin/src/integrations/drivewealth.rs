use async_trait::async_trait;
use uuid::Uuid;

use super::{BrokerageProfile, BrokerageProvider, OpenedAccount, Provider, ProviderError};
use crate::config::DriveWealthConfig;
use crate::workflows::onboarding::domain::UserId;

const MOCK_ID_HEX_LEN: usize = 20;

/// DriveWealth adapter. Only the mock mode is wired; it fabricates ids without
/// touching the network.
#[derive(Clone)]
pub struct DriveWealthClient {
    base_url: String,
    credentials_present: bool,
    use_mock: bool,
}

impl std::fmt::Debug for DriveWealthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveWealthClient")
            .field("base_url", &self.base_url)
            .field("use_mock", &self.use_mock)
            .finish_non_exhaustive()
    }
}

impl DriveWealthClient {
    pub fn new(config: &DriveWealthConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            credentials_present: config.app_key.is_some() && config.app_secret.is_some(),
            use_mock: config.use_mock,
        }
    }

    pub fn mock() -> Self {
        Self {
            base_url: String::new(),
            credentials_present: false,
            use_mock: true,
        }
    }

    pub fn is_mock(&self) -> bool {
        self.use_mock
    }
}

fn mock_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &hex[..MOCK_ID_HEX_LEN])
}

#[async_trait]
impl BrokerageProvider for DriveWealthClient {
    async fn create_account(
        &self,
        user_id: &UserId,
        profile: &BrokerageProfile,
    ) -> Result<OpenedAccount, ProviderError> {
        if !self.use_mock {
            if !self.credentials_present {
                return Err(ProviderError::NotConfigured {
                    provider: Provider::DriveWealth,
                    setting: "DRIVEWEALTH_APP_KEY",
                });
            }
            return Err(ProviderError::Unimplemented {
                provider: Provider::DriveWealth,
                operation: "create_account",
            });
        }

        let account = OpenedAccount {
            customer_id: mock_id("DW-CUST"),
            account_id: mock_id("DW-ACC"),
            base_currency: profile.base_currency.to_ascii_uppercase(),
            status: "created".to_string(),
        };
        tracing::debug!(
            user_id = %user_id,
            account_id = %account.account_id,
            "drivewealth mock account opened"
        );
        Ok(account)
    }
}
