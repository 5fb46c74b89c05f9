//! Persistence boundary for the onboarding entities.
//!
//! Services only see [`EntityStore`]; the sqlite and in-memory backends map the
//! plain domain structs onto their own storage.

mod memory;
mod sqlite;

pub use memory::InMemoryEntityStore;
pub use sqlite::SqliteEntityStore;

use async_trait::async_trait;

use crate::workflows::onboarding::domain::{
    BrokerageAccount, CashAccount, KycRecord, Transaction, User, UserId,
};

/// Storage abstraction so services can be exercised against any backend.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Insert a user; a duplicate email is reported as [`StoreError::Conflict`].
    async fn insert_user(&self, user: User) -> Result<User, StoreError>;
    async fn fetch_user(&self, id: &UserId) -> Result<Option<User>, StoreError>;
    async fn list_users(&self, limit: usize) -> Result<Vec<User>, StoreError>;

    async fn insert_cash_account(&self, account: CashAccount) -> Result<CashAccount, StoreError>;
    async fn fetch_cash_account(&self, id: &str) -> Result<Option<CashAccount>, StoreError>;

    /// Insert a KYC record; a second record for the same user is a conflict.
    async fn insert_kyc(&self, record: KycRecord) -> Result<KycRecord, StoreError>;
    async fn update_kyc(&self, record: KycRecord) -> Result<(), StoreError>;
    async fn fetch_kyc(&self, user_id: &UserId) -> Result<Option<KycRecord>, StoreError>;
    async fn fetch_kyc_by_applicant(
        &self,
        applicant_id: &str,
    ) -> Result<Option<KycRecord>, StoreError>;
    async fn fetch_kyc_by_external_user(
        &self,
        external_user_id: &str,
    ) -> Result<Option<KycRecord>, StoreError>;

    async fn insert_brokerage_account(
        &self,
        account: BrokerageAccount,
    ) -> Result<BrokerageAccount, StoreError>;
    /// Accounts for a user in creation order.
    async fn list_brokerage_accounts(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<BrokerageAccount>, StoreError>;

    async fn insert_transaction(&self, transaction: Transaction)
        -> Result<Transaction, StoreError>;
    async fn list_transactions(&self, user_id: &UserId) -> Result<Vec<Transaction>, StoreError>;
}

/// Error enumeration for persistence failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} '{key}' already exists")]
    Conflict { entity: &'static str, key: String },
    #[error("{entity} '{key}' not found")]
    NotFound { entity: &'static str, key: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("stored {entity} row is corrupt: {detail}")]
    Corrupt { entity: &'static str, detail: String },
}

impl StoreError {
    pub fn conflict(entity: &'static str, key: impl Into<String>) -> Self {
        Self::Conflict {
            entity,
            key: key.into(),
        }
    }

    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }
}
