use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{EntityStore, StoreError};
use crate::workflows::onboarding::domain::{
    BrokerageAccount, CashAccount, KycRecord, Transaction, User, UserId,
};

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    cash_accounts: HashMap<String, CashAccount>,
    kyc: HashMap<UserId, KycRecord>,
    brokerage_accounts: Vec<BrokerageAccount>,
    transactions: Vec<Transaction>,
}

/// Process-local store used by tests and `DATABASE_URL=memory`.
#[derive(Debug, Default, Clone)]
pub struct InMemoryEntityStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store mutex poisoned".to_string()))
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn insert_user(&self, user: User) -> Result<User, StoreError> {
        let mut tables = self.tables()?;
        if tables
            .users
            .iter()
            .any(|existing| existing.id == user.id || existing.email == user.email)
        {
            return Err(StoreError::conflict("user", user.email));
        }
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn fetch_user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        let tables = self.tables()?;
        Ok(tables.users.iter().find(|user| &user.id == id).cloned())
    }

    async fn list_users(&self, limit: usize) -> Result<Vec<User>, StoreError> {
        let tables = self.tables()?;
        Ok(tables.users.iter().take(limit).cloned().collect())
    }

    async fn insert_cash_account(&self, account: CashAccount) -> Result<CashAccount, StoreError> {
        let mut tables = self.tables()?;
        if tables.cash_accounts.contains_key(&account.id) {
            return Err(StoreError::conflict("cash account", account.id));
        }
        tables
            .cash_accounts
            .insert(account.id.clone(), account.clone());
        Ok(account)
    }

    async fn fetch_cash_account(&self, id: &str) -> Result<Option<CashAccount>, StoreError> {
        let tables = self.tables()?;
        Ok(tables.cash_accounts.get(id).cloned())
    }

    async fn insert_kyc(&self, record: KycRecord) -> Result<KycRecord, StoreError> {
        let mut tables = self.tables()?;
        if tables.kyc.contains_key(&record.user_id) {
            return Err(StoreError::conflict("kyc record", record.user_id.0));
        }
        tables.kyc.insert(record.user_id.clone(), record.clone());
        Ok(record)
    }

    async fn update_kyc(&self, record: KycRecord) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        match tables.kyc.get_mut(&record.user_id) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(StoreError::not_found("kyc record", record.user_id.0)),
        }
    }

    async fn fetch_kyc(&self, user_id: &UserId) -> Result<Option<KycRecord>, StoreError> {
        let tables = self.tables()?;
        Ok(tables.kyc.get(user_id).cloned())
    }

    async fn fetch_kyc_by_applicant(
        &self,
        applicant_id: &str,
    ) -> Result<Option<KycRecord>, StoreError> {
        let tables = self.tables()?;
        Ok(tables
            .kyc
            .values()
            .find(|record| record.applicant_id == applicant_id)
            .cloned())
    }

    async fn fetch_kyc_by_external_user(
        &self,
        external_user_id: &str,
    ) -> Result<Option<KycRecord>, StoreError> {
        let tables = self.tables()?;
        Ok(tables
            .kyc
            .values()
            .find(|record| record.external_user_id == external_user_id)
            .cloned())
    }

    async fn insert_brokerage_account(
        &self,
        account: BrokerageAccount,
    ) -> Result<BrokerageAccount, StoreError> {
        let mut tables = self.tables()?;
        tables.brokerage_accounts.push(account.clone());
        Ok(account)
    }

    async fn list_brokerage_accounts(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<BrokerageAccount>, StoreError> {
        let tables = self.tables()?;
        Ok(tables
            .brokerage_accounts
            .iter()
            .filter(|account| &account.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_transaction(
        &self,
        transaction: Transaction,
    ) -> Result<Transaction, StoreError> {
        let mut tables = self.tables()?;
        tables.transactions.push(transaction.clone());
        Ok(transaction)
    }

    async fn list_transactions(&self, user_id: &UserId) -> Result<Vec<Transaction>, StoreError> {
        let tables = self.tables()?;
        Ok(tables
            .transactions
            .iter()
            .filter(|transaction| &transaction.user_id == user_id)
            .cloned()
            .collect())
    }
}
