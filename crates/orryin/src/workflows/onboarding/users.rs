use std::sync::Arc;

use serde::Serialize;

use super::domain::{CashAccount, User, UserId};
use super::error::OnboardingError;
use crate::store::EntityStore;

pub const DEFAULT_CASH_CURRENCY: &str = "USD";
pub const USER_LIST_LIMIT: usize = 50;

/// A freshly created user together with its zero-balance cash account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OnboardedUser {
    pub user: User,
    pub cash_account: CashAccount,
}

pub struct UserService {
    store: Arc<dyn EntityStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Create a user and its USD cash account. Duplicate emails surface as a
    /// store conflict.
    pub async fn create_with_cash_account(
        &self,
        email: &str,
    ) -> Result<OnboardedUser, OnboardingError> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(OnboardingError::validation(format!(
                "'{email}' is not a valid email address"
            )));
        }

        let user = self.store.insert_user(User::new(email)).await?;
        let cash_account = self
            .store
            .insert_cash_account(CashAccount::opened_for(&user.id, DEFAULT_CASH_CURRENCY))
            .await?;

        tracing::info!(
            user_id = %user.id,
            cash_account_id = %cash_account.id,
            "user created"
        );
        Ok(OnboardedUser { user, cash_account })
    }

    pub async fn list(&self) -> Result<Vec<User>, OnboardingError> {
        Ok(self.store.list_users(USER_LIST_LIMIT).await?)
    }

    /// Fetch a user or fail with a not-found error.
    pub async fn require(&self, id: &UserId) -> Result<User, OnboardingError> {
        self.store
            .fetch_user(id)
            .await?
            .ok_or_else(|| OnboardingError::not_found(format!("user '{id}' not found")))
    }
}
