use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier wrapper for onboarded users.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identifier sent to the KYC provider as `externalUserId`.
    pub fn external_kyc_id(&self) -> String {
        format!("user-{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            id: UserId::generate(),
            email: email.into(),
            created_at: Utc::now(),
        }
    }
}

/// Fiat balance held on the platform for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashAccount {
    pub id: String,
    pub user_id: UserId,
    pub currency: String,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

impl CashAccount {
    pub fn opened_for(user_id: &UserId, currency: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.clone(),
            currency: currency.to_ascii_uppercase(),
            balance: Decimal::ZERO,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    Pending,
    AlreadyExists,
    Approved,
    Rejected,
}

impl KycStatus {
    pub fn label(&self) -> &'static str {
        match self {
            KycStatus::Pending => "pending",
            KycStatus::AlreadyExists => "already_exists",
            KycStatus::Approved => "approved",
            KycStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for KycStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown KYC status '{0}'")]
pub struct UnknownKycStatus(pub String);

impl FromStr for KycStatus {
    type Err = UnknownKycStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(KycStatus::Pending),
            "already_exists" => Ok(KycStatus::AlreadyExists),
            "approved" => Ok(KycStatus::Approved),
            "rejected" => Ok(KycStatus::Rejected),
            other => Err(UnknownKycStatus(other.to_string())),
        }
    }
}

/// Local mirror of the provider-side applicant; at most one per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KycRecord {
    pub user_id: UserId,
    pub external_user_id: String,
    pub applicant_id: String,
    pub status: KycStatus,
    pub review_result: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KycRecord {
    pub fn new(user_id: &UserId, applicant_id: impl Into<String>, status: KycStatus) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.clone(),
            external_user_id: user_id.external_kyc_id(),
            applicant_id: applicant_id.into(),
            status,
            review_result: None,
            created_at: now,
            updated_at: now,
        }
    }
}

pub const DRIVEWEALTH_BROKER: &str = "drivewealth";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerageAccount {
    pub id: String,
    pub user_id: UserId,
    pub broker: String,
    pub external_customer_id: String,
    pub external_account_id: String,
    pub base_currency: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Identity fields forwarded to providers during onboarding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantProfile {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub country: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferOutcome {
    Success,
    SimulatedFailure,
}

/// Transient result of an FX lookup plus sandbox transfer; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FxQuote {
    pub source_currency: String,
    pub target_currency: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub source_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,
    pub rate_timestamp: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::float")]
    pub estimated_target_amount: Decimal,
    pub outcome: TransferOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_id: Option<String>,
}

pub const FX_SANDBOX_TRANSACTION: &str = "fx_sandbox";

/// Ledger line recorded for sandbox funding simulations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: UserId,
    pub account_id: String,
    pub kind: String,
    pub amount: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn fx_sandbox(user_id: &UserId, account_id: &str, amount: Decimal, currency: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.clone(),
            account_id: account_id.to_string(),
            kind: FX_SANDBOX_TRANSACTION.to_string(),
            amount,
            currency: currency.to_ascii_uppercase(),
            created_at: Utc::now(),
        }
    }
}

/// Normalize an ISO-4217 code, rejecting anything that is not three ASCII letters.
pub fn normalize_currency(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.len() == 3 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(trimmed.to_ascii_uppercase())
    } else {
        None
    }
}

/// Round a converted amount the way statements show it.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kyc_status_round_trips_through_labels() {
        for status in [
            KycStatus::Pending,
            KycStatus::AlreadyExists,
            KycStatus::Approved,
            KycStatus::Rejected,
        ] {
            assert_eq!(status.label().parse::<KycStatus>(), Ok(status));
        }
        assert!("created".parse::<KycStatus>().is_err());
    }

    #[test]
    fn currency_codes_are_normalized() {
        assert_eq!(normalize_currency(" brl "), Some("BRL".to_string()));
        assert_eq!(normalize_currency("US"), None);
        assert_eq!(normalize_currency("U5D"), None);
    }

    #[test]
    fn cash_accounts_open_with_zero_balance() {
        let user = User::new("someone@example.com");
        let account = CashAccount::opened_for(&user.id, "usd");
        assert_eq!(account.balance, Decimal::ZERO);
        assert_eq!(account.currency, "USD");
        assert_eq!(account.user_id, user.id);
    }

    #[test]
    fn external_kyc_id_is_prefixed() {
        let id = UserId("42".to_string());
        assert_eq!(id.external_kyc_id(), "user-42");
    }
}
