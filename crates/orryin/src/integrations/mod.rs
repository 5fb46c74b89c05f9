//! Adapters for the three external providers.
//!
//! Each adapter turns one domain-level call into a single HTTP request and
//! normalizes the provider's answer (or its error vocabulary) into the types
//! below. None of them writes local state.

pub mod drivewealth;
mod http;
pub mod sumsub;
pub mod wise;

pub use drivewealth::DriveWealthClient;
pub use http::build_client;
pub use sumsub::{
    conflict_applicant_id, parse_webhook_event, verify_webhook_signature, SumsubClient,
    WebhookEvent,
};
pub use wise::WiseClient;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::workflows::onboarding::domain::{ApplicantProfile, TransferOutcome, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Sumsub,
    Wise,
    DriveWealth,
}

impl Provider {
    pub fn label(&self) -> &'static str {
        match self {
            Provider::Sumsub => "sumsub",
            Provider::Wise => "wise",
            Provider::DriveWealth => "drivewealth",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Normalized failure from any provider call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} returned HTTP {status}: {body}")]
    Http {
        provider: Provider,
        status: u16,
        body: String,
    },
    #[error("{provider} request failed: {message}")]
    Transport { provider: Provider, message: String },
    #[error("{provider} sent an unexpected response: {message}")]
    MalformedResponse { provider: Provider, message: String },
    #[error("{provider} does not implement {operation}")]
    Unimplemented {
        provider: Provider,
        operation: &'static str,
    },
    #[error("{provider} is not configured: {setting} is missing")]
    NotConfigured {
        provider: Provider,
        setting: &'static str,
    },
}

impl ProviderError {
    pub fn provider(&self) -> Provider {
        match self {
            ProviderError::Http { provider, .. }
            | ProviderError::Transport { provider, .. }
            | ProviderError::MalformedResponse { provider, .. }
            | ProviderError::Unimplemented { provider, .. }
            | ProviderError::NotConfigured { provider, .. } => *provider,
        }
    }

    /// Stable machine-readable reason, surfaced in stage error descriptors.
    pub fn reason_code(&self) -> &'static str {
        match self {
            ProviderError::Http { .. } => "http_status",
            ProviderError::Transport { .. } => "transport",
            ProviderError::MalformedResponse { .. } => "malformed_response",
            ProviderError::Unimplemented { .. } => "unimplemented",
            ProviderError::NotConfigured { .. } => "not_configured",
        }
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            ProviderError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn malformed(provider: Provider, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            provider,
            message: message.into(),
        }
    }
}

/// The KYC provider's documented "applicant already exists" answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConflict {
    pub provider: Provider,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplicantCreation {
    Created {
        applicant_id: String,
        raw_status: String,
    },
    AlreadyExists(ProviderConflict),
}

#[async_trait]
pub trait KycProvider: Send + Sync {
    async fn create_applicant(
        &self,
        external_user_id: &str,
        profile: &ApplicantProfile,
    ) -> Result<ApplicantCreation, ProviderError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FxRate {
    pub rate: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedTransfer {
    pub rate: Decimal,
    pub estimated_target_amount: Decimal,
    pub outcome: TransferOutcome,
    pub failure_reason: Option<String>,
    pub quote_id: Option<String>,
}

#[async_trait]
pub trait FxProvider: Send + Sync {
    async fn get_rate(&self, source: &str, target: &str) -> Result<FxRate, ProviderError>;

    async fn simulate_transfer(
        &self,
        amount: Decimal,
        source: &str,
        target: &str,
    ) -> Result<SimulatedTransfer, ProviderError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedAccount {
    pub customer_id: String,
    pub account_id: String,
    pub base_currency: String,
    pub status: String,
}

#[async_trait]
pub trait BrokerageProvider: Send + Sync {
    async fn create_account(
        &self,
        user_id: &UserId,
        profile: &BrokerageProfile,
    ) -> Result<OpenedAccount, ProviderError>;
}

/// Fields the brokerage needs to open an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerageProfile {
    pub email: String,
    pub base_currency: String,
}
