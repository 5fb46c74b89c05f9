//! User onboarding across KYC, FX funding and brokerage providers.
//!
//! Standalone services back the thin HTTP endpoints; [`FlowOrchestrator`]
//! strings them together into a single end-to-end run.

pub mod brokerage;
pub mod domain;
pub mod error;
pub mod flow;
pub mod kyc;
pub mod payments;
pub mod router;
pub mod service;
pub mod users;

#[cfg(test)]
mod tests;

pub use brokerage::{BrokerageOnboardRequest, BrokerageService};
pub use domain::{
    ApplicantProfile, BrokerageAccount, CashAccount, FxQuote, KycRecord, KycStatus, Transaction,
    TransferOutcome, User, UserId,
};
pub use error::{ErrorDescriptor, OnboardingError};
pub use flow::{FlowOrchestrator, FlowProfileInput, FlowSnapshot, Stage};
pub use kyc::{KycService, WebhookOutcome, WebhookSettings};
pub use payments::{PaymentsService, RateLookup, SandboxTransferReceipt, SandboxTransferRequest};
pub use router::onboarding_router;
pub use service::OnboardingServices;
pub use users::{OnboardedUser, UserService};
