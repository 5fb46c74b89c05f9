use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{
    normalize_currency, round_money, FxQuote, Transaction, TransferOutcome, UserId,
};
use super::error::OnboardingError;
use crate::integrations::FxProvider;
use crate::store::EntityStore;

/// Plain rate lookup, optionally converting an amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLookup {
    pub source: String,
    pub target: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,
    pub rate_timestamp: DateTime<Utc>,
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub source_amount: Option<Decimal>,
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_amount: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SandboxTransferRequest {
    pub user_id: UserId,
    pub account_id: String,
    pub source_currency: String,
    pub target_currency: String,
    pub source_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SandboxTransferReceipt {
    pub user_id: UserId,
    pub account_id: String,
    pub source_currency: String,
    pub target_currency: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub source_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub fx_rate: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub estimated_target_amount: Decimal,
    pub outcome: TransferOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

pub struct PaymentsService {
    store: Arc<dyn EntityStore>,
    fx: Arc<dyn FxProvider>,
}

fn currency_pair(source: &str, target: &str) -> Result<(String, String), OnboardingError> {
    let parse = |raw: &str| {
        normalize_currency(raw).ok_or_else(|| {
            OnboardingError::validation(format!("'{raw}' is not a three-letter currency code"))
        })
    };
    Ok((parse(source)?, parse(target)?))
}

fn positive_amount(amount: Decimal) -> Result<Decimal, OnboardingError> {
    if amount <= Decimal::ZERO {
        return Err(OnboardingError::validation(format!(
            "amount must be greater than zero, got {amount}"
        )));
    }
    Ok(amount)
}

impl PaymentsService {
    pub fn new(store: Arc<dyn EntityStore>, fx: Arc<dyn FxProvider>) -> Self {
        Self { store, fx }
    }

    pub async fn fx_rate(
        &self,
        source: &str,
        target: &str,
        amount: Option<Decimal>,
    ) -> Result<RateLookup, OnboardingError> {
        let (source, target) = currency_pair(source, target)?;
        let amount = amount.map(positive_amount).transpose()?;

        let rate = self.fx.get_rate(&source, &target).await?;
        let target_amount = amount
            .map(|value| {
                value.checked_mul(rate.rate).map(round_money).ok_or_else(|| {
                    OnboardingError::validation(format!(
                        "amount {value} is too large to convert at rate {}",
                        rate.rate
                    ))
                })
            })
            .transpose()?;
        Ok(RateLookup {
            source,
            target,
            rate: rate.rate,
            rate_timestamp: rate.timestamp,
            source_amount: amount,
            target_amount,
        })
    }

    /// Fetch the live rate, then ask the provider to simulate the transfer.
    pub async fn quote(
        &self,
        amount: Decimal,
        source: &str,
        target: &str,
    ) -> Result<FxQuote, OnboardingError> {
        let (source, target) = currency_pair(source, target)?;
        let amount = positive_amount(amount)?;

        let rate = self.fx.get_rate(&source, &target).await?;
        let simulated = self.fx.simulate_transfer(amount, &source, &target).await?;

        Ok(FxQuote {
            source_currency: source,
            target_currency: target,
            source_amount: amount,
            rate: rate.rate,
            rate_timestamp: rate.timestamp,
            estimated_target_amount: round_money(simulated.estimated_target_amount),
            outcome: simulated.outcome,
            failure_reason: simulated.failure_reason,
            quote_id: simulated.quote_id,
        })
    }

    /// Log the sandbox transaction for a quote that simulated successfully.
    pub async fn record_sandbox_transfer(
        &self,
        user_id: &UserId,
        account_id: &str,
        quote: &FxQuote,
    ) -> Result<Option<Transaction>, OnboardingError> {
        if quote.outcome != TransferOutcome::Success {
            return Ok(None);
        }
        let transaction = self
            .store
            .insert_transaction(Transaction::fx_sandbox(
                user_id,
                account_id,
                quote.source_amount,
                &quote.source_currency,
            ))
            .await?;
        tracing::info!(
            user_id = %user_id,
            transaction_id = %transaction.id,
            amount = %transaction.amount,
            currency = %transaction.currency,
            "sandbox transaction recorded"
        );
        Ok(Some(transaction))
    }

    pub async fn sandbox_transfer(
        &self,
        request: SandboxTransferRequest,
    ) -> Result<SandboxTransferReceipt, OnboardingError> {
        currency_pair(&request.source_currency, &request.target_currency)?;
        positive_amount(request.source_amount)?;

        if self.store.fetch_user(&request.user_id).await?.is_none() {
            return Err(OnboardingError::not_found(format!(
                "user '{}' not found",
                request.user_id
            )));
        }
        let owned = self
            .store
            .fetch_cash_account(&request.account_id)
            .await?
            .filter(|account| account.user_id == request.user_id);
        if owned.is_none() {
            return Err(OnboardingError::not_found(format!(
                "account '{}' not found for user '{}'",
                request.account_id, request.user_id
            )));
        }

        let quote = self
            .quote(
                request.source_amount,
                &request.source_currency,
                &request.target_currency,
            )
            .await?;
        let transaction = self
            .record_sandbox_transfer(&request.user_id, &request.account_id, &quote)
            .await?;

        Ok(SandboxTransferReceipt {
            user_id: request.user_id,
            account_id: request.account_id,
            source_currency: quote.source_currency,
            target_currency: quote.target_currency,
            source_amount: quote.source_amount,
            fx_rate: quote.rate,
            estimated_target_amount: quote.estimated_target_amount,
            outcome: quote.outcome,
            failure_reason: quote.failure_reason,
            quote_id: quote.quote_id,
            transaction_id: transaction.map(|tx| tx.id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_pair_normalizes_case() {
        let (source, target) = currency_pair(" brl", "usd").expect("valid codes");
        assert_eq!(source, "BRL");
        assert_eq!(target, "USD");
    }

    #[test]
    fn currency_pair_rejects_bad_codes() {
        let err = currency_pair("REAL", "USD").expect_err("four letters");
        assert!(matches!(err, OnboardingError::Validation(_)));
    }

    #[test]
    fn zero_amount_is_rejected() {
        assert!(positive_amount(Decimal::ZERO).is_err());
        assert!(positive_amount(Decimal::ONE).is_ok());
    }
}
