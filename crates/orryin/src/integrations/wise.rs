//! Wise adapter: live rates and sandbox quotes used to simulate funding.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::header::ACCEPT;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::http::{self, join_url};
use super::{FxProvider, FxRate, Provider, ProviderError, SimulatedTransfer};
use crate::config::WiseConfig;
use crate::workflows::onboarding::domain::{round_money, TransferOutcome};

#[derive(Clone)]
pub struct WiseClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    profile_id: Option<String>,
}

impl std::fmt::Debug for WiseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WiseClient")
            .field("base_url", &self.base_url)
            .field("profile_id", &self.profile_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuoteRequest<'a> {
    source_currency: &'a str,
    target_currency: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    source_amount: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    id: Option<Value>,
    rate: Option<Value>,
    target_amount: Option<Value>,
    #[serde(default)]
    payment_options: Vec<PaymentOption>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentOption {
    #[serde(default)]
    disabled: bool,
    target_amount: Option<Value>,
    disabled_reason: Option<DisabledReason>,
}

#[derive(Debug, Deserialize)]
struct DisabledReason {
    code: Option<String>,
    message: Option<String>,
}

impl WiseClient {
    pub fn new(client: Client, config: &WiseConfig) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            profile_id: config.profile_id.clone(),
        }
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.api_key
            .as_deref()
            .ok_or(ProviderError::NotConfigured {
                provider: Provider::Wise,
                setting: "WISE_API_KEY",
            })
    }

    fn quotes_path(&self) -> String {
        match &self.profile_id {
            Some(profile) => format!("/v3/profiles/{profile}/quotes"),
            None => "/v3/quotes".to_string(),
        }
    }
}

/// Read a JSON number or numeric string as a decimal.
fn decimal_value(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn positive_rate(value: Option<&Value>) -> Result<Decimal, ProviderError> {
    let rate = value
        .and_then(decimal_value)
        .ok_or_else(|| ProviderError::malformed(Provider::Wise, "missing or non-numeric rate"))?;
    if rate <= Decimal::ZERO {
        return Err(ProviderError::malformed(
            Provider::Wise,
            format!("rate must be positive, got {rate}"),
        ));
    }
    Ok(rate)
}

/// Wise stamps rates like `2024-05-01T10:15:00+0000`; RFC 3339 is accepted too.
fn parse_rate_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|stamp| stamp.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

#[async_trait]
impl FxProvider for WiseClient {
    async fn get_rate(&self, source: &str, target: &str) -> Result<FxRate, ProviderError> {
        let api_key = self.api_key()?;
        let request = self
            .client
            .get(join_url(&self.base_url, "/v1/rates"))
            .query(&[
                ("source", source.to_ascii_uppercase()),
                ("target", target.to_ascii_uppercase()),
            ])
            .bearer_auth(api_key)
            .header(ACCEPT, "application/json");

        let raw = http::send(Provider::Wise, request).await?;
        if !raw.is_success() {
            return Err(raw.into_error(Provider::Wise));
        }

        let body: Value = raw.json(Provider::Wise)?;
        let entry = match &body {
            Value::Array(entries) => entries
                .first()
                .ok_or_else(|| ProviderError::malformed(Provider::Wise, "empty rate list"))?,
            other => other,
        };

        let rate = positive_rate(entry.get("rate"))?;
        let timestamp = entry
            .get("time")
            .and_then(Value::as_str)
            .and_then(parse_rate_time)
            .unwrap_or_else(Utc::now);

        Ok(FxRate { rate, timestamp })
    }

    async fn simulate_transfer(
        &self,
        amount: Decimal,
        source: &str,
        target: &str,
    ) -> Result<SimulatedTransfer, ProviderError> {
        let api_key = self.api_key()?;
        let source = source.to_ascii_uppercase();
        let target = target.to_ascii_uppercase();
        let payload = QuoteRequest {
            source_currency: &source,
            target_currency: &target,
            source_amount: amount,
        };

        let request = self
            .client
            .post(join_url(&self.base_url, &self.quotes_path()))
            .bearer_auth(api_key)
            .header(ACCEPT, "application/json")
            .json(&payload);

        let raw = http::send(Provider::Wise, request).await?;
        if !raw.is_success() {
            return Err(raw.into_error(Provider::Wise));
        }

        let quote: QuoteResponse = raw.json(Provider::Wise)?;
        let rate = positive_rate(quote.rate.as_ref())?;

        let enabled_option = quote.payment_options.iter().find(|option| !option.disabled);
        let estimated = quote
            .target_amount
            .as_ref()
            .and_then(decimal_value)
            .or_else(|| {
                enabled_option
                    .and_then(|option| option.target_amount.as_ref())
                    .and_then(decimal_value)
            })
            .or_else(|| amount.checked_mul(rate))
            .ok_or_else(|| {
                ProviderError::malformed(
                    Provider::Wise,
                    format!("quote for {amount} at rate {rate} overflows the target amount"),
                )
            })?;

        let (outcome, failure_reason) =
            if !quote.payment_options.is_empty() && enabled_option.is_none() {
                let reason = quote
                    .payment_options
                    .iter()
                    .find_map(|option| option.disabled_reason.as_ref())
                    .and_then(|reason| reason.message.clone().or_else(|| reason.code.clone()))
                    .unwrap_or_else(|| "all payment options are disabled".to_string());
                (TransferOutcome::SimulatedFailure, Some(reason))
            } else {
                (TransferOutcome::Success, None)
            };

        let quote_id = quote.id.map(|id| match id {
            Value::String(text) => text,
            other => other.to_string(),
        });

        Ok(SimulatedTransfer {
            rate,
            estimated_target_amount: round_money(estimated),
            outcome,
            failure_reason,
            quote_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decimal_value_accepts_numbers_and_strings() {
        assert_eq!(
            decimal_value(&json!(0.1934)),
            Decimal::from_str("0.1934").ok()
        );
        assert_eq!(decimal_value(&json!("5.25")), Decimal::from_str("5.25").ok());
        assert_eq!(decimal_value(&json!(null)), None);
    }

    #[test]
    fn non_positive_rate_is_malformed() {
        let err = positive_rate(Some(&json!(0))).expect_err("zero rejected");
        assert_eq!(err.reason_code(), "malformed_response");
    }

    #[test]
    fn parses_wise_rate_timestamps() {
        let parsed = parse_rate_time("2024-05-01T10:15:00+0000").expect("wise format");
        assert_eq!(parsed.to_rfc3339(), "2024-05-01T10:15:00+00:00");
        assert!(parse_rate_time("2024-05-01T10:15:00Z").is_some());
        assert!(parse_rate_time("yesterday").is_none());
    }
}
