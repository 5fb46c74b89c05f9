use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use super::{Provider, ProviderError};

/// Build the shared reqwest client every adapter clones.
pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

/// Status and body of a completed exchange, before interpretation.
#[derive(Debug)]
pub(crate) struct RawResponse {
    pub(crate) status: StatusCode,
    pub(crate) body: String,
}

impl RawResponse {
    pub(crate) fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub(crate) fn json<T: DeserializeOwned>(&self, provider: Provider) -> Result<T, ProviderError> {
        serde_json::from_str(&self.body).map_err(|err| {
            ProviderError::malformed(provider, format!("invalid JSON body ({err})"))
        })
    }

    pub(crate) fn into_error(self, provider: Provider) -> ProviderError {
        ProviderError::Http {
            provider,
            status: self.status.as_u16(),
            body: self.body,
        }
    }
}

/// Send a request once and capture the response; transport faults become
/// [`ProviderError::Transport`].
pub(crate) async fn send(
    provider: Provider,
    request: RequestBuilder,
) -> Result<RawResponse, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|err| ProviderError::Transport {
            provider,
            message: err.to_string(),
        })?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| ProviderError::Transport {
            provider,
            message: format!("failed to read body: {err}"),
        })?;
    Ok(RawResponse { status, body })
}

/// Join a configured base URL and an absolute path without doubling slashes.
pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}
