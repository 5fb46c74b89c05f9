use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;

use crate::integrations::{Provider, ProviderError};
use crate::store::StoreError;

/// Failures surfaced by the onboarding services.
#[derive(Debug, thiserror::Error)]
pub enum OnboardingError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl OnboardingError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Store failures abort whatever is running; everything else can be
    /// recorded against a single flow stage.
    pub fn is_fatal(&self) -> bool {
        matches!(self, OnboardingError::Store(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            OnboardingError::Validation(_) => StatusCode::BAD_REQUEST,
            OnboardingError::NotFound(_) => StatusCode::NOT_FOUND,
            OnboardingError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            OnboardingError::Provider(ProviderError::Unimplemented { .. }) => {
                StatusCode::NOT_IMPLEMENTED
            }
            OnboardingError::Provider(_) => StatusCode::BAD_GATEWAY,
            OnboardingError::Store(StoreError::Conflict { .. }) => StatusCode::CONFLICT,
            OnboardingError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn descriptor(&self) -> ErrorDescriptor {
        match self {
            OnboardingError::Provider(err) => ErrorDescriptor {
                provider: Some(err.provider()),
                reason: err.reason_code().to_string(),
                http_status: err.http_status(),
                message: err.to_string(),
            },
            OnboardingError::Validation(message) => ErrorDescriptor::local("validation", message),
            OnboardingError::NotFound(message) => ErrorDescriptor::local("not_found", message),
            OnboardingError::Unauthorized(message) => {
                ErrorDescriptor::local("unauthorized", message)
            }
            OnboardingError::Store(err) => ErrorDescriptor::local("store", &err.to_string()),
        }
    }
}

/// Machine-readable description of a failed call or flow stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    pub message: String,
}

impl ErrorDescriptor {
    fn local(reason: &str, message: &str) -> Self {
        Self {
            provider: None,
            reason: reason.to_string(),
            http_status: None,
            message: message.to_string(),
        }
    }
}

impl IntoResponse for OnboardingError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(error = %self, status = status.as_u16(), "onboarding request failed");
        }
        let descriptor = self.descriptor();
        let payload = json!({
            "error": descriptor.message,
            "reason": descriptor.reason,
            "provider": descriptor.provider,
            "provider_status": descriptor.http_status,
        });
        (status, axum::Json(payload)).into_response()
    }
}
