use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or unknown request field. Never retried, returned
    /// immediately with a stable per-field code.
    #[error("validation failed: {message}")]
    Validation { code: String, message: String },

    /// Every geocoding fallback was tried and none recognizes the address.
    #[error("address could not be resolved: {address}")]
    LocationUnresolvable { address: String },

    /// External provider timed out after the bounded retry.
    #[error("provider timed out: {provider}")]
    ProviderTimeout { provider: String },

    /// External provider failed in a non-timeout way after the bounded retry.
    #[error("provider error: {provider}: {detail}")]
    ProviderError { provider: String, detail: String },

    /// The rate table is missing an entry the calculation needs and no
    /// documented safe default exists.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(code: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            code: code.to_string(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code surfaced in the error envelope.
    pub fn code(&self) -> &str {
        match self {
            AppError::Validation { code, .. } => code,
            AppError::LocationUnresolvable { .. } => "location_unresolvable",
            AppError::ProviderTimeout { .. } | AppError::ProviderError { .. } => {
                "provider_unavailable"
            }
            AppError::Configuration(_) => "configuration_error",
            AppError::Internal(_) => "internal_server_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, msg) = match &self {
            AppError::Validation { message, .. } => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                message.clone(),
            ),
            AppError::LocationUnresolvable { address } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "location_error",
                format!("address could not be resolved: '{}'", address),
            ),
            AppError::ProviderTimeout { provider } => (
                StatusCode::BAD_GATEWAY,
                "provider_error",
                format!(
                    "provider '{}' timed out and all fallbacks were exhausted",
                    provider
                ),
            ),
            AppError::ProviderError { provider, detail } => {
                tracing::warn!(%provider, %detail, "provider failure surfaced to caller");
                (
                    StatusCode::BAD_GATEWAY,
                    "provider_error",
                    format!(
                        "provider '{}' failed and all fallbacks were exhausted",
                        provider
                    ),
                )
            }
            AppError::Configuration(detail) => {
                tracing::error!("configuration error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "configuration_error",
                    "pricing configuration is incomplete".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": self.code(),
            }
        }));

        (status, body).into_response()
    }
}
