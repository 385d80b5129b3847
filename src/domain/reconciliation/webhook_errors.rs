//! Webhook error types for gateway notifications.
//!
//! Every variant maps to a definitive HTTP status. Gateways retry on
//! non-2xx, so only failures that can succeed later return 5xx.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors that occur during webhook processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Webhook signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Failed to parse webhook payload or signature header.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Required field missing from webhook payload.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Notification refers to a payment we never issued.
    #[error("Unknown reference: {0}")]
    UnknownReference(String),

    /// Event was intentionally ignored (not an error condition).
    #[error("Event ignored: {0}")]
    Ignored(String),

    /// Gateway could not be queried for the authoritative status.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),
}

impl WebhookError {
    /// Returns true if the gateway should retry delivering this webhook.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::Gateway(_) | WebhookError::Database(_))
    }

    /// Maps the error to an HTTP status code.
    ///
    /// - 2xx: acknowledged, no retry
    /// - 4xx: malformed or forged, no retry
    /// - 5xx: transient, gateway retries
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::InvalidSignature => StatusCode::UNAUTHORIZED,

            WebhookError::ParseError(_) | WebhookError::MissingField(_) => {
                StatusCode::BAD_REQUEST
            }

            // Retrying cannot fix a reference we do not have
            WebhookError::UnknownReference(_) | WebhookError::Ignored(_) => StatusCode::OK,

            WebhookError::Gateway(_) => StatusCode::SERVICE_UNAVAILABLE,
            WebhookError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
