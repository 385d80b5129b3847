//! Payment gateway port.
//!
//! Mercado Pago and Flow expose the same two operations to billing:
//! create a checkout and query a payment's authoritative status.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::reconciliation::{Gateway, PayerInfo};

/// Port for an external payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Which gateway this adapter talks to.
    fn gateway(&self) -> Gateway;

    /// Create a checkout the payer can be redirected to.
    async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent, GatewayError>;

    /// Query a payment by the gateway's own id (MP payment id, Flow token).
    async fn get_payment_status(&self, external_id: &str)
        -> Result<GatewayPaymentStatus, GatewayError>;

    /// Query the latest payment for one of our references.
    ///
    /// Returns `None` if the gateway has no payment for it yet.
    async fn find_payment_by_reference(
        &self,
        reference_id: &str,
    ) -> Result<Option<GatewayPaymentStatus>, GatewayError>;
}

/// Request to open a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntentRequest {
    /// Amount in minor units of `currency`.
    pub amount: i64,
    pub currency: String,
    pub reference_id: String,
    pub description: String,
    pub payer_email: Option<String>,
    pub return_url: String,
    pub notify_url: String,
}

/// Checkout created by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub redirect_url: String,
    pub external_id: String,
}

/// Authoritative status of a payment as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayPaymentStatus {
    /// Raw status in the gateway's own vocabulary.
    pub status: String,

    /// Our reference echoed back (`external_reference`, `commerceOrder`).
    pub reference_id: Option<String>,

    /// Gateway payment id, when distinct from the queried id.
    pub external_id: Option<String>,

    pub amount: Option<i64>,
    pub payer: Option<PayerInfo>,
    pub raw_payload: Value,
}

/// Gateway failure. A single integration error kind with a code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayError {
    pub code: GatewayErrorCode,
    pub message: String,
    pub retryable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayErrorCode {
    /// Our input was rejected before or by the gateway.
    InvalidRequest,
    NetworkError,
    Timeout,
    AuthenticationError,
    NotFound,
    /// Response could not be understood.
    MalformedResponse,
    ProviderError,
}

impl GatewayErrorCode {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayErrorCode::NetworkError
                | GatewayErrorCode::Timeout
                | GatewayErrorCode::ProviderError
        )
    }
}

impl std::fmt::Display for GatewayErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GatewayErrorCode::InvalidRequest => "invalid_request",
            GatewayErrorCode::NetworkError => "network_error",
            GatewayErrorCode::Timeout => "timeout",
            GatewayErrorCode::AuthenticationError => "authentication_error",
            GatewayErrorCode::NotFound => "not_found",
            GatewayErrorCode::MalformedResponse => "malformed_response",
            GatewayErrorCode::ProviderError => "provider_error",
        };
        write!(f, "{}", s)
    }
}

impl GatewayError {
    pub fn new(code: GatewayErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retryable: code.is_retryable(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::InvalidRequest, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::NetworkError, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::MalformedResponse, message)
    }

    /// Map a reqwest failure, distinguishing timeouts.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(GatewayErrorCode::Timeout, err.to_string())
        } else {
            Self::network(err.to_string())
        }
    }

    /// Map a non-success HTTP status.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let code = match status {
            400 | 422 => GatewayErrorCode::InvalidRequest,
            401 | 403 => GatewayErrorCode::AuthenticationError,
            404 => GatewayErrorCode::NotFound,
            _ => GatewayErrorCode::ProviderError,
        };
        Self::new(code, format!("HTTP {}: {}", status, body.into()))
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for GatewayError {}

impl From<GatewayError> for DomainError {
    fn from(err: GatewayError) -> Self {
        let code = match err.code {
            GatewayErrorCode::InvalidRequest => ErrorCode::ValidationFailed,
            _ => ErrorCode::GatewayError,
        };
        DomainError::new(code, err.message).with_detail("gateway_code", err.code.to_string())
    }
}

/// Gateway adapters keyed by the gateway they serve.
#[derive(Clone, Default)]
pub struct PaymentGateways {
    by_gateway: HashMap<Gateway, Arc<dyn PaymentGateway>>,
}

impl PaymentGateways {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, adapter: Arc<dyn PaymentGateway>) -> Self {
        self.by_gateway.insert(adapter.gateway(), adapter);
        self
    }

    pub fn get(&self, gateway: Gateway) -> Option<Arc<dyn PaymentGateway>> {
        self.by_gateway.get(&gateway).cloned()
    }

    /// Adapter for `gateway`, or an `InvalidRequest` error if none is configured.
    pub fn require(&self, gateway: Gateway) -> Result<Arc<dyn PaymentGateway>, GatewayError> {
        self.get(gateway).ok_or_else(|| {
            GatewayError::invalid_request(format!("gateway {} is not configured", gateway.as_str()))
        })
    }
}
