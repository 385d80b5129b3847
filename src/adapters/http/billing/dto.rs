//! HTTP DTOs for the billing endpoints.

use serde::{Deserialize, Serialize};

use crate::application::ReconciliationOutcome;

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Mercado Pago notification body. Only the payment id is trusted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MercadoPagoNotification {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub data: Option<NotificationData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationData {
    /// Sent as a string or a number depending on the notification version.
    #[serde(default)]
    pub id: Option<serde_json::Value>,
}

impl MercadoPagoNotification {
    pub fn payment_id(&self) -> Option<String> {
        match self.data.as_ref()?.id.as_ref()? {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Flow confirmation callback (form encoded).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlowConfirmation {
    #[serde(default)]
    pub token: Option<String>,
}

/// Query string a payer returns with from either checkout.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReturnParams {
    #[serde(default)]
    pub gateway: Option<String>,

    /// Flow.
    #[serde(default)]
    pub token: Option<String>,

    /// Mercado Pago.
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub collection_id: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// What happened to a notification or lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationResult {
    Processed,
    Ignored,
    UnknownReference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationResponse {
    pub result: ReconciliationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_status: Option<String>,
    #[serde(default)]
    pub newly_paid: bool,
}

impl ReconciliationResponse {
    pub fn without_link(result: ReconciliationResult) -> Self {
        Self {
            result,
            reference_id: None,
            link_status: None,
            payment_status: None,
            subscription_status: None,
            newly_paid: false,
        }
    }
}

impl From<ReconciliationOutcome> for ReconciliationResponse {
    fn from(outcome: ReconciliationOutcome) -> Self {
        Self {
            result: ReconciliationResult::Processed,
            reference_id: Some(outcome.link.reference_id),
            link_status: Some(outcome.link.status.as_str().to_string()),
            payment_status: outcome
                .status
                .and_then(|s| serde_json::to_value(s).ok())
                .and_then(|v| v.as_str().map(str::to_string)),
            subscription_status: outcome.subscription.map(|s| s.status.as_str().to_string()),
            newly_paid: outcome.newly_paid,
        }
    }
}

/// Error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error_code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}
