//! Payer contact extraction from gateway payloads.
//!
//! Gateways put payer details in different places. Each extractor knows one
//! shape; they are tried in order and the first non-empty result wins.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Contact details of whoever paid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayerInfo {
    pub email: Option<String>,
    pub name: Option<String>,
}

impl PayerInfo {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.name.is_none()
    }
}

pub type PayerExtractor = fn(&Value) -> Option<PayerInfo>;

/// Extractors in priority order.
pub const PAYER_EXTRACTORS: &[PayerExtractor] =
    &[top_level_payer, additional_info_payer, flow_payer_email];

/// Runs [`PAYER_EXTRACTORS`] against `payload`.
pub fn extract_payer(payload: &Value) -> Option<PayerInfo> {
    PAYER_EXTRACTORS.iter().find_map(|extract| extract(payload))
}

fn non_blank(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn payer_object(payer: &Value) -> Option<PayerInfo> {
    let obj = payer.as_object()?;
    let first = non_blank(obj.get("first_name"));
    let last = non_blank(obj.get("last_name"));
    let name = match (first, last) {
        (Some(f), Some(l)) => Some(format!("{} {}", f, l)),
        (Some(n), None) | (None, Some(n)) => Some(n),
        (None, None) => non_blank(obj.get("name")),
    };
    let info = PayerInfo {
        email: non_blank(obj.get("email")),
        name,
    };
    (!info.is_empty()).then_some(info)
}

/// `{"payer": {"email": .., "first_name": .., "last_name": ..}}`
pub fn top_level_payer(payload: &Value) -> Option<PayerInfo> {
    payload.get("payer").and_then(payer_object)
}

/// `{"additional_info": {"payer": {...}}}`
pub fn additional_info_payer(payload: &Value) -> Option<PayerInfo> {
    payload
        .get("additional_info")
        .and_then(|info| info.get("payer"))
        .and_then(payer_object)
}

/// Flow's `{"payer": "someone@example.com"}`.
pub fn flow_payer_email(payload: &Value) -> Option<PayerInfo> {
    let email = non_blank(payload.get("payer"))?;
    Some(PayerInfo {
        email: Some(email),
        name: None,
    })
}
