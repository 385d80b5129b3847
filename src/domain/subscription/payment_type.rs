//! Billing cadence.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{next_annual_date, next_monthly_date};

/// How often a subscription is charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Monthly,
    Annual,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Monthly => "monthly",
            PaymentType::Annual => "annual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "monthly" => Some(PaymentType::Monthly),
            "annual" => Some(PaymentType::Annual),
            _ => None,
        }
    }

    /// Two-letter prefix used in subscription reference ids.
    pub fn reference_prefix(&self) -> &'static str {
        match self {
            PaymentType::Monthly => "ME",
            PaymentType::Annual => "AN",
        }
    }

    /// Next billing date after `today` for a subscription anchored on `anchor`.
    pub fn next_billing_date(&self, anchor: NaiveDate, today: NaiveDate) -> NaiveDate {
        match self {
            PaymentType::Monthly => next_monthly_date(anchor, today),
            PaymentType::Annual => next_annual_date(anchor, today),
        }
    }

    /// Human label used in payment descriptions.
    pub fn label(&self) -> &'static str {
        match self {
            PaymentType::Monthly => "Mensual",
            PaymentType::Annual => "Anual",
        }
    }
}
