//! Billing rules and job cadence

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::domain::reconciliation::Gateway;
use crate::domain::subscription::DEFAULT_GRACE_PERIOD_DAYS;

/// Billing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    /// Days past the period end before an unpaid subscription expires
    #[serde(default = "default_grace_period_days")]
    pub grace_period_days: u32,

    /// ISO currency sent to gateways
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Days a payment link stays payable
    #[serde(default = "default_payment_link_ttl_days")]
    pub payment_link_ttl_days: u32,

    /// Seconds between scheduler ticks
    #[serde(default = "default_scheduler_interval")]
    pub scheduler_interval_secs: u64,

    /// Gateway HTTP timeout in seconds
    #[serde(default = "default_gateway_timeout")]
    pub gateway_timeout_secs: u64,

    /// Gateway used when a link request names none
    #[serde(default = "default_gateway")]
    pub default_gateway: String,

    /// Let the scheduler create payment links for due subscriptions
    #[serde(default)]
    pub generate_payment_links: bool,
}

impl BillingConfig {
    pub fn scheduler_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler_interval_secs)
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }

    pub fn default_gateway(&self) -> Result<Gateway, ValidationError> {
        Gateway::parse(&self.default_gateway)
            .ok_or_else(|| ValidationError::UnknownGateway(self.default_gateway.clone()))
    }

    /// Validate billing configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.currency.len() != 3 || !self.currency.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(ValidationError::InvalidBillingSetting("currency"));
        }
        if self.payment_link_ttl_days == 0 {
            return Err(ValidationError::InvalidBillingSetting("payment_link_ttl_days"));
        }
        if self.scheduler_interval_secs == 0 {
            return Err(ValidationError::InvalidBillingSetting("scheduler_interval_secs"));
        }
        if self.gateway_timeout_secs == 0 || self.gateway_timeout_secs > 120 {
            return Err(ValidationError::InvalidBillingSetting("gateway_timeout_secs"));
        }
        self.default_gateway()?;
        Ok(())
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            grace_period_days: default_grace_period_days(),
            currency: default_currency(),
            payment_link_ttl_days: default_payment_link_ttl_days(),
            scheduler_interval_secs: default_scheduler_interval(),
            gateway_timeout_secs: default_gateway_timeout(),
            default_gateway: default_gateway(),
            generate_payment_links: false,
        }
    }
}

fn default_grace_period_days() -> u32 {
    DEFAULT_GRACE_PERIOD_DAYS
}

fn default_currency() -> String {
    "CLP".to_string()
}

fn default_payment_link_ttl_days() -> u32 {
    7
}

fn default_scheduler_interval() -> u64 {
    3600
}

fn default_gateway_timeout() -> u64 {
    30
}

fn default_gateway() -> String {
    "mercadopago".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = BillingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.grace_period_days, 15);
        assert_eq!(config.payment_link_ttl_days, 7);
        assert_eq!(config.default_gateway().unwrap(), Gateway::MercadoPago);
    }

    #[test]
    fn test_currency_must_be_iso_code() {
        let config = BillingConfig {
            currency: "pesos".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidBillingSetting("currency"))
        );
    }

    #[test]
    fn test_unknown_default_gateway() {
        let config = BillingConfig {
            default_gateway: "paypal".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::UnknownGateway("paypal".to_string()))
        );
    }
}
