//! Payment gateway configuration (Mercado Pago, Flow)

use serde::Deserialize;

use super::error::ValidationError;

/// Payment configuration
///
/// A gateway is enabled when its credentials are present. Callback URLs
/// default to paths under `site_url`.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Public base URL of this service
    #[serde(default = "default_site_url")]
    pub site_url: String,

    /// Mercado Pago access token
    pub mercadopago_access_token: Option<String>,

    /// Secret for `x-signature` verification; unset skips the check
    pub mercadopago_webhook_secret: Option<String>,

    pub mercadopago_notify_url: Option<String>,

    /// Send payers to the sandbox checkout
    #[serde(default)]
    pub mercadopago_sandbox: bool,

    #[serde(default = "default_flow_api_url")]
    pub flow_api_url: String,

    pub flow_api_key: Option<String>,

    pub flow_secret_key: Option<String>,

    /// Flow `urlConfirmation`
    pub flow_confirmation_url: Option<String>,

    /// Flow `urlReturn`; also the Mercado Pago back URL
    pub flow_return_url: Option<String>,

    /// Payer e-mail sent to Flow when none is known
    pub flow_fallback_email: Option<String>,
}

impl PaymentConfig {
    pub fn mercadopago_enabled(&self) -> bool {
        present(&self.mercadopago_access_token)
    }

    pub fn flow_enabled(&self) -> bool {
        present(&self.flow_api_key) && present(&self.flow_secret_key)
    }

    pub fn mercadopago_notify_url(&self) -> String {
        self.mercadopago_notify_url
            .clone()
            .unwrap_or_else(|| self.site_path("/webhooks/mercadopago"))
    }

    pub fn flow_notify_url(&self) -> String {
        self.flow_confirmation_url
            .clone()
            .unwrap_or_else(|| self.site_path("/webhooks/flow"))
    }

    pub fn return_url(&self) -> String {
        self.flow_return_url
            .clone()
            .unwrap_or_else(|| self.site_path("/payments/return"))
    }

    fn site_path(&self, path: &str) -> String {
        format!("{}{}", self.site_url.trim_end_matches('/'), path)
    }

    /// Validate payment configuration
    pub fn validate(&self, production: bool) -> Result<(), ValidationError> {
        if !is_http_url(&self.site_url) {
            return Err(ValidationError::InvalidUrl("site_url"));
        }
        if !is_http_url(&self.flow_api_url) {
            return Err(ValidationError::InvalidUrl("flow_api_url"));
        }
        if present(&self.flow_api_key) && !present(&self.flow_secret_key) {
            return Err(ValidationError::MissingRequired("FLOW_SECRET_KEY"));
        }
        for (name, url) in [
            ("mercadopago_notify_url", self.mercadopago_notify_url()),
            ("flow_confirmation_url", self.flow_notify_url()),
            ("flow_return_url", self.return_url()),
        ] {
            if !is_http_url(&url) {
                return Err(ValidationError::InvalidUrl(name));
            }
        }

        if production {
            if !self.mercadopago_enabled() && !self.flow_enabled() {
                return Err(ValidationError::NoGatewayConfigured);
            }
            if !self.site_url.starts_with("https://") {
                return Err(ValidationError::HttpsRequired("site_url"));
            }
            if self.mercadopago_enabled() && !present(&self.mercadopago_webhook_secret) {
                return Err(ValidationError::MissingRequired("MERCADOPAGO_WEBHOOK_SECRET"));
            }
        }
        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            site_url: default_site_url(),
            mercadopago_access_token: None,
            mercadopago_webhook_secret: None,
            mercadopago_notify_url: None,
            mercadopago_sandbox: false,
            flow_api_url: default_flow_api_url(),
            flow_api_key: None,
            flow_secret_key: None,
            flow_confirmation_url: None,
            flow_return_url: None,
            flow_fallback_email: None,
        }
    }
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().map_or(false, |v| !v.trim().is_empty())
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn default_site_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_flow_api_url() -> String {
    "https://www.flow.cl/api".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_urls_default_to_site_paths() {
        let config = PaymentConfig {
            site_url: "https://billing.forgeapp.cl/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.mercadopago_notify_url(),
            "https://billing.forgeapp.cl/webhooks/mercadopago"
        );
        assert_eq!(config.flow_notify_url(), "https://billing.forgeapp.cl/webhooks/flow");
        assert_eq!(config.return_url(), "https://billing.forgeapp.cl/payments/return");
    }

    #[test]
    fn test_gateway_enabled_by_credentials() {
        let config = PaymentConfig {
            mercadopago_access_token: Some("APP_USR-1".to_string()),
            flow_api_key: Some("key".to_string()),
            ..Default::default()
        };
        assert!(config.mercadopago_enabled());
        assert!(!config.flow_enabled());
    }

    #[test]
    fn test_flow_key_requires_secret() {
        let config = PaymentConfig {
            flow_api_key: Some("key".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.validate(false),
            Err(ValidationError::MissingRequired("FLOW_SECRET_KEY"))
        );
    }

    #[test]
    fn test_production_requires_a_gateway_and_https() {
        let config = PaymentConfig::default();
        assert!(config.validate(false).is_ok());
        assert_eq!(config.validate(true), Err(ValidationError::NoGatewayConfigured));

        let config = PaymentConfig {
            mercadopago_access_token: Some("APP_USR-1".to_string()),
            mercadopago_webhook_secret: Some("whsec".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.validate(true),
            Err(ValidationError::HttpsRequired("site_url"))
        );
    }
}
