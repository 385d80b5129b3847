//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables with the
//! `config` and `dotenvy` crates. Variables use the `FORGEAPP` prefix and
//! `__` between nesting levels.
//!
//! # Example
//!
//! ```no_run
//! use forgeapp_billing::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod billing;
mod database;
mod error;
mod payment;
mod server;

pub use billing::BillingConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use payment::PaymentConfig;
pub use server::{Environment, LogFormat, ServerConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Every section has defaults, so an empty environment yields a
/// development setup on the in-memory adapters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment, logging)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (PostgreSQL connection)
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Billing rules and scheduler cadence
    #[serde(default)]
    pub billing: BillingConfig,

    /// Gateway credentials and callback URLs
    #[serde(default)]
    pub payment: PaymentConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `FORGEAPP` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// - `FORGEAPP__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `FORGEAPP__BILLING__GRACE_PERIOD_DAYS=15` -> `billing.grace_period_days = 15`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("FORGEAPP")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.billing.validate()?;
        self.payment.validate(self.is_production())?;
        if self.is_production() && !self.database.is_configured() {
            return Err(ValidationError::MissingRequired("DATABASE_URL"));
        }
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "FORGEAPP__DATABASE__URL",
        "FORGEAPP__SERVER__PORT",
        "FORGEAPP__SERVER__ENVIRONMENT",
        "FORGEAPP__SERVER__LOG_FORMAT",
        "FORGEAPP__BILLING__GRACE_PERIOD_DAYS",
        "FORGEAPP__BILLING__DEFAULT_GATEWAY",
        "FORGEAPP__PAYMENT__MERCADOPAGO_ACCESS_TOKEN",
        "FORGEAPP__PAYMENT__FLOW_API_KEY",
        "FORGEAPP__PAYMENT__FLOW_SECRET_KEY",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_empty_environment_loads_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let config = AppConfig::load().unwrap();

        assert_eq!(config.server.port, 8080);
        assert!(!config.database.is_configured());
        assert_eq!(config.billing.grace_period_days, 15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("FORGEAPP__DATABASE__URL", "postgresql://test@localhost/billing");
        env::set_var("FORGEAPP__SERVER__PORT", "3000");
        env::set_var("FORGEAPP__SERVER__LOG_FORMAT", "json");
        env::set_var("FORGEAPP__BILLING__GRACE_PERIOD_DAYS", "10");
        env::set_var("FORGEAPP__PAYMENT__FLOW_API_KEY", "flow-key");
        env::set_var("FORGEAPP__PAYMENT__FLOW_SECRET_KEY", "flow-secret");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.database.url, "postgresql://test@localhost/billing");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.log_format, LogFormat::Json);
        assert_eq!(config.billing.grace_period_days, 10);
        assert!(config.payment.flow_enabled());
    }

    #[test]
    fn test_production_requires_database() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("FORGEAPP__SERVER__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        let mut config = result.unwrap();
        assert!(config.is_production());
        config.payment.site_url = "https://billing.forgeapp.cl".to_string();
        config.payment.flow_api_key = Some("k".to_string());
        config.payment.flow_secret_key = Some("s".to_string());
        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingRequired("DATABASE_URL"))
        );
    }

    #[test]
    fn test_invalid_default_gateway_fails_validation() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("FORGEAPP__BILLING__DEFAULT_GATEWAY", "paypal");
        let result = AppConfig::load();
        clear_env();

        assert!(result.unwrap().validate().is_err());
    }
}
