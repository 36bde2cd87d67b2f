//! API configuration
//!
//! Loaded from `API_`-prefixed environment variables; nested sections use a
//! double underscore, e.g. `API_LEDGER__GATEWAY_EXPIRY_MINUTES=45` or
//! `API_GATEWAY__HASH_SECRET=...`.

use chrono::Duration;
use serde::Deserialize;

use core_kernel::{CoreError, Currency};
use domain_billing::{LedgerConfig, RetryPolicy, VnpayConfig};
use infra_db::DatabaseConfig;

/// Where ledger data is kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Ledger tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// ISO 4217 code of the ledger currency
    pub currency: String,
    pub max_retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub gateway_expiry_minutes: i64,
    /// How often the server runs the expiry sweep; 0 disables it
    pub sweep_interval_secs: u64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            currency: Currency::VND.code().to_string(),
            max_retry_attempts: retry.max_attempts,
            retry_base_delay_ms: retry.base_delay_ms,
            gateway_expiry_minutes: 30,
            sweep_interval_secs: 60,
        }
    }
}

/// API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    /// Secret for verifying bearer tokens
    pub jwt_secret: String,
    /// Longest bearer token lifetime (`exp - iat`) the API accepts
    pub jwt_max_lifetime_secs: u64,
    pub storage: StorageBackend,
    pub database: DatabaseConfig,
    pub ledger: LedgerSettings,
    /// VNPAY merchant settings; gateway checkout is disabled without them
    pub gateway: Option<VnpayConfig>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_max_lifetime_secs: 3600,
            storage: StorageBackend::Memory,
            database: DatabaseConfig::default(),
            ledger: LedgerSettings::default(),
            gateway: None,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::with_prefix("API")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Rejects settings the server cannot run with
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.jwt_secret.len() < 16 {
            return Err(CoreError::configuration("jwt_secret", "must be at least 16 characters"));
        }
        if self.jwt_max_lifetime_secs == 0 {
            return Err(CoreError::configuration("jwt_max_lifetime_secs", "must be positive"));
        }
        if self.ledger.max_retry_attempts == 0 {
            return Err(CoreError::configuration("ledger.max_retry_attempts", "must be at least 1"));
        }
        if self.ledger.gateway_expiry_minutes <= 0 {
            return Err(CoreError::configuration("ledger.gateway_expiry_minutes", "must be positive"));
        }
        if let Some(gateway) = &self.gateway {
            if gateway.tmn_code.is_empty() || gateway.hash_secret.is_empty() {
                return Err(CoreError::configuration(
                    "gateway",
                    "tmn_code and hash_secret are required",
                ));
            }
        }
        self.ledger_config().map(|_| ())
    }

    /// Ledger settings in domain form
    pub fn ledger_config(&self) -> Result<LedgerConfig, CoreError> {
        let currency: Currency = self.ledger.currency.parse()?;
        Ok(LedgerConfig {
            currency,
            retry: RetryPolicy {
                max_attempts: self.ledger.max_retry_attempts,
                base_delay_ms: self.ledger.retry_base_delay_ms,
            },
            gateway_expiry: Duration::minutes(self.ledger.gateway_expiry_minutes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ApiConfig {
        ApiConfig {
            jwt_secret: "a-secret-long-enough".to_string(),
            ..ApiConfig::default()
        }
    }

    #[test]
    fn test_defaults_are_valid_once_secret_is_set() {
        let config = valid();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.server_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_short_secret_is_rejected() {
        let config = ApiConfig {
            jwt_secret: "short".to_string(),
            ..ApiConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CoreError::Configuration { setting: "jwt_secret", .. })
        ));
    }

    #[test]
    fn test_zero_token_lifetime_is_rejected() {
        let mut config = valid();
        config.jwt_max_lifetime_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(CoreError::Configuration { setting: "jwt_max_lifetime_secs", .. })
        ));
    }

    #[test]
    fn test_unknown_currency_is_rejected() {
        let mut config = valid();
        config.ledger.currency = "XYZ".to_string();
        assert!(matches!(config.validate(), Err(CoreError::Money(_))));
    }

    #[test]
    fn test_ledger_config_carries_settings() {
        let mut config = valid();
        config.ledger.max_retry_attempts = 3;
        config.ledger.gateway_expiry_minutes = 45;

        let ledger = config.ledger_config().unwrap();
        assert_eq!(ledger.currency, Currency::VND);
        assert_eq!(ledger.retry.max_attempts, 3);
        assert_eq!(ledger.gateway_expiry, Duration::minutes(45));
    }

    #[test]
    fn test_deserializes_nested_sections() {
        let config: ApiConfig = serde_json::from_str(
            r#"{
                "port": 9000,
                "storage": "postgres",
                "log_format": "json",
                "ledger": { "gateway_expiry_minutes": 15 },
                "gateway": {
                    "tmn_code": "DEMO0001",
                    "hash_secret": "SECRET",
                    "payment_url": "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html",
                    "return_url": "https://dealer.example/return"
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.storage, StorageBackend::Postgres);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.ledger.gateway_expiry_minutes, 15);
        assert_eq!(config.ledger.max_retry_attempts, 5);
        assert_eq!(config.gateway.unwrap().expire_minutes, 15);
    }
}
