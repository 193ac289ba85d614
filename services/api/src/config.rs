//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use storefront_core::services::StatusPolicy;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where the storefront keeps its records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(format!("'{}' is not one of postgres, memory", other)),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub storage_backend: StorageBackend,
    /// Required when `storage_backend` is Postgres.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub log_level: Level,
    pub cors_origin: String,
    pub session_ttl_days: i64,
    pub cookie_secure: bool,
    pub shipping_fee: Decimal,
    pub currency: String,
    pub stripe_secret_key: Option<String>,
    pub stripe_api_base: String,
    pub gateway_timeout: Duration,
    pub simulated_gateway_delay: Duration,
    pub order_status_policy: StatusPolicy,
    pub restock_on_cancel: bool,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        // --- Server and Storage ---
        let bind_address: SocketAddr = vars.parse_or("BIND_ADDRESS", "0.0.0.0:5000")?;
        let storage_backend: StorageBackend = vars.parse_or("STORAGE_BACKEND", "postgres")?;
        let database_url = vars.get("DATABASE_URL");
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingVar("DATABASE_URL".to_string()));
        }
        let database_max_connections: u32 = vars.parse_or("DATABASE_MAX_CONNECTIONS", "5")?;
        let log_level: Level = vars.parse_or("RUST_LOG", "INFO")?;

        // --- HTTP and Sessions ---
        let cors_origin = vars
            .get("CORS_ORIGIN")
            .unwrap_or_else(|| "http://localhost:5173".to_string());
        let session_ttl_days: i64 = vars.parse_or("SESSION_TTL_DAYS", "7")?;
        if session_ttl_days <= 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_TTL_DAYS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let cookie_secure = vars.flag("COOKIE_SECURE", false)?;

        // --- Checkout ---
        let shipping_fee: Decimal = vars.parse_or("SHIPPING_FEE", "5.00")?;
        if shipping_fee.is_sign_negative() {
            return Err(ConfigError::InvalidValue(
                "SHIPPING_FEE".to_string(),
                "must not be negative".to_string(),
            ));
        }
        let currency = vars
            .get("CURRENCY")
            .unwrap_or_else(|| "usd".to_string())
            .to_lowercase();
        let order_status_policy: StatusPolicy =
            vars.parse_or("ORDER_STATUS_POLICY", "forward_only")?;
        let restock_on_cancel = vars.flag("RESTOCK_ON_CANCEL", false)?;

        // --- Payment Gateway ---
        let stripe_secret_key = vars.get("STRIPE_SECRET_KEY");
        let stripe_api_base = vars
            .get("STRIPE_API_BASE")
            .unwrap_or_else(|| "https://api.stripe.com".to_string());
        let gateway_timeout = Duration::from_secs(vars.parse_or("GATEWAY_TIMEOUT_SECS", "10")?);
        let simulated_gateway_delay =
            Duration::from_millis(vars.parse_or("SIMULATED_GATEWAY_DELAY_MS", "500")?);

        Ok(Self {
            bind_address,
            storage_backend,
            database_url,
            database_max_connections,
            log_level,
            cors_origin,
            session_ttl_days,
            cookie_secure,
            shipping_fee,
            currency,
            stripe_secret_key,
            stripe_api_base,
            gateway_timeout,
            simulated_gateway_delay,
            order_status_policy,
            restock_on_cancel,
        })
    }
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Blank values count as unset.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn parse_or<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.get(key).unwrap_or_else(|| default.to_string());
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), format!("'{}': {}", raw, e)))
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::InvalidValue(
                    key.to_string(),
                    format!("'{}' is not a boolean", raw),
                )),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_for_the_memory_backend() {
        let config = load(&[("STORAGE_BACKEND", "memory")]).unwrap();

        assert_eq!(config.bind_address, "0.0.0.0:5000".parse().unwrap());
        assert_eq!(config.storage_backend, StorageBackend::Memory);
        assert_eq!(config.shipping_fee, Decimal::new(500, 2));
        assert_eq!(config.currency, "usd");
        assert_eq!(config.session_ttl_days, 7);
        assert_eq!(config.gateway_timeout, Duration::from_secs(10));
        assert_eq!(config.order_status_policy, StatusPolicy::ForwardOnly);
        assert!(!config.restock_on_cancel);
        assert!(!config.cookie_secure);
        assert!(config.stripe_secret_key.is_none());
    }

    #[test]
    fn postgres_requires_a_database_url() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingVar(v)) if v == "DATABASE_URL"));
        assert!(load(&[("DATABASE_URL", "postgres://localhost/shop")]).is_ok());
    }

    #[test]
    fn rejects_malformed_values() {
        let bad = [
            ("SHIPPING_FEE", "five"),
            ("SHIPPING_FEE", "-1"),
            ("ORDER_STATUS_POLICY", "strict"),
            ("RESTOCK_ON_CANCEL", "maybe"),
            ("GATEWAY_TIMEOUT_SECS", "-3"),
            ("BIND_ADDRESS", "localhost"),
        ];
        for (key, value) in bad {
            let result = load(&[("STORAGE_BACKEND", "memory"), (key, value)]);
            assert!(
                matches!(&result, Err(ConfigError::InvalidValue(k, _)) if k == key),
                "{key}={value} gave {result:?}"
            );
        }
    }

    #[test]
    fn reads_overrides() {
        let config = load(&[
            ("STORAGE_BACKEND", "memory"),
            ("SHIPPING_FEE", "0"),
            ("ORDER_STATUS_POLICY", "permissive"),
            ("RESTOCK_ON_CANCEL", "true"),
            ("STRIPE_SECRET_KEY", "sk_test_123"),
            ("CURRENCY", "INR"),
        ])
        .unwrap();

        assert_eq!(config.shipping_fee, Decimal::ZERO);
        assert_eq!(config.order_status_policy, StatusPolicy::Permissive);
        assert!(config.restock_on_cancel);
        assert_eq!(config.stripe_secret_key.as_deref(), Some("sk_test_123"));
        assert_eq!(config.currency, "inr");
    }
}
