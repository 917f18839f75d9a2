//! Engine configuration loaded from environment variables.
//!
//! Every variable is optional:
//! - `CHECKOUT_FREE_SHIPPING_THRESHOLD` - items total above which shipping is free (default: 1000)
//! - `CHECKOUT_FLAT_SHIPPING_FEE` - shipping fee otherwise (default: 50)
//! - `CHECKOUT_TAX_RATE` - fraction of the items total charged as tax (default: 0)
//! - `CHECKOUT_LOCK_TIMEOUT_MS` - bound on stock lock acquisition (default: 2000)
//! - `CHECKOUT_RETRY_MAX_ATTEMPTS` - attempts for follow-up work (default: 3)
//! - `CHECKOUT_RETRY_INITIAL_DELAY_MS` - first backoff delay (default: 100)
//! - `CHECKOUT_STORAGE` - `memory` or `scylla` (default: memory)
//! - `SCYLLA_NODE` - contact point (default: 127.0.0.1:9042)
//! - `SCYLLA_KEYSPACE` - keyspace for orders and carts (default: storefront_ks)
//! - `METRICS_PORT` - port of the /metrics endpoint (default: 9090)

use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::checkout::CheckoutConfig;
use crate::ledger::LedgerConfig;
use crate::pricing::PricingConfig;
use crate::utils::{CircuitBreakerConfig, RetryConfig};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Scylla,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "scylla" | "scylladb" => Ok(StorageBackend::Scylla),
            other => Err(format!("expected memory or scylla, got {other:?}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScyllaConfig {
    pub node: String,
    pub keyspace: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub pricing: PricingConfig,
    pub lock_timeout: Duration,
    pub retry: RetryConfig,
    pub storage: StorageBackend,
    pub scylla: ScyllaConfig,
    pub metrics_port: u16,
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = PricingConfig::default();
        let pricing = PricingConfig {
            free_shipping_threshold: parse_or(
                &lookup,
                "CHECKOUT_FREE_SHIPPING_THRESHOLD",
                defaults.free_shipping_threshold,
            )?,
            flat_shipping_fee: parse_or(&lookup, "CHECKOUT_FLAT_SHIPPING_FEE", defaults.flat_shipping_fee)?,
            tax_rate: parse_or(&lookup, "CHECKOUT_TAX_RATE", defaults.tax_rate)?,
        };
        for (name, value) in [
            ("CHECKOUT_FREE_SHIPPING_THRESHOLD", pricing.free_shipping_threshold),
            ("CHECKOUT_FLAT_SHIPPING_FEE", pricing.flat_shipping_fee),
            ("CHECKOUT_TAX_RATE", pricing.tax_rate),
        ] {
            if value.is_sign_negative() && !value.is_zero() {
                return Err(ConfigError::InvalidEnvVar(name.to_string(), "must not be negative".into()));
            }
        }

        let lock_timeout = Duration::from_millis(parse_or(&lookup, "CHECKOUT_LOCK_TIMEOUT_MS", 2000u64)?);

        let max_attempts: u32 = parse_or(&lookup, "CHECKOUT_RETRY_MAX_ATTEMPTS", 3)?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "CHECKOUT_RETRY_MAX_ATTEMPTS".to_string(),
                "must be at least 1".into(),
            ));
        }
        let retry = RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(parse_or(&lookup, "CHECKOUT_RETRY_INITIAL_DELAY_MS", 100u64)?),
            ..RetryConfig::default()
        };

        let storage = parse_or(&lookup, "CHECKOUT_STORAGE", StorageBackend::Memory)?;
        let scylla = ScyllaConfig {
            node: lookup("SCYLLA_NODE").unwrap_or_else(|| "127.0.0.1:9042".to_string()),
            keyspace: lookup("SCYLLA_KEYSPACE").unwrap_or_else(|| "storefront_ks".to_string()),
        };
        let metrics_port = parse_or(&lookup, "METRICS_PORT", 9090u16)?;

        Ok(Self {
            pricing,
            lock_timeout,
            retry,
            storage,
            scylla,
            metrics_port,
        })
    }

    pub fn checkout_config(&self) -> CheckoutConfig {
        CheckoutConfig {
            pricing: self.pricing.clone(),
            ledger: LedgerConfig {
                lock_timeout: self.lock_timeout,
                retry: RetryConfig {
                    max_attempts: self.retry.max_attempts.max(RetryConfig::for_compensation().max_attempts),
                    ..self.retry.clone()
                },
            },
            follow_up_retry: self.retry.clone(),
            order_store_breaker: CircuitBreakerConfig::default(),
        }
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(name.to_string(), e.to_string())),
        _ => Ok(default),
    }
}
