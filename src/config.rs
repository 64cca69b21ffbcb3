//! Runtime configuration read from the environment (and `.env`, if present).

use crate::infrastructure::exchange_rates::DEFAULT_BASE_URL;
use std::env;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the exchange-rate API; the base currency is appended.
    pub exchange_rate_url: String,
    pub exchange_rate_ttl: Duration,
    pub exchange_rate_timeout: Duration,
    /// Sender id for SMS. `None` means SMS is not configured.
    pub sms_sender: Option<String>,
    /// Default filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exchange_rate_url: DEFAULT_BASE_URL.to_string(),
            exchange_rate_ttl: Duration::from_secs(3600),
            exchange_rate_timeout: Duration::from_secs(5),
            sms_sender: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; unset keys take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            exchange_rate_url: var("EXCHANGE_RATE_URL").unwrap_or(defaults.exchange_rate_url),
            exchange_rate_ttl: match var("EXCHANGE_RATE_TTL_SECS") {
                Some(raw) => seconds("EXCHANGE_RATE_TTL_SECS", &raw)?,
                None => defaults.exchange_rate_ttl,
            },
            exchange_rate_timeout: match var("EXCHANGE_RATE_TIMEOUT_SECS") {
                Some(raw) => seconds("EXCHANGE_RATE_TIMEOUT_SECS", &raw)?,
                None => defaults.exchange_rate_timeout,
            },
            sms_sender: var("SMS_SENDER"),
            log_level: var("LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }
}

fn seconds(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
        reason: "expected a whole number of seconds",
    })?;
    if secs == 0 {
        return Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
            reason: "must be greater than zero",
        });
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.exchange_rate_url, "https://open.er-api.com/v6/latest/");
        assert_eq!(config.exchange_rate_ttl, Duration::from_secs(3600));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("EXCHANGE_RATE_URL", "http://localhost:9000/latest/"),
            ("EXCHANGE_RATE_TTL_SECS", "60"),
            ("SMS_SENDER", "SETTLE"),
            ("LOG_LEVEL", "debug"),
        ]))
        .unwrap();

        assert_eq!(config.exchange_rate_url, "http://localhost:9000/latest/");
        assert_eq!(config.exchange_rate_ttl, Duration::from_secs(60));
        assert_eq!(config.exchange_rate_timeout, Duration::from_secs(5));
        assert_eq!(config.sms_sender.as_deref(), Some("SETTLE"));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        let err = Config::from_lookup(lookup(&[("EXCHANGE_RATE_TTL_SECS", "soon")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "EXCHANGE_RATE_TTL_SECS",
                ..
            }
        ));

        let zero = Config::from_lookup(lookup(&[("EXCHANGE_RATE_TIMEOUT_SECS", "0")]));
        assert!(zero.is_err());
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup(&[("SMS_SENDER", "  ")])).unwrap();
        assert!(config.sms_sender.is_none());
    }
}
