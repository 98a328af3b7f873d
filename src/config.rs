// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use crate::services::conversation::{
    ConversationSettings, DEFAULT_HISTORY_LIMIT, DEFAULT_REMINDER_DELAY_SECS,
};
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DNS_RESOLVER_URL: &str = "https://dns.google/resolve";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Shared secret the chat adapter sends in `x-webhook-secret`
    pub webhook_secret: String,
    /// Delay before re-prompting for a pending verification code
    pub reminder_delay_secs: u64,
    /// History entries shown per request (0 = all)
    pub history_limit: usize,
    /// DNS-over-HTTPS JSON endpoint used for MX checks
    pub dns_resolver_url: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            port: parse_or("PORT", DEFAULT_PORT)?,
            webhook_secret: env::var("WEBHOOK_SECRET")
                .map(|v| v.trim().to_string())
                .ok()
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing("WEBHOOK_SECRET"))?,
            reminder_delay_secs: parse_or("REMINDER_DELAY_SECS", DEFAULT_REMINDER_DELAY_SECS)?,
            history_limit: parse_or("HISTORY_LIMIT", DEFAULT_HISTORY_LIMIT)?,
            dns_resolver_url: env::var("DNS_RESOLVER_URL")
                .unwrap_or_else(|_| DEFAULT_DNS_RESOLVER_URL.to_string()),
        })
    }

    /// Config for tests.
    pub fn test_default() -> Self {
        Self {
            port: DEFAULT_PORT,
            webhook_secret: "test_webhook_secret".to_string(),
            reminder_delay_secs: DEFAULT_REMINDER_DELAY_SECS,
            history_limit: DEFAULT_HISTORY_LIMIT,
            dns_resolver_url: DEFAULT_DNS_RESOLVER_URL.to_string(),
        }
    }

    pub fn conversation_settings(&self) -> ConversationSettings {
        ConversationSettings {
            reminder_delay: Duration::from_secs(self.reminder_delay_secs),
            history_limit: self.history_limit,
        }
    }
}

/// Read `name`, falling back to `default` when unset.
fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test so env mutations do not race across test threads.
    #[test]
    fn test_config_from_env() {
        env::set_var("WEBHOOK_SECRET", " s3cret ");
        env::set_var("REMINDER_DELAY_SECS", "30");
        env::remove_var("HISTORY_LIMIT");
        env::remove_var("PORT");

        let config = Config::from_env().expect("Config should load");
        assert_eq!(config.webhook_secret, "s3cret");
        assert_eq!(config.reminder_delay_secs, 30);
        assert_eq!(config.history_limit, DEFAULT_HISTORY_LIMIT);
        assert_eq!(config.port, 8080);
        assert_eq!(
            config.conversation_settings().reminder_delay,
            Duration::from_secs(30)
        );

        env::set_var("REMINDER_DELAY_SECS", "soon");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid("REMINDER_DELAY_SECS", _))
        ));

        env::remove_var("REMINDER_DELAY_SECS");
        env::set_var("WEBHOOK_SECRET", "");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Missing("WEBHOOK_SECRET"))
        ));
        env::remove_var("WEBHOOK_SECRET");
    }
}
