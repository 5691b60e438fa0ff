//! Client configuration.
//!
//! Every setting has a default; `from_env` overrides them from `STOCKROOM_*`
//! environment variables.

use std::time::Duration;

use stockroom_inventory::{DashboardSettings, PricePolicy};
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://localhost:5000";
pub const DEFAULT_UNDO_GRACE: Duration = Duration::from_millis(5000);
pub const DEFAULT_NOTICE_TTL: Duration = Duration::from_millis(3000);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(10_000);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: '{value}' ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the item store (without the `/api/items` suffix).
    pub api_url: String,
    /// How long a single delete stays undoable before it is sent to the store.
    pub undo_grace: Duration,
    pub notice_ttl: Duration,
    pub request_timeout: Duration,
    pub dashboard: DashboardSettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            undo_grace: DEFAULT_UNDO_GRACE,
            notice_ttl: DEFAULT_NOTICE_TTL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            dashboard: DashboardSettings::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("STOCKROOM_API_URL") {
            let url = url.trim().trim_end_matches('/').to_string();
            if url.is_empty() {
                return Err(invalid("STOCKROOM_API_URL", &url, "must not be empty"));
            }
            config.api_url = url;
        }
        if let Some(v) = lookup("STOCKROOM_UNDO_GRACE_MS") {
            config.undo_grace = parse_millis("STOCKROOM_UNDO_GRACE_MS", &v)?;
        }
        if let Some(v) = lookup("STOCKROOM_NOTICE_TTL_MS") {
            config.notice_ttl = parse_millis("STOCKROOM_NOTICE_TTL_MS", &v)?;
        }
        if let Some(v) = lookup("STOCKROOM_REQUEST_TIMEOUT_MS") {
            config.request_timeout = parse_millis("STOCKROOM_REQUEST_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("STOCKROOM_LOW_STOCK") {
            let threshold: f64 = v
                .trim()
                .parse()
                .map_err(|_| invalid("STOCKROOM_LOW_STOCK", &v, "expected a number"))?;
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(invalid("STOCKROOM_LOW_STOCK", &v, "must be non-negative"));
            }
            config.dashboard.low_stock_threshold = threshold;
        }
        if let Some(v) = lookup("STOCKROOM_PRICE_POLICY") {
            config.dashboard.price_policy = v
                .parse::<PricePolicy>()
                .map_err(|e| invalid("STOCKROOM_PRICE_POLICY", &v, &e.to_string()))?;
        }

        Ok(config)
    }

    pub fn items_url(&self) -> String {
        format!("{}/api/items", self.api_url)
    }
}

fn parse_millis(var: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| invalid(var, raw, "expected milliseconds"))
}

fn invalid(var: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
