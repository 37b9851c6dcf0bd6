//! Client configuration loaded from environment variables.
//!
//! Every field has a default so the client runs against a local database
//! with zero configuration.

use std::path::PathBuf;
use std::time::Duration;

use bizmatch_shared::constants::{
    DEFAULT_REFRESH_SECS, MAX_RETRIES, RETRY_BASE_DELAY_MS, ROUTE_SIGN_IN,
};

use crate::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// SQLite file backing the local server.
    /// Env: `BIZMATCH_DB_PATH`
    /// Default: platform data dir.
    pub db_path: Option<PathBuf>,

    /// Env: `BIZMATCH_MAX_RETRIES`, `BIZMATCH_RETRY_BASE_MS`
    /// Default: 3 attempts, 1000 ms base delay.
    pub retry: RetryPolicy,

    /// Where the UI is sent after a forced sign-out.
    /// Env: `BIZMATCH_SIGN_IN_ROUTE`
    /// Default: `/sign-in`
    pub sign_in_route: String,

    /// Polling interval for live lists.
    /// Env: `BIZMATCH_REFRESH_SECS` (0 disables polling)
    /// Default: 30 s
    pub refresh_interval: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            retry: RetryPolicy {
                max_attempts: MAX_RETRIES,
                base_backoff_ms: RETRY_BASE_DELAY_MS,
            },
            sign_in_route: ROUTE_SIGN_IN.to_string(),
            refresh_interval: Some(Duration::from_secs(DEFAULT_REFRESH_SECS)),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = var("BIZMATCH_DB_PATH").filter(|p| !p.is_empty()) {
            config.db_path = Some(PathBuf::from(path));
        }

        if let Some(val) = var("BIZMATCH_MAX_RETRIES") {
            match val.parse::<u32>() {
                Ok(n) if n > 0 => config.retry.max_attempts = n,
                _ => tracing::warn!(value = %val, "Invalid BIZMATCH_MAX_RETRIES, using default"),
            }
        }

        if let Some(val) = var("BIZMATCH_RETRY_BASE_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                config.retry.base_backoff_ms = ms;
            } else {
                tracing::warn!(value = %val, "Invalid BIZMATCH_RETRY_BASE_MS, using default");
            }
        }

        if let Some(route) = var("BIZMATCH_SIGN_IN_ROUTE") {
            if route.starts_with('/') {
                config.sign_in_route = route;
            } else {
                tracing::warn!(value = %route, "BIZMATCH_SIGN_IN_ROUTE must start with '/', using default");
            }
        }

        if let Some(val) = var("BIZMATCH_REFRESH_SECS") {
            match val.parse::<u64>() {
                Ok(0) => config.refresh_interval = None,
                Ok(secs) => config.refresh_interval = Some(Duration::from_secs(secs)),
                Err(_) => {
                    tracing::warn!(value = %val, "Invalid BIZMATCH_REFRESH_SECS, using default")
                }
            }
        }

        config
    }
}
