//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `base_url` is not an absolute http(s) URL ending in `/`
    /// - `user_agent` is empty
    /// - `http_timeout_ms` or `timeouts.page_load_ms` is outside 100ms..=5min
    /// - `retry.max_attempts` is 0 or above 10
    /// - `terms.max_terms` is 0 or `terms.tooltip_selectors` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("https://") || self.base_url.starts_with("http://")) {
            return Err(invalid("base_url", "must be an absolute http(s) URL"));
        }
        if !self.base_url.ends_with('/') {
            return Err(invalid("base_url", "must end with '/'"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        let request_budgets =
            [("http_timeout_ms", self.http_timeout_ms), ("timeouts.page_load_ms", self.timeouts.page_load_ms)];
        for (field, value) in request_budgets {
            if value < 100 {
                return Err(invalid(field, "must be at least 100ms"));
            }
            if value > 300_000 {
                return Err(invalid(field, "must not exceed 5 minutes (300000ms)"));
            }
        }

        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "must be at least 1"));
        }
        if self.retry.max_attempts > 10 {
            return Err(invalid("retry.max_attempts", "must not exceed 10"));
        }

        if self.terms.max_terms == 0 {
            return Err(invalid("terms.max_terms", "must be at least 1"));
        }
        if self.terms.tooltip_selectors.is_empty() {
            return Err(invalid("terms.tooltip_selectors", "must list at least one selector"));
        }

        if !self.browser.headless {
            tracing::warn!("browser.headless is off; a window will open for every batch");
        }

        if self.item_delay_ms < 500 {
            tracing::warn!(
                item_delay_ms = self.item_delay_ms,
                "item_delay_ms below 500ms risks throttling by the wiki"
            );
        }

        Ok(())
    }
}
