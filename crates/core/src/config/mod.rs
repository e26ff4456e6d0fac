//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (PRTS_*, nested keys split on `__`)
//! 2. TOML config file (if PRTS_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (PRTS_*)
/// 2. TOML config file (if PRTS_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite database.
    ///
    /// Set via PRTS_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Wiki article prefix; a subject's page is `base_url` + subject name.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Article name of the roster listing.
    #[serde(default = "default_roster_path")]
    pub roster_path: String,

    /// Article name of the static glossary.
    #[serde(default = "default_glossary_path")]
    pub glossary_path: String,

    /// User-Agent string for static HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Static HTTP request timeout in milliseconds.
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,

    /// Pause between two subjects of a batch, in milliseconds.
    #[serde(default = "default_item_delay_ms")]
    pub item_delay_ms: u64,

    #[serde(default)]
    pub browser: BrowserSettings,

    #[serde(default)]
    pub timeouts: TimeoutSettings,

    #[serde(default)]
    pub waits: WaitSettings,

    #[serde(default)]
    pub terms: TermSettings,

    #[serde(default)]
    pub retry: RetrySettings,
}

/// Headless browser launch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Run without a visible window. Turn off to watch the hover sequence.
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Extra command-line switches passed to Chromium.
    #[serde(default = "default_browser_args")]
    pub args: Vec<String>,

    /// Viewport width in pixels.
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,

    /// Viewport height in pixels.
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,

    /// User-Agent presented by the browser.
    #[serde(default = "default_browser_user_agent")]
    pub user_agent: String,

    /// Browser process launch timeout in milliseconds.
    #[serde(default = "default_launch_timeout_ms")]
    pub launch_timeout_ms: u64,
}

/// Upper bounds on render-surface operations, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutSettings {
    #[serde(default = "default_page_load_ms")]
    pub page_load_ms: u64,

    #[serde(default = "default_locator_wait_ms")]
    pub locator_wait_ms: u64,

    #[serde(default = "default_text_extract_ms")]
    pub text_extract_ms: u64,

    #[serde(default = "default_network_idle_ms")]
    pub network_idle_ms: u64,
}

/// Fixed pauses, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitSettings {
    /// Delay after hovering before the tooltip is read.
    #[serde(default = "default_tooltip_render_ms")]
    pub tooltip_render_ms: u64,

    /// Delay after moving the pointer away from a term.
    #[serde(default = "default_pointer_reset_ms")]
    pub pointer_reset_ms: u64,

    /// Delay after network idle before the markup is read.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

/// Glossary term filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermSettings {
    /// Minimum term name length, in characters.
    #[serde(default = "default_term_min_length")]
    pub min_length: usize,

    /// Minimum description length, in characters.
    #[serde(default = "default_desc_min_length")]
    pub desc_min_length: usize,

    /// Maximum number of candidates processed per page.
    #[serde(default = "default_max_terms")]
    pub max_terms: usize,

    /// Tooltip container selectors, tried in order.
    #[serde(default = "default_tooltip_selectors")]
    pub tooltip_selectors: Vec<String>,
}

/// Page acquisition retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between two ordinary attempts.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Delay after the render surface crashed and was torn down.
    #[serde(default = "default_crash_delay_ms")]
    pub crash_delay_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./prts.sqlite")
}

fn default_base_url() -> String {
    "https://prts.wiki/w/".into()
}

fn default_roster_path() -> String {
    "干员一览".into()
}

fn default_glossary_path() -> String {
    "术语释义".into()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
        .into()
}

fn default_browser_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".into()
}

fn default_http_timeout_ms() -> u64 {
    30_000
}

fn default_item_delay_ms() -> u64 {
    2_000
}

fn default_true() -> bool {
    true
}

fn default_browser_args() -> Vec<String> {
    ["--no-sandbox", "--disable-gpu", "--disable-dev-shm-usage", "--memory-pressure-off"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_viewport_width() -> u32 {
    1920
}

fn default_viewport_height() -> u32 {
    1080
}

fn default_launch_timeout_ms() -> u64 {
    60_000
}

fn default_page_load_ms() -> u64 {
    60_000
}

fn default_locator_wait_ms() -> u64 {
    3_000
}

fn default_text_extract_ms() -> u64 {
    1_500
}

fn default_network_idle_ms() -> u64 {
    15_000
}

fn default_tooltip_render_ms() -> u64 {
    1_200
}

fn default_pointer_reset_ms() -> u64 {
    100
}

fn default_settle_ms() -> u64 {
    1_000
}

fn default_term_min_length() -> usize {
    2
}

fn default_desc_min_length() -> usize {
    5
}

fn default_max_terms() -> usize {
    20
}

fn default_tooltip_selectors() -> Vec<String> {
    [
        r#"[role="tooltip"]"#,
        ".tippy-box",
        ".tippy-content",
        ".tooltip-content",
        ".mw-tooltip",
        ".mc-tooltip-content",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    3_000
}

fn default_crash_delay_ms() -> u64 {
    5_000
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            args: default_browser_args(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            user_agent: default_browser_user_agent(),
            launch_timeout_ms: default_launch_timeout_ms(),
        }
    }
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            page_load_ms: default_page_load_ms(),
            locator_wait_ms: default_locator_wait_ms(),
            text_extract_ms: default_text_extract_ms(),
            network_idle_ms: default_network_idle_ms(),
        }
    }
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            tooltip_render_ms: default_tooltip_render_ms(),
            pointer_reset_ms: default_pointer_reset_ms(),
            settle_ms: default_settle_ms(),
        }
    }
}

impl Default for TermSettings {
    fn default() -> Self {
        Self {
            min_length: default_term_min_length(),
            desc_min_length: default_desc_min_length(),
            max_terms: default_max_terms(),
            tooltip_selectors: default_tooltip_selectors(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            crash_delay_ms: default_crash_delay_ms(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            base_url: default_base_url(),
            roster_path: default_roster_path(),
            glossary_path: default_glossary_path(),
            user_agent: default_user_agent(),
            http_timeout_ms: default_http_timeout_ms(),
            item_delay_ms: default_item_delay_ms(),
            browser: BrowserSettings::default(),
            timeouts: TimeoutSettings::default(),
            waits: WaitSettings::default(),
            terms: TermSettings::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl AppConfig {
    /// Static HTTP timeout as Duration for use with reqwest.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    /// Inter-item batch pause.
    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `PRTS_`
    /// 2. TOML file from `PRTS_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// The layered provider stack used by [`AppConfig::load`].
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("PRTS_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment.merge(
            Env::prefixed("PRTS_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        )
    }

    fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

impl TimeoutSettings {
    pub fn page_load(&self) -> Duration {
        Duration::from_millis(self.page_load_ms)
    }

    pub fn locator_wait(&self) -> Duration {
        Duration::from_millis(self.locator_wait_ms)
    }

    pub fn text_extract(&self) -> Duration {
        Duration::from_millis(self.text_extract_ms)
    }

    pub fn network_idle(&self) -> Duration {
        Duration::from_millis(self.network_idle_ms)
    }
}

impl WaitSettings {
    pub fn tooltip_render(&self) -> Duration {
        Duration::from_millis(self.tooltip_render_ms)
    }

    pub fn pointer_reset(&self) -> Duration {
        Duration::from_millis(self.pointer_reset_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl RetrySettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn crash_delay(&self) -> Duration {
        Duration::from_millis(self.crash_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./prts.sqlite"));
        assert_eq!(config.base_url, "https://prts.wiki/w/");
        assert_eq!(config.item_delay_ms, 2_000);
        assert!(config.browser.headless);
        assert_eq!(config.terms.min_length, 2);
        assert_eq!(config.terms.desc_min_length, 5);
        assert_eq!(config.terms.max_terms, 20);
        assert_eq!(config.terms.tooltip_selectors.len(), 6);
        assert_eq!(config.terms.tooltip_selectors[0], r#"[role="tooltip"]"#);
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_durations() {
        let config = AppConfig::default();
        assert_eq!(config.http_timeout(), Duration::from_millis(30_000));
        assert_eq!(config.waits.tooltip_render(), Duration::from_millis(1_200));
        assert_eq!(config.retry.crash_delay(), Duration::from_millis(5_000));
    }

    #[test]
    fn test_env_overrides_nested_keys() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("PRTS_ITEM_DELAY_MS", "500");
            jail.set_env("PRTS_BROWSER__HEADLESS", "false");
            jail.set_env("PRTS_TERMS__MAX_TERMS", "7");

            let config = AppConfig::load().expect("config loads");
            assert_eq!(config.item_delay_ms, 500);
            assert!(!config.browser.headless);
            assert_eq!(config.terms.max_terms, 7);
            assert_eq!(config.terms.min_length, 2);
            Ok(())
        });
    }

    #[test]
    fn test_toml_file_layer() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("prts.toml", "base_url = \"https://mirror.example/w/\"\n[retry]\nmax_attempts = 5\n")?;
            jail.set_env("PRTS_CONFIG_FILE", "prts.toml");

            let config = AppConfig::load().expect("config loads");
            assert_eq!(config.base_url, "https://mirror.example/w/");
            assert_eq!(config.retry.max_attempts, 5);
            assert_eq!(config.retry.retry_delay_ms, 3_000);
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("PRTS_RETRY__MAX_ATTEMPTS", "0");
            let result = AppConfig::load();
            assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "retry.max_attempts"));
            Ok(())
        });
    }
}
