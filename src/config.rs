//! Configuration management.
//!
//! Loads `exchanges.yaml` (venue roster and fee model) and process-wide
//! settings from the environment (`.env` via `dotenv`, teacher pattern).
//! Missing or malformed per-venue entries disable that venue with a logged
//! warning rather than aborting the process; a structurally broken file or
//! a missing `DATABASE_URL` is the one case that aborts at boot
//! (`ConfigError::Invalid`, see `error.rs`).
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use std::collections::HashMap;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

use crate::error::ConfigError;

fn default_true() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_orderbook_interval_ms() -> u64 {
    10_000
}

fn default_detection_interval_secs() -> u64 {
    5
}

fn default_freshness_window_secs() -> i64 {
    300
}

fn default_http_timeout_secs() -> u64 {
    10
}

/// Raw per-venue entry as it appears in `exchanges.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub api_base_url: String,
    #[serde(default)]
    pub ws_url: Option<String>,
    #[serde(default)]
    pub maker_fee: Option<Decimal>,
    #[serde(default)]
    pub taker_fee: Option<Decimal>,
    #[serde(default)]
    pub withdrawal_fees: HashMap<String, Decimal>,
    #[serde(default)]
    pub supported_pairs: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ExchangesFile {
    exchanges: HashMap<String, ExchangeConfig>,
}

/// Process-wide settings, part env var / part `exchanges.yaml`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub discord_webhook_url: Option<String>,
    pub exchanges: HashMap<String, ExchangeConfig>,
    pub quote_poll_interval_ms: u64,
    pub orderbook_poll_interval_ms: u64,
    pub detection_interval_secs: u64,
    pub freshness_window_secs: i64,
    pub http_timeout_secs: u64,
    pub major_pairs: Vec<String>,
    pub notification_policy_path: String,
}

impl AppConfig {
    /// Load environment variables (`.env` via `dotenv`) and parse
    /// `exchanges.yaml` from `config_path`.
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::Invalid("DATABASE_URL not set".into()))?;

        let discord_webhook_url = std::env::var("DISCORD_WEBHOOK_URL").ok();

        let exchanges = Self::load_exchanges(config_path.as_ref())?;

        Ok(Self {
            database_url,
            discord_webhook_url,
            exchanges,
            quote_poll_interval_ms: env_or("QUOTE_POLL_INTERVAL_MS", default_poll_interval_ms()),
            orderbook_poll_interval_ms: env_or(
                "ORDERBOOK_POLL_INTERVAL_MS",
                default_orderbook_interval_ms(),
            ),
            detection_interval_secs: env_or(
                "DETECTION_INTERVAL_SECS",
                default_detection_interval_secs(),
            ),
            freshness_window_secs: env_or(
                "FRESHNESS_WINDOW_SECS",
                default_freshness_window_secs(),
            ),
            http_timeout_secs: env_or("HTTP_TIMEOUT_SECS", default_http_timeout_secs()),
            major_pairs: vec!["BTC/JPY".to_string(), "ETH/JPY".to_string()],
            notification_policy_path: std::env::var("NOTIFICATION_POLICY_PATH")
                .unwrap_or_else(|_| "config/notifications.json".to_string()),
        })
    }

    fn load_exchanges(path: &Path) -> Result<HashMap<String, ExchangeConfig>, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::Invalid(format!("failed to read {}: {e}", path.display()))
        })?;

        let parsed: ExchangesFile = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Invalid(format!("failed to parse {}: {e}", path.display())))?;

        let mut exchanges = HashMap::new();
        for (code, mut cfg) in parsed.exchanges {
            if cfg.api_base_url.trim().is_empty() {
                warn!(venue = %code, "exchange entry missing api_base_url, disabling");
                cfg.enabled = false;
            }
            if cfg.maker_fee.is_none() || cfg.taker_fee.is_none() {
                warn!(venue = %code, "exchange entry missing maker_fee/taker_fee, disabling");
                cfg.enabled = false;
            }
            exchanges.insert(code, cfg);
        }
        Ok(exchanges)
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
