//! Notification policy: thresholds, cooldowns, and quiet hours, reloaded
//! from `notifications.json` on every evaluation (no caching — the file is
//! tiny and the OS page cache already makes this cheap, and it means a
//! SIGHUP-triggered edit takes effect on the very next cycle with no extra
//! plumbing).
//!
//! The on-disk shape follows §6's wire format verbatim: a top-level object
//! with `arbitrage_alerts`, `system_alerts`, and `discord` sections, the
//! latter carrying quiet hours as `"HH:MM"` strings rather than bare hours.

use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationPolicy {
    pub arbitrage_alerts: ArbitrageAlertsConfig,
    pub system_alerts: SystemAlertsConfig,
    pub discord: DiscordConfig,
}

impl Default for NotificationPolicy {
    fn default() -> Self {
        Self {
            arbitrage_alerts: ArbitrageAlertsConfig::default(),
            system_alerts: SystemAlertsConfig::default(),
            discord: DiscordConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArbitrageAlertsConfig {
    pub enabled: bool,
    pub min_profit_threshold: Decimal,
    pub min_profit_amount: Decimal,
    pub cooldown_minutes: i64,
    pub max_notifications_per_hour: u32,
}

impl Default for ArbitrageAlertsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_profit_threshold: dec!(0.3),
            min_profit_amount: dec!(1000),
            cooldown_minutes: 5,
            max_notifications_per_hour: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SystemAlertsConfig {
    pub enabled: bool,
    pub alert_types: Vec<String>,
}

impl Default for SystemAlertsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            alert_types: vec!["ERROR".to_string(), "WARNING".to_string(), "INFO".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    pub enabled: bool,
    pub use_embeds: bool,
    pub quiet_hours: QuietHoursConfig,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            use_embeds: true,
            quiet_hours: QuietHoursConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuietHoursConfig {
    pub enabled: bool,
    pub start: String,
    pub end: String,
}

impl Default for QuietHoursConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            start: "23:00".to_string(),
            end: "07:00".to_string(),
        }
    }
}

impl QuietHoursConfig {
    /// Parse `"HH:MM"` into minutes-since-midnight. Malformed values fall
    /// back to 0 with a warning rather than aborting the gate decision —
    /// quiet hours are a soft policy, not a correctness invariant.
    pub fn start_minutes(&self) -> u32 {
        parse_hh_mm(&self.start)
    }

    pub fn end_minutes(&self) -> u32 {
        parse_hh_mm(&self.end)
    }
}

fn parse_hh_mm(s: &str) -> u32 {
    let Some((h, m)) = s.split_once(':') else {
        warn!(value = %s, "malformed HH:MM quiet-hours bound, treating as 00:00");
        return 0;
    };
    let (Ok(h), Ok(m)) = (h.parse::<u32>(), m.parse::<u32>()) else {
        warn!(value = %s, "malformed HH:MM quiet-hours bound, treating as 00:00");
        return 0;
    };
    (h % 24) * 60 + (m % 60)
}

/// Reads and parses `notifications.json` fresh on every call.
pub struct NotificationPolicyStore {
    path: PathBuf,
}

impl NotificationPolicyStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self) -> NotificationPolicy {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(_) => return NotificationPolicy::default(),
        };

        match serde_json::from_str(&content) {
            Ok(policy) => policy,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "malformed notifications.json, using defaults");
                NotificationPolicy::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_documented_defaults() {
        let store = NotificationPolicyStore::new("/nonexistent/notifications.json");
        let policy = store.load();
        assert!(policy.arbitrage_alerts.enabled);
        assert_eq!(policy.arbitrage_alerts.cooldown_minutes, 5);
        assert_eq!(policy.arbitrage_alerts.max_notifications_per_hour, 20);
        assert!(!policy.discord.quiet_hours.enabled);
    }

    #[test]
    fn parses_hh_mm_quiet_hours() {
        let q = QuietHoursConfig {
            enabled: true,
            start: "23:00".to_string(),
            end: "07:30".to_string(),
        };
        assert_eq!(q.start_minutes(), 23 * 60);
        assert_eq!(q.end_minutes(), 7 * 60 + 30);
    }

    #[test]
    fn partial_document_falls_back_per_missing_section() {
        let parsed: NotificationPolicy =
            serde_json::from_str(r#"{"arbitrage_alerts": {"enabled": false}}"#).unwrap();
        assert!(!parsed.arbitrage_alerts.enabled);
        assert_eq!(parsed.arbitrage_alerts.cooldown_minutes, 5);
        assert!(parsed.system_alerts.enabled);
    }
}
