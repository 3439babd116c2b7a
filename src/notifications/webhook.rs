//! Discord webhook client, generalized from the teacher's paper-trading
//! alerter (`paper_trading/discord_alerts.rs`) to arbitrage opportunities
//! and system alerts.

use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::{error, warn};

use crate::types::ArbitrageOpportunity;

#[derive(Serialize)]
struct DiscordMessage {
    content: Option<String>,
    username: String,
    avatar_url: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

#[derive(Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
    color: u32,
    fields: Vec<DiscordField>,
    footer: Option<DiscordFooter>,
    timestamp: Option<String>,
}

#[derive(Serialize)]
struct DiscordField {
    name: String,
    value: String,
    inline: bool,
}

#[derive(Serialize)]
struct DiscordFooter {
    text: String,
}

pub struct WebhookClient {
    webhook_url: Option<String>,
    client: Client,
}

impl WebhookClient {
    pub fn new(webhook_url: Option<String>, client: Client) -> Self {
        Self { webhook_url, client }
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Send an opportunity alert. Returns true on HTTP 204 (§6's documented
    /// success status for this webhook); the caller (the gate) only records
    /// cooldown/cap state on `true`.
    pub async fn send_opportunity(&self, opp: &ArbitrageOpportunity) -> bool {
        let Some(webhook_url) = &self.webhook_url else {
            return false;
        };

        let color = banding_color(opp.estimated_profit_pct);

        let embed = DiscordEmbed {
            title: format!("{} arbitrage: {}", opp.kind, opp.pair_symbol),
            description: format!("{} -> {}", opp.buy_exchange, opp.sell_exchange),
            color,
            fields: vec![
                DiscordField {
                    name: "Buy price".to_string(),
                    value: opp.buy_price.to_string(),
                    inline: true,
                },
                DiscordField {
                    name: "Sell price".to_string(),
                    value: opp.sell_price.to_string(),
                    inline: true,
                },
                DiscordField {
                    name: "Price diff".to_string(),
                    value: format!("{}%", opp.price_diff_pct),
                    inline: true,
                },
                DiscordField {
                    name: "Estimated profit".to_string(),
                    value: format!("{}%", opp.estimated_profit_pct),
                    inline: true,
                },
                DiscordField {
                    name: "Max volume".to_string(),
                    value: opp.max_volume.to_string(),
                    inline: true,
                },
            ],
            footer: Some(DiscordFooter {
                text: "arbiwatch".to_string(),
            }),
            timestamp: Some(Utc::now().to_rfc3339()),
        };

        self.post(webhook_url, DiscordMessage {
            content: None,
            username: "arbiwatch".to_string(),
            avatar_url: None,
            embeds: vec![embed],
        })
        .await
    }

    /// Send a system alert (config error, exchange outage, etc). Bypasses
    /// the profit-threshold / cooldown / quiet-hours gating that regular
    /// opportunity alerts go through, but still honors the feature flag and
    /// (for non-ERROR severities) quiet hours — see `NotificationGate`.
    pub async fn send_system_alert(&self, title: &str, description: &str, is_error: bool) -> bool {
        let Some(webhook_url) = &self.webhook_url else {
            return false;
        };

        let embed = DiscordEmbed {
            title: title.to_string(),
            description: description.to_string(),
            color: if is_error { 0xFF0000 } else { 0xFFFF00 },
            fields: Vec::new(),
            footer: Some(DiscordFooter {
                text: "arbiwatch".to_string(),
            }),
            timestamp: Some(Utc::now().to_rfc3339()),
        };

        self.post(webhook_url, DiscordMessage {
            content: None,
            username: "arbiwatch".to_string(),
            avatar_url: None,
            embeds: vec![embed],
        })
        .await
    }

    async fn post(&self, webhook_url: &str, message: DiscordMessage) -> bool {
        match self.client.post(webhook_url).json(&message).send().await {
            Ok(resp) if resp.status() == reqwest::StatusCode::NO_CONTENT => true,
            Ok(resp) => {
                warn!(status = %resp.status(), "discord webhook returned non-204 status, treating as failure");
                false
            }
            Err(e) => {
                error!(error = %e, "failed to send discord webhook");
                false
            }
        }
    }
}

fn banding_color(estimated_profit_pct: Decimal) -> u32 {
    if estimated_profit_pct >= dec!(0.5) {
        0x00FF00
    } else if estimated_profit_pct >= dec!(0.1) {
        0xFFFF00
    } else {
        0xFFA500
    }
}
