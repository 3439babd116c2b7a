//! Notification gate: the single place every outbound alert passes through.
//!
//! `evaluate` runs the short-circuit procedure (feature flag, quiet hours,
//! thresholds, per-route cooldown, hourly cap) and only calls the webhook
//! client once every earlier step has passed. `evaluate_many` runs it over
//! a sorted batch of opportunities from one detection cycle.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, FixedOffset, Utc};

use super::policy::{NotificationPolicy, NotificationPolicyStore};
use super::webhook::WebhookClient;
use crate::types::ArbitrageOpportunity;

const JST_OFFSET_SECS: i32 = 9 * 3600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Sent,
    Dropped(String),
    Failed,
}

struct GateHistory {
    last_sent_by_route: HashMap<String, DateTime<Utc>>,
    sent_timestamps: VecDeque<DateTime<Utc>>,
}

impl GateHistory {
    fn new() -> Self {
        Self {
            last_sent_by_route: HashMap::new(),
            sent_timestamps: VecDeque::new(),
        }
    }

    fn record(&mut self, route_key: String, now: DateTime<Utc>) {
        self.last_sent_by_route.insert(route_key, now);
        self.sent_timestamps.push_back(now);
        let cutoff = now - chrono::Duration::hours(1);
        while matches!(self.sent_timestamps.front(), Some(t) if *t < cutoff) {
            self.sent_timestamps.pop_front();
        }
    }

    fn count_last_hour(&self, now: DateTime<Utc>) -> u32 {
        let cutoff = now - chrono::Duration::hours(1);
        self.sent_timestamps.iter().filter(|t| **t >= cutoff).count() as u32
    }
}

pub struct NotificationGate {
    policy_store: NotificationPolicyStore,
    history: Mutex<GateHistory>,
    webhook: WebhookClient,
}

impl NotificationGate {
    pub fn new(policy_store: NotificationPolicyStore, webhook: WebhookClient) -> Self {
        Self {
            policy_store,
            history: Mutex::new(GateHistory::new()),
            webhook,
        }
    }

    pub async fn evaluate_many(&self, opportunities: &[ArbitrageOpportunity]) -> Vec<GateDecision> {
        let mut out = Vec::with_capacity(opportunities.len());
        for opp in opportunities {
            out.push(self.evaluate(opp).await);
        }
        out
    }

    pub async fn evaluate(&self, opp: &ArbitrageOpportunity) -> GateDecision {
        let policy = self.policy_store.load();
        let now = Utc::now();

        if !policy.arbitrage_alerts.enabled || !policy.discord.enabled {
            return GateDecision::Dropped("notifications disabled".into());
        }

        if in_quiet_hours(&policy, now) {
            return GateDecision::Dropped("quiet hours".into());
        }

        // Q4: gated on price_diff_pct, the raw spread, not the
        // after-fees estimated_profit_pct — the two are allowed to diverge
        // and the threshold here is the operator-facing "is this even worth
        // looking at" bar.
        if opp.price_diff_pct < policy.arbitrage_alerts.min_profit_threshold {
            return GateDecision::Dropped("below min_profit_threshold".into());
        }

        let estimated_profit_amount = opp.estimated_profit_pct / rust_decimal::Decimal::ONE_HUNDRED
            * opp.buy_price
            * opp.max_volume;
        if estimated_profit_amount < policy.arbitrage_alerts.min_profit_amount {
            return GateDecision::Dropped("below min_profit_amount".into());
        }

        let route_key = opp.route_key();
        {
            let history = self.history.lock().unwrap();
            if let Some(last_sent) = history.last_sent_by_route.get(&route_key) {
                let elapsed = now.signed_duration_since(*last_sent);
                if elapsed < chrono::Duration::minutes(policy.arbitrage_alerts.cooldown_minutes) {
                    return GateDecision::Dropped("route on cooldown".into());
                }
            }
            if history.count_last_hour(now) >= policy.arbitrage_alerts.max_notifications_per_hour {
                return GateDecision::Dropped("hourly cap reached".into());
            }
        }

        if self.webhook.send_opportunity(opp).await {
            let mut history = self.history.lock().unwrap();
            history.record(route_key, now);
            GateDecision::Sent
        } else {
            GateDecision::Failed
        }
    }

    /// System alerts bypass thresholds, cooldown, and hourly cap, but still
    /// honor the feature flag, and honor quiet hours unless `is_error`.
    pub async fn send_system_alert(&self, title: &str, description: &str, is_error: bool) -> GateDecision {
        let policy = self.policy_store.load();
        let now = Utc::now();

        if !policy.system_alerts.enabled || !policy.discord.enabled {
            return GateDecision::Dropped("notifications disabled".into());
        }
        if !is_error && in_quiet_hours(&policy, now) {
            return GateDecision::Dropped("quiet hours".into());
        }

        if self.webhook.send_system_alert(title, description, is_error).await {
            GateDecision::Sent
        } else {
            GateDecision::Failed
        }
    }
}

/// §6: quiet hours wrap across midnight (`start > end` means "until
/// tomorrow"), compared in JST at minute resolution against the `"HH:MM"`
/// bounds in `discord.quiet_hours`.
fn in_quiet_hours(policy: &NotificationPolicy, now: DateTime<Utc>) -> bool {
    use chrono::Timelike;

    let quiet = &policy.discord.quiet_hours;
    if !quiet.enabled {
        return false;
    }
    let jst = FixedOffset::east_opt(JST_OFFSET_SECS).expect("fixed JST offset is always valid");
    let local = now.with_timezone(&jst);
    let minute_of_day = local.hour() * 60 + local.minute();

    let start = quiet.start_minutes();
    let end = quiet.end_minutes();
    if start <= end {
        minute_of_day >= start && minute_of_day < end
    } else {
        minute_of_day >= start || minute_of_day < end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::policy::QuietHoursConfig;
    use chrono::TimeZone;

    fn utc_at(hour_jst: u32) -> DateTime<Utc> {
        // JST = UTC+9, so hour_jst 0 is UTC 15:00 the previous day.
        let hour_utc = (hour_jst + 24 - 9) % 24;
        Utc.with_ymd_and_hms(2026, 7, 28, hour_utc, 0, 0).unwrap()
    }

    fn policy_with_quiet(start: &str, end: &str) -> NotificationPolicy {
        let mut policy = NotificationPolicy::default();
        policy.discord.quiet_hours = QuietHoursConfig {
            enabled: true,
            start: start.to_string(),
            end: end.to_string(),
        };
        policy
    }

    #[test]
    fn disabled_quiet_hours_never_suppress() {
        let policy = NotificationPolicy::default();
        assert!(!in_quiet_hours(&policy, utc_at(3)));
    }

    #[test]
    fn ordinary_window_suppresses_inside_range() {
        let policy = policy_with_quiet("01:00", "06:00");
        assert!(in_quiet_hours(&policy, utc_at(3)));
        assert!(!in_quiet_hours(&policy, utc_at(6)));
        assert!(!in_quiet_hours(&policy, utc_at(0)));
    }

    #[test]
    fn midnight_wraparound_suppresses_across_day_boundary() {
        // §8 B3 / scenario 6: 23:00-07:00 blocks 02:00, allows 08:00.
        let policy = policy_with_quiet("23:00", "07:00");
        assert!(in_quiet_hours(&policy, utc_at(23)));
        assert!(in_quiet_hours(&policy, utc_at(0)));
        assert!(in_quiet_hours(&policy, utc_at(2)));
        assert!(!in_quiet_hours(&policy, utc_at(7)));
        assert!(!in_quiet_hours(&policy, utc_at(8)));
        assert!(!in_quiet_hours(&policy, utc_at(12)));
    }
}
