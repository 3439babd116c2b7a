//! Detection engine: runs all four arbitrage strategies over the latest
//! fresh quotes for each tracked pair, aggregates, and hands the sorted
//! result to the notification gate.

pub mod cross_rate;
pub mod direct;
pub mod fees;
pub mod latency;
pub mod triangle;
pub mod usd;

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, warn};

use crate::store::Store;
use crate::types::{ArbitrageOpportunity, Exchange};

const USDT_VENUES: [&str; 2] = ["binance", "bybit"];

/// Detection-engine thresholds (§4.E.1/§4.E.2). Overridable at runtime
/// through the `system_config` table (`min_profit_threshold`,
/// `cross_rate_min_profit_threshold`) on top of these YAML-seeded defaults,
/// per the original_source `arbitrage_detector.py` operator-tunable-override
/// pattern (§3 SUPPLEMENT).
#[derive(Debug, Clone, Copy)]
pub struct DetectionThresholds {
    pub direct_min_profit_pct: Decimal,
    pub cross_rate_min_profit_pct: Decimal,
    /// Per-asset position cap (§3 SUPPLEMENT `system_config.max_position_size`).
    /// `None` until an operator sets it; no cap is applied in that case.
    pub max_position_size: Option<Decimal>,
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            direct_min_profit_pct: dec!(0.3),
            cross_rate_min_profit_pct: dec!(0.1),
            max_position_size: None,
        }
    }
}

impl DetectionThresholds {
    /// Apply `system_config` overrides on top of the defaults. Unknown or
    /// unparseable keys are ignored (logged) rather than failing the cycle.
    pub fn with_overrides(mut self, system_config: &HashMap<String, serde_json::Value>) -> Self {
        if let Some(v) = system_config.get("min_profit_threshold").and_then(parse_decimal) {
            self.direct_min_profit_pct = v;
        }
        if let Some(v) = system_config
            .get("cross_rate_min_profit_threshold")
            .and_then(parse_decimal)
        {
            self.cross_rate_min_profit_pct = v;
        }
        if let Some(v) = system_config.get("max_position_size").and_then(parse_decimal) {
            self.max_position_size = Some(v);
        }
        self
    }
}

fn parse_decimal(v: &serde_json::Value) -> Option<Decimal> {
    match v {
        serde_json::Value::Number(n) => n.as_f64().and_then(|f| Decimal::try_from(f).ok()),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

pub struct Detector {
    store: Arc<Store>,
    exchanges: HashMap<String, Exchange>,
    pairs: Vec<String>,
    freshness_window_secs: i64,
    thresholds: DetectionThresholds,
}

impl Detector {
    /// Builds a detector, loading `system_config` overrides once at
    /// construction time (per §3 SUPPLEMENT — read-only from the monitor's
    /// perspective, falling back to `defaults` on any read failure).
    pub async fn new(
        store: Arc<Store>,
        exchanges: HashMap<String, Exchange>,
        pairs: Vec<String>,
        freshness_window_secs: i64,
        defaults: DetectionThresholds,
    ) -> Self {
        let system_config = store.load_system_config().await;
        let thresholds = defaults.with_overrides(&system_config);
        Self {
            store,
            exchanges,
            pairs,
            freshness_window_secs,
            thresholds,
        }
    }

    /// One detection cycle across every tracked pair, returning
    /// opportunities sorted by `estimated_profit_pct` descending. Each is
    /// persisted before being returned; a persistence failure is logged and
    /// does not drop the opportunity from the returned list, since the
    /// notification gate still needs to evaluate it this cycle.
    pub async fn run_once(&self) -> Vec<ArbitrageOpportunity> {
        let mut all = Vec::new();

        for pair in &self.pairs {
            let quotes = match self
                .store
                .latest_quotes_for_pair(pair, self.freshness_window_secs)
                .await
            {
                Ok(q) => q,
                Err(e) => {
                    warn!(pair = %pair, error = %e, "failed to load latest quotes, skipping pair this cycle");
                    continue;
                }
            };

            if quotes.len() < 2 {
                debug!(pair = %pair, count = quotes.len(), "fewer than two fresh quotes, skipping");
                continue;
            }

            all.extend(direct::detect(
                pair,
                &quotes,
                &self.exchanges,
                self.thresholds.direct_min_profit_pct,
                self.thresholds.max_position_size,
            ));
            all.extend(usd::detect(
                pair,
                &quotes,
                &self.exchanges,
                self.thresholds.direct_min_profit_pct,
                self.thresholds.max_position_size,
            ));

            // binance/bybit ticks land in this same per-pair fetch already
            // JPY-converted (see `BinanceAdapter::jpy_pair_symbol`), carrying
            // `conversion` metadata — so cross-rate's two legs are a split of
            // this one list rather than a second store round-trip.
            let usdt_quotes: Vec<_> = quotes
                .iter()
                .filter(|q| USDT_VENUES.contains(&q.exchange_code.as_str()) && q.conversion.is_some())
                .cloned()
                .collect();
            if !usdt_quotes.is_empty() {
                let jpy_quotes: Vec<_> = quotes
                    .iter()
                    .filter(|q| !USDT_VENUES.contains(&q.exchange_code.as_str()))
                    .cloned()
                    .collect();
                if !jpy_quotes.is_empty() {
                    all.extend(cross_rate::detect(
                        pair,
                        &jpy_quotes,
                        &usdt_quotes,
                        &self.exchanges,
                        self.thresholds.cross_rate_min_profit_pct,
                        self.thresholds.max_position_size,
                    ));
                }
            }
        }

        all.extend(triangle::detect());
        all.extend(latency::detect());

        all.sort_by(|a, b| b.estimated_profit_pct.cmp(&a.estimated_profit_pct));

        for opp in &all {
            if let Err(e) = self.store.insert_opportunity(opp).await {
                warn!(route = %opp.route_key(), error = %e, "failed to persist opportunity");
            }
        }

        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_and_latency_are_stubs() {
        assert!(triangle::detect().is_empty());
        assert!(latency::detect().is_empty());
    }

    #[test]
    fn system_config_overrides_apply_on_top_of_defaults() {
        let mut cfg = HashMap::new();
        cfg.insert("min_profit_threshold".to_string(), serde_json::json!("0.5"));
        cfg.insert("max_position_size".to_string(), serde_json::json!("0.75"));
        let thresholds = DetectionThresholds::default().with_overrides(&cfg);
        assert_eq!(thresholds.direct_min_profit_pct, dec!(0.5));
        assert_eq!(thresholds.cross_rate_min_profit_pct, dec!(0.1));
        assert_eq!(thresholds.max_position_size, Some(dec!(0.75)));
    }

    #[test]
    fn max_position_size_defaults_to_unset() {
        assert_eq!(DetectionThresholds::default().max_position_size, None);
    }
}
