//! USD/JPY rate lookup, cached with a single-flight refresh and a three-source
//! fallback chain (grounded in the original `fx_rate_service.py`: provider
//! outages there are handled the same way — try the next source down the
//! list, and if all of them fail, serve the last known rate rather than
//! stall the detector).
//!
//! Author: AI-Generated
//! Created: 2026-02-03

use std::time::{Duration, Instant};

use reqwest::Client;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const REFRESH_INTERVAL: Duration = Duration::from_secs(300);
const STALENESS_CEILING: Duration = Duration::from_secs(24 * 3600);

struct FxCache {
    rate: Decimal,
    fetched_at: Instant,
}

/// USD/JPY spot rate, refreshed on read when stale and never blocking a
/// cold caller longer than the HTTP timeout of a single source.
pub struct FxRateService {
    client: Client,
    cache: Mutex<FxCache>,
}

impl FxRateService {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache: Mutex::new(FxCache {
                rate: fallback_rate(),
                fetched_at: Instant::now() - REFRESH_INTERVAL - Duration::from_secs(1),
            }),
        }
    }

    /// Current USD/JPY rate. Only `"USDJPY"` is meaningful today; any other
    /// pair argument returns the same rate with a debug log, since every
    /// conversion path in the detector is USD-denominated.
    pub async fn get_rate(&self, pair: &str) -> Decimal {
        if pair != "USDJPY" {
            debug!(pair, "fx rate requested for unsupported pair, using USDJPY");
        }

        let needs_refresh = {
            let cache = self.cache.lock().await;
            cache.fetched_at.elapsed() >= REFRESH_INTERVAL
        };

        if needs_refresh {
            self.refresh().await;
        }

        let cache = self.cache.lock().await;
        if cache.fetched_at.elapsed() >= STALENESS_CEILING {
            warn!(
                age_secs = cache.fetched_at.elapsed().as_secs(),
                "USDJPY rate has not refreshed in over 24h, serving stale value"
            );
        }
        cache.rate
    }

    /// Single-flight refresh: the mutex guard is held across the whole
    /// attempt chain, so concurrent callers block briefly rather than
    /// issuing redundant outbound requests.
    async fn refresh(&self) {
        let mut cache = self.cache.lock().await;
        if cache.fetched_at.elapsed() < REFRESH_INTERVAL {
            return;
        }

        match self.fetch_from_sources().await {
            Some(rate) => {
                cache.rate = rate;
                cache.fetched_at = Instant::now();
            }
            None => {
                warn!("all USDJPY sources failed, keeping previous cached value");
            }
        }
    }

    async fn fetch_from_sources(&self) -> Option<Decimal> {
        if let Some(rate) = self.fetch_exchangerate_api().await {
            return Some(rate);
        }
        if let Some(rate) = self.fetch_fixer().await {
            return Some(rate);
        }
        if let Some(rate) = self.fetch_coingecko().await {
            return Some(rate);
        }
        None
    }

    async fn fetch_exchangerate_api(&self) -> Option<Decimal> {
        #[derive(Deserialize)]
        struct Resp {
            rates: RatesUsd,
        }
        #[derive(Deserialize)]
        struct RatesUsd {
            #[serde(rename = "JPY")]
            jpy: Decimal,
        }

        let resp = self
            .client
            .get("https://open.er-api.com/v6/latest/USD")
            .send()
            .await
            .ok()?
            .json::<Resp>()
            .await
            .ok()?;
        Some(resp.rates.jpy)
    }

    async fn fetch_fixer(&self) -> Option<Decimal> {
        #[derive(Deserialize)]
        struct Resp {
            success: bool,
            rates: Option<RatesJpy>,
        }
        #[derive(Deserialize)]
        struct RatesJpy {
            #[serde(rename = "JPY")]
            jpy: Decimal,
        }

        let resp = self
            .client
            .get("https://data.fixer.io/api/latest?base=USD")
            .send()
            .await
            .ok()?
            .json::<Resp>()
            .await
            .ok()?;
        if !resp.success {
            return None;
        }
        resp.rates.map(|r| r.jpy)
    }

    /// Last-resort fallback via CoinGecko's tether/jpy market pair, used
    /// as a USD proxy since USDT trades close to parity with USD.
    async fn fetch_coingecko(&self) -> Option<Decimal> {
        #[derive(Deserialize)]
        struct Resp {
            tether: TetherJpy,
        }
        #[derive(Deserialize)]
        struct TetherJpy {
            jpy: Decimal,
        }

        let resp = self
            .client
            .get("https://api.coingecko.com/api/v3/simple/price?ids=tether&vs_currencies=jpy")
            .send()
            .await
            .ok()?
            .json::<Resp>()
            .await
            .ok()?;
        Some(resp.tether.jpy)
    }
}

fn fallback_rate() -> Decimal {
    dec!(155.0)
}
