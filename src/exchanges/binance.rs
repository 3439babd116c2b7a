//! Binance adapter (international, USDT-quoted).
//!
//! Public ticker unauthenticated. Private requests (unused here) carry
//! `X-MBX-APIKEY` and a `signature` query parameter: HMAC-SHA256 over the
//! URL-encoded query string, keyed by the API secret.
//!
//! Quotes are USDT-denominated and converted to JPY via the shared FX rate
//! service, mirroring `BybitAdapter`. The resulting tick is stored under the
//! `BASE/JPY` canonical pair — the same key a domestic venue's genuine JPY
//! quote uses — so direct arbitrage can join the two; the pre-conversion
//! USDT figures survive in `Quote::conversion` for the USD-quoted strategy.
//! Configured pairs are validated against `GET /api/v3/exchangeInfo` once at
//! session start (`discover_pairs`); pairs the venue doesn't list are
//! dropped with a warning rather than failing every subsequent poll.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

use super::{hmac_sha256_hex, ExchangeAdapter};
use crate::error::AdapterError;
use crate::fx::FxRateService;
use crate::types::{ConversionMeta, OrderbookLevel, OrderbookSnapshot, Quote};

pub struct BinanceAdapter {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    api_secret: Option<String>,
    fx: Arc<FxRateService>,
}

impl BinanceAdapter {
    pub fn new(
        client: Client,
        base_url: String,
        api_key: Option<String>,
        api_secret: Option<String>,
        fx: Arc<FxRateService>,
    ) -> Self {
        Self {
            client,
            base_url,
            api_key,
            api_secret,
            fx,
        }
    }

    #[allow(dead_code)]
    fn sign_query(&self, query: &str) -> Option<String> {
        let secret = self.api_secret.as_ref()?;
        Some(hmac_sha256_hex(secret, query))
    }

    fn usdt_symbol(pair_symbol: &str) -> Option<String> {
        let (base, quote) = pair_symbol.split_once('/')?;
        Some(format!("{base}{quote}"))
    }

    /// The canonical pair this venue's JPY-converted quote is stored under.
    /// Direct arbitrage (§4.E.1) joins quotes by `pair_symbol`, so a
    /// USDT-quoted venue's FX-converted tick has to land under the same
    /// `BASE/JPY` key a domestic venue's genuine JPY tick uses, not under
    /// the native `BASE/USDT` pair it was fetched for.
    fn jpy_pair_symbol(pair_symbol: &str) -> String {
        let base = pair_symbol.split('/').next().unwrap_or(pair_symbol);
        format!("{base}/JPY")
    }

    /// Query `/api/v3/exchangeInfo` and keep only the configured pairs that
    /// are actually listed, logging the ones dropped. Called once at
    /// session start; not part of the steady-state poll loop.
    pub async fn discover_pairs(&self, configured: &[String]) -> Vec<String> {
        let url = format!("{}/api/v3/exchangeInfo", self.base_url);
        let listed: HashSet<String> = match self.client.get(&url).send().await {
            Ok(resp) => match resp.json::<ExchangeInfo>().await {
                Ok(info) => info.symbols.into_iter().map(|s| s.symbol).collect(),
                Err(e) => {
                    warn!(error = %e, "failed to parse binance exchangeInfo, keeping all configured pairs");
                    return configured.to_vec();
                }
            },
            Err(e) => {
                warn!(error = %e, "failed to fetch binance exchangeInfo, keeping all configured pairs");
                return configured.to_vec();
            }
        };

        configured
            .iter()
            .filter(|pair| match Self::usdt_symbol(pair) {
                Some(symbol) if listed.contains(&symbol) => true,
                _ => {
                    warn!(pair = %pair, "pair not listed on binance, dropping from poll set");
                    false
                }
            })
            .cloned()
            .collect()
    }
}

#[derive(Deserialize)]
struct ExchangeInfo {
    symbols: Vec<ExchangeInfoSymbol>,
}

#[derive(Deserialize)]
struct ExchangeInfoSymbol {
    symbol: String,
}

#[derive(Deserialize)]
struct BinanceBookTicker {
    #[serde(rename = "bidPrice")]
    bid_price: Decimal,
    #[serde(rename = "askPrice")]
    ask_price: Decimal,
    #[serde(rename = "bidQty")]
    bid_qty: Decimal,
    #[serde(rename = "askQty")]
    ask_qty: Decimal,
}

#[derive(Deserialize)]
struct Binance24hr {
    #[serde(rename = "lastPrice")]
    last_price: Decimal,
    volume: Decimal,
}

#[derive(Deserialize)]
struct BinanceDepth {
    bids: Vec<[Decimal; 2]>,
    asks: Vec<[Decimal; 2]>,
}

#[async_trait]
impl ExchangeAdapter for BinanceAdapter {
    fn code(&self) -> &str {
        "binance"
    }

    async fn get_ticker(&self, pair_symbol: &str) -> Result<Quote, AdapterError> {
        let symbol = Self::usdt_symbol(pair_symbol)
            .ok_or_else(|| AdapterError::MalformedQuote(format!("unparseable pair {pair_symbol}")))?;

        let ticker_url = format!("{}/api/v3/ticker/bookTicker?symbol={}", self.base_url, symbol);
        let resp = self
            .client
            .get(&ticker_url)
            .send()
            .await
            .map_err(|e| AdapterError::TransientNetwork(e.to_string()))?;

        if resp.status() == 429 {
            return Err(AdapterError::RateLimited {
                retry_after_secs: super::retry_after_secs(&resp),
            });
        }

        let book: BinanceBookTicker = resp
            .json()
            .await
            .map_err(|e| AdapterError::TransientNetwork(e.to_string()))?;

        let stats_url = format!("{}/api/v3/ticker/24hr?symbol={}", self.base_url, symbol);
        let stats: Option<Binance24hr> = match self.client.get(&stats_url).send().await {
            Ok(resp) => resp.json().await.ok(),
            Err(_) => None,
        };

        let fx_rate = self.fx.get_rate("USDJPY").await;
        let converted_bid = book.bid_price * fx_rate;
        let converted_ask = book.ask_price * fx_rate;

        let mut quote = Quote::new(
            self.code(),
            &Self::jpy_pair_symbol(pair_symbol),
            Utc::now(),
            converted_bid,
            converted_ask,
            book.bid_qty,
            book.ask_qty,
            stats.as_ref().map(|s| s.last_price * fx_rate),
            stats.as_ref().map(|s| s.volume),
        )?;
        quote.conversion = Some(ConversionMeta {
            original_bid: book.bid_price,
            original_ask: book.ask_price,
            fx_rate,
        });
        Ok(quote)
    }

    async fn get_orderbook(&self, pair_symbol: &str) -> Result<OrderbookSnapshot, AdapterError> {
        let symbol = Self::usdt_symbol(pair_symbol)
            .ok_or_else(|| AdapterError::MalformedQuote(format!("unparseable pair {pair_symbol}")))?;
        let url = format!("{}/api/v3/depth?symbol={}&limit=50", self.base_url, symbol);
        let depth: BinanceDepth = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AdapterError::TransientNetwork(e.to_string()))?
            .json()
            .await
            .map_err(|e| AdapterError::TransientNetwork(e.to_string()))?;

        let fx_rate = self.fx.get_rate("USDJPY").await;
        let bids: Vec<OrderbookLevel> = depth
            .bids
            .into_iter()
            .map(|[price, size]| OrderbookLevel {
                price: price * fx_rate,
                size,
            })
            .collect();
        let asks: Vec<OrderbookLevel> = depth
            .asks
            .into_iter()
            .map(|[price, size]| OrderbookLevel {
                price: price * fx_rate,
                size,
            })
            .collect();
        let depth_count = bids.len().max(asks.len()) as i32;

        Ok(OrderbookSnapshot {
            id: None,
            exchange_code: self.code().to_string(),
            pair_symbol: pair_symbol.to_string(),
            timestamp: Utc::now(),
            bids,
            asks,
            depth: depth_count,
        })
    }

    async fn get_balance(&self, _asset: &str) -> Result<crate::types::Balance, AdapterError> {
        super::require_credentials(&self.api_key, &self.api_secret)?;
        Err(AdapterError::UnsupportedOperation)
    }
}
