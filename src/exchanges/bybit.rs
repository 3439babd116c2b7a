//! Bybit adapter (international, USDT-quoted).
//!
//! Public ticker unauthenticated (`GET /v5/market/tickers?category=spot&symbol=...`).
//! Private requests (unused here) sign `timestamp + api_key + recv_window + query_or_body`
//! with HMAC-SHA256, sent as `X-BAPI-SIGN` alongside `X-BAPI-API-KEY` /
//! `X-BAPI-TIMESTAMP` / `X-BAPI-RECV-WINDOW` (default `"5000"`).
//!
//! Quotes from this venue are USDT-denominated; every quote is converted to
//! JPY via the shared FX rate service and stored under the `BASE/JPY`
//! canonical pair — the same key a domestic venue's genuine JPY quote
//! uses — so direct arbitrage can join the two, with the pre-conversion
//! USDT values preserved in `ConversionMeta` for the USD-quoted strategy.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::{hmac_sha256_hex, now_millis, ExchangeAdapter};
use crate::error::AdapterError;
use crate::fx::FxRateService;
use crate::types::{ConversionMeta, OrderbookLevel, OrderbookSnapshot, Quote};

pub struct BybitAdapter {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    api_secret: Option<String>,
    fx: Arc<FxRateService>,
}

impl BybitAdapter {
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
    fn sign(&self, recv_window: &str, query_or_body: &str) -> Option<(String, String, String)> {
        let secret = self.api_secret.as_ref()?;
        let api_key = self.api_key.clone()?;
        let timestamp = now_millis().to_string();
        let message = format!("{timestamp}{api_key}{recv_window}{query_or_body}");
        let sign = hmac_sha256_hex(secret, &message);
        Some((timestamp, "5000".to_string(), sign))
    }

    fn usdt_symbol(pair_symbol: &str) -> Option<String> {
        let (base, quote) = pair_symbol.split_once('/')?;
        Some(format!("{base}{quote}"))
    }

    /// The canonical pair this venue's JPY-converted quote is stored under;
    /// see `BinanceAdapter::jpy_pair_symbol`.
    fn jpy_pair_symbol(pair_symbol: &str) -> String {
        let base = pair_symbol.split('/').next().unwrap_or(pair_symbol);
        format!("{base}/JPY")
    }
}

#[derive(Deserialize)]
struct BybitResponse<T> {
    result: T,
}

#[derive(Deserialize)]
struct BybitTickersResult {
    list: Vec<BybitTickerEntry>,
}

#[derive(Deserialize)]
struct BybitTickerEntry {
    #[serde(rename = "bid1Price")]
    bid1_price: Decimal,
    #[serde(rename = "ask1Price")]
    ask1_price: Decimal,
    #[serde(rename = "bid1Size")]
    bid1_size: Decimal,
    #[serde(rename = "ask1Size")]
    ask1_size: Decimal,
    #[serde(rename = "lastPrice")]
    last_price: Decimal,
    volume24h: Decimal,
}

#[derive(Deserialize)]
struct BybitOrderbookResult {
    b: Vec<[Decimal; 2]>,
    a: Vec<[Decimal; 2]>,
}

#[async_trait]
impl ExchangeAdapter for BybitAdapter {
    fn code(&self) -> &str {
        "bybit"
    }

    async fn get_ticker(&self, pair_symbol: &str) -> Result<Quote, AdapterError> {
        let symbol = Self::usdt_symbol(pair_symbol)
            .ok_or_else(|| AdapterError::MalformedQuote(format!("unparseable pair {pair_symbol}")))?;
        let url = format!(
            "{}/v5/market/tickers?category=spot&symbol={}",
            self.base_url, symbol
        );
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AdapterError::TransientNetwork(e.to_string()))?;

        if resp.status() == 429 {
            return Err(AdapterError::RateLimited {
                retry_after_secs: super::retry_after_secs(&resp),
            });
        }

        let body: BybitResponse<BybitTickersResult> = resp
            .json()
            .await
            .map_err(|e| AdapterError::TransientNetwork(e.to_string()))?;
        let t = body
            .result
            .list
            .into_iter()
            .next()
            .ok_or_else(|| AdapterError::MalformedQuote("empty ticker list".into()))?;

        let fx_rate = self.fx.get_rate("USDJPY").await;
        let converted_bid = t.bid1_price * fx_rate;
        let converted_ask = t.ask1_price * fx_rate;

        let mut quote = Quote::new(
            self.code(),
            &Self::jpy_pair_symbol(pair_symbol),
            Utc::now(),
            converted_bid,
            converted_ask,
            t.bid1_size,
            t.ask1_size,
            Some(t.last_price * fx_rate),
            Some(t.volume24h),
        )?;
        quote.conversion = Some(ConversionMeta {
            original_bid: t.bid1_price,
            original_ask: t.ask1_price,
            fx_rate,
        });
        Ok(quote)
    }

    async fn get_orderbook(&self, pair_symbol: &str) -> Result<OrderbookSnapshot, AdapterError> {
        let symbol = Self::usdt_symbol(pair_symbol)
            .ok_or_else(|| AdapterError::MalformedQuote(format!("unparseable pair {pair_symbol}")))?;
        let url = format!(
            "{}/v5/market/orderbook?category=spot&symbol={}&limit=25",
            self.base_url, symbol
        );
        let body: BybitResponse<BybitOrderbookResult> = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AdapterError::TransientNetwork(e.to_string()))?
            .json()
            .await
            .map_err(|e| AdapterError::TransientNetwork(e.to_string()))?;

        let fx_rate = self.fx.get_rate("USDJPY").await;
        let bids: Vec<OrderbookLevel> = body
            .result
            .b
            .into_iter()
            .map(|[price, size]| OrderbookLevel {
                price: price * fx_rate,
                size,
            })
            .collect();
        let asks: Vec<OrderbookLevel> = body
            .result
            .a
            .into_iter()
            .map(|[price, size]| OrderbookLevel {
                price: price * fx_rate,
                size,
            })
            .collect();
        let depth = bids.len().max(asks.len()) as i32;

        Ok(OrderbookSnapshot {
            id: None,
            exchange_code: self.code().to_string(),
            pair_symbol: pair_symbol.to_string(),
            timestamp: Utc::now(),
            bids,
            asks,
            depth,
        })
    }

    async fn get_balance(&self, _asset: &str) -> Result<crate::types::Balance, AdapterError> {
        super::require_credentials(&self.api_key, &self.api_secret)?;
        Err(AdapterError::UnsupportedOperation)
    }
}
