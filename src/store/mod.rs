//! Persistent time-series store (PostgreSQL via `sqlx`).
//!
//! Two access modes: append-only writes (quotes, opportunities, orderbook
//! snapshots) and reads (the detection hot path, operator analytics). The
//! hot path — "one row per exchange containing its most recent tick within
//! the freshness window" — is a single `DISTINCT ON` query that rides the
//! `(pair, exchange, timestamp DESC)` index, answering in O(exchanges).
//!
//! Author: AI-Generated
//! Created: 2026-02-03

mod schema;

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{error, warn};

use crate::error::StoreError;
use crate::types::{
    ArbitrageOpportunity, Balance, CurrencyPair, Exchange, FeeBreakdown, OpportunityKind,
    OpportunityStatus, OrderbookLevel, OrderbookSnapshot, Quote,
};

const STATEMENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Handle onto the persistent store. Cheap to clone (wraps a connection pool).
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    /// Connect and run the embedded schema if it hasn't been applied yet.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Idempotently provision the schema. Out-of-scope as an *operator*
    /// workflow (§1), but the monitor itself must be able to start against
    /// an empty database without a separate provisioning step failing it.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(schema::SCHEMA_SQL)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn with_timeout<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, sqlx::Error>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(STATEMENT_TIMEOUT, fut).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(StoreError::from(e)),
            Err(_) => Err(StoreError::Unavailable("statement timed out".into())),
        }
    }

    // --- Writes -----------------------------------------------------------

    pub async fn upsert_exchange(&self, ex: &Exchange) -> Result<(), StoreError> {
        let withdrawal_fees =
            serde_json::to_value(&ex.withdrawal_fees).unwrap_or(serde_json::Value::Null);
        self.with_timeout(
            sqlx::query(
                r#"
                INSERT INTO exchanges (code, name, maker_fee, taker_fee, withdrawal_fees, is_active)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (code) DO UPDATE SET
                    name = EXCLUDED.name,
                    maker_fee = EXCLUDED.maker_fee,
                    taker_fee = EXCLUDED.taker_fee,
                    withdrawal_fees = EXCLUDED.withdrawal_fees,
                    is_active = EXCLUDED.is_active
                "#,
            )
            .bind(&ex.code)
            .bind(&ex.name)
            .bind(ex.maker_fee)
            .bind(ex.taker_fee)
            .bind(withdrawal_fees)
            .bind(ex.active)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    pub async fn upsert_pair(&self, pair: &CurrencyPair) -> Result<(), StoreError> {
        self.with_timeout(
            sqlx::query(
                r#"
                INSERT INTO currency_pairs (symbol, base_currency, quote_currency, is_active)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (symbol) DO UPDATE SET is_active = EXCLUDED.is_active
                "#,
            )
            .bind(&pair.symbol)
            .bind(&pair.base)
            .bind(&pair.quote)
            .bind(pair.active)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    pub async fn active_pairs(&self) -> Result<Vec<CurrencyPair>, StoreError> {
        let rows = self
            .with_timeout(
                sqlx::query_as::<_, (String, String, String)>(
                    "SELECT symbol, base_currency, quote_currency FROM currency_pairs WHERE is_active",
                )
                .fetch_all(&self.pool),
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|(symbol, base, quote)| CurrencyPair {
                symbol,
                base,
                quote,
                lot_increment: None,
                price_increment: None,
                active: true,
            })
            .collect())
    }

    /// Insert a quote. Because a tick can only be constructed through
    /// `Quote::new`, the `ask >= bid > 0` invariant already held by the time
    /// this is called; a write failure downgrades the calling cycle's tick
    /// to a logged skip rather than aborting the process (§4.A).
    pub async fn insert_quote(&self, q: &Quote) -> Result<(), StoreError> {
        self.with_timeout(
            sqlx::query(
                r#"
                INSERT INTO price_ticks
                    (exchange_code, pair_symbol, timestamp, bid, ask, bid_size, ask_size, last_price, volume_24h)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (exchange_code, pair_symbol, timestamp) DO NOTHING
                "#,
            )
            .bind(&q.exchange_code)
            .bind(&q.pair_symbol)
            .bind(q.timestamp)
            .bind(q.bid)
            .bind(q.ask)
            .bind(q.bid_size)
            .bind(q.ask_size)
            .bind(q.last)
            .bind(q.volume_24h)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    pub async fn insert_orderbook_snapshot(
        &self,
        snap: &OrderbookSnapshot,
    ) -> Result<(), StoreError> {
        let bids = serde_json::to_value(&snap.bids).unwrap_or(serde_json::Value::Null);
        let asks = serde_json::to_value(&snap.asks).unwrap_or(serde_json::Value::Null);
        self.with_timeout(
            sqlx::query(
                r#"
                INSERT INTO orderbook_snapshots
                    (exchange_code, pair_symbol, timestamp, bids, asks, depth)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(&snap.exchange_code)
            .bind(&snap.pair_symbol)
            .bind(snap.timestamp)
            .bind(bids)
            .bind(asks)
            .bind(snap.depth)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    pub async fn insert_balance(&self, bal: &Balance) -> Result<(), StoreError> {
        self.with_timeout(
            sqlx::query(
                r#"
                INSERT INTO balances (exchange_code, currency, timestamp, available, locked)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (exchange_code, currency, timestamp) DO NOTHING
                "#,
            )
            .bind(&bal.exchange_code)
            .bind(&bal.asset)
            .bind(bal.timestamp)
            .bind(bal.available)
            .bind(bal.locked)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    pub async fn insert_opportunity(
        &self,
        opp: &ArbitrageOpportunity,
    ) -> Result<i64, StoreError> {
        let status = match opp.status {
            OpportunityStatus::Detected => "detected",
            OpportunityStatus::Skipped => "skipped",
            OpportunityStatus::Notified => "notified",
        };
        let row: (i64,) = self
            .with_timeout(
                sqlx::query_as(
                    r#"
                    INSERT INTO arbitrage_opportunities
                        (timestamp, kind, pair_symbol, buy_exchange, sell_exchange,
                         buy_price, sell_price, price_diff_pct, estimated_profit_pct,
                         max_profitable_volume, buy_fees, sell_fees, transfer_fee,
                         total_fees_pct, status, skip_reason)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                    RETURNING id
                    "#,
                )
                .bind(opp.timestamp)
                .bind(opp.kind.to_string())
                .bind(&opp.pair_symbol)
                .bind(&opp.buy_exchange)
                .bind(&opp.sell_exchange)
                .bind(opp.buy_price)
                .bind(opp.sell_price)
                .bind(opp.price_diff_pct)
                .bind(opp.estimated_profit_pct)
                .bind(opp.max_volume)
                .bind(opp.fees.buy_fees)
                .bind(opp.fees.sell_fees)
                .bind(opp.fees.transfer_fee)
                .bind(opp.fees.total_fees_pct)
                .bind(status)
                .bind(&opp.skip_reason)
                .fetch_one(&self.pool),
            )
            .await?;
        Ok(row.0)
    }

    // --- Reads --------------------------------------------------------------

    /// The detection hot path: one row per exchange holding that exchange's
    /// most recent tick for `pair_symbol` within `window_secs` seconds of
    /// now. Rides the `(pair_symbol, exchange_code, timestamp DESC)` index.
    pub async fn latest_quotes_for_pair(
        &self,
        pair_symbol: &str,
        window_secs: i64,
    ) -> Result<Vec<Quote>, StoreError> {
        let cutoff = Utc::now() - chrono::Duration::seconds(window_secs);
        let rows = self
            .with_timeout(
                sqlx::query_as::<
                    _,
                    (
                        String,
                        String,
                        DateTime<Utc>,
                        Decimal,
                        Decimal,
                        Decimal,
                        Decimal,
                        Option<Decimal>,
                        Option<Decimal>,
                    ),
                >(
                    r#"
                    SELECT DISTINCT ON (exchange_code)
                        exchange_code, pair_symbol, timestamp, bid, ask,
                        bid_size, ask_size, last_price, volume_24h
                    FROM price_ticks
                    WHERE pair_symbol = $1 AND timestamp > $2
                    ORDER BY exchange_code, timestamp DESC
                    "#,
                )
                .bind(pair_symbol)
                .bind(cutoff)
                .fetch_all(&self.pool),
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(
                |(exchange_code, pair_symbol, timestamp, bid, ask, bid_size, ask_size, last, volume_24h)| {
                    Quote {
                        exchange_code,
                        pair_symbol,
                        timestamp,
                        bid,
                        ask,
                        bid_size,
                        ask_size,
                        last,
                        volume_24h,
                        is_native_jpy: false,
                        conversion: None,
                    }
                },
            )
            .collect())
    }

    /// Operator analytics: opportunities within a time window, newest first.
    pub async fn opportunities_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<ArbitrageOpportunity>, StoreError> {
        let rows = self
            .with_timeout(
                sqlx::query_as::<
                    _,
                    (
                        i64,
                        DateTime<Utc>,
                        String,
                        String,
                        String,
                        String,
                        Decimal,
                        Decimal,
                        Decimal,
                        Decimal,
                        Decimal,
                        Decimal,
                        Decimal,
                        Decimal,
                        Decimal,
                        String,
                        Option<String>,
                    ),
                >(
                    r#"
                    SELECT id, timestamp, kind, pair_symbol, buy_exchange, sell_exchange,
                           buy_price, sell_price, price_diff_pct, estimated_profit_pct,
                           max_profitable_volume, buy_fees, sell_fees, transfer_fee,
                           total_fees_pct, status, skip_reason
                    FROM arbitrage_opportunities
                    WHERE timestamp > $1
                    ORDER BY timestamp DESC
                    "#,
                )
                .bind(since)
                .fetch_all(&self.pool),
            )
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(
                |(
                    id,
                    timestamp,
                    kind,
                    pair_symbol,
                    buy_exchange,
                    sell_exchange,
                    buy_price,
                    sell_price,
                    price_diff_pct,
                    estimated_profit_pct,
                    max_volume,
                    buy_fees,
                    sell_fees,
                    transfer_fee,
                    total_fees_pct,
                    status,
                    skip_reason,
                )| {
                    let kind = parse_kind(&kind)?;
                    let status = parse_status(&status)?;
                    Some(ArbitrageOpportunity {
                        id: Some(id),
                        timestamp,
                        kind,
                        pair_symbol,
                        buy_exchange,
                        sell_exchange,
                        buy_price,
                        sell_price,
                        price_diff_pct,
                        estimated_profit_pct,
                        max_volume,
                        fees: FeeBreakdown {
                            buy_fees,
                            sell_fees,
                            transfer_fee,
                            total_fees_pct,
                        },
                        status,
                        skip_reason,
                    })
                },
            )
            .collect())
    }

    /// Operator-tunable overrides loaded from the `system_config` table,
    /// falling back to YAML-seeded defaults on any read failure.
    pub async fn load_system_config(&self) -> HashMap<String, serde_json::Value> {
        let result = self
            .with_timeout(
                sqlx::query_as::<_, (String, serde_json::Value)>(
                    "SELECT key, value FROM system_config",
                )
                .fetch_all(&self.pool),
            )
            .await;

        match result {
            Ok(rows) => rows.into_iter().collect(),
            Err(e) => {
                warn!(error = %e, "failed to load system_config, using YAML defaults");
                HashMap::new()
            }
        }
    }

    pub async fn test_connection(&self) -> bool {
        match self
            .with_timeout(sqlx::query("SELECT 1").execute(&self.pool))
            .await
        {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, "store connection test failed");
                false
            }
        }
    }
}

fn parse_kind(s: &str) -> Option<OpportunityKind> {
    match s {
        "direct" => Some(OpportunityKind::Direct),
        "cross_rate" => Some(OpportunityKind::CrossRate),
        "usd" => Some(OpportunityKind::Usd),
        "triangle" => Some(OpportunityKind::Triangle),
        "latency" => Some(OpportunityKind::Latency),
        _ => None,
    }
}

fn parse_status(s: &str) -> Option<OpportunityStatus> {
    match s {
        "detected" => Some(OpportunityStatus::Detected),
        "skipped" => Some(OpportunityStatus::Skipped),
        "notified" => Some(OpportunityStatus::Notified),
        _ => None,
    }
}
