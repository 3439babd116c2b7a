//! Embedded schema, applied idempotently on `Store::connect`.
//!
//! Kept as one `CREATE ... IF NOT EXISTS` batch rather than a `sqlx::migrate!`
//! directory: there is exactly one schema revision so far and no migration
//! history to replay.

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS exchanges (
    code            TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    maker_fee       NUMERIC NOT NULL,
    taker_fee       NUMERIC NOT NULL,
    withdrawal_fees JSONB NOT NULL DEFAULT '{}',
    is_active       BOOLEAN NOT NULL DEFAULT TRUE
);

CREATE TABLE IF NOT EXISTS currency_pairs (
    symbol          TEXT PRIMARY KEY,
    base_currency   TEXT NOT NULL,
    quote_currency  TEXT NOT NULL,
    is_active       BOOLEAN NOT NULL DEFAULT TRUE
);

CREATE TABLE IF NOT EXISTS price_ticks (
    id              BIGSERIAL PRIMARY KEY,
    exchange_code   TEXT NOT NULL REFERENCES exchanges(code),
    pair_symbol     TEXT NOT NULL REFERENCES currency_pairs(symbol),
    timestamp       TIMESTAMPTZ NOT NULL,
    bid             NUMERIC NOT NULL,
    ask             NUMERIC NOT NULL,
    bid_size        NUMERIC NOT NULL,
    ask_size        NUMERIC NOT NULL,
    last_price      NUMERIC,
    volume_24h      NUMERIC,
    UNIQUE (exchange_code, pair_symbol, timestamp)
);

CREATE INDEX IF NOT EXISTS idx_price_ticks_hot_path
    ON price_ticks (pair_symbol, exchange_code, timestamp DESC);

CREATE TABLE IF NOT EXISTS orderbook_snapshots (
    id              BIGSERIAL PRIMARY KEY,
    exchange_code   TEXT NOT NULL REFERENCES exchanges(code),
    pair_symbol     TEXT NOT NULL REFERENCES currency_pairs(symbol),
    timestamp       TIMESTAMPTZ NOT NULL,
    bids            JSONB NOT NULL,
    asks            JSONB NOT NULL,
    depth           INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_orderbook_snapshots_lookup
    ON orderbook_snapshots (pair_symbol, exchange_code, timestamp DESC);

CREATE TABLE IF NOT EXISTS balances (
    id              BIGSERIAL PRIMARY KEY,
    exchange_code   TEXT NOT NULL REFERENCES exchanges(code),
    currency        TEXT NOT NULL,
    timestamp       TIMESTAMPTZ NOT NULL,
    available       NUMERIC NOT NULL,
    locked          NUMERIC NOT NULL,
    UNIQUE (exchange_code, currency, timestamp)
);

CREATE TABLE IF NOT EXISTS arbitrage_opportunities (
    id                      BIGSERIAL PRIMARY KEY,
    timestamp               TIMESTAMPTZ NOT NULL,
    kind                    TEXT NOT NULL,
    pair_symbol             TEXT NOT NULL,
    buy_exchange            TEXT NOT NULL,
    sell_exchange           TEXT NOT NULL,
    buy_price               NUMERIC NOT NULL,
    sell_price              NUMERIC NOT NULL,
    price_diff_pct          NUMERIC NOT NULL,
    estimated_profit_pct    NUMERIC NOT NULL,
    max_profitable_volume   NUMERIC NOT NULL,
    buy_fees                NUMERIC NOT NULL,
    sell_fees               NUMERIC NOT NULL,
    transfer_fee            NUMERIC NOT NULL,
    total_fees_pct          NUMERIC NOT NULL,
    status                  TEXT NOT NULL,
    skip_reason             TEXT
);

CREATE INDEX IF NOT EXISTS idx_opportunities_recent
    ON arbitrage_opportunities (pair_symbol, timestamp DESC);

CREATE INDEX IF NOT EXISTS idx_opportunities_profit
    ON arbitrage_opportunities (estimated_profit_pct DESC);

CREATE INDEX IF NOT EXISTS idx_opportunities_status
    ON arbitrage_opportunities (status);

CREATE TABLE IF NOT EXISTS system_config (
    key     TEXT PRIMARY KEY,
    value   JSONB NOT NULL
);
"#;
