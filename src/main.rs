//! `arbiwatch` binary entry point and construction root.
//!
//! Wires `AppConfig` into `Store`, `FxRateService`, one adapter per enabled
//! venue, `NotificationGate`, and the `Scheduler`/`Detector` loops, then
//! dispatches to a CLI subcommand (§6). Everything here is an explicit
//! dependency passed down from `main`, not a global singleton (§9).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arbiwatch::exchanges::binance::BinanceAdapter;
use arbiwatch::exchanges::bitbank::BitbankAdapter;
use arbiwatch::exchanges::bitflyer::BitflyerAdapter;
use arbiwatch::exchanges::bybit::BybitAdapter;
use arbiwatch::exchanges::coincheck::CoincheckAdapter;
use arbiwatch::exchanges::gmo::GmoAdapter;
use arbiwatch::exchanges::ExchangeAdapter;
use arbiwatch::{
    AppConfig, ConfigError, CurrencyPair, DetectionThresholds, Detector, Exchange, FxRateService,
    GateDecision, NotificationGate, NotificationPolicyStore, Scheduler, Store, WebhookClient,
};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use futures::StreamExt;
use reqwest::Client;
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use tokio::sync::Notify;
use tracing::{error, info, warn, Level};

#[derive(Parser)]
#[command(name = "arbiwatch", about = "Cross-exchange crypto spot arbitrage monitor")]
struct Cli {
    /// Path to the venue roster / fee model file.
    #[arg(long, env = "EXCHANGES_CONFIG", default_value = "config/exchanges.yaml")]
    exchanges_config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the collection scheduler only (quote + orderbook polling loops).
    Collect,
    /// Run the detection engine only, on a fixed interval.
    Analyze {
        #[arg(long, default_value_t = 5)]
        interval: u64,
    },
    /// Run both the scheduler and the detector in one process (default).
    Run {
        #[arg(long, default_value_t = 5)]
        detection_interval: u64,
    },
    /// Read-only dashboard. Out of scope for this binary (§1); reads the
    /// Store directly from a separate tool.
    Dashboard,
    /// Apply the embedded schema to `DATABASE_URL`. Initial provisioning is
    /// an out-of-scope operator workflow (§1); this is a thin wrapper around
    /// the same idempotent DDL the monitor runs on every `Store::connect`.
    SetupDb,
    /// Smoke-test connectivity: Store, each enabled adapter's public
    /// ticker, the FX rate service, and the Discord webhook.
    TestConnection,
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    init_logging();

    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.exchanges_config) {
        Ok(c) => c,
        Err(ConfigError::Invalid(msg)) => {
            error!(error = %msg, "configuration invalid, aborting at boot");
            std::process::exit(1);
        }
    };

    let default_interval = config.detection_interval_secs;
    let exit_code = match cli.command.unwrap_or(Command::Run { detection_interval: default_interval }) {
        Command::Collect => run_collect(config).await,
        Command::Analyze { interval } => run_analyze(config, interval).await,
        Command::Run { detection_interval } => run_both(config, detection_interval).await,
        Command::Dashboard => run_dashboard(),
        Command::SetupDb => run_setup_db(config).await,
        Command::TestConnection => run_test_connection(config).await,
    };

    std::process::exit(exit_code);
}

fn init_logging() {
    let level = std::env::var("LOG_LEVEL")
        .ok()
        .and_then(|s| s.parse::<Level>().ok())
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

/// Registers SIGINT/SIGTERM (shutdown) and SIGHUP (policy/config reload)
/// handlers. Returns a future that resolves once a shutdown signal fires;
/// SIGHUP just logs and lets the next cycle pick up the on-disk files, since
/// `NotificationPolicyStore` and `exchanges.yaml` are both already read
/// fresh rather than cached (§5 AMBIENT graceful shutdown).
fn shutdown_signal() -> impl std::future::Future<Output = ()> {
    let notify = Arc::new(Notify::new());
    let notify_clone = notify.clone();

    let signals = Signals::new([SIGINT, SIGTERM, SIGHUP]).expect("failed to register signal handlers");
    let handle = signals.handle();

    tokio::spawn(async move {
        let mut signals = signals.fuse();
        while let Some(signal) = signals.next().await {
            match signal {
                SIGHUP => {
                    info!("SIGHUP received, policy and exchange config will be re-read on the next cycle");
                }
                SIGINT | SIGTERM => {
                    info!(signal, "shutdown signal received");
                    notify_clone.notify_one();
                    break;
                }
                _ => unreachable!(),
            }
        }
        handle.close();
    });

    async move { notify.notified().await }
}

async fn connect_store(config: &AppConfig) -> Option<Arc<Store>> {
    match Store::connect(&config.database_url).await {
        Ok(s) => Some(Arc::new(s)),
        Err(e) => {
            error!(error = %e, "failed to connect to store");
            None
        }
    }
}

/// Builds one adapter per enabled venue in `config.exchanges`, plus the
/// (adapter code -> configured pairs) map the scheduler needs for fan-out.
/// Each adapter owns its own `reqwest::Client` (single-owner, §5).
fn build_adapters(
    config: &AppConfig,
    fx: Arc<FxRateService>,
) -> (Vec<Arc<dyn ExchangeAdapter>>, HashMap<String, Vec<String>>) {
    let mut adapters: Vec<Arc<dyn ExchangeAdapter>> = Vec::new();
    let mut pairs_by_adapter = HashMap::new();

    for (code, venue) in &config.exchanges {
        if !venue.enabled {
            continue;
        }
        let Ok(client) = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
        else {
            warn!(venue = %code, "failed to build HTTP client, skipping venue");
            continue;
        };

        let (api_key, api_secret) = venue_credentials(code);
        let base_url = venue.api_base_url.clone();

        let adapter: Arc<dyn ExchangeAdapter> = match code.as_str() {
            "bitflyer" => Arc::new(BitflyerAdapter::new(client, base_url, api_key, api_secret)),
            "bitbank" => Arc::new(BitbankAdapter::new(client, base_url, api_key, api_secret)),
            "coincheck" => Arc::new(CoincheckAdapter::new(client, base_url, api_key, api_secret)),
            "gmo" => Arc::new(GmoAdapter::new(client, base_url, api_key, api_secret)),
            "bybit" => Arc::new(BybitAdapter::new(client, base_url, api_key, api_secret, fx.clone())),
            "binance" => Arc::new(BinanceAdapter::new(client, base_url, api_key, api_secret, fx.clone())),
            other => {
                warn!(venue = other, "unknown venue code in exchanges.yaml, skipping");
                continue;
            }
        };

        pairs_by_adapter.insert(code.clone(), venue.supported_pairs.clone());
        adapters.push(adapter);
    }

    (adapters, pairs_by_adapter)
}

fn venue_credentials(code: &str) -> (Option<String>, Option<String>) {
    let prefix = code.to_uppercase();
    (
        std::env::var(format!("{prefix}_API_KEY")).ok(),
        std::env::var(format!("{prefix}_API_SECRET")).ok(),
    )
}

fn exchanges_from_config(config: &AppConfig) -> HashMap<String, Exchange> {
    config
        .exchanges
        .iter()
        .map(|(code, venue)| {
            (
                code.clone(),
                Exchange {
                    code: code.clone(),
                    name: code.clone(),
                    maker_fee: venue.maker_fee.unwrap_or(rust_decimal::Decimal::ZERO),
                    taker_fee: venue.taker_fee.unwrap_or(rust_decimal::Decimal::ZERO),
                    withdrawal_fees: venue.withdrawal_fees.clone(),
                    active: venue.enabled,
                },
            )
        })
        .collect()
}

/// Upserts every configured venue and pair into the catalog tables so that
/// subsequent `insert_quote`/`insert_opportunity` calls don't trip the
/// `price_ticks` foreign keys on a freshly-provisioned database. Shared by
/// every entry point that runs the scheduler, standalone or not.
async fn provision_catalog(
    store: &Store,
    exchanges: &HashMap<String, Exchange>,
    pairs_by_adapter: &HashMap<String, Vec<String>>,
) {
    for venue in exchanges.values() {
        let _ = store.upsert_exchange(venue).await;
    }
    for pairs in pairs_by_adapter.values() {
        for symbol in pairs {
            if let Some(pair) = CurrencyPair::new(symbol) {
                let _ = store.upsert_pair(&pair).await;
            }
        }
    }
}

fn build_gate(config: &AppConfig) -> NotificationGate {
    let policy_store = NotificationPolicyStore::new(&config.notification_policy_path);
    let webhook_client = Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_default();
    let webhook = WebhookClient::new(config.discord_webhook_url.clone(), webhook_client);
    NotificationGate::new(policy_store, webhook)
}

async fn run_collect(config: AppConfig) -> i32 {
    let Some(store) = connect_store(&config).await else {
        return 2;
    };
    let fx = Arc::new(FxRateService::new(Client::new()));
    let (adapters, pairs_by_adapter) = build_adapters(&config, fx);
    if adapters.is_empty() {
        warn!("no enabled exchange adapters configured, scheduler will idle");
    }
    let exchanges = exchanges_from_config(&config);
    provision_catalog(&store, &exchanges, &pairs_by_adapter).await;

    let scheduler = Arc::new(Scheduler::new(
        adapters,
        pairs_by_adapter,
        config.major_pairs.clone(),
        store,
        Duration::from_millis(config.quote_poll_interval_ms),
        Duration::from_millis(config.orderbook_poll_interval_ms),
        Duration::from_secs(config.http_timeout_secs),
    ));

    info!("collection scheduler starting");
    scheduler.run(shutdown_signal(), Duration::from_secs(10)).await;
    info!("collection scheduler stopped");
    0
}

async fn run_analyze(config: AppConfig, interval_secs: u64) -> i32 {
    let Some(store) = connect_store(&config).await else {
        return 2;
    };
    let exchanges = exchanges_from_config(&config);
    let pairs = match store.active_pairs().await {
        Ok(p) => p.into_iter().map(|p| p.symbol).collect(),
        Err(e) => {
            error!(error = %e, "failed to load active pairs, aborting");
            return 2;
        }
    };

    let detector = Detector::new(
        store,
        exchanges,
        pairs,
        config.freshness_window_secs,
        DetectionThresholds::default(),
    )
    .await;
    let gate = build_gate(&config);

    info!(interval_secs, "detection engine starting");
    let mut tick = tokio::time::interval(Duration::from_secs(interval_secs));
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = tick.tick() => {
                let opportunities = detector.run_once().await;
                if !opportunities.is_empty() {
                    let decisions = gate.evaluate_many(&opportunities).await;
                    let sent = decisions.iter().filter(|d| **d == GateDecision::Sent).count();
                    info!(found = opportunities.len(), notified = sent, "detection cycle complete");
                }
            }
            _ = &mut shutdown => {
                info!("detection engine stopped");
                break;
            }
        }
    }
    0
}

/// Default mode: scheduler and detector as sibling tasks in one process
/// (§6 SUPPLEMENT, mirroring original_source's combined-daemon `main.py`).
async fn run_both(config: AppConfig, detection_interval: u64) -> i32 {
    let Some(store) = connect_store(&config).await else {
        return 2;
    };
    let fx = Arc::new(FxRateService::new(Client::new()));
    let (adapters, pairs_by_adapter) = build_adapters(&config, fx);
    let exchanges = exchanges_from_config(&config);
    provision_catalog(&store, &exchanges, &pairs_by_adapter).await;

    let scheduler = Arc::new(Scheduler::new(
        adapters,
        pairs_by_adapter.clone(),
        config.major_pairs.clone(),
        store.clone(),
        Duration::from_millis(config.quote_poll_interval_ms),
        Duration::from_millis(config.orderbook_poll_interval_ms),
        Duration::from_secs(config.http_timeout_secs),
    ));

    let pairs: Vec<String> = pairs_by_adapter.values().flatten().cloned().collect();
    let detector = Detector::new(
        store,
        exchanges,
        pairs,
        config.freshness_window_secs,
        DetectionThresholds::default(),
    )
    .await;
    let gate = build_gate(&config);

    let scheduler_task = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move {
            scheduler.run(std::future::pending::<()>(), Duration::from_secs(10)).await;
        })
    };

    info!(detection_interval_secs = detection_interval, "collection and detection running in one process");
    let mut tick = tokio::time::interval(Duration::from_secs(detection_interval));
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = tick.tick() => {
                let opportunities = detector.run_once().await;
                if !opportunities.is_empty() {
                    let decisions = gate.evaluate_many(&opportunities).await;
                    let sent = decisions.iter().filter(|d| **d == GateDecision::Sent).count();
                    info!(found = opportunities.len(), notified = sent, "detection cycle complete");
                }
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping");
                scheduler_task.abort();
                break;
            }
        }
    }
    0
}

fn run_dashboard() -> i32 {
    info!("the read-only dashboard is a separate tool that reads the Store directly (out of scope here, see DESIGN.md)");
    0
}

async fn run_setup_db(config: AppConfig) -> i32 {
    match Store::connect(&config.database_url).await {
        Ok(_) => {
            info!("schema applied (idempotent)");
            0
        }
        Err(e) => {
            error!(error = %e, "schema setup failed");
            2
        }
    }
}

async fn run_test_connection(config: AppConfig) -> i32 {
    let mut ok = true;

    match Store::connect(&config.database_url).await {
        Ok(store) => {
            if store.test_connection().await {
                info!("store: OK");
            } else {
                error!("store: connection test query failed");
                ok = false;
            }
        }
        Err(e) => {
            error!(error = %e, "store: connect failed");
            ok = false;
        }
    }

    let fx = Arc::new(FxRateService::new(Client::new()));
    let rate = fx.get_rate("USDJPY").await;
    info!(%rate, "fx: OK");

    let (adapters, pairs_by_adapter) = build_adapters(&config, fx);
    let checks = adapters.iter().map(|adapter| {
        let pair = pairs_by_adapter
            .get(adapter.code())
            .and_then(|p| p.first())
            .cloned()
            .unwrap_or_else(|| "BTC/JPY".to_string());
        let code = adapter.code().to_string();
        let adapter = adapter.clone();
        async move {
            match adapter.get_ticker(&pair).await {
                Ok(_) => {
                    info!(venue = %code, "ticker: OK");
                    true
                }
                Err(e) => {
                    error!(venue = %code, error = %e, "ticker: failed");
                    false
                }
            }
        }
    });
    if !join_all(checks).await.into_iter().all(|r| r) {
        ok = false;
    }

    if let Some(webhook_url) = &config.discord_webhook_url {
        let client = Client::new();
        let webhook = WebhookClient::new(Some(webhook_url.clone()), client);
        if webhook.send_system_alert("test-connection", "arbiwatch connectivity check", false).await {
            info!("webhook: OK");
        } else {
            error!("webhook: failed");
            ok = false;
        }
    } else {
        warn!("webhook: DISCORD_WEBHOOK_URL not set, skipping");
    }

    if ok {
        0
    } else {
        2
    }
}
