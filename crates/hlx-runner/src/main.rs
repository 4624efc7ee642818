//! # hlx-runner
//!
//! Connects to the venue's streaming endpoint, subscribes to the configured
//! feeds and logs what arrives until Ctrl+C.
//!
//! # Usage
//!
//! ```bash
//! hlx-runner --config runner.json --coin BTC --coin ETH --mids
//! HL_ACCOUNT_ADDRESS=0x... hlx-runner --network testnet --log-level debug
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use hlx_core::config::{AppConfig, Credentials, Network, WsConfig, load_config};
use hlx_core::logging::{LogFormat, init_logging};
use hlx_core::types::{AllMids, WsBbo, WsOrder, WsTrade, WsUserFills};
use hlx_ws::WsClient;
use serde_json::json;
use tracing::{error, info, warn};

/// Venue WebSocket feed runner.
#[derive(Parser)]
#[command(name = "hlx-runner", about = "Venue WebSocket feed runner")]
struct Cli {
    /// Configuration file path (JSON). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Network to connect to (mainnet, testnet); overrides the config file.
    #[arg(short, long)]
    network: Option<Network>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Optional log directory for file output.
    #[arg(long)]
    log_dir: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,

    /// Coin to follow; repeatable.
    #[arg(long = "coin")]
    coins: Vec<String>,

    /// Subscribe to the all-mids feed.
    #[arg(long)]
    mids: bool,
}

impl Cli {
    /// Fold command-line overrides into the file config.
    fn merge(&self, mut config: AppConfig) -> AppConfig {
        if let Some(network) = self.network {
            config.ws = WsConfig {
                network,
                ws_url: None,
                ..config.ws
            };
        }
        if let Some(level) = &self.log_level {
            config.log.level = level.clone();
        }
        if self.log_dir.is_some() {
            config.log.dir = self.log_dir.clone();
        }
        config.log.json |= self.json_logs;
        config.feeds.all_mids |= self.mids;
        for coin in &self.coins {
            if !config.feeds.coins.contains(coin) {
                config.feeds.coins.push(coin.clone());
            }
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Configuration
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    let config = cli.merge(config);

    // 2. Logging
    let format = if config.log.json { LogFormat::Json } else { LogFormat::Pretty };
    init_logging(&config.log.level, config.log.dir.as_deref(), "hlx-runner", format);
    info!(
        "hlx-runner starting, endpoint={}, coins={:?}, all_mids={}",
        config.ws.endpoint(),
        config.feeds.coins,
        config.feeds.all_mids,
    );

    let credentials = Credentials::from_env();
    let client = WsClient::new(config.ws.clone());
    client.connect().await?;

    // 3. Venue metadata over the stream
    match client.post_info(&json!({"type": "meta"})).await {
        Ok(meta) => {
            // Info answers nest the result as {"type": ..., "data": ...}.
            let universe = meta["data"]["universe"].as_array().or_else(|| meta["universe"].as_array());
            let assets = universe.map_or(0, Vec::len);
            info!("venue lists {assets} perp asset(s)");
        }
        Err(e) => warn!("meta request failed: {e}"),
    }

    // 4. Feeds
    for coin in &config.feeds.coins {
        client
            .subscribe_bbo(coin, |bbo: WsBbo| {
                let bid = bbo.bid().map_or("-", |l| l.px.as_str());
                let ask = bbo.ask().map_or("-", |l| l.px.as_str());
                info!("bbo {} {bid} / {ask}", bbo.coin);
            })
            .await?;
        client
            .subscribe_trades(coin, |trades: Vec<WsTrade>| {
                for t in &trades {
                    info!("trade {} {} {}@{}", t.coin, t.side, t.sz, t.px);
                }
            })
            .await?;
    }

    if config.feeds.all_mids {
        client
            .subscribe_all_mids(|mids: AllMids| info!("all mids: {} coin(s)", mids.mids.len()))
            .await?;
    }

    match &credentials.account_address {
        Some(user) => {
            client
                .subscribe_order_updates(user, |orders: Vec<WsOrder>| {
                    for o in &orders {
                        info!("order {} {} {}: {}", o.order.oid, o.order.coin, o.order.side, o.status);
                    }
                })
                .await?;
            client
                .subscribe_user_fills(user, false, |fills: WsUserFills| {
                    if fills.is_snapshot {
                        info!("fill snapshot: {} fill(s)", fills.fills.len());
                        return;
                    }
                    for f in &fills.fills {
                        info!("fill {} {} {}@{} oid={}", f.coin, f.side, f.sz, f.px, f.oid);
                    }
                })
                .await?;
        }
        None => info!("no account address set, skipping user feeds"),
    }

    info!(
        "{} subscription(s) active, press Ctrl+C to stop",
        client.subscription_count().await
    );

    // 5. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    if let Err(e) = client.disconnect().await {
        error!("error during disconnect: {e}");
    }

    info!("stopped");
    Ok(())
}
