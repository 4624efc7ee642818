//! Configuration for the streaming client and the runner.
//!
//! Settings come from an optional JSON file; every field has a default so an
//! empty object (or no file at all) yields a working mainnet configuration.
//!
//! # Example config
//!
//! ```json
//! {
//!   "ws":    { "network": "testnet", "request_timeout_ms": 10000 },
//!   "log":   { "level": "debug", "dir": "/tmp/hlx", "json": false },
//!   "feeds": { "coins": ["BTC", "ETH"], "all_mids": true }
//! }
//! ```

use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{HlxError, Result};

/// Production WebSocket endpoint.
pub const MAINNET_WS_URL: &str = "wss://api.hyperliquid.xyz/ws";
/// Test network WebSocket endpoint.
pub const TESTNET_WS_URL: &str = "wss://api.hyperliquid-testnet.xyz/ws";

/// Default wait for a post response.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;
/// Default pause between sending the close frame and dropping the socket.
pub const DEFAULT_CLOSE_GRACE_MS: u64 = 100;

/// Environment variable holding the account address used for user feeds.
pub const ACCOUNT_ADDRESS_ENV: &str = "HL_ACCOUNT_ADDRESS";

/// Which venue network to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    /// Fixed WebSocket endpoint for this network.
    pub fn ws_url(self) -> &'static str {
        match self {
            Network::Mainnet => MAINNET_WS_URL,
            Network::Testnet => TESTNET_WS_URL,
        }
    }
}

impl FromStr for Network {
    type Err = HlxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            other => Err(HlxError::Config(format!("unknown network: {other}"))),
        }
    }
}

/// Connection settings for the WebSocket client.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WsConfig {
    /// Network whose fixed endpoint is used when `ws_url` is unset.
    pub network: Network,

    /// Explicit endpoint, used verbatim (local gateways, test servers).
    pub ws_url: Option<String>,

    /// How long `post` waits for its response.
    pub request_timeout_ms: u64,

    /// Pause after the close frame before the socket is dropped.
    pub close_grace_ms: u64,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            network: Network::Mainnet,
            ws_url: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            close_grace_ms: DEFAULT_CLOSE_GRACE_MS,
        }
    }
}

impl WsConfig {
    /// Default settings for the given network.
    pub fn for_network(network: Network) -> Self {
        Self {
            network,
            ..Self::default()
        }
    }

    /// Settings pointing at an explicit endpoint.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            ws_url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Resolved endpoint URL.
    pub fn endpoint(&self) -> &str {
        self.ws_url.as_deref().unwrap_or_else(|| self.network.ws_url())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }

    /// Reject endpoints that are not `ws`/`wss` URLs and a zero request timeout.
    pub fn validate(&self) -> Result<()> {
        let endpoint = self.endpoint();
        let parsed = url::Url::parse(endpoint)
            .map_err(|e| HlxError::Config(format!("invalid endpoint {endpoint}: {e}")))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(HlxError::Config(format!(
                "endpoint {endpoint} is not a websocket url"
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(HlxError::Config("request_timeout_ms must be > 0".into()));
        }
        Ok(())
    }
}

/// Logging block of the runner config.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub dir: Option<String>,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            dir: None,
            json: false,
        }
    }
}

/// Feeds the runner subscribes to.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Coins to follow (best bid/offer + trades for each).
    pub coins: Vec<String>,
    /// Also subscribe to the all-mids feed.
    pub all_mids: bool,
}

/// Top-level runner config, deserialized from a JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ws: WsConfig,
    pub log: LogConfig,
    pub feeds: FeedConfig,
}

/// Load and parse a JSON config file.
pub fn load_config(path: &std::path::Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| HlxError::Config(format!("read {}: {e}", path.display())))?;
    let config: AppConfig = serde_json::from_str(&content)
        .map_err(|e| HlxError::Config(format!("parse {}: {e}", path.display())))?;
    config.ws.validate()?;
    Ok(config)
}

/// Account identity supplied through the environment.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Account address used for user-scoped feeds.
    pub account_address: Option<String>,
}

impl Credentials {
    /// Read credentials from [`ACCOUNT_ADDRESS_ENV`]; blank values count as unset.
    pub fn from_env() -> Self {
        let account_address = std::env::var(ACCOUNT_ADDRESS_ENV)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        Self { account_address }
    }
}
