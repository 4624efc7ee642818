//! Typed payloads for each subscription feed.
//!
//! Prices and sizes stay decimal strings exactly as the venue sends them so no
//! precision is lost; callers convert where they need arithmetic. Fields the
//! venue omits on some messages (snapshot flags, optional ids) are defaulted.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Market data
// ---------------------------------------------------------------------------

/// Mid prices for every coin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllMids {
    pub mids: HashMap<String, String>,
}

/// One OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Open time (ms).
    #[serde(rename = "t")]
    pub open_time: u64,
    /// Close time (ms).
    #[serde(rename = "T")]
    pub close_time: u64,
    #[serde(rename = "s")]
    pub coin: String,
    #[serde(rename = "i")]
    pub interval: String,
    #[serde(rename = "o")]
    pub open: String,
    #[serde(rename = "c")]
    pub close: String,
    #[serde(rename = "h")]
    pub high: String,
    #[serde(rename = "l")]
    pub low: String,
    #[serde(rename = "v")]
    pub volume: String,
    /// Number of trades.
    #[serde(rename = "n")]
    pub trades: u64,
}

/// A single price level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsLevel {
    pub px: String,
    pub sz: String,
    /// Number of orders at this level.
    pub n: u32,
}

/// Order book snapshot; `levels[0]` are bids, `levels[1]` asks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsBook {
    pub coin: String,
    pub time: u64,
    pub levels: Vec<Vec<WsLevel>>,
}

impl WsBook {
    pub fn bids(&self) -> &[WsLevel] {
        self.levels.first().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn asks(&self) -> &[WsLevel] {
        self.levels.get(1).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Best bid and offer; either side may be empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsBbo {
    pub coin: String,
    pub time: u64,
    pub bbo: [Option<WsLevel>; 2],
}

impl WsBbo {
    pub fn bid(&self) -> Option<&WsLevel> {
        self.bbo[0].as_ref()
    }

    pub fn ask(&self) -> Option<&WsLevel> {
        self.bbo[1].as_ref()
    }
}

/// A public trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsTrade {
    pub coin: String,
    pub side: String,
    pub px: String,
    pub sz: String,
    pub hash: String,
    pub time: u64,
    pub tid: u64,
    /// `[buyer, seller]`.
    #[serde(default)]
    pub users: [String; 2],
}

/// Free-form notification text for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub notification: String,
}

// ---------------------------------------------------------------------------
// Orders and fills
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsBasicOrder {
    pub coin: String,
    pub side: String,
    pub limit_px: String,
    pub sz: String,
    pub oid: u64,
    pub timestamp: u64,
    pub orig_sz: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloid: Option<String>,
}

/// Order status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsOrder {
    pub order: WsBasicOrder,
    pub status: String,
    pub status_timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillLiquidation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquidated_user: Option<String>,
    pub mark_px: f64,
    pub method: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsFill {
    pub coin: String,
    pub px: String,
    pub sz: String,
    pub side: String,
    pub time: u64,
    pub start_position: String,
    pub dir: String,
    pub closed_pnl: String,
    pub hash: String,
    pub oid: u64,
    pub crossed: bool,
    pub fee: String,
    pub tid: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquidation: Option<FillLiquidation>,
    #[serde(default)]
    pub fee_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder_fee: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsUserFills {
    #[serde(default)]
    pub is_snapshot: bool,
    pub user: String,
    pub fills: Vec<WsFill>,
}

// ---------------------------------------------------------------------------
// Account events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsUserFunding {
    pub time: u64,
    pub coin: String,
    pub usdc: String,
    pub szi: String,
    pub funding_rate: String,
}

/// Liquidation record; the venue uses snake_case keys here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsLiquidation {
    pub lid: u64,
    pub liquidator: String,
    pub liquidated_user: String,
    pub liquidated_ntl_pos: String,
    pub liquidated_account_value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsNonUserCancel {
    pub coin: String,
    pub oid: u64,
}

/// One of fills, funding, liquidation or non-user cancels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsUserEvent {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fills: Vec<WsFill>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funding: Option<WsUserFunding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquidation: Option<WsLiquidation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub non_user_cancel: Vec<WsNonUserCancel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsUserFundings {
    #[serde(default)]
    pub is_snapshot: bool,
    pub user: String,
    pub fundings: Vec<WsUserFunding>,
}

/// Deposit, withdrawal, transfer, ... The `delta` shape depends on its `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonFundingUpdate {
    pub time: u64,
    pub hash: String,
    pub delta: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsUserNonFundingLedgerUpdates {
    #[serde(default)]
    pub is_snapshot: bool,
    pub user: String,
    #[serde(rename = "nonFundingLedgerUpdates", alias = "updates")]
    pub updates: Vec<NonFundingUpdate>,
}

// ---------------------------------------------------------------------------
// Asset context / data
// ---------------------------------------------------------------------------

/// Market context of a perp or spot asset. Perp-only and spot-only fields
/// are absent for the other kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetCtx {
    pub day_ntl_vlm: String,
    pub prev_day_px: String,
    pub mark_px: String,
    #[serde(default)]
    pub mid_px: Option<String>,
    #[serde(default)]
    pub funding: Option<String>,
    #[serde(default)]
    pub open_interest: Option<String>,
    #[serde(default)]
    pub oracle_px: Option<String>,
    #[serde(default)]
    pub circulating_supply: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsActiveAssetCtx {
    pub coin: String,
    pub ctx: AssetCtx,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Leverage {
    /// `"cross"` or `"isolated"`.
    #[serde(rename = "type")]
    pub kind: String,
    pub value: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_usd: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsActiveAssetData {
    pub user: String,
    pub coin: String,
    pub leverage: Leverage,
    pub max_trade_szs: [String; 2],
    pub available_to_trade: [String; 2],
}

// ---------------------------------------------------------------------------
// TWAP
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsTwapSliceFill {
    pub fill: WsFill,
    pub twap_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsUserTwapSliceFills {
    #[serde(default)]
    pub is_snapshot: bool,
    pub user: String,
    pub twap_slice_fills: Vec<WsTwapSliceFill>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwapState {
    pub coin: String,
    pub user: String,
    pub side: String,
    pub sz: String,
    pub executed_sz: String,
    pub executed_ntl: String,
    pub minutes: u32,
    pub reduce_only: bool,
    pub randomize: bool,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwapStatus {
    pub status: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsTwapHistory {
    pub state: TwapState,
    pub status: TwapStatus,
    pub time: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsUserTwapHistory {
    #[serde(default)]
    pub is_snapshot: bool,
    pub user: String,
    pub history: Vec<WsTwapHistory>,
}
