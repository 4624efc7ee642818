//! Subscription descriptors and channel-key derivation.
//!
//! A [`Subscription`] is what goes on the wire inside a `subscribe` /
//! `unsubscribe` request. Locally it is identified by its *channel key*: the
//! feed type followed by `-user`, `-coin` and `-interval`, each segment only
//! present when the field is set and non-empty. Two descriptors with the same
//! key occupy the same registry slot.

use serde::{Deserialize, Serialize};

/// Channel labels used by the venue.
pub mod channel {
    pub const ALL_MIDS: &str = "allMids";
    pub const NOTIFICATION: &str = "notification";
    pub const CANDLE: &str = "candle";
    pub const L2_BOOK: &str = "l2Book";
    pub const TRADES: &str = "trades";
    pub const ORDER_UPDATES: &str = "orderUpdates";
    pub const USER_EVENTS: &str = "userEvents";
    pub const USER_FILLS: &str = "userFills";
    pub const USER_FUNDINGS: &str = "userFundings";
    pub const USER_NON_FUNDING_LEDGER_UPDATES: &str = "userNonFundingLedgerUpdates";
    pub const ACTIVE_ASSET_CTX: &str = "activeAssetCtx";
    pub const ACTIVE_ASSET_DATA: &str = "activeAssetData";
    pub const USER_TWAP_SLICE_FILLS: &str = "userTwapSliceFills";
    pub const USER_TWAP_HISTORY: &str = "userTwapHistory";
    pub const BBO: &str = "bbo";

    /// Responses to `post` requests.
    pub const POST: &str = "post";
    /// Acknowledgement of a subscribe/unsubscribe request.
    pub const SUBSCRIPTION_RESPONSE: &str = "subscriptionResponse";
}

/// Description of one feed of interest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// Feed type, e.g. `"l2Book"`.
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coin: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,

    /// Book aggregation: significant figures.
    #[serde(rename = "nSigFigs", default, skip_serializing_if = "Option::is_none")]
    pub n_sig_figs: Option<u32>,

    /// Book aggregation: mantissa (only valid with 5 significant figures).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mantissa: Option<u32>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub aggregate_by_time: bool,

    /// Builder-deployed perp dex name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dex: Option<String>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Subscription {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn coin(mut self, coin: impl Into<String>) -> Self {
        self.coin = Some(coin.into());
        self
    }

    pub fn interval(mut self, interval: impl Into<String>) -> Self {
        self.interval = Some(interval.into());
        self
    }

    pub fn n_sig_figs(mut self, n: u32) -> Self {
        self.n_sig_figs = Some(n);
        self
    }

    pub fn mantissa(mut self, m: u32) -> Self {
        self.mantissa = Some(m);
        self
    }

    pub fn aggregate_by_time(mut self, on: bool) -> Self {
        self.aggregate_by_time = on;
        self
    }

    pub fn dex(mut self, dex: impl Into<String>) -> Self {
        self.dex = Some(dex.into());
        self
    }

    // -- Per-feed constructors --

    pub fn all_mids() -> Self {
        Self::new(channel::ALL_MIDS)
    }

    pub fn notification(user: &str) -> Self {
        Self::new(channel::NOTIFICATION).user(user)
    }

    pub fn candle(coin: &str, interval: &str) -> Self {
        Self::new(channel::CANDLE).coin(coin).interval(interval)
    }

    pub fn l2_book(coin: &str) -> Self {
        Self::new(channel::L2_BOOK).coin(coin)
    }

    pub fn trades(coin: &str) -> Self {
        Self::new(channel::TRADES).coin(coin)
    }

    pub fn order_updates(user: &str) -> Self {
        Self::new(channel::ORDER_UPDATES).user(user)
    }

    pub fn user_events(user: &str) -> Self {
        Self::new(channel::USER_EVENTS).user(user)
    }

    pub fn user_fills(user: &str, aggregate_by_time: bool) -> Self {
        Self::new(channel::USER_FILLS)
            .user(user)
            .aggregate_by_time(aggregate_by_time)
    }

    pub fn user_fundings(user: &str) -> Self {
        Self::new(channel::USER_FUNDINGS).user(user)
    }

    pub fn user_non_funding_ledger_updates(user: &str) -> Self {
        Self::new(channel::USER_NON_FUNDING_LEDGER_UPDATES).user(user)
    }

    pub fn active_asset_ctx(coin: &str) -> Self {
        Self::new(channel::ACTIVE_ASSET_CTX).coin(coin)
    }

    pub fn active_asset_data(user: &str, coin: &str) -> Self {
        Self::new(channel::ACTIVE_ASSET_DATA).user(user).coin(coin)
    }

    pub fn user_twap_slice_fills(user: &str) -> Self {
        Self::new(channel::USER_TWAP_SLICE_FILLS).user(user)
    }

    pub fn user_twap_history(user: &str) -> Self {
        Self::new(channel::USER_TWAP_HISTORY).user(user)
    }

    pub fn bbo(coin: &str) -> Self {
        Self::new(channel::BBO).coin(coin)
    }

    /// Registry key for this subscription: `type[-user][-coin][-interval]`.
    pub fn channel_key(&self) -> String {
        compose_key(
            &self.kind,
            &[
                self.user.as_deref(),
                self.coin.as_deref(),
                self.interval.as_deref(),
            ],
        )
    }
}

/// Join `label` and every present, non-empty segment with `-`, in order.
pub fn compose_key(label: &str, segments: &[Option<&str>]) -> String {
    let mut key = String::with_capacity(label.len() + 48);
    key.push_str(label);
    for segment in segments.iter().flatten() {
        if !segment.is_empty() {
            key.push('-');
            key.push_str(segment);
        }
    }
    key
}
