//! Typed subscription helpers.
//!
//! Each helper subscribes with a fixed descriptor and puts a decode step in
//! front of the caller's callback. A payload that does not decode into the
//! feed's type is logged and skipped; the callback only ever sees
//! well-formed values. Every helper returns the descriptor it subscribed
//! with, ready to pass to [`WsClient::unsubscribe`].

use std::sync::Arc;

use hlx_core::error::Result;
use hlx_core::types::*;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::client::WsClient;
use crate::registry::Callback;

/// Wrap a typed callback into a raw handler that decodes first.
pub fn decoding<T, F>(label: String, callback: F) -> Callback
where
    T: DeserializeOwned,
    F: Fn(T) + Send + Sync + 'static,
{
    Arc::new(move |data: Value| match serde_json::from_value::<T>(data) {
        Ok(value) => callback(value),
        Err(e) => warn!("[hl-ws] {label}: payload skipped, decode failed: {e}"),
    })
}

/// Candle frames carry one bar or a batch of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(v: OneOrMany<T>) -> Self {
        match v {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

impl WsClient {
    async fn subscribe_typed<T, F>(&self, subscription: Subscription, callback: F) -> Result<Subscription>
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        let handler = decoding(subscription.channel_key(), callback);
        self.subscribe(subscription.clone(), handler).await?;
        Ok(subscription)
    }

    /// Mid prices of every coin.
    pub async fn subscribe_all_mids<F>(&self, callback: F) -> Result<Subscription>
    where
        F: Fn(AllMids) + Send + Sync + 'static,
    {
        self.subscribe_typed(Subscription::all_mids(), callback).await
    }

    pub async fn subscribe_notification<F>(&self, user: &str, callback: F) -> Result<Subscription>
    where
        F: Fn(Notification) + Send + Sync + 'static,
    {
        self.subscribe_typed(Subscription::notification(user), callback).await
    }

    /// Candles for `coin` at `interval` (e.g. `"1m"`, `"1h"`).
    pub async fn subscribe_candles<F>(&self, coin: &str, interval: &str, callback: F) -> Result<Subscription>
    where
        F: Fn(Vec<Candle>) + Send + Sync + 'static,
    {
        self.subscribe_typed(Subscription::candle(coin, interval), move |batch: OneOrMany<Candle>| {
            callback(batch.into())
        })
        .await
    }

    /// Order book snapshots for `coin`.
    pub async fn subscribe_l2_book<F>(&self, coin: &str, callback: F) -> Result<Subscription>
    where
        F: Fn(WsBook) + Send + Sync + 'static,
    {
        self.subscribe_typed(Subscription::l2_book(coin), callback).await
    }

    pub async fn subscribe_trades<F>(&self, coin: &str, callback: F) -> Result<Subscription>
    where
        F: Fn(Vec<WsTrade>) + Send + Sync + 'static,
    {
        self.subscribe_typed(Subscription::trades(coin), callback).await
    }

    /// Order status changes for `user`.
    pub async fn subscribe_order_updates<F>(&self, user: &str, callback: F) -> Result<Subscription>
    where
        F: Fn(Vec<WsOrder>) + Send + Sync + 'static,
    {
        self.subscribe_typed(Subscription::order_updates(user), callback).await
    }

    pub async fn subscribe_user_events<F>(&self, user: &str, callback: F) -> Result<Subscription>
    where
        F: Fn(WsUserEvent) + Send + Sync + 'static,
    {
        self.subscribe_typed(Subscription::user_events(user), callback).await
    }

    /// Fills for `user`; `aggregate_by_time` merges partial fills of one order.
    pub async fn subscribe_user_fills<F>(
        &self,
        user: &str,
        aggregate_by_time: bool,
        callback: F,
    ) -> Result<Subscription>
    where
        F: Fn(WsUserFills) + Send + Sync + 'static,
    {
        self.subscribe_typed(Subscription::user_fills(user, aggregate_by_time), callback)
            .await
    }

    pub async fn subscribe_user_fundings<F>(&self, user: &str, callback: F) -> Result<Subscription>
    where
        F: Fn(WsUserFundings) + Send + Sync + 'static,
    {
        self.subscribe_typed(Subscription::user_fundings(user), callback).await
    }

    pub async fn subscribe_user_non_funding_ledger_updates<F>(
        &self,
        user: &str,
        callback: F,
    ) -> Result<Subscription>
    where
        F: Fn(WsUserNonFundingLedgerUpdates) + Send + Sync + 'static,
    {
        self.subscribe_typed(Subscription::user_non_funding_ledger_updates(user), callback)
            .await
    }

    pub async fn subscribe_active_asset_ctx<F>(&self, coin: &str, callback: F) -> Result<Subscription>
    where
        F: Fn(WsActiveAssetCtx) + Send + Sync + 'static,
    {
        self.subscribe_typed(Subscription::active_asset_ctx(coin), callback).await
    }

    pub async fn subscribe_active_asset_data<F>(
        &self,
        user: &str,
        coin: &str,
        callback: F,
    ) -> Result<Subscription>
    where
        F: Fn(WsActiveAssetData) + Send + Sync + 'static,
    {
        self.subscribe_typed(Subscription::active_asset_data(user, coin), callback)
            .await
    }

    pub async fn subscribe_user_twap_slice_fills<F>(&self, user: &str, callback: F) -> Result<Subscription>
    where
        F: Fn(WsUserTwapSliceFills) + Send + Sync + 'static,
    {
        self.subscribe_typed(Subscription::user_twap_slice_fills(user), callback)
            .await
    }

    pub async fn subscribe_user_twap_history<F>(&self, user: &str, callback: F) -> Result<Subscription>
    where
        F: Fn(WsUserTwapHistory) + Send + Sync + 'static,
    {
        self.subscribe_typed(Subscription::user_twap_history(user), callback)
            .await
    }

    /// Best bid and offer for `coin`.
    pub async fn subscribe_bbo<F>(&self, coin: &str, callback: F) -> Result<Subscription>
    where
        F: Fn(WsBbo) + Send + Sync + 'static,
    {
        self.subscribe_typed(Subscription::bbo(coin), callback).await
    }
}
