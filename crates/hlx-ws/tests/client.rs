mod common;

use std::sync::Arc;

use common::{MockVenue, eventually, recv_within};
use hlx_core::HlxError;
use hlx_core::types::{Subscription, WsOrder};
use hlx_ws::{Callback, WsClient};
use serde_json::{Value, json};
use tokio::sync::mpsc;

fn forward(tx: mpsc::UnboundedSender<Value>) -> Callback {
    Arc::new(move |data: Value| {
        let _ = tx.send(data);
    })
}

fn channel() -> (Callback, mpsc::UnboundedReceiver<Value>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (forward(tx), rx)
}

fn book(coin: &str) -> Value {
    json!({"coin": coin, "time": 1, "levels": [[], []]})
}

fn order(oid: u64) -> Value {
    json!({
        "order": {"coin": "BTC", "side": "B", "limitPx": "1", "sz": "1", "oid": oid,
                  "timestamp": 1, "origSz": "1"},
        "status": "open",
        "statusTimestamp": 1
    })
}

async fn connected(venue: &MockVenue) -> WsClient {
    let client = WsClient::new(venue.config());
    client.connect().await.unwrap();
    client
}

// ---------------------------------------------------------------------------
// Feeds
// ---------------------------------------------------------------------------

#[tokio::test]
async fn handlers_are_isolated_by_channel_key() {
    let mut venue = MockVenue::start().await;
    let client = connected(&venue).await;

    let (btc_cb, mut btc) = channel();
    let (eth_cb, mut eth) = channel();
    client.subscribe(Subscription::l2_book("BTC"), btc_cb).await.unwrap();
    client.subscribe(Subscription::l2_book("ETH"), eth_cb).await.unwrap();

    let sent = venue.next_with_method("subscribe").await;
    assert_eq!(sent["subscription"], json!({"type": "l2Book", "coin": "BTC"}));
    venue.next_with_method("subscribe").await;

    venue.push_feed("l2Book", book("BTC"));
    venue.push_feed("l2Book", book("ETH"));

    assert_eq!(recv_within(&mut btc).await["coin"], "BTC");
    assert_eq!(recv_within(&mut eth).await["coin"], "ETH");
    assert!(btc.try_recv().is_err());
    assert!(eth.try_recv().is_err());

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn resubscribe_replaces_handler() {
    let venue = MockVenue::start().await;
    let client = connected(&venue).await;

    let (first_cb, mut first) = channel();
    let (second_cb, mut second) = channel();
    client.subscribe(Subscription::l2_book("BTC"), first_cb).await.unwrap();
    client.subscribe(Subscription::l2_book("BTC"), second_cb).await.unwrap();
    assert_eq!(client.subscription_count().await, 1);

    venue.push_feed("l2Book", book("BTC"));

    assert_eq!(recv_within(&mut second).await["coin"], "BTC");
    assert!(first.try_recv().is_err());

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn unsubscribe_stops_delivery() {
    let mut venue = MockVenue::start().await;
    let client = connected(&venue).await;

    let (trades_cb, mut trades) = channel();
    let (mids_cb, mut mids) = channel();
    let trades_sub = Subscription::trades("BTC");
    client.subscribe(trades_sub.clone(), trades_cb).await.unwrap();
    client.subscribe(Subscription::all_mids(), mids_cb).await.unwrap();

    client.unsubscribe(&trades_sub).await.unwrap();
    let sent = venue.next_with_method("unsubscribe").await;
    assert_eq!(sent["subscription"], json!({"type": "trades", "coin": "BTC"}));
    assert_eq!(client.subscription_count().await, 1);

    venue.push_feed("trades", json!([{"coin": "BTC", "side": "A", "px": "1", "sz": "1",
                                      "hash": "0x0", "time": 1, "tid": 1}]));
    // Frames are handled in order: once this one lands the trade was dropped.
    venue.push_feed("allMids", json!({"mids": {"BTC": "1"}}));

    recv_within(&mut mids).await;
    assert!(trades.try_recv().is_err());

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn bare_order_updates_subscription_receives_user_keyed_frames() {
    let venue = MockVenue::start().await;
    let client = connected(&venue).await;

    let (cb, mut rx) = channel();
    client.subscribe(Subscription::new("orderUpdates"), cb).await.unwrap();

    venue.push_feed("orderUpdates", json!({"user": "0xabc", "orders": []}));

    assert_eq!(recv_within(&mut rx).await["user"], "0xabc");
    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn user_order_updates_reach_typed_handler() {
    let venue = MockVenue::start().await;
    let client = connected(&venue).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    client
        .subscribe_order_updates("0xabc", move |orders: Vec<WsOrder>| {
            let _ = tx.send(orders);
        })
        .await
        .unwrap();

    // Payloads carry no user; the prefix rule finds the subscription.
    venue.push_feed("orderUpdates", json!([order(7), order(8)]));

    let orders = recv_within(&mut rx).await;
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].order.oid, 7);
    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn malformed_frames_do_not_stop_the_reader() {
    let venue = MockVenue::start().await;
    let client = connected(&venue).await;

    let (cb, mut rx) = channel();
    client.subscribe(Subscription::all_mids(), cb).await.unwrap();

    venue.push_raw("not json");
    venue.push_raw(r#"{"data": {}}"#);
    venue.push_feed("allMids", json!({"mids": {"ETH": "2"}}));

    assert_eq!(recv_within(&mut rx).await["mids"]["ETH"], "2");
    assert!(client.is_connected().await);
    client.disconnect().await.unwrap();
}

// ---------------------------------------------------------------------------
// Post
// ---------------------------------------------------------------------------

#[tokio::test]
async fn post_resolves_once_and_drops_duplicates() {
    let mut venue = MockVenue::start().await;
    let client = connected(&venue).await;

    let task = {
        let client = client.clone();
        tokio::spawn(async move { client.post_info(&json!({"type": "meta"})).await })
    };

    let sent = venue.next_with_method("post").await;
    assert_eq!(sent["request"], json!({"type": "info", "payload": {"type": "meta"}}));
    let id = sent["id"].as_u64().unwrap();

    venue.respond(id, "info", json!({"universe": []}));
    venue.respond(id, "info", json!({"universe": ["late"]}));

    assert_eq!(task.await.unwrap().unwrap(), json!({"universe": []}));
    assert_eq!(client.pending_count().await, 0);

    // The duplicate was dropped and the connection still correlates.
    let task = {
        let client = client.clone();
        tokio::spawn(async move { client.post_info(&json!({"type": "meta"})).await })
    };
    let sent = venue.next_with_method("post").await;
    let next = sent["id"].as_u64().unwrap();
    assert_eq!(next, id + 1);
    venue.respond(next, "info", json!(1));
    assert_eq!(task.await.unwrap().unwrap(), json!(1));

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn post_error_response_surfaces_remote_message() {
    let mut venue = MockVenue::start().await;
    let client = connected(&venue).await;

    let task = {
        let client = client.clone();
        tokio::spawn(async move { client.post_action(&json!({"type": "order"})).await })
    };
    let id = venue.next_with_method("post").await["id"].as_u64().unwrap();
    venue.respond(id, "error", json!("Order has invalid price."));

    match task.await.unwrap() {
        Err(HlxError::Remote(msg)) => assert_eq!(msg, "Order has invalid price."),
        other => panic!("unexpected {other:?}"),
    }
    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn post_times_out_and_ignores_late_response() {
    let mut venue = MockVenue::start().await;
    let mut config = venue.config();
    config.request_timeout_ms = 150;
    let client = WsClient::new(config);
    client.connect().await.unwrap();

    let task = {
        let client = client.clone();
        tokio::spawn(async move { client.post_info(&json!({"type": "meta"})).await })
    };
    let id = venue.next_with_method("post").await["id"].as_u64().unwrap();

    match task.await.unwrap() {
        Err(HlxError::RequestTimeout { id: timed_out, .. }) => assert_eq!(timed_out, id),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(client.pending_count().await, 0);

    venue.respond(id, "info", json!("late"));

    let (cb, mut rx) = channel();
    client.subscribe(Subscription::all_mids(), cb).await.unwrap();
    venue.push_feed("allMids", json!({"mids": {}}));
    recv_within(&mut rx).await;
    assert!(client.is_connected().await);

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn disconnect_cancels_pending_posts() {
    let mut venue = MockVenue::start().await;
    let client = connected(&venue).await;

    let (cb, _rx) = channel();
    client.subscribe(Subscription::all_mids(), cb).await.unwrap();

    let tasks: Vec<_> = (0..2)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.post_info(&json!({"type": "meta"})).await })
        })
        .collect();
    venue.next_with_method("post").await;
    venue.next_with_method("post").await;
    assert_eq!(client.pending_count().await, 2);

    client.disconnect().await.unwrap();

    for task in tasks {
        assert!(matches!(task.await.unwrap(), Err(HlxError::Cancelled)));
    }
    assert!(!client.is_connected().await);
    assert_eq!(client.subscription_count().await, 0);
    assert_eq!(client.pending_count().await, 0);
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn connect_and_disconnect_are_idempotent() {
    let venue = MockVenue::start().await;
    let client = WsClient::new(venue.config());

    client.connect().await.unwrap();
    client.connect().await.unwrap();
    assert!(client.is_connected().await);
    assert!(venue.wait_for_sessions(1).await);

    client.disconnect().await.unwrap();
    client.disconnect().await.unwrap();
    assert!(!client.is_connected().await);
    assert_eq!(venue.sessions(), 1);
}

#[tokio::test]
async fn subscribe_and_post_connect_on_demand() {
    let mut venue = MockVenue::start().await;
    let client = WsClient::new(venue.config());

    let (cb, _rx) = channel();
    client.subscribe(Subscription::bbo("BTC"), cb).await.unwrap();
    assert!(client.is_connected().await);
    client.disconnect().await.unwrap();

    let task = {
        let client = client.clone();
        tokio::spawn(async move { client.post_info(&json!({"type": "meta"})).await })
    };
    let id = venue.next_with_method("post").await["id"].as_u64().unwrap();
    venue.respond(id, "info", json!(null));
    assert_eq!(task.await.unwrap().unwrap(), Value::Null);
    assert!(venue.wait_for_sessions(2).await);

    client.disconnect().await.unwrap();
    assert!(matches!(
        client.unsubscribe(&Subscription::bbo("BTC")).await,
        Err(HlxError::NotConnected)
    ));
}

#[tokio::test]
async fn remote_close_fails_pending_and_disconnects() {
    let mut venue = MockVenue::start().await;
    let client = connected(&venue).await;

    let task = {
        let client = client.clone();
        tokio::spawn(async move { client.post_info(&json!({"type": "meta"})).await })
    };
    venue.next_with_method("post").await;

    venue.hang_up();

    assert!(matches!(task.await.unwrap(), Err(HlxError::Connection(_))));
    let probe = client.clone();
    assert!(eventually(move || {
        let probe = probe.clone();
        async move { !probe.is_connected().await }
    })
    .await);

    // A later subscribe opens a fresh connection.
    let (cb, mut rx) = channel();
    client.subscribe(Subscription::all_mids(), cb).await.unwrap();
    venue.push_feed("allMids", json!({"mids": {}}));
    recv_within(&mut rx).await;
    assert!(venue.wait_for_sessions(2).await);

    client.disconnect().await.unwrap();
}
