//! Wire protocol shapes (spec §6): inbound frames as a tagged-variant enum, and constructors
//! for the outbound subscribe/update/unsubscribe commands.
//!
//! Grounded in `original_source/packages/kalshi/src/kalshi/ws/{client,handler}.py`, whose
//! string-keyed `message_type_map`/`match message.get("type")` dispatch this replaces with
//! serde's internally-tagged enum — per the re-architecture guidance against string-tagged
//! dispatch. Outbound payload construction follows the teacher's `serde_json::json!` idiom
//! (`examples/feothyuth-lr/src/ws_client.rs`).

use serde::Deserialize;
use serde_json::{json, Value};

use crate::types::{QuoteSide, SubscriptionId};

/// A decoded inbound frame. Unrecognised `type` tags deserialize to `Unknown` rather than
/// failing, so the Dispatcher can log and drop them per spec §4.5.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum IncomingFrame {
    #[serde(rename = "subscribed")]
    Subscribed {
        id: Option<SubscriptionId>,
        msg: Option<Value>,
    },
    #[serde(rename = "unsubscribed")]
    Unsubscribed { sid: Option<SubscriptionId> },
    #[serde(rename = "ok")]
    Ok {
        id: Option<SubscriptionId>,
        market_tickers: Option<Vec<String>>,
    },
    #[serde(rename = "error")]
    Error {
        id: Option<SubscriptionId>,
        msg: Option<Value>,
    },
    #[serde(rename = "orderbook_snapshot")]
    OrderbookSnapshot {
        seq: Option<i64>,
        market_ticker: String,
        yes: Vec<(i32, i64)>,
        no: Vec<(i32, i64)>,
    },
    #[serde(rename = "orderbook_delta")]
    OrderbookDelta {
        seq: Option<i64>,
        market_ticker: String,
        price: i32,
        delta: i64,
        side: QuoteSide,
    },
    #[serde(rename = "ticker")]
    Ticker {
        market_ticker: String,
        ts: Option<i64>,
        price: Option<i32>,
        bid: Option<i32>,
        ask: Option<i32>,
        volume: Option<i64>,
        open_interest: Option<i64>,
        dollar_volume: Option<i64>,
        dollar_open_interest: Option<i64>,
    },
    #[serde(rename = "trade")]
    Trade {
        market_ticker: String,
        ts: Option<i64>,
        taker_side: Option<QuoteSide>,
        yes_price: Option<i32>,
        no_price: Option<i32>,
        count: Option<i64>,
    },
    #[serde(rename = "fill")]
    Fill(Value),
    #[serde(rename = "market_lifecycle")]
    MarketLifecycle {
        market_ticker: String,
        is_deactivated: Option<bool>,
        open_ts: Option<i64>,
        close_ts: Option<i64>,
        determination_ts: Option<i64>,
        settled_ts: Option<i64>,
        result: Option<QuoteSide>,
    },
    #[serde(other)]
    Unknown,
}

/// Builds a `subscribe` command. `tickers == None` omits `market_tickers` (all-markets mode).
pub fn subscribe_command(id: SubscriptionId, channels: &[String], tickers: Option<&[String]>) -> Value {
    let mut params = json!({ "channels": channels });
    if let Some(tickers) = tickers {
        params["market_tickers"] = json!(tickers);
    }
    json!({ "id": id.into_inner(), "cmd": "subscribe", "params": params })
}

/// Builds an `update_subscription` command for a single subscription id.
pub fn update_subscription_command(
    command_id: SubscriptionId,
    sid: SubscriptionId,
    tickers: &[String],
    action: &str,
) -> Value {
    json!({
        "id": command_id.into_inner(),
        "cmd": "update_subscription",
        "params": {
            "sids": [sid.into_inner()],
            "market_tickers": tickers,
            "action": action,
        }
    })
}

/// Builds an `unsubscribe` command. Carries no top-level `id`, keeping the local subscription
/// id space distinct from command ids.
pub fn unsubscribe_command(sids: &[SubscriptionId]) -> Value {
    let ids: Vec<u64> = sids.iter().map(|sid| sid.into_inner()).collect();
    json!({ "cmd": "unsubscribe", "params": { "sids": ids } })
}
