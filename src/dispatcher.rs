//! Message Dispatcher (spec §4.5): demultiplexes inbound frames by `type` and routes each to a
//! typed handler, owning the per-market Book/Tick/Trade/Lifecycle stores exclusively.
//!
//! Grounded in `original_source/packages/kalshi/src/kalshi/ws/handler.py`
//! (`KalshiMessageHandler.handle_message`) and the per-type handlers in
//! `original_source/packages/kalshi/src/kalshi/ws/handlers/{orderbooks,trades,lifecycles}.py`.
//! Per spec §9's re-architecture guidance, the string-keyed `message_type_map` becomes matching
//! on `IncomingFrame` (wire.rs), and duck-typed handlers become the `HandlesBookUpdate`,
//! `HandlesTick`, `HandlesTrade`, `HandlesLifecycle` capability traits below, each with one
//! concrete implementation on `Dispatcher`.

use std::collections::HashMap;

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::book::Orderbook;
use crate::errors::{Result, StreamError};
use crate::stores::{Lifecycle, Tick, Trade};
use crate::subscription::SubscriptionManager;
use crate::types::MarketTicker;
use crate::wire::IncomingFrame;

/// What the Dispatcher asks its caller to do after routing a frame.
#[derive(Debug, Clone)]
pub enum DispatchAction {
    /// Nothing further; the frame was fully handled in-process.
    None,
    /// Send this outbound wire command on the active connection (e.g. a forced resubscribe).
    Send(serde_json::Value),
    /// A `SequenceGap`/`ProtocolError` occurred; the named market's book needs a fresh snapshot.
    RequestSnapshot(MarketTicker),
}

pub trait HandlesBookUpdate {
    fn on_snapshot(&mut self, market: &MarketTicker, seq: Option<i64>, yes: &[(i32, i64)], no: &[(i32, i64)]) -> Result<()>;
    fn on_delta(&mut self, market: &MarketTicker, seq: Option<i64>, side: crate::types::QuoteSide, price: i32, delta: i64) -> Result<()>;
}

pub trait HandlesTick {
    #[allow(clippy::too_many_arguments)]
    fn on_tick(
        &mut self,
        market: &MarketTicker,
        ts: Option<i64>,
        price: Option<i32>,
        bid: Option<i32>,
        ask: Option<i32>,
        volume: Option<i64>,
        open_interest: Option<i64>,
        dollar_volume: Option<i64>,
        dollar_open_interest: Option<i64>,
    );
}

pub trait HandlesTrade {
    fn on_trade(
        &mut self,
        market: &MarketTicker,
        ts: Option<i64>,
        taker_side: Option<crate::types::QuoteSide>,
        yes_price: Option<i32>,
        no_price: Option<i32>,
        count: Option<i64>,
    );
}

pub trait HandlesLifecycle {
    #[allow(clippy::too_many_arguments)]
    fn on_lifecycle(
        &mut self,
        market: &MarketTicker,
        is_deactivated: Option<bool>,
        open_ts: Option<i64>,
        close_ts: Option<i64>,
        determination_ts: Option<i64>,
        settled_ts: Option<i64>,
        result: Option<crate::types::QuoteSide>,
    ) -> Result<()>;
}

/// Single-threaded-per-socket owner of every per-market store. Preserves arrival order; never
/// blocks on downstream stores, since each store update is an in-memory last-value write.
pub struct Dispatcher {
    books: HashMap<MarketTicker, Orderbook>,
    ticks: HashMap<MarketTicker, Tick>,
    trades: HashMap<MarketTicker, Trade>,
    lifecycles: HashMap<MarketTicker, Lifecycle>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            books: HashMap::new(),
            ticks: HashMap::new(),
            trades: HashMap::new(),
            lifecycles: HashMap::new(),
        }
    }

    pub fn book(&self, market: &MarketTicker) -> Option<&Orderbook> {
        self.books.get(market)
    }

    pub fn tick(&self, market: &MarketTicker) -> Option<&Tick> {
        self.ticks.get(market)
    }

    pub fn trade(&self, market: &MarketTicker) -> Option<&Trade> {
        self.trades.get(market)
    }

    pub fn lifecycle(&self, market: &MarketTicker) -> Option<&Lifecycle> {
        self.lifecycles.get(market)
    }

    /// Routes one decoded frame, per the table in spec §4.5. `subscriptions` is consulted/
    /// mutated for the four subscription-lifecycle frame types; `now` timestamps any
    /// resubscribe this produces.
    pub fn dispatch(
        &mut self,
        frame: IncomingFrame,
        subscriptions: &mut SubscriptionManager,
        now: OffsetDateTime,
    ) -> DispatchAction {
        match frame {
            IncomingFrame::Subscribed { id, msg } => {
                if let Some(id) = id {
                    subscriptions.confirm(id, now);
                    info!(subscription_id = %id, ?msg, "subscription confirmed");
                }
                DispatchAction::None
            }
            IncomingFrame::Unsubscribed { sid } => {
                let Some(sid) = sid else { return DispatchAction::None };
                match subscriptions.handle_unsubscribed(sid, now) {
                    Some((_new_id, command)) => DispatchAction::Send(command),
                    None => DispatchAction::None,
                }
            }
            IncomingFrame::Ok { id, market_tickers } => {
                info!(subscription_id = ?id, ?market_tickers, "subscription update acknowledged");
                DispatchAction::None
            }
            IncomingFrame::Error { id, msg } => {
                warn!(subscription_id = ?id, ?msg, "error frame received");
                match id.and_then(|id| subscriptions.rollback_ticker_update(id, now)) {
                    Some(command) => DispatchAction::Send(command),
                    None => DispatchAction::None,
                }
            }
            IncomingFrame::OrderbookSnapshot { seq, market_ticker, yes, no } => {
                let market = MarketTicker::from(market_ticker);
                match self.on_snapshot(&market, seq, &yes, &no) {
                    Ok(()) => DispatchAction::None,
                    Err(_) => DispatchAction::RequestSnapshot(market),
                }
            }
            IncomingFrame::OrderbookDelta { seq, market_ticker, price, delta, side } => {
                let market = MarketTicker::from(market_ticker);
                match self.on_delta(&market, seq, side, price, delta) {
                    Ok(()) => DispatchAction::None,
                    Err(StreamError::StaleDelta { .. }) => DispatchAction::None,
                    Err(_) => DispatchAction::RequestSnapshot(market),
                }
            }
            IncomingFrame::Ticker {
                market_ticker,
                ts,
                price,
                bid,
                ask,
                volume,
                open_interest,
                dollar_volume,
                dollar_open_interest,
            } => {
                let market = MarketTicker::from(market_ticker);
                self.on_tick(&market, ts, price, bid, ask, volume, open_interest, dollar_volume, dollar_open_interest);
                DispatchAction::None
            }
            IncomingFrame::Trade { market_ticker, ts, taker_side, yes_price, no_price, count } => {
                let market = MarketTicker::from(market_ticker);
                self.on_trade(&market, ts, taker_side, yes_price, no_price, count);
                DispatchAction::None
            }
            IncomingFrame::Fill(payload) => {
                debug!(?payload, "fill frame received (external: portfolio observer)");
                DispatchAction::None
            }
            IncomingFrame::MarketLifecycle {
                market_ticker,
                is_deactivated,
                open_ts,
                close_ts,
                determination_ts,
                settled_ts,
                result,
            } => {
                let market = MarketTicker::from(market_ticker);
                if let Err(err) = self.on_lifecycle(&market, is_deactivated, open_ts, close_ts, determination_ts, settled_ts, result) {
                    warn!(%market, %err, "lifecycle update rejected");
                }
                DispatchAction::None
            }
            IncomingFrame::Unknown => {
                debug!("unknown frame type, dropped");
                DispatchAction::None
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlesBookUpdate for Dispatcher {
    fn on_snapshot(&mut self, market: &MarketTicker, seq: Option<i64>, yes: &[(i32, i64)], no: &[(i32, i64)]) -> Result<()> {
        let book = self.books.entry(market.clone()).or_insert_with(Orderbook::new);
        book.apply_snapshot(market.as_str(), seq, yes, no)
    }

    fn on_delta(&mut self, market: &MarketTicker, seq: Option<i64>, side: crate::types::QuoteSide, price: i32, delta: i64) -> Result<()> {
        let book = self.books.entry(market.clone()).or_insert_with(Orderbook::new);
        book.apply_delta(market.as_str(), seq, side, price, delta)
    }
}

impl HandlesTick for Dispatcher {
    fn on_tick(
        &mut self,
        market: &MarketTicker,
        ts: Option<i64>,
        price: Option<i32>,
        bid: Option<i32>,
        ask: Option<i32>,
        volume: Option<i64>,
        open_interest: Option<i64>,
        dollar_volume: Option<i64>,
        dollar_open_interest: Option<i64>,
    ) {
        let tick = self.ticks.entry(market.clone()).or_insert_with(Tick::empty);
        tick.update(ts, price, bid, ask, volume, open_interest, dollar_volume, dollar_open_interest);
    }
}

impl HandlesTrade for Dispatcher {
    fn on_trade(
        &mut self,
        market: &MarketTicker,
        ts: Option<i64>,
        taker_side: Option<crate::types::QuoteSide>,
        yes_price: Option<i32>,
        no_price: Option<i32>,
        count: Option<i64>,
    ) {
        let trade = self.trades.entry(market.clone()).or_insert_with(Trade::empty);
        trade.update(ts, taker_side, yes_price, no_price, count);
    }
}

impl HandlesLifecycle for Dispatcher {
    fn on_lifecycle(
        &mut self,
        market: &MarketTicker,
        is_deactivated: Option<bool>,
        open_ts: Option<i64>,
        close_ts: Option<i64>,
        determination_ts: Option<i64>,
        settled_ts: Option<i64>,
        result: Option<crate::types::QuoteSide>,
    ) -> Result<()> {
        let lifecycle = self.lifecycles.entry(market.clone()).or_insert_with(Lifecycle::empty);
        let result = lifecycle.update(market.as_str(), is_deactivated, open_ts, close_ts, determination_ts, settled_ts, result);
        if result.is_ok() && self.lifecycles[market].settled_ts.is_some() {
            self.books.remove(market);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn now() -> OffsetDateTime {
        datetime!(2026-01-01 00:00:00 UTC)
    }

    #[test]
    fn unknown_frame_is_dropped_without_action() {
        let mut dispatcher = Dispatcher::new();
        let mut subs = SubscriptionManager::new();
        let action = dispatcher.dispatch(IncomingFrame::Unknown, &mut subs, now());
        assert!(matches!(action, DispatchAction::None));
    }

    #[test]
    fn snapshot_frame_populates_book() {
        let mut dispatcher = Dispatcher::new();
        let mut subs = SubscriptionManager::new();
        let market = MarketTicker::from("T");

        let action = dispatcher.dispatch(
            IncomingFrame::OrderbookSnapshot {
                seq: Some(1),
                market_ticker: "T".to_string(),
                yes: vec![(40, 5)],
                no: vec![(55, 2)],
            },
            &mut subs,
            now(),
        );

        assert!(matches!(action, DispatchAction::None));
        assert!(dispatcher.book(&market).is_some());
    }

    #[test]
    fn missing_seq_on_snapshot_requests_a_fresh_snapshot() {
        let mut dispatcher = Dispatcher::new();
        let mut subs = SubscriptionManager::new();

        let action = dispatcher.dispatch(
            IncomingFrame::OrderbookSnapshot {
                seq: None,
                market_ticker: "T".to_string(),
                yes: vec![],
                no: vec![],
            },
            &mut subs,
            now(),
        );

        assert!(matches!(action, DispatchAction::RequestSnapshot(_)));
    }

    #[test]
    fn terminal_lifecycle_tears_down_the_books_market() {
        let mut dispatcher = Dispatcher::new();
        let mut subs = SubscriptionManager::new();
        let market = MarketTicker::from("T");

        dispatcher.dispatch(
            IncomingFrame::OrderbookSnapshot {
                seq: Some(1),
                market_ticker: "T".to_string(),
                yes: vec![(40, 5)],
                no: vec![(55, 2)],
            },
            &mut subs,
            now(),
        );
        assert!(dispatcher.book(&market).is_some());

        dispatcher.dispatch(
            IncomingFrame::MarketLifecycle {
                market_ticker: "T".to_string(),
                is_deactivated: Some(true),
                open_ts: Some(1),
                close_ts: Some(2),
                determination_ts: Some(3),
                settled_ts: Some(4),
                result: Some(crate::types::QuoteSide::Yes),
            },
            &mut subs,
            now(),
        );

        assert!(dispatcher.book(&market).is_none());
    }

    #[test]
    fn error_frame_rolls_back_a_pending_ticker_update() {
        use crate::types::TickerScope;

        let mut dispatcher = Dispatcher::new();
        let mut subs = SubscriptionManager::new();
        let (sub_id, _) =
            subs.add_subscription(vec!["ticker".into()], TickerScope::Markets(vec!["A".into()]), now());
        subs.confirm(sub_id, now());

        let commands = subs.update_tickers(sub_id, vec!["A".into(), "B".into()], now());
        let command_id = crate::types::SubscriptionId::new(commands[0]["id"].as_u64().unwrap());

        let action = dispatcher.dispatch(
            IncomingFrame::Error { id: Some(command_id), msg: Some(serde_json::json!("market unknown")) },
            &mut subs,
            now(),
        );

        match action {
            DispatchAction::Send(command) => assert_eq!(command["params"]["action"], "delete_markets"),
            other => panic!("expected a rollback Send action, got {other:?}"),
        }
    }
}
