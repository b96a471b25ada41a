//! Integration coverage for the Subscription Manager's public API (spec §8), driven only through
//! `kalshi_stream::SubscriptionManager` rather than the white-box unit tests colocated in
//! `src/subscription.rs`.

use kalshi_stream::{SubscriptionManager, TickerScope};
use time::macros::datetime;

fn now() -> time::OffsetDateTime {
    datetime!(2026-01-01 00:00:00 UTC)
}

#[test]
fn subscription_ids_stay_monotonic_across_add_unsub_and_forced_resubscribe() {
    let mut manager = SubscriptionManager::new();

    let (first, _) = manager.add_subscription(vec!["trade".into()], TickerScope::AllMarkets, now());
    manager.confirm(first, now());

    let (_, command) = manager.unsubscribe(&[first]);
    assert!(command.is_some());

    let (second, _) = manager.add_subscription(vec!["ticker".into()], TickerScope::AllMarkets, now());
    assert!(second > first);

    manager.confirm(second, now());
    let (forced_id, _forced_command) = manager
        .handle_unsubscribed(second, now())
        .expect("an active subscription not awaiting removal is a forced unsubscribe");
    assert!(forced_id > second);
}

#[test]
fn ticker_diff_then_server_rejection_restores_prior_scope_through_dispatch() {
    use kalshi_stream::wire::IncomingFrame;
    use kalshi_stream::{Dispatcher, MarketTicker};

    let mut manager = SubscriptionManager::new();
    let (id, _) = manager.add_subscription(
        vec!["orderbook_delta".into()],
        TickerScope::Markets(vec![MarketTicker::from("A")]),
        now(),
    );
    manager.confirm(id, now());

    let commands = manager.update_tickers(id, vec!["A".into(), "B".into()], now());
    assert_eq!(commands.len(), 1);
    let command_id =
        kalshi_stream::SubscriptionId::new(commands[0]["id"].as_u64().expect("command has an id"));

    let mut dispatcher = Dispatcher::new();
    let action = dispatcher.dispatch(
        IncomingFrame::Error { id: Some(command_id), msg: None },
        &mut manager,
        now(),
    );

    match action {
        kalshi_stream::dispatcher::DispatchAction::Send(rollback) => {
            assert_eq!(rollback["params"]["action"], "delete_markets");
        }
        other => panic!("expected the dispatcher to request a rollback send, got {other:?}"),
    }
}

#[test]
fn resubscribe_all_replays_only_active_subscriptions_with_their_original_channels() {
    let mut manager = SubscriptionManager::new();
    let (active, _) = manager.add_subscription(vec!["trade".into()], TickerScope::AllMarkets, now());
    manager.confirm(active, now());
    let (_pending, _) = manager.add_subscription(vec!["ticker".into()], TickerScope::AllMarkets, now());

    let replayed = manager.resubscribe_all(now());
    assert_eq!(replayed.len(), 1);
    assert_eq!(replayed[0]["params"]["channels"][0], "trade");
}
